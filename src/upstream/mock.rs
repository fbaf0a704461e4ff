use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use super::openweather::OpenWeatherError;
use super::types::{sample_payload, CurrentWeatherResponse};
use super::WeatherSource;
use crate::models::Units;

#[derive(Debug, Clone, PartialEq)]
pub enum RecordedCall {
    Coordinates { lat: f64, lon: f64, units: Units, lang: String },
    City { city_name: String, country_code: Option<String>, units: Units, lang: String },
}

enum Reply {
    Payload(CurrentWeatherResponse),
    Failure { status: u16, message: Option<String> },
}

/// Upstream double returning a canned answer and recording every call.
pub struct MockWeatherClient {
    reply: Reply,
    calls: AtomicUsize,
    recorded: Mutex<Vec<RecordedCall>>,
}

impl MockWeatherClient {
    pub fn returning(payload: CurrentWeatherResponse) -> Self {
        Self {
            reply: Reply::Payload(payload),
            calls: AtomicUsize::new(0),
            recorded: Mutex::new(Vec::new()),
        }
    }

    pub fn london() -> Self {
        Self::returning(sample_payload("London", "GB"))
    }

    pub fn failing(status: u16, message: Option<&str>) -> Self {
        Self {
            reply: Reply::Failure {
                status,
                message: message.map(str::to_string),
            },
            calls: AtomicUsize::new(0),
            recorded: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn recorded(&self) -> Vec<RecordedCall> {
        self.recorded.lock().unwrap().clone()
    }

    fn answer(&self, call: RecordedCall) -> Result<CurrentWeatherResponse, OpenWeatherError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.recorded.lock().unwrap().push(call);
        match &self.reply {
            Reply::Payload(payload) => Ok(payload.clone()),
            Reply::Failure { status, message } => Err(OpenWeatherError::ApiError {
                status: *status,
                message: message.clone(),
            }),
        }
    }
}

#[async_trait]
impl WeatherSource for MockWeatherClient {
    async fn fetch_by_coordinates(
        &self,
        lat: f64,
        lon: f64,
        units: Units,
        lang: &str,
    ) -> Result<CurrentWeatherResponse, OpenWeatherError> {
        self.answer(RecordedCall::Coordinates {
            lat,
            lon,
            units,
            lang: lang.to_string(),
        })
    }

    async fn fetch_by_city(
        &self,
        city_name: &str,
        country_code: Option<&str>,
        units: Units,
        lang: &str,
    ) -> Result<CurrentWeatherResponse, OpenWeatherError> {
        self.answer(RecordedCall::City {
            city_name: city_name.to_string(),
            country_code: country_code.map(str::to_string),
            units,
            lang: lang.to_string(),
        })
    }
}
