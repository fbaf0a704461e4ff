use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use thiserror::Error;

use super::types::{ApiErrorBody, CurrentWeatherResponse};
use super::WeatherSource;
use crate::config::Config;
use crate::error::WeatherError;
use crate::models::Units;
use crate::utils::validate_coordinates;

#[derive(Error, Debug)]
pub enum OpenWeatherError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),
    #[error("JSON parsing failed: {0}")]
    JsonParsing(#[from] serde_json::Error),
    #[error("API error: HTTP {status}: {message:?}")]
    ApiError { status: u16, message: Option<String> },
    #[error("Invalid coordinates: {0}")]
    InvalidCoordinates(String),
}

impl OpenWeatherError {
    /// Classify into a domain error. `fallback` is used whenever the provider
    /// did not supply a message of its own.
    pub fn into_weather_error(self, fallback: &str) -> WeatherError {
        match self {
            OpenWeatherError::ApiError { status, message } => WeatherError::Upstream {
                status,
                message: message
                    .filter(|m| !m.trim().is_empty())
                    .unwrap_or_else(|| fallback.to_string()),
            },
            OpenWeatherError::RequestFailed(e) => WeatherError::Upstream {
                status: e.status().map(|s| s.as_u16()).unwrap_or(500),
                message: fallback.to_string(),
            },
            OpenWeatherError::JsonParsing(_) => WeatherError::Upstream {
                status: 500,
                message: fallback.to_string(),
            },
            OpenWeatherError::InvalidCoordinates(reason) => WeatherError::Validation(reason),
        }
    }
}

pub struct OpenWeatherClient {
    client: Client,
    config: Config,
}

impl OpenWeatherClient {
    pub fn new(config: Config) -> Result<Self, OpenWeatherError> {
        let client = Client::builder()
            .user_agent("WeatherCrudServer/1.0")
            .timeout(config.http_timeout())
            .build()?;

        Ok(Self { client, config })
    }

    fn weather_url(&self) -> String {
        format!(
            "{}{}",
            self.config.openweather_base_url, self.config.openweather_weather_path
        )
    }

    /// Single attempt, no retry.
    async fn make_request(&self, params: &[(&str, &str)]) -> Result<Value, OpenWeatherError> {
        let response = self.client.get(self.weather_url()).query(params).send().await?;
        let status = response.status();

        if status.is_success() {
            let json: Value = response.json().await?;
            return Ok(json);
        }

        let error_text = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ApiErrorBody>(&error_text)
            .ok()
            .and_then(|body| body.message);
        tracing::error!("OpenWeather API returned HTTP {}: {}", status, error_text);

        Err(OpenWeatherError::ApiError {
            status: status.as_u16(),
            message,
        })
    }
}

/// `q` parameter for a city lookup, e.g. `london,gb`.
pub fn city_query(city_name: &str, country_code: Option<&str>) -> String {
    let city = city_name.trim().to_lowercase();
    match country_code.map(|c| c.trim().to_lowercase()) {
        Some(country) if !country.is_empty() => format!("{},{}", city, country),
        _ => city,
    }
}

#[async_trait]
impl WeatherSource for OpenWeatherClient {
    async fn fetch_by_coordinates(
        &self,
        lat: f64,
        lon: f64,
        units: Units,
        lang: &str,
    ) -> Result<CurrentWeatherResponse, OpenWeatherError> {
        validate_coordinates(lat, lon).map_err(OpenWeatherError::InvalidCoordinates)?;

        let response = self
            .make_request(&[
                ("lat", &lat.to_string()),
                ("lon", &lon.to_string()),
                ("units", units.as_str()),
                ("lang", lang),
                ("appid", &self.config.openweather_api_key),
            ])
            .await?;

        let weather: CurrentWeatherResponse = serde_json::from_value(response)?;
        Ok(weather)
    }

    async fn fetch_by_city(
        &self,
        city_name: &str,
        country_code: Option<&str>,
        units: Units,
        lang: &str,
    ) -> Result<CurrentWeatherResponse, OpenWeatherError> {
        let response = self
            .make_request(&[
                ("q", &city_query(city_name, country_code)),
                ("units", units.as_str()),
                ("lang", lang),
                ("appid", &self.config.openweather_api_key),
            ])
            .await?;

        let weather: CurrentWeatherResponse = serde_json::from_value(response)?;
        Ok(weather)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> OpenWeatherClient {
        let config = Config::from_lookup(|key| match key {
            "OPENWEATHER_API_KEY" => Some("test-key".to_string()),
            "OPENWEATHER_BASE_URL" => Some(server.uri()),
            "HTTP_TIMEOUT_SECS" => Some("5".to_string()),
            _ => None,
        })
        .unwrap();
        OpenWeatherClient::new(config).unwrap()
    }

    fn london_body() -> Value {
        json!({
            "coord": { "lon": -0.13, "lat": 51.51 },
            "weather": [{ "id": 802, "main": "Clouds", "description": "scattered clouds", "icon": "03d" }],
            "main": { "temp": 15.2, "feels_like": 14.8, "pressure": 1012, "humidity": 76 },
            "visibility": 10000,
            "wind": { "speed": 4.1, "deg": 250 },
            "clouds": { "all": 40 },
            "dt": 1641038400,
            "sys": { "country": "GB" },
            "name": "London",
            "cod": 200
        })
    }

    #[test]
    fn test_city_query() {
        assert_eq!(city_query("London", Some("GB")), "london,gb");
        assert_eq!(city_query("London", Some("")), "london");
        assert_eq!(city_query(" New York ", None), "new york");
    }

    #[tokio::test]
    async fn test_fetch_by_coordinates_sends_expected_query() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/data/2.5/weather"))
            .and(query_param("lat", "51.51"))
            .and(query_param("lon", "-0.13"))
            .and(query_param("units", "imperial"))
            .and(query_param("lang", "de"))
            .and(query_param("appid", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(london_body()))
            .expect(1)
            .mount(&server)
            .await;

        let weather = client_for(&server)
            .fetch_by_coordinates(51.51, -0.13, Units::Imperial, "de")
            .await
            .unwrap();

        assert_eq!(weather.name, "London");
        assert_eq!(weather.sys.country.as_deref(), Some("GB"));
    }

    #[tokio::test]
    async fn test_fetch_by_city_uses_lowercased_query() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/data/2.5/weather"))
            .and(query_param("q", "london,gb"))
            .and(query_param("units", "metric"))
            .respond_with(ResponseTemplate::new(200).set_body_json(london_body()))
            .expect(1)
            .mount(&server)
            .await;

        let weather = client_for(&server)
            .fetch_by_city("London", Some("GB"), Units::Metric, "en")
            .await
            .unwrap();

        assert_eq!(weather.name, "London");
    }

    #[tokio::test]
    async fn test_api_error_carries_status_and_message() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(404).set_body_json(json!({ "cod": "404", "message": "city not found" })),
            )
            .mount(&server)
            .await;

        let err = client_for(&server)
            .fetch_by_city("Atlantis", None, Units::Metric, "en")
            .await
            .unwrap_err();

        assert_eq!(
            err.into_weather_error("Failed to fetch weather data for city"),
            WeatherError::Upstream { status: 404, message: "city not found".into() }
        );
    }

    #[tokio::test]
    async fn test_api_error_without_body_uses_fallback() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .fetch_by_coordinates(0.0, 0.0, Units::Metric, "en")
            .await
            .unwrap_err();

        assert_eq!(
            err.into_weather_error("Failed to fetch weather data"),
            WeatherError::Upstream { status: 503, message: "Failed to fetch weather data".into() }
        );
    }

    #[tokio::test]
    async fn test_malformed_body_is_upstream_500() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "unexpected": true })))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .fetch_by_coordinates(10.0, 10.0, Units::Metric, "en")
            .await
            .unwrap_err();

        assert!(matches!(err, OpenWeatherError::JsonParsing(_)));
        assert_eq!(
            err.into_weather_error("Failed to fetch weather data"),
            WeatherError::Upstream { status: 500, message: "Failed to fetch weather data".into() }
        );
    }

    #[tokio::test]
    async fn test_invalid_coordinates_never_reach_the_network() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(london_body()))
            .expect(0)
            .mount(&server)
            .await;

        let err = client_for(&server)
            .fetch_by_coordinates(123.0, 0.0, Units::Metric, "en")
            .await
            .unwrap_err();

        assert!(matches!(
            err.into_weather_error("Failed to fetch weather data"),
            WeatherError::Validation(_)
        ));
    }
}
