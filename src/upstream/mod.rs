pub mod openweather;
pub mod types;
#[cfg(test)]
pub mod mock;

use async_trait::async_trait;

use crate::models::Units;
use openweather::OpenWeatherError;
use types::CurrentWeatherResponse;

/// Third-party source of current weather observations.
#[async_trait]
pub trait WeatherSource: Send + Sync {
    async fn fetch_by_coordinates(
        &self,
        lat: f64,
        lon: f64,
        units: Units,
        lang: &str,
    ) -> Result<CurrentWeatherResponse, OpenWeatherError>;

    async fn fetch_by_city(
        &self,
        city_name: &str,
        country_code: Option<&str>,
        units: Units,
        lang: &str,
    ) -> Result<CurrentWeatherResponse, OpenWeatherError>;
}
