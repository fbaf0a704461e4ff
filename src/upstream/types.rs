use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::models::{Units, WeatherRecord};

/// Body of the OpenWeather "current weather" endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentWeatherResponse {
    pub coord: Coord,
    #[serde(default)]
    pub weather: Vec<WeatherCondition>,
    pub main: MainMeasurements,
    pub visibility: Option<f64>,
    pub wind: Wind,
    pub clouds: Clouds,
    pub rain: Option<HashMap<String, f64>>,
    pub snow: Option<HashMap<String, f64>>,
    pub dt: i64,
    #[serde(default)]
    pub sys: Sys,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Coord {
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherCondition {
    pub id: Option<i32>,
    pub main: Option<String>,
    pub description: String,
    pub icon: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MainMeasurements {
    pub temp: f64,
    pub feels_like: f64,
    pub temp_min: Option<f64>,
    pub temp_max: Option<f64>,
    pub pressure: f64,
    pub humidity: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Wind {
    pub speed: f64,
    #[serde(default)]
    pub deg: f64,
    pub gust: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Clouds {
    pub all: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Sys {
    pub country: Option<String>,
}

/// Error body returned with non-2xx responses, e.g.
/// `{"cod":"404","message":"city not found"}`.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorBody {
    pub message: Option<String>,
}

fn last_hour(volumes: &Option<HashMap<String, f64>>) -> f64 {
    volumes
        .as_ref()
        .and_then(|v| v.get("1h"))
        .copied()
        .unwrap_or(0.0)
}

impl CurrentWeatherResponse {
    /// Convert the upstream payload into a fresh, not yet persisted record.
    pub fn into_record(self, units: Units) -> WeatherRecord {
        let now = Utc::now();
        let fetched_at = chrono::DateTime::from_timestamp(self.dt, 0).unwrap_or(now);
        let rain_volume = last_hour(&self.rain);
        let snow_volume = last_hour(&self.snow);
        let description = self.weather.into_iter().next().map(|w| w.description);

        WeatherRecord {
            id: Uuid::new_v4(),
            city_name: self.name,
            country: self.sys.country.filter(|c| !c.is_empty()),
            lat: self.coord.lat,
            lon: self.coord.lon,
            temperature: self.main.temp,
            feels_like: self.main.feels_like,
            temp_min: self.main.temp_min,
            temp_max: self.main.temp_max,
            pressure: self.main.pressure,
            humidity: self.main.humidity,
            wind_speed: self.wind.speed,
            wind_deg: self.wind.deg,
            wind_gust: self.wind.gust,
            description,
            visibility: self.visibility,
            cloudiness: self.clouds.all,
            rain_volume,
            snow_volume,
            units,
            fetched_at,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
pub(crate) fn sample_payload(name: &str, country: &str) -> CurrentWeatherResponse {
    serde_json::from_value(serde_json::json!({
        "coord": { "lon": -0.13, "lat": 51.51 },
        "weather": [{ "id": 802, "main": "Clouds", "description": "scattered clouds", "icon": "03d" }],
        "main": {
            "temp": 15.2, "feels_like": 14.8, "temp_min": 13.9, "temp_max": 16.1,
            "pressure": 1012, "humidity": 76
        },
        "visibility": 10000,
        "wind": { "speed": 4.1, "deg": 250, "gust": 8.2 },
        "clouds": { "all": 40 },
        "dt": 1641038400,
        "sys": { "country": country },
        "name": name,
        "cod": 200
    }))
    .unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_full_payload_mapping() {
        let record = sample_payload("London", "GB").into_record(Units::Metric);

        assert_eq!(record.city_name, "London");
        assert_eq!(record.country.as_deref(), Some("GB"));
        assert_eq!(record.lat, 51.51);
        assert_eq!(record.lon, -0.13);
        assert_eq!(record.temperature, 15.2);
        assert_eq!(record.temp_min, Some(13.9));
        assert_eq!(record.pressure, 1012.0);
        assert_eq!(record.wind_gust, Some(8.2));
        assert_eq!(record.description.as_deref(), Some("scattered clouds"));
        assert_eq!(record.visibility, Some(10000.0));
        assert_eq!(record.cloudiness, 40.0);
        assert_eq!(record.rain_volume, 0.0);
        assert_eq!(record.fetched_at.timestamp(), 1_641_038_400);
        assert_eq!(record.units, Units::Metric);
    }

    #[test]
    fn test_sparse_payload_defaults() {
        let payload: CurrentWeatherResponse = serde_json::from_value(json!({
            "coord": { "lon": 2.35, "lat": 48.85 },
            "weather": [],
            "main": { "temp": 280.1, "feels_like": 278.0, "pressure": 1020, "humidity": 90 },
            "wind": { "speed": 1.5 },
            "clouds": { "all": 100 },
            "rain": { "1h": 0.42 },
            "snow": { "3h": 1.0 },
            "dt": 1700000000,
            "sys": {},
            "name": "Paris"
        }))
        .unwrap();

        let record = payload.into_record(Units::Standard);

        assert_eq!(record.wind_gust, None);
        assert_eq!(record.wind_deg, 0.0);
        assert_eq!(record.description, None);
        assert_eq!(record.visibility, None);
        assert_eq!(record.country, None);
        assert_eq!(record.rain_volume, 0.42);
        // only the last hour counts
        assert_eq!(record.snow_volume, 0.0);
        assert_eq!(record.units, Units::Standard);
    }
}
