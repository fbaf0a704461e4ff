use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::WeatherError;
use crate::utils::{normalize_country, validate_coordinates};

/// Measurement system requested from the upstream provider.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum Units {
    #[default]
    Metric,
    Imperial,
    Standard,
}

impl Units {
    pub fn as_str(&self) -> &'static str {
        match self {
            Units::Metric => "metric",
            Units::Imperial => "imperial",
            Units::Standard => "standard",
        }
    }
}

impl fmt::Display for Units {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Units {
    type Err = WeatherError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "metric" => Ok(Units::Metric),
            "imperial" => Ok(Units::Imperial),
            "standard" => Ok(Units::Standard),
            other => Err(WeatherError::Validation(format!("Unknown units: {}", other))),
        }
    }
}

/// A persisted weather observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WeatherRecord {
    pub id: Uuid,
    pub city_name: String,
    pub country: Option<String>,
    pub lat: f64,
    pub lon: f64,
    pub temperature: f64,
    pub feels_like: f64,
    pub temp_min: Option<f64>,
    pub temp_max: Option<f64>,
    pub pressure: f64,
    pub humidity: f64,
    pub wind_speed: f64,
    pub wind_deg: f64,
    pub wind_gust: Option<f64>,
    pub description: Option<String>,
    pub visibility: Option<f64>,
    pub cloudiness: f64,
    pub rain_volume: f64,
    pub snow_volume: f64,
    pub units: Units,
    pub fetched_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Sparse update applied on top of an existing record.
///
/// Absent fields keep their current value. Nullable columns cannot be cleared
/// through a patch, only overwritten. Unknown keys (`id`, `createdAt`, ...) are
/// ignored so a record fetched from the API can be sent back as-is.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WeatherPatch {
    pub city_name: Option<String>,
    pub country: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub temperature: Option<f64>,
    pub feels_like: Option<f64>,
    pub temp_min: Option<f64>,
    pub temp_max: Option<f64>,
    pub pressure: Option<f64>,
    pub humidity: Option<f64>,
    pub wind_speed: Option<f64>,
    pub wind_deg: Option<f64>,
    pub wind_gust: Option<f64>,
    pub description: Option<String>,
    pub visibility: Option<f64>,
    pub cloudiness: Option<f64>,
    pub rain_volume: Option<f64>,
    pub snow_volume: Option<f64>,
    pub units: Option<Units>,
    pub fetched_at: Option<DateTime<Utc>>,
}

impl WeatherRecord {
    /// Returns a new record with every field present in `patch` overwritten.
    /// Identity and creation time never change. City and country are trimmed
    /// the same way lookup input is; a blank country keeps the current one.
    pub fn merge(&self, patch: WeatherPatch) -> WeatherRecord {
        let current = self.clone();
        WeatherRecord {
            id: current.id,
            city_name: patch
                .city_name
                .map(|name| name.trim().to_string())
                .unwrap_or(current.city_name),
            country: normalize_country(patch.country.as_deref())
                .map(str::to_string)
                .or(current.country),
            lat: patch.lat.unwrap_or(current.lat),
            lon: patch.lon.unwrap_or(current.lon),
            temperature: patch.temperature.unwrap_or(current.temperature),
            feels_like: patch.feels_like.unwrap_or(current.feels_like),
            temp_min: patch.temp_min.or(current.temp_min),
            temp_max: patch.temp_max.or(current.temp_max),
            pressure: patch.pressure.unwrap_or(current.pressure),
            humidity: patch.humidity.unwrap_or(current.humidity),
            wind_speed: patch.wind_speed.unwrap_or(current.wind_speed),
            wind_deg: patch.wind_deg.unwrap_or(current.wind_deg),
            wind_gust: patch.wind_gust.or(current.wind_gust),
            description: patch.description.or(current.description),
            visibility: patch.visibility.or(current.visibility),
            cloudiness: patch.cloudiness.unwrap_or(current.cloudiness),
            rain_volume: patch.rain_volume.unwrap_or(current.rain_volume),
            snow_volume: patch.snow_volume.unwrap_or(current.snow_volume),
            units: patch.units.unwrap_or(current.units),
            fetched_at: patch.fetched_at.unwrap_or(current.fetched_at),
            created_at: current.created_at,
            updated_at: current.updated_at,
        }
    }

    pub fn validate(&self) -> Result<(), WeatherError> {
        if self.city_name.trim().is_empty() {
            return Err(WeatherError::Validation("cityName must not be empty".to_string()));
        }
        validate_coordinates(self.lat, self.lon).map_err(WeatherError::Validation)?;

        if !(0.0..=100.0).contains(&self.humidity) {
            return Err(WeatherError::Validation(format!(
                "humidity must be between 0 and 100, got {}",
                self.humidity
            )));
        }
        if !(0.0..=100.0).contains(&self.cloudiness) {
            return Err(WeatherError::Validation(format!(
                "cloudiness must be between 0 and 100, got {}",
                self.cloudiness
            )));
        }

        let non_negative = [
            ("windSpeed", Some(self.wind_speed)),
            ("windGust", self.wind_gust),
            ("visibility", self.visibility),
            ("rainVolume", Some(self.rain_volume)),
            ("snowVolume", Some(self.snow_volume)),
        ];
        for (field, value) in non_negative {
            if let Some(value) = value {
                if value.is_nan() || value < 0.0 {
                    return Err(WeatherError::Validation(format!(
                        "{} must not be negative, got {}",
                        field, value
                    )));
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
pub(crate) fn sample_record(city: &str, country: Option<&str>) -> WeatherRecord {
    let fetched_at = DateTime::from_timestamp(1_641_038_400, 0).unwrap_or_default();
    WeatherRecord {
        id: Uuid::new_v4(),
        city_name: city.to_string(),
        country: country.map(str::to_string),
        lat: 51.51,
        lon: -0.13,
        temperature: 15.2,
        feels_like: 14.8,
        temp_min: None,
        temp_max: None,
        pressure: 1012.0,
        humidity: 76.0,
        wind_speed: 4.1,
        wind_deg: 250.0,
        wind_gust: Some(8.2),
        description: Some("scattered clouds".to_string()),
        visibility: Some(10000.0),
        cloudiness: 40.0,
        rain_volume: 0.0,
        snow_volume: 0.0,
        units: Units::Metric,
        fetched_at,
        created_at: fetched_at,
        updated_at: fetched_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_units_parsing() {
        assert_eq!("metric".parse::<Units>().unwrap(), Units::Metric);
        assert_eq!("IMPERIAL".parse::<Units>().unwrap(), Units::Imperial);
        assert_eq!(" standard ".parse::<Units>().unwrap(), Units::Standard);
        assert!(matches!(
            "kelvin".parse::<Units>(),
            Err(WeatherError::Validation(_))
        ));
        assert_eq!(Units::default(), Units::Metric);
    }

    #[test]
    fn test_record_serializes_camel_case() {
        let record = sample_record("London", Some("GB"));
        let json = serde_json::to_value(&record).unwrap();

        assert_eq!(json["cityName"], "London");
        assert_eq!(json["feelsLike"], 14.8);
        assert_eq!(json["units"], "metric");
        assert!(json.get("fetchedAt").is_some());
        assert!(json.get("city_name").is_none());
    }

    #[test]
    fn test_merge_overwrites_only_present_fields() {
        let record = sample_record("Berlin", Some("DE"));
        let patch = WeatherPatch {
            temperature: Some(3.5),
            description: Some("light snow".to_string()),
            units: Some(Units::Imperial),
            ..Default::default()
        };

        let merged = record.merge(patch);

        assert_eq!(merged.id, record.id);
        assert_eq!(merged.created_at, record.created_at);
        assert_eq!(merged.city_name, "Berlin");
        assert_eq!(merged.temperature, 3.5);
        assert_eq!(merged.description.as_deref(), Some("light snow"));
        assert_eq!(merged.units, Units::Imperial);
        assert_eq!(merged.humidity, record.humidity);
        // the original value is untouched
        assert_eq!(record.temperature, 15.2);
    }

    #[test]
    fn test_merge_trims_city_and_country() {
        let record = sample_record("Berlin", Some("DE"));

        let merged = record.merge(WeatherPatch {
            city_name: Some(" Munich ".to_string()),
            country: Some(" de ".to_string()),
            ..Default::default()
        });
        assert_eq!(merged.city_name, "Munich");
        assert_eq!(merged.country.as_deref(), Some("de"));

        let blank_country = record.merge(WeatherPatch {
            country: Some("  ".to_string()),
            ..Default::default()
        });
        assert_eq!(blank_country.country.as_deref(), Some("DE"));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let record = sample_record("Paris", Some("FR"));
        assert!(record.validate().is_ok());

        let blank = record.merge(WeatherPatch {
            city_name: Some("   ".to_string()),
            ..Default::default()
        });
        assert!(matches!(blank.validate(), Err(WeatherError::Validation(_))));

        let humid = record.merge(WeatherPatch {
            humidity: Some(140.0),
            ..Default::default()
        });
        assert!(humid.validate().is_err());

        let off_map = record.merge(WeatherPatch {
            lat: Some(91.0),
            ..Default::default()
        });
        assert!(off_map.validate().is_err());

        let negative_rain = record.merge(WeatherPatch {
            rain_volume: Some(-1.0),
            ..Default::default()
        });
        assert!(negative_rain.validate().is_err());
    }

    #[test]
    fn test_patch_ignores_identity_fields() {
        let record = sample_record("Munich", Some("DE"));
        let patch: WeatherPatch = serde_json::from_str(
            r#"{"id": "5d8e0a52-4a0a-4c47-8a6c-1f1d54a4f6a5", "cityName": "Augsburg"}"#,
        )
        .unwrap();

        let merged = record.merge(patch);
        assert_eq!(merged.id, record.id);
        assert_eq!(merged.city_name, "Augsburg");
    }
}
