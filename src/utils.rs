use serde::Serialize;
use utoipa::ToSchema;

/// Validate latitude and longitude coordinates
pub fn validate_coordinates(lat: f64, lon: f64) -> Result<(), String> {
    if !(-90.0..=90.0).contains(&lat) {
        return Err(format!("Invalid latitude: {}. Must be between -90 and 90", lat));
    }
    if !(-180.0..=180.0).contains(&lon) {
        return Err(format!("Invalid longitude: {}. Must be between -180 and 180", lon));
    }
    Ok(())
}

/// Validate a city name used as a lookup identity
pub fn validate_city_name(city_name: &str) -> Result<&str, String> {
    let trimmed = city_name.trim();
    if trimmed.is_empty() {
        return Err("City name must not be empty".to_string());
    }
    Ok(trimmed)
}

/// Treat blank country codes the same as a missing one
pub fn normalize_country(country: Option<&str>) -> Option<&str> {
    country.map(str::trim).filter(|c| !c.is_empty())
}

/// Error response body
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub status: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(message: &str) -> Self {
        Self {
            status: "error".to_string(),
            message: message.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_coordinates() {
        assert!(validate_coordinates(0.0, 0.0).is_ok());
        assert!(validate_coordinates(90.0, 180.0).is_ok());
        assert!(validate_coordinates(-90.0, -180.0).is_ok());
        assert!(validate_coordinates(91.0, 0.0).is_err());
        assert!(validate_coordinates(0.0, 181.0).is_err());
        assert!(validate_coordinates(f64::NAN, 0.0).is_err());
    }

    #[test]
    fn test_validate_city_name() {
        assert_eq!(validate_city_name("  London ").unwrap(), "London");
        assert!(validate_city_name("").is_err());
        assert!(validate_city_name("   ").is_err());
    }

    #[test]
    fn test_normalize_country() {
        assert_eq!(normalize_country(Some(" GB ")), Some("GB"));
        assert_eq!(normalize_country(Some("")), None);
        assert_eq!(normalize_country(None), None);
    }

    #[test]
    fn test_error_response_shape() {
        let body = serde_json::to_value(ErrorResponse::new("Weather record not found")).unwrap();
        assert_eq!(body["status"], "error");
        assert_eq!(body["message"], "Weather record not found");
    }
}
