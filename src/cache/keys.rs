//! Cache key derivation.
//!
//! Keys are `:`-separated segments behind a namespace tag. City names and
//! country codes are lower-cased so lookups differing only in case share an
//! entry. Coordinates are rendered exactly as given, without rounding.

use crate::models::Units;

pub const KEY_SEPARATOR: char = ':';

const WEATHER_NAMESPACE: &str = "weather";
const LATEST_NAMESPACE: &str = "latest";

/// Case folding shared by cache keys and the stored `city_name_lower` column.
pub fn fold_city_name(city_name: &str) -> String {
    city_name.to_lowercase()
}

/// `weather:{lat}:{lon}:{units}`
pub fn coordinate_key(lat: f64, lon: f64, units: Units) -> String {
    format!(
        "{WEATHER_NAMESPACE}{sep}{lat}{sep}{lon}{sep}{units}",
        sep = KEY_SEPARATOR
    )
}

/// `weather:{city}:{country}:{units}`; a missing country leaves an empty
/// segment rather than dropping it.
pub fn city_key(city_name: &str, country: Option<&str>, units: Units) -> String {
    format!(
        "{WEATHER_NAMESPACE}{sep}{city}{sep}{country}{sep}{units}",
        sep = KEY_SEPARATOR,
        city = fold_city_name(city_name),
        country = country.unwrap_or_default().to_lowercase(),
    )
}

/// `latest:{city}`. Units and country are deliberately not part of it.
pub fn latest_city_key(city_name: &str) -> String {
    format!(
        "{LATEST_NAMESPACE}{sep}{city}",
        sep = KEY_SEPARATOR,
        city = fold_city_name(city_name)
    )
}
