use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    pub openweather_api_key: String,
    pub openweather_base_url: String,
    pub openweather_weather_path: String,
    pub database_url: String,
    pub port: u16,
    pub cache_ttl_secs: u64,
    pub cache_max_capacity: u64,
    pub http_timeout_secs: u64,
    pub default_lang: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup so that parsing
    /// can be exercised without touching the process environment.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let string_or = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        Ok(Config {
            openweather_api_key: lookup("OPENWEATHER_API_KEY")
                .ok_or_else(|| anyhow::anyhow!("OPENWEATHER_API_KEY not set"))?,
            openweather_base_url: string_or("OPENWEATHER_BASE_URL", "https://api.openweathermap.org"),
            openweather_weather_path: string_or("OPENWEATHER_WEATHER_PATH", "/data/2.5/weather"),
            database_url: string_or("DATABASE_URL", "sqlite:./weather.db"),
            port: parse_or(&lookup, "PORT", 3000)?,
            cache_ttl_secs: parse_or(&lookup, "CACHE_TTL_SECS", 1800)?,
            cache_max_capacity: parse_or(&lookup, "CACHE_MAX_CAPACITY", 10_000)?,
            http_timeout_secs: parse_or(&lookup, "HTTP_TIMEOUT_SECS", 30)?,
            default_lang: string_or("DEFAULT_LANG", "en"),
        })
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn bind_addr(&self) -> String {
        format!("0.0.0.0:{}", self.port)
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> anyhow::Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("{} has an invalid value {:?}: {}", key, raw, e)),
        None => Ok(default),
    }
}
