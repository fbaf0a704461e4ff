//! Weather lookups and mutations.
//!
//! Lookups go through [`CacheAside`]: by-coordinate and by-city requests fall
//! back to the upstream provider and persist what they fetch, "latest for
//! city" falls back to the database only. Mutations hit the database first and
//! invalidate the cache afterwards.

use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::cache::aside::CacheAside;
use crate::cache::keys::{city_key, coordinate_key, latest_city_key};
use crate::cache::CacheStore;
use crate::database::WeatherRepository;
use crate::error::WeatherError;
use crate::models::{Units, WeatherPatch, WeatherRecord};
use crate::upstream::WeatherSource;
use crate::utils::{normalize_country, validate_city_name, validate_coordinates};

const COORDINATES_FETCH_FAILED: &str = "Failed to fetch weather data";
const CITY_FETCH_FAILED: &str = "Failed to fetch weather data for city";
const CITY_NOT_FOUND: &str = "No weather data found for this city";
const LIST_FAILED: &str = "Failed to retrieve weather data";

pub struct WeatherService {
    repository: Arc<dyn WeatherRepository>,
    source: Arc<dyn WeatherSource>,
    cache: CacheAside,
    ttl: Duration,
    default_lang: String,
}

impl WeatherService {
    pub fn new(
        repository: Arc<dyn WeatherRepository>,
        source: Arc<dyn WeatherSource>,
        cache: Arc<dyn CacheStore>,
        ttl: Duration,
        default_lang: impl Into<String>,
    ) -> Self {
        Self {
            repository,
            source,
            cache: CacheAside::new(cache),
            ttl,
            default_lang: default_lang.into(),
        }
    }

    fn lang<'a>(&'a self, lang: Option<&'a str>) -> &'a str {
        lang.map(str::trim)
            .filter(|l| !l.is_empty())
            .unwrap_or(&self.default_lang)
    }

    pub async fn get_weather_by_coordinates(
        &self,
        lat: f64,
        lon: f64,
        units: Option<Units>,
        lang: Option<&str>,
    ) -> Result<WeatherRecord, WeatherError> {
        validate_coordinates(lat, lon).map_err(WeatherError::Validation)?;
        let units = units.unwrap_or_default();
        let lang = self.lang(lang);
        let key = coordinate_key(lat, lon, units);

        self.cache
            .resolve(&key, self.ttl, || async move {
                let payload = self
                    .source
                    .fetch_by_coordinates(lat, lon, units, lang)
                    .await
                    .map_err(|e| {
                        tracing::error!("Upstream lookup for ({}, {}) failed: {}", lat, lon, e);
                        e.into_weather_error(COORDINATES_FETCH_FAILED)
                    })?;
                let saved = self.repository.save(payload.into_record(units)).await?;
                tracing::info!("Stored weather {} for {}", saved.id, saved.city_name);
                Ok(saved)
            })
            .await
    }

    pub async fn get_weather_by_city(
        &self,
        city_name: &str,
        country: Option<&str>,
        units: Option<Units>,
        lang: Option<&str>,
    ) -> Result<WeatherRecord, WeatherError> {
        let city_name = validate_city_name(city_name).map_err(WeatherError::Validation)?;
        let country = normalize_country(country);
        let units = units.unwrap_or_default();
        let key = city_key(city_name, country, units);

        self.cache
            .resolve(&key, self.ttl, || self.fetch_and_store_city(city_name, country, units, lang))
            .await
    }

    pub async fn get_latest_by_city(&self, city_name: &str) -> Result<WeatherRecord, WeatherError> {
        let city_name = validate_city_name(city_name).map_err(WeatherError::Validation)?;
        let key = latest_city_key(city_name);

        self.cache
            .resolve(&key, self.ttl, || async move {
                self.repository
                    .find_latest_by_city(city_name)
                    .await?
                    .ok_or_else(|| WeatherError::not_found(CITY_NOT_FOUND))
            })
            .await
    }

    pub async fn get_weather_by_id(&self, id: Uuid) -> Result<WeatherRecord, WeatherError> {
        self.repository
            .find_by_id(id)
            .await?
            .ok_or_else(|| WeatherError::not_found("Weather record not found"))
    }

    pub async fn get_all_weather(&self) -> Result<Vec<WeatherRecord>, WeatherError> {
        self.repository.find_all().await.map_err(|e| {
            tracing::error!("Failed to fetch all weather records: {}", e);
            WeatherError::Internal(LIST_FAILED.to_string())
        })
    }

    /// Always fetches a fresh observation, then seeds the city entry with it
    /// and drops the now outdated "latest" entry.
    pub async fn create_weather(
        &self,
        city_name: &str,
        country: Option<&str>,
        units: Option<Units>,
        lang: Option<&str>,
    ) -> Result<WeatherRecord, WeatherError> {
        let city_name = validate_city_name(city_name).map_err(WeatherError::Validation)?;
        let country = normalize_country(country);
        let units = units.unwrap_or_default();

        let created = self.fetch_and_store_city(city_name, country, units, lang).await?;

        self.cache
            .refresh(&city_key(city_name, country, units), self.ttl, &created)
            .await;
        self.cache.evict(&latest_city_key(city_name)).await;
        if !created.city_name.eq_ignore_ascii_case(city_name) {
            self.cache.evict(&latest_city_key(&created.city_name)).await;
        }

        Ok(created)
    }

    pub async fn update_weather(&self, id: Uuid, patch: WeatherPatch) -> Result<WeatherRecord, WeatherError> {
        let existing = self.get_weather_by_id(id).await?;
        let merged = existing.merge(patch);
        merged.validate()?;

        let updated = self.repository.save(merged).await?;
        tracing::info!("Updated weather record {}", updated.id);

        self.cache.invalidate_all(&[&existing, &updated]).await;
        Ok(updated)
    }

    pub async fn delete_weather(&self, id: Uuid) -> Result<(), WeatherError> {
        let existing = self.get_weather_by_id(id).await?;
        self.repository.remove(existing.id).await?;
        tracing::info!("Deleted weather record {}", existing.id);

        self.cache.invalidate(&existing).await;
        Ok(())
    }

    pub async fn health_check(&self) -> Result<(), WeatherError> {
        self.repository.health_check().await?;
        Ok(())
    }

    async fn fetch_and_store_city(
        &self,
        city_name: &str,
        country: Option<&str>,
        units: Units,
        lang: Option<&str>,
    ) -> Result<WeatherRecord, WeatherError> {
        let payload = self
            .source
            .fetch_by_city(city_name, country, units, self.lang(lang))
            .await
            .map_err(|e| {
                tracing::error!("Upstream lookup for city {} failed: {}", city_name, e);
                e.into_weather_error(CITY_FETCH_FAILED)
            })?;
        let saved = self.repository.save(payload.into_record(units)).await?;
        tracing::info!("Stored weather {} for {}", saved.id, saved.city_name);
        Ok(saved)
    }
}
