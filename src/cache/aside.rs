//! Cache-aside reads and write-side invalidation.

use serde::{de::DeserializeOwned, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use super::keys::{city_key, latest_city_key};
use super::{CacheError, CacheStore};
use crate::error::WeatherError;
use crate::models::WeatherRecord;

impl From<CacheError> for WeatherError {
    fn from(err: CacheError) -> Self {
        WeatherError::Transport(err.to_string())
    }
}

#[derive(Clone)]
pub struct CacheAside {
    cache: Arc<dyn CacheStore>,
}

impl CacheAside {
    pub fn new(cache: Arc<dyn CacheStore>) -> Self {
        Self { cache }
    }

    /// Serve `key` from the cache, or run `miss` and store its result for `ttl`.
    ///
    /// A hit is returned as-is with no call to `miss`. Errors from `miss` are
    /// passed through unchanged and nothing is written, so absence is never
    /// cached. Cache read/write failures surface as `Transport`.
    pub async fn resolve<T, F, Fut>(&self, key: &str, ttl: Duration, miss: F) -> Result<T, WeatherError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, WeatherError>>,
    {
        if let Some(cached) = self.cache.get(key).await? {
            match serde_json::from_str::<T>(&cached) {
                Ok(value) => {
                    tracing::debug!("Cache hit for {}", key);
                    return Ok(value);
                }
                Err(e) => {
                    tracing::warn!("Discarding unreadable cache entry {}: {}", key, e);
                }
            }
        } else {
            tracing::debug!("Cache miss for {}", key);
        }

        let value = miss().await?;

        let serialized = serde_json::to_string(&value)
            .map_err(|e| WeatherError::Internal(format!("Failed to serialize cache entry: {}", e)))?;
        self.cache.set_with_ttl(key, ttl, serialized).await?;

        Ok(value)
    }

    /// Store `value` under `key` without consulting the cache first. Failures
    /// are logged and swallowed.
    pub async fn refresh<T: Serialize>(&self, key: &str, ttl: Duration, value: &T) {
        let serialized = match serde_json::to_string(value) {
            Ok(serialized) => serialized,
            Err(e) => {
                tracing::warn!("Failed to serialize cache entry {}: {}", key, e);
                return;
            }
        };
        if let Err(e) = self.cache.set_with_ttl(key, ttl, serialized).await {
            tracing::warn!("Failed to refresh cache entry {}: {}", key, e);
        }
    }

    /// Keys that may hold a copy of `record`.
    pub fn keys_for(record: &WeatherRecord) -> [String; 2] {
        [
            city_key(&record.city_name, record.country.as_deref(), record.units),
            latest_city_key(&record.city_name),
        ]
    }

    /// Drop every cache entry that could still reference `record`.
    ///
    /// Runs after the database write has committed, so failures are only
    /// logged.
    pub async fn invalidate(&self, record: &WeatherRecord) {
        self.invalidate_keys(Self::keys_for(record)).await;
    }

    /// Like [`invalidate`](Self::invalidate) for several states of the same
    /// record, e.g. before and after an update. Duplicate keys are removed once.
    pub async fn invalidate_all(&self, records: &[&WeatherRecord]) {
        let mut keys: Vec<String> = Vec::new();
        for record in records {
            for key in Self::keys_for(record) {
                if !keys.contains(&key) {
                    keys.push(key);
                }
            }
        }
        self.invalidate_keys(keys).await;
    }

    /// Remove a single entry, logging instead of failing.
    pub async fn evict(&self, key: &str) {
        match self.cache.delete(key).await {
            Ok(()) => tracing::debug!("Invalidated cache entry {}", key),
            Err(e) => tracing::warn!("Failed to invalidate cache entry {}: {}", key, e),
        }
    }

    async fn invalidate_keys<I>(&self, keys: I)
    where
        I: IntoIterator<Item = String>,
    {
        for key in keys {
            self.evict(&key).await;
        }
    }
}
