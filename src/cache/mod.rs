pub mod aside;
pub mod keys;

use async_trait::async_trait;
use moka::future::Cache;
use moka::Expiry;
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CacheError {
    #[error("Cache unavailable: {0}")]
    Unavailable(String),
}

/// Key/value store holding serialized records with a per-entry TTL.
///
/// Implementations must be safe to share across requests; no locking is done
/// by callers.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    async fn set_with_ttl(&self, key: &str, ttl: Duration, value: String) -> Result<(), CacheError>;

    async fn delete(&self, key: &str) -> Result<(), CacheError>;
}

#[derive(Clone, Debug)]
struct CachedValue {
    payload: String,
    ttl: Duration,
}

struct PerEntryTtl;

impl Expiry<String, CachedValue> for PerEntryTtl {
    fn expire_after_create(&self, _key: &String, value: &CachedValue, _created_at: Instant) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &CachedValue,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// In-process cache backed by moka.
#[derive(Clone)]
pub struct MokaCacheStore {
    inner: Cache<String, CachedValue>,
}

impl MokaCacheStore {
    pub fn new(max_capacity: u64) -> Self {
        let inner = Cache::builder()
            .max_capacity(max_capacity)
            .expire_after(PerEntryTtl)
            .build();
        Self { inner }
    }
}

#[async_trait]
impl CacheStore for MokaCacheStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        Ok(self.inner.get(key).await.map(|cached| cached.payload))
    }

    async fn set_with_ttl(&self, key: &str, ttl: Duration, value: String) -> Result<(), CacheError> {
        self.inner
            .insert(key.to_string(), CachedValue { payload: value, ttl })
            .await;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.inner.invalidate(key).await;
        Ok(())
    }
}

/// Cache double that remembers the TTL of every write and can be switched
/// into a failing state.
#[cfg(test)]
#[derive(Default)]
pub struct RecordingCache {
    entries: std::sync::Mutex<std::collections::HashMap<String, (String, Duration)>>,
    deleted: std::sync::Mutex<Vec<String>>,
    fail_reads: std::sync::atomic::AtomicBool,
    fail_writes: std::sync::atomic::AtomicBool,
    fail_deletes: std::sync::atomic::AtomicBool,
}

#[cfg(test)]
impl RecordingCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, key: &str, value: &str) {
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), (value.to_string(), Duration::from_secs(1800)));
    }

    pub fn entry(&self, key: &str) -> Option<(String, Duration)> {
        self.entries.lock().unwrap().get(key).cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.lock().unwrap().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn deleted_keys(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }

    pub fn fail_reads(&self) {
        self.fail_reads.store(true, std::sync::atomic::Ordering::SeqCst);
    }

    pub fn fail_writes(&self) {
        self.fail_writes.store(true, std::sync::atomic::Ordering::SeqCst);
    }

    pub fn fail_deletes(&self) {
        self.fail_deletes.store(true, std::sync::atomic::Ordering::SeqCst);
    }
}

#[cfg(test)]
#[async_trait]
impl CacheStore for RecordingCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        if self.fail_reads.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(CacheError::Unavailable("connection refused".to_string()));
        }
        Ok(self.entries.lock().unwrap().get(key).map(|(value, _)| value.clone()))
    }

    async fn set_with_ttl(&self, key: &str, ttl: Duration, value: String) -> Result<(), CacheError> {
        if self.fail_writes.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(CacheError::Unavailable("connection refused".to_string()));
        }
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), (value, ttl));
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        if self.fail_deletes.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(CacheError::Unavailable("connection refused".to_string()));
        }
        self.deleted.lock().unwrap().push(key.to_string());
        self.entries.lock().unwrap().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_moka_store_roundtrip() {
        let store = MokaCacheStore::new(100);

        assert_eq!(store.get("weather:berlin:de:metric").await.unwrap(), None);

        store
            .set_with_ttl("weather:berlin:de:metric", Duration::from_secs(1800), "{}".to_string())
            .await
            .unwrap();
        assert_eq!(
            store.get("weather:berlin:de:metric").await.unwrap().as_deref(),
            Some("{}")
        );

        store.delete("weather:berlin:de:metric").await.unwrap();
        assert_eq!(store.get("weather:berlin:de:metric").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_moka_store_expires_entries() {
        let store = MokaCacheStore::new(100);
        store
            .set_with_ttl("latest:oslo", Duration::from_millis(50), "{}".to_string())
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(200)).await;

        assert_eq!(store.get("latest:oslo").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_deleting_missing_key_is_ok() {
        let store = MokaCacheStore::new(10);
        assert!(store.delete("latest:nowhere").await.is_ok());
    }
}
