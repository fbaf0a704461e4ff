use async_trait::async_trait;
use sqlx::SqlitePool;
use thiserror::Error;
use uuid::Uuid;

use crate::cache::keys::fold_city_name;
use crate::error::WeatherError;
use crate::models::WeatherRecord;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Database connection failed: {0}")]
    ConnectionFailed(#[from] sqlx::Error),
    #[error("Weather record not found")]
    RecordNotFound,
}

impl From<DatabaseError> for WeatherError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::RecordNotFound => WeatherError::not_found("Weather record not found"),
            other => WeatherError::Internal(other.to_string()),
        }
    }
}

/// Relational store of weather records.
///
/// Lookups report absence as `Ok(None)`; only storage failures are errors.
#[async_trait]
pub trait WeatherRepository: Send + Sync {
    /// All records, newest fetch first.
    async fn find_all(&self) -> Result<Vec<WeatherRecord>, DatabaseError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<WeatherRecord>, DatabaseError>;

    /// Most recently fetched record for a city, matched case-insensitively.
    async fn find_latest_by_city(&self, city_name: &str) -> Result<Option<WeatherRecord>, DatabaseError>;

    /// Insert or update by id. `updated_at` is refreshed, `created_at` is kept
    /// from the first insert.
    async fn save(&self, record: WeatherRecord) -> Result<WeatherRecord, DatabaseError>;

    /// Fails with [`DatabaseError::RecordNotFound`] when nothing was deleted.
    async fn remove(&self, id: Uuid) -> Result<(), DatabaseError>;

    async fn health_check(&self) -> Result<(), DatabaseError>;
}

pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn init_tables(&self) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS weather (
                id BLOB PRIMARY KEY,
                city_name TEXT NOT NULL,
                city_name_lower TEXT NOT NULL,
                country TEXT,
                lat REAL NOT NULL,
                lon REAL NOT NULL,
                temperature REAL NOT NULL,
                feels_like REAL NOT NULL,
                temp_min REAL,
                temp_max REAL,
                pressure REAL NOT NULL,
                humidity REAL NOT NULL,
                wind_speed REAL NOT NULL,
                wind_deg REAL NOT NULL,
                wind_gust REAL,
                description TEXT,
                visibility REAL,
                cloudiness REAL NOT NULL,
                rain_volume REAL NOT NULL DEFAULT 0,
                snow_volume REAL NOT NULL DEFAULT 0,
                units TEXT NOT NULL DEFAULT 'metric',
                fetched_at TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_weather_city_fetched ON weather(city_name_lower, fetched_at)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl WeatherRepository for Database {
    async fn find_all(&self) -> Result<Vec<WeatherRecord>, DatabaseError> {
        let results = sqlx::query_as::<_, WeatherRecord>(
            "SELECT * FROM weather ORDER BY fetched_at DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(results)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<WeatherRecord>, DatabaseError> {
        let result = sqlx::query_as::<_, WeatherRecord>("SELECT * FROM weather WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(result)
    }

    async fn find_latest_by_city(&self, city_name: &str) -> Result<Option<WeatherRecord>, DatabaseError> {
        let result = sqlx::query_as::<_, WeatherRecord>(
            "SELECT * FROM weather WHERE city_name_lower = ? ORDER BY fetched_at DESC LIMIT 1",
        )
        .bind(fold_city_name(city_name))
        .fetch_optional(&self.pool)
        .await?;

        Ok(result)
    }

    async fn save(&self, record: WeatherRecord) -> Result<WeatherRecord, DatabaseError> {
        let now = chrono::Utc::now();
        let city_name_lower = fold_city_name(&record.city_name);

        let result = sqlx::query_as::<_, WeatherRecord>(
            r#"
            INSERT INTO weather (
                id, city_name, city_name_lower, country, lat, lon, temperature, feels_like,
                temp_min, temp_max, pressure, humidity, wind_speed, wind_deg,
                wind_gust, description, visibility, cloudiness, rain_volume,
                snow_volume, units, fetched_at, created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                city_name = excluded.city_name,
                city_name_lower = excluded.city_name_lower,
                country = excluded.country,
                lat = excluded.lat,
                lon = excluded.lon,
                temperature = excluded.temperature,
                feels_like = excluded.feels_like,
                temp_min = excluded.temp_min,
                temp_max = excluded.temp_max,
                pressure = excluded.pressure,
                humidity = excluded.humidity,
                wind_speed = excluded.wind_speed,
                wind_deg = excluded.wind_deg,
                wind_gust = excluded.wind_gust,
                description = excluded.description,
                visibility = excluded.visibility,
                cloudiness = excluded.cloudiness,
                rain_volume = excluded.rain_volume,
                snow_volume = excluded.snow_volume,
                units = excluded.units,
                fetched_at = excluded.fetched_at,
                updated_at = excluded.updated_at
            RETURNING *
            "#,
        )
        .bind(record.id)
        .bind(record.city_name)
        .bind(city_name_lower)
        .bind(record.country)
        .bind(record.lat)
        .bind(record.lon)
        .bind(record.temperature)
        .bind(record.feels_like)
        .bind(record.temp_min)
        .bind(record.temp_max)
        .bind(record.pressure)
        .bind(record.humidity)
        .bind(record.wind_speed)
        .bind(record.wind_deg)
        .bind(record.wind_gust)
        .bind(record.description)
        .bind(record.visibility)
        .bind(record.cloudiness)
        .bind(record.rain_volume)
        .bind(record.snow_volume)
        .bind(record.units)
        .bind(record.fetched_at)
        .bind(record.created_at)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(result)
    }

    async fn remove(&self, id: Uuid) -> Result<(), DatabaseError> {
        let result = sqlx::query("DELETE FROM weather WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::RecordNotFound);
        }
        Ok(())
    }

    async fn health_check(&self) -> Result<(), DatabaseError> {
        sqlx::query("SELECT 1").fetch_one(&self.pool).await?;
        Ok(())
    }
}

// Mock database for testing
#[cfg(test)]
pub struct MockDatabase {
    records: tokio::sync::RwLock<std::collections::HashMap<Uuid, WeatherRecord>>,
    unavailable: std::sync::atomic::AtomicBool,
}

#[cfg(test)]
impl MockDatabase {
    pub fn new() -> Self {
        Self {
            records: tokio::sync::RwLock::new(std::collections::HashMap::new()),
            unavailable: std::sync::atomic::AtomicBool::new(false),
        }
    }

    pub fn go_offline(&self) {
        self.unavailable.store(true, std::sync::atomic::Ordering::SeqCst);
    }

    pub async fn insert(&self, record: WeatherRecord) {
        self.records.write().await.insert(record.id, record);
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    fn check(&self) -> Result<(), DatabaseError> {
        if self.unavailable.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(DatabaseError::ConnectionFailed(sqlx::Error::PoolTimedOut));
        }
        Ok(())
    }
}

#[cfg(test)]
#[async_trait]
impl WeatherRepository for MockDatabase {
    async fn find_all(&self) -> Result<Vec<WeatherRecord>, DatabaseError> {
        self.check()?;
        let mut all: Vec<_> = self.records.read().await.values().cloned().collect();
        all.sort_by(|a, b| b.fetched_at.cmp(&a.fetched_at));
        Ok(all)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<WeatherRecord>, DatabaseError> {
        self.check()?;
        Ok(self.records.read().await.get(&id).cloned())
    }

    async fn find_latest_by_city(&self, city_name: &str) -> Result<Option<WeatherRecord>, DatabaseError> {
        self.check()?;
        let wanted = fold_city_name(city_name);
        Ok(self
            .records
            .read()
            .await
            .values()
            .filter(|r| fold_city_name(&r.city_name) == wanted)
            .max_by_key(|r| r.fetched_at)
            .cloned())
    }

    async fn save(&self, mut record: WeatherRecord) -> Result<WeatherRecord, DatabaseError> {
        self.check()?;
        let mut records = self.records.write().await;
        if let Some(existing) = records.get(&record.id) {
            record.created_at = existing.created_at;
        }
        record.updated_at = chrono::Utc::now();
        records.insert(record.id, record.clone());
        Ok(record)
    }

    async fn remove(&self, id: Uuid) -> Result<(), DatabaseError> {
        self.check()?;
        self.records
            .write()
            .await
            .remove(&id)
            .map(|_| ())
            .ok_or(DatabaseError::RecordNotFound)
    }

    async fn health_check(&self) -> Result<(), DatabaseError> {
        self.check()
    }
}
