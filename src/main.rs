use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::str::FromStr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod cache;
mod config;
mod database;
mod error;
mod models;
mod routes;
mod service;
mod upstream;
mod utils;

use cache::MokaCacheStore;
use config::Config;
use database::Database;
use routes::{create_router, AppState};
use service::WeatherService;
use upstream::openweather::OpenWeatherClient;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "weather_crud_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    // Initialize database
    let connect_options = SqliteConnectOptions::from_str(&config.database_url)?.create_if_missing(true);
    let pool = SqlitePoolOptions::new().connect_with(connect_options).await?;
    let database = Database::new(pool);
    database.init_tables().await?;

    let weather_client = OpenWeatherClient::new(config.clone())?;
    let cache = MokaCacheStore::new(config.cache_max_capacity);
    tracing::info!(
        "Caching weather for {}s (capacity {})",
        config.cache_ttl_secs,
        config.cache_max_capacity
    );

    let service = WeatherService::new(
        Arc::new(database),
        Arc::new(weather_client),
        Arc::new(cache),
        config.cache_ttl(),
        config.default_lang.clone(),
    );

    let app = create_router(AppState {
        service: Arc::new(service),
    });

    let listener = tokio::net::TcpListener::bind(config.bind_addr()).await?;
    tracing::info!("Server starting on http://{}", config.bind_addr());

    axum::serve(listener, app).await?;

    Ok(())
}
