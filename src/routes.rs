use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::{IntoParams, OpenApi, ToSchema};
use utoipa_swagger_ui::SwaggerUi;
use uuid::Uuid;

use crate::{
    error::WeatherError,
    models::{Units, WeatherPatch, WeatherRecord},
    service::WeatherService,
    utils::ErrorResponse,
};

// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<WeatherService>,
}

// Request/Response types
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CoordinatesQuery {
    /// Latitude, -90 to 90
    pub lat: f64,
    /// Longitude, -180 to 180
    pub lon: f64,
    /// metric (default), imperial or standard
    pub units: Option<String>,
    pub lang: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CityQuery {
    /// ISO 3166 country code
    pub country: Option<String>,
    pub units: Option<String>,
    pub lang: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateWeatherRequest {
    pub city_name: String,
    pub country: Option<String>,
    pub units: Option<String>,
    pub lang: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub version: String,
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Weather CRUD API",
        description = "Current weather from OpenWeather, persisted and cached"
    ),
    paths(
        health,
        list_weather,
        get_current_weather,
        get_city_weather,
        get_latest_city_weather,
        get_weather,
        create_weather,
        update_weather,
        delete_weather,
    ),
    components(schemas(
        WeatherRecord,
        WeatherPatch,
        Units,
        CreateWeatherRequest,
        HealthResponse,
        ErrorResponse,
    )),
    tags((name = "Weather", description = "Weather lookups and records"))
)]
pub struct ApiDoc;

fn parse_units(units: Option<&str>) -> Result<Option<Units>, WeatherError> {
    units
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .map(str::parse::<Units>)
        .transpose()
}

fn parse_id(id: &str) -> Result<Uuid, WeatherError> {
    Uuid::parse_str(id).map_err(|_| WeatherError::Validation(format!("Invalid weather id: {}", id)))
}

// Route handlers
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service and database reachable", body = HealthResponse),
        (status = 503, description = "Database unreachable", body = HealthResponse),
    )
)]
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let (status, label) = match state.service.health_check().await {
        Ok(()) => (StatusCode::OK, "healthy"),
        Err(e) => {
            tracing::warn!("Health check failed: {}", e);
            (StatusCode::SERVICE_UNAVAILABLE, "unhealthy")
        }
    };

    (
        status,
        Json(HealthResponse {
            status: label.to_string(),
            timestamp: chrono::Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }),
    )
}

#[utoipa::path(
    get,
    path = "/api/weather",
    tag = "Weather",
    responses(
        (status = 200, description = "All stored records, newest first", body = [WeatherRecord]),
        (status = 500, description = "Database failure", body = ErrorResponse),
    )
)]
pub async fn list_weather(
    State(state): State<AppState>,
) -> Result<Json<Vec<WeatherRecord>>, WeatherError> {
    Ok(Json(state.service.get_all_weather().await?))
}

#[utoipa::path(
    get,
    path = "/api/weather/current",
    tag = "Weather",
    params(CoordinatesQuery),
    responses(
        (status = 200, description = "Current weather at the coordinates", body = WeatherRecord),
        (status = 400, description = "Invalid coordinates or units", body = ErrorResponse),
        (status = 500, description = "Upstream or storage failure", body = ErrorResponse),
    )
)]
pub async fn get_current_weather(
    State(state): State<AppState>,
    Query(params): Query<CoordinatesQuery>,
) -> Result<Json<WeatherRecord>, WeatherError> {
    let units = parse_units(params.units.as_deref())?;
    let record = state
        .service
        .get_weather_by_coordinates(params.lat, params.lon, units, params.lang.as_deref())
        .await?;
    Ok(Json(record))
}

#[utoipa::path(
    get,
    path = "/api/weather/city/{city_name}",
    tag = "Weather",
    params(
        ("city_name" = String, Path, description = "City name"),
        CityQuery,
    ),
    responses(
        (status = 200, description = "Current weather for the city", body = WeatherRecord),
        (status = 404, description = "City unknown upstream", body = ErrorResponse),
        (status = 500, description = "Upstream or storage failure", body = ErrorResponse),
    )
)]
pub async fn get_city_weather(
    State(state): State<AppState>,
    Path(city_name): Path<String>,
    Query(params): Query<CityQuery>,
) -> Result<Json<WeatherRecord>, WeatherError> {
    let units = parse_units(params.units.as_deref())?;
    let record = state
        .service
        .get_weather_by_city(
            &city_name,
            params.country.as_deref(),
            units,
            params.lang.as_deref(),
        )
        .await?;
    Ok(Json(record))
}

#[utoipa::path(
    get,
    path = "/api/weather/latest/{city_name}",
    tag = "Weather",
    params(("city_name" = String, Path, description = "City name, case-insensitive")),
    responses(
        (status = 200, description = "Most recently fetched stored record", body = WeatherRecord),
        (status = 404, description = "No stored record for the city", body = ErrorResponse),
    )
)]
pub async fn get_latest_city_weather(
    State(state): State<AppState>,
    Path(city_name): Path<String>,
) -> Result<Json<WeatherRecord>, WeatherError> {
    Ok(Json(state.service.get_latest_by_city(&city_name).await?))
}

#[utoipa::path(
    get,
    path = "/api/weather/{id}",
    tag = "Weather",
    params(("id" = Uuid, Path, description = "Record id")),
    responses(
        (status = 200, description = "Stored record", body = WeatherRecord),
        (status = 404, description = "No such record", body = ErrorResponse),
    )
)]
pub async fn get_weather(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<WeatherRecord>, WeatherError> {
    let id = parse_id(&id)?;
    Ok(Json(state.service.get_weather_by_id(id).await?))
}

#[utoipa::path(
    post,
    path = "/api/weather",
    tag = "Weather",
    request_body = CreateWeatherRequest,
    responses(
        (status = 201, description = "Fresh observation fetched and stored", body = WeatherRecord),
        (status = 400, description = "Invalid request", body = ErrorResponse),
    )
)]
pub async fn create_weather(
    State(state): State<AppState>,
    Json(request): Json<CreateWeatherRequest>,
) -> Result<(StatusCode, Json<WeatherRecord>), WeatherError> {
    let units = parse_units(request.units.as_deref())?;
    let record = state
        .service
        .create_weather(
            &request.city_name,
            request.country.as_deref(),
            units,
            request.lang.as_deref(),
        )
        .await?;
    Ok((StatusCode::CREATED, Json(record)))
}

#[utoipa::path(
    put,
    path = "/api/weather/{id}",
    tag = "Weather",
    params(("id" = Uuid, Path, description = "Record id")),
    request_body = WeatherPatch,
    responses(
        (status = 200, description = "Updated record", body = WeatherRecord),
        (status = 400, description = "Patch produces an invalid record", body = ErrorResponse),
        (status = 404, description = "No such record", body = ErrorResponse),
    )
)]
pub async fn update_weather(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(patch): Json<WeatherPatch>,
) -> Result<Json<WeatherRecord>, WeatherError> {
    let id = parse_id(&id)?;
    Ok(Json(state.service.update_weather(id, patch).await?))
}

#[utoipa::path(
    delete,
    path = "/api/weather/{id}",
    tag = "Weather",
    params(("id" = Uuid, Path, description = "Record id")),
    responses(
        (status = 204, description = "Record deleted"),
        (status = 404, description = "No such record", body = ErrorResponse),
    )
)]
pub async fn delete_weather(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, WeatherError> {
    let id = parse_id(&id)?;
    state.service.delete_weather(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// Create the router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/weather", get(list_weather).post(create_weather))
        .route("/api/weather/current", get(get_current_weather))
        .route("/api/weather/city/:city_name", get(get_city_weather))
        .route("/api/weather/latest/:city_name", get(get_latest_city_weather))
        .route(
            "/api/weather/:id",
            get(get_weather).put(update_weather).delete(delete_weather),
        )
        .with_state(state)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
