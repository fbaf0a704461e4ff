use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::utils::ErrorResponse;

/// Classified failure of a weather operation.
///
/// The core only classifies; turning a variant into a status code and body
/// happens in [`IntoResponse`] below.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum WeatherError {
    #[error("{0}")]
    NotFound(String),
    #[error("Upstream error ({status}): {message}")]
    Upstream { status: u16, message: String },
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Validation failed: {0}")]
    Validation(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl WeatherError {
    pub fn not_found(message: impl Into<String>) -> Self {
        WeatherError::NotFound(message.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            WeatherError::NotFound(_) => StatusCode::NOT_FOUND,
            WeatherError::Upstream { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            }
            WeatherError::Validation(_) => StatusCode::BAD_REQUEST,
            WeatherError::Transport(_) | WeatherError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Message safe to show to API callers.
    pub fn public_message(&self) -> String {
        match self {
            WeatherError::NotFound(message) | WeatherError::Validation(message) => message.clone(),
            WeatherError::Upstream { message, .. } => message.clone(),
            WeatherError::Transport(_) | WeatherError::Internal(_) => {
                "Internal server error".to_string()
            }
        }
    }
}

impl IntoResponse for WeatherError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        }
        (status, Json(ErrorResponse::new(&self.public_message()))).into_response()
    }
}
