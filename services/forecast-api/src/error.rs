//! HTTP error responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Message for invalid or missing coordinates.
pub const INVALID_COORDINATES: &str = "Invalid input for latitude or longitude";

/// Errors returned by the handlers; the body is always `{"error": ...}`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    /// Logged in full; callers only see a generic message.
    #[error("internal error: {0}")]
    Internal(String),

    /// Logged and returned to the caller as is.
    #[error("{0}")]
    InternalDetail(String),
}

impl ApiError {
    pub fn invalid_coordinates() -> Self {
        ApiError::BadRequest(INVALID_COORDINATES.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, message),
            ApiError::Internal(detail) => {
                error!(error = %detail, "Internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            ApiError::InternalDetail(detail) => {
                error!(error = %detail, "Request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, detail)
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}
