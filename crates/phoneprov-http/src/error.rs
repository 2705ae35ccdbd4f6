//! Operator API error types.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use phoneprov_db::DbError;
use serde::Serialize;
use thiserror::Error;
use tracing::{error, info};

/// API error surfaced to operator clients.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// All authorization failures collapse into this one variant so callers
    /// cannot probe which check refused them.
    #[error("Forbidden")]
    Forbidden,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error")]
    Internal,
}

/// Error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    code: &'static str,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            ApiError::Forbidden => {
                (StatusCode::FORBIDDEN, "FORBIDDEN", "forbidden".to_string())
            }
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
            ApiError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "internal error".to_string(),
            ),
        };

        (status, Json(ErrorResponse { error: message, code })).into_response()
    }
}

impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound(what) => ApiError::NotFound(what),
            DbError::Conflict(what) => ApiError::Conflict(what),
            DbError::Domain(domain) => ApiError::BadRequest(domain.to_string()),
            DbError::TokenDenied(reason) => {
                info!(reason = reason.as_str(), "Token redemption refused");
                ApiError::Forbidden
            }
            other => {
                error!(%other, "Store failure");
                ApiError::Internal
            }
        }
    }
}

/// API result type
pub type ApiResult<T> = Result<T, ApiError>;
