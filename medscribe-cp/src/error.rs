//! Error types for medscribe-cp
//!
//! Maps the processing error taxonomy onto HTTP responses. Validation,
//! not-found, and precondition failures return without any persisted
//! mutation; adapter failures at a step boundary are converted into
//! persisted record state by the sequencer before surfacing here.

use crate::fsm::TransitionError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Bad/missing request parameters, oversized or overlong audio,
    /// ownership mismatch (400)
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Referenced record/patient absent or not owned by caller (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Step retried before its prerequisite artifact exists (409);
    /// the response names the step to run first
    #[error("Precondition failed: {0}")]
    Precondition(TransitionError),

    /// Concurrent writer won the version compare-and-set (409)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// External AI/storage collaborator failure (502)
    #[error("Adapter error: {0}")]
    Adapter(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error(transparent)]
    Other(#[from] anyhow::Error),

    /// medscribe-common error
    #[error("Common error: {0}")]
    Common(#[from] medscribe_common::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            ApiError::Precondition(ref err) => {
                (StatusCode::CONFLICT, "PRECONDITION_ERROR", err.to_string())
            }
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg),
            ApiError::Adapter(msg) => (StatusCode::BAD_GATEWAY, "ADAPTER_ERROR", msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg),
            ApiError::Io(ref err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "IO_ERROR",
                err.to_string(),
            ),
            ApiError::Other(ref err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                err.to_string(),
            ),
            ApiError::Common(ref err) => match err {
                medscribe_common::Error::NotFound(msg) => {
                    (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone())
                }
                medscribe_common::Error::InvalidInput(msg) => {
                    (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
                }
                other => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "COMMON_ERROR",
                    other.to_string(),
                ),
            },
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

impl From<TransitionError> for ApiError {
    fn from(err: TransitionError) -> Self {
        ApiError::Precondition(err)
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
