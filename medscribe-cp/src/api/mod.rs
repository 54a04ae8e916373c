//! HTTP API handlers for medscribe-cp

pub mod consultations;
pub mod finalize;
pub mod health;
pub mod pipeline;
pub mod reuse;
pub mod sse;
pub mod upload;

pub use consultations::consultation_routes;
pub use finalize::finalize_routes;
pub use health::health_routes;
pub use pipeline::pipeline_routes;
pub use reuse::reuse_routes;
pub use sse::event_stream;
pub use upload::upload_routes;

use crate::error::{ApiError, ApiResult};
use axum::http::HeaderMap;
use uuid::Uuid;

/// Caller identity header
///
/// Authentication is handled upstream; the gateway forwards the
/// authenticated doctor id in this header.
pub const DOCTOR_ID_HEADER: &str = "x-doctor-id";

/// Extract the calling doctor's id from request headers
pub fn doctor_id_from_headers(headers: &HeaderMap) -> ApiResult<Uuid> {
    let value = headers
        .get(DOCTOR_ID_HEADER)
        .ok_or_else(|| ApiError::Validation(format!("Missing {} header", DOCTOR_ID_HEADER)))?;
    let value = value
        .to_str()
        .map_err(|_| ApiError::Validation(format!("Invalid {} header", DOCTOR_ID_HEADER)))?;
    Uuid::parse_str(value)
        .map_err(|_| ApiError::Validation(format!("Invalid {} header", DOCTOR_ID_HEADER)))
}
