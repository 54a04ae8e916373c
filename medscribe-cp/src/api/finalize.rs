//! Finalization API handler
//!
//! POST /consultations/{id}/finalize

use axum::{
    extract::{Path, State},
    http::HeaderMap,
    routing::post,
    Json, Router,
};
use serde::Serialize;
use uuid::Uuid;

use super::doctor_id_from_headers;
use crate::error::ApiResult;
use crate::models::SummaryOutput;
use crate::AppState;

/// POST /consultations/{id}/finalize response
#[derive(Debug, Serialize)]
pub struct FinalizeResponse {
    pub record_id: Uuid,
    /// Absent when summary generation failed (finalization proceeds anyway)
    pub summary: Option<SummaryOutput>,
}

/// POST /consultations/{id}/finalize
pub async fn finalize(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(record_id): Path<Uuid>,
) -> ApiResult<Json<FinalizeResponse>> {
    let doctor_id = doctor_id_from_headers(&headers)?;
    let summary = state.finalizer().finalize(record_id, doctor_id).await?;

    Ok(Json(FinalizeResponse { record_id, summary }))
}

/// Build finalize routes
pub fn finalize_routes() -> Router<AppState> {
    Router::new().route("/consultations/:id/finalize", post(finalize))
}
