//! Reuse fast-path API handler
//!
//! POST /consultations/{id}/reuse

use axum::{
    extract::{Path, State},
    http::HeaderMap,
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::doctor_id_from_headers;
use crate::error::ApiResult;
use crate::models::RecordStatus;
use crate::AppState;

/// POST /consultations/{id}/reuse request
#[derive(Debug, Deserialize)]
pub struct ReuseRequest {
    /// May differ from the source record's patient
    pub target_patient_id: Uuid,
}

/// POST /consultations/{id}/reuse response
#[derive(Debug, Serialize)]
pub struct ReuseResponse {
    pub new_record_id: Uuid,
    pub source_record_id: Uuid,
    pub status: RecordStatus,
}

/// POST /consultations/{id}/reuse
pub async fn reuse(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(source_record_id): Path<Uuid>,
    Json(request): Json<ReuseRequest>,
) -> ApiResult<Json<ReuseResponse>> {
    let doctor_id = doctor_id_from_headers(&headers)?;
    let record = state
        .reuse_service()
        .reuse(source_record_id, request.target_patient_id, doctor_id)
        .await?;

    Ok(Json(ReuseResponse {
        new_record_id: record.id,
        source_record_id,
        status: record.status,
    }))
}

/// Build reuse routes
pub fn reuse_routes() -> Router<AppState> {
    Router::new().route("/consultations/:id/reuse", post(reuse))
}
