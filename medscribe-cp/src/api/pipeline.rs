//! Pipeline execution API handlers
//!
//! POST /consultations/{id}/process, POST /consultations/{id}/steps/{step}/retry

use axum::{
    extract::{Path, State},
    http::HeaderMap,
    routing::post,
    Json, Router,
};
use serde::Serialize;
use uuid::Uuid;

use super::doctor_id_from_headers;
use crate::error::{ApiError, ApiResult};
use crate::models::{ExtractedFields, LedgerEntry, RecordStatus, StepName};
use crate::AppState;

/// POST /consultations/{id}/process response
#[derive(Debug, Serialize)]
pub struct ProcessResponse {
    pub record_id: Uuid,
    pub status: RecordStatus,
    pub fields: Option<ExtractedFields>,
    pub ledger: Vec<LedgerEntry>,
}

/// POST /consultations/{id}/steps/{step}/retry response
#[derive(Debug, Serialize)]
pub struct RetryStepResponse {
    pub record_id: Uuid,
    pub step: StepName,
    pub status: RecordStatus,
    pub ledger: Vec<LedgerEntry>,
}

/// POST /consultations/{id}/process
///
/// Runs the full pipeline synchronously within this request. On the
/// first failing step the persisted record carries the failing step and
/// message, so the caller can retry just that step later.
pub async fn run_pipeline(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(record_id): Path<Uuid>,
) -> ApiResult<Json<ProcessResponse>> {
    let doctor_id = doctor_id_from_headers(&headers)?;
    let record = state.sequencer().run_all(record_id, doctor_id).await?;

    Ok(Json(ProcessResponse {
        record_id: record.id,
        status: record.status,
        fields: record.fields.clone(),
        ledger: record.ledger.entries().to_vec(),
    }))
}

/// POST /consultations/{id}/steps/{step}/retry
///
/// Executes exactly one named step.
pub async fn retry_step(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((record_id, step)): Path<(Uuid, String)>,
) -> ApiResult<Json<RetryStepResponse>> {
    let doctor_id = doctor_id_from_headers(&headers)?;
    let step: StepName = step
        .parse()
        .map_err(|e: String| ApiError::Validation(e))?;

    let record = state
        .sequencer()
        .retry_step(record_id, doctor_id, step)
        .await?;

    Ok(Json(RetryStepResponse {
        record_id: record.id,
        step,
        status: record.status,
        ledger: record.ledger.entries().to_vec(),
    }))
}

/// Build pipeline routes
pub fn pipeline_routes() -> Router<AppState> {
    Router::new()
        .route("/consultations/:id/process", post(run_pipeline))
        .route("/consultations/:id/steps/:step/retry", post(retry_step))
}
