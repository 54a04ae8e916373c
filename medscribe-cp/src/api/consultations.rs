//! Consultation record read API
//!
//! GET /consultations/{id}

use axum::{
    extract::{Path, State},
    http::HeaderMap,
    routing::get,
    Json, Router,
};
use serde::Serialize;
use uuid::Uuid;

use super::doctor_id_from_headers;
use crate::db::consultations::load_consultation_owned;
use crate::error::{ApiError, ApiResult};
use crate::models::{
    ExtractedFields, HistorySummary, LedgerEntry, RecordStatus,
};
use crate::AppState;

/// GET /consultations/{id} response
///
/// The full record view minus internal storage keys. The client never
/// sees blob paths; audio access goes through its own endpoint.
#[derive(Debug, Serialize)]
pub struct ConsultationView {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub consultation_type: String,
    pub status: RecordStatus,
    pub duration_seconds: u32,
    pub content_hash: String,
    pub raw_transcript: Option<String>,
    pub cleaned_transcript: Option<String>,
    pub fields: Option<ExtractedFields>,
    pub original_ai_version: Option<ExtractedFields>,
    pub ledger: Vec<LedgerEntry>,
    pub processing_error: Option<String>,
    pub history_window: Vec<HistorySummary>,
    pub reused_from: Option<Uuid>,
    pub version: i64,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub completed_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// GET /consultations/{id}
pub async fn get_consultation(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(record_id): Path<Uuid>,
) -> ApiResult<Json<ConsultationView>> {
    let doctor_id = doctor_id_from_headers(&headers)?;
    let record = load_consultation_owned(&state.db, record_id, doctor_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Consultation {} not found", record_id)))?;

    Ok(Json(ConsultationView {
        id: record.id,
        patient_id: record.patient_id,
        consultation_type: record.consultation_type,
        status: record.status,
        duration_seconds: record.audio.duration_seconds,
        content_hash: record.audio.content_hash,
        raw_transcript: record.raw_transcript,
        cleaned_transcript: record.cleaned_transcript,
        fields: record.fields,
        original_ai_version: record.original_ai_version,
        ledger: record.ledger.entries().to_vec(),
        processing_error: record.processing_error,
        history_window: record.history_window,
        reused_from: record.reused_from,
        version: record.version,
        created_at: record.created_at,
        completed_at: record.completed_at,
    }))
}

/// Build consultation read routes
pub fn consultation_routes() -> Router<AppState> {
    Router::new().route("/consultations/:id", get(get_consultation))
}
