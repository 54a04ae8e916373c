//! Audio upload API handler
//!
//! POST /consultations/upload

use axum::{extract::State, http::HeaderMap, routing::post, Json, Router};
use base64::Engine;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::doctor_id_from_headers;
use crate::error::{ApiError, ApiResult};
use crate::models::RecordStatus;
use crate::services::ingestion::{UploadRequest, UploadSource};
use crate::AppState;

/// POST /consultations/upload request
///
/// Exactly one of `audio_base64` or `chunk_session_id` must be set.
#[derive(Debug, Deserialize)]
pub struct UploadAudioRequest {
    pub patient_id: Uuid,
    pub consultation_type: String,
    pub duration_seconds: u32,
    #[serde(default)]
    pub audio_base64: Option<String>,
    #[serde(default)]
    pub chunk_session_id: Option<String>,
    /// Client-computed content hash, trusted as-is when present
    #[serde(default)]
    pub content_hash: Option<String>,
}

/// POST /consultations/upload response
#[derive(Debug, Serialize)]
pub struct UploadAudioResponse {
    pub record_id: Uuid,
    pub status: RecordStatus,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// POST /consultations/upload
///
/// Creates the processing record and returns immediately; running the
/// pipeline is a separate call so the upload never blocks on AI work.
pub async fn upload_audio(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<UploadAudioRequest>,
) -> ApiResult<Json<UploadAudioResponse>> {
    let doctor_id = doctor_id_from_headers(&headers)?;

    let source = match (&request.audio_base64, &request.chunk_session_id) {
        (Some(payload), None) => {
            let bytes = base64::engine::general_purpose::STANDARD
                .decode(payload)
                .map_err(|e| ApiError::Validation(format!("Invalid base64 payload: {}", e)))?;
            UploadSource::Inline(bytes)
        }
        (None, Some(session_id)) => UploadSource::ChunkSession(session_id.clone()),
        _ => {
            return Err(ApiError::Validation(
                "Provide exactly one of audio_base64 or chunk_session_id".to_string(),
            ))
        }
    };

    let record = state
        .ingestion()
        .ingest(UploadRequest {
            doctor_id,
            patient_id: request.patient_id,
            consultation_type: request.consultation_type,
            duration_seconds: request.duration_seconds,
            client_hash: request.content_hash,
            source,
        })
        .await?;

    Ok(Json(UploadAudioResponse {
        record_id: record.id,
        status: record.status,
        created_at: record.created_at,
    }))
}

/// Build upload routes
pub fn upload_routes() -> Router<AppState> {
    Router::new().route("/consultations/upload", post(upload_audio))
}
