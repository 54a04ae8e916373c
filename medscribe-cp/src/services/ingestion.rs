//! Audio ingestion
//!
//! Accepts a single audio payload or a chunked-upload session,
//! reassembles and validates the bytes, persists the asset, and creates
//! the consultation record with the download step already completed.
//! Running the pipeline is a separate, explicitly triggered operation so
//! the upload request never blocks on minutes-long AI calls.

use futures::future::try_join_all;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::config::{MAX_AUDIO_BYTES, MAX_DURATION_SECONDS};
use crate::error::{ApiError, ApiResult};
use crate::fsm;
use crate::models::{AudioRef, Consultation};
use crate::storage::{sha256_hex, FsBlobStore};
use medscribe_common::events::{EventBus, MedscribeEvent};

/// Where the audio bytes come from
#[derive(Debug)]
pub enum UploadSource {
    /// Complete payload in one request
    Inline(Vec<u8>),
    /// Chunk objects previously staged under `chunks/<session_id>/`
    ChunkSession(String),
}

/// Parameters of an upload request
#[derive(Debug)]
pub struct UploadRequest {
    pub doctor_id: Uuid,
    pub patient_id: Uuid,
    pub consultation_type: String,
    pub duration_seconds: u32,
    /// Client-computed content hash, trusted as-is when present
    pub client_hash: Option<String>,
    pub source: UploadSource,
}

pub struct IngestionService {
    db: SqlitePool,
    blob: FsBlobStore,
    event_bus: EventBus,
}

impl IngestionService {
    pub fn new(db: SqlitePool, blob: FsBlobStore, event_bus: EventBus) -> Self {
        Self { db, blob, event_bus }
    }

    /// Ingest an upload and create the processing record
    ///
    /// All validation happens before any record exists; a rejected
    /// request leaves no partial state (staged chunks are still cleaned
    /// up, the staging area is not part of the record).
    pub async fn ingest(&self, request: UploadRequest) -> ApiResult<Consultation> {
        if request.consultation_type.trim().is_empty() {
            return Err(ApiError::Validation(
                "consultation_type must not be empty".to_string(),
            ));
        }
        if request.duration_seconds > MAX_DURATION_SECONDS {
            return Err(ApiError::Validation(format!(
                "Duration {}s exceeds the {}s limit",
                request.duration_seconds, MAX_DURATION_SECONDS
            )));
        }

        let patient =
            crate::db::patients::get_patient_owned(&self.db, request.patient_id, request.doctor_id)
                .await?
                .ok_or_else(|| {
                    ApiError::NotFound(format!("Patient not found: {}", request.patient_id))
                })?;

        let bytes = match &request.source {
            UploadSource::Inline(bytes) => {
                if bytes.is_empty() {
                    return Err(ApiError::Validation("Audio payload is empty".to_string()));
                }
                bytes.clone()
            }
            UploadSource::ChunkSession(session_id) => self.reassemble_chunks(session_id).await?,
        };

        if bytes.len() as u64 > MAX_AUDIO_BYTES {
            return Err(ApiError::Validation(format!(
                "Audio size {} bytes exceeds the {} byte limit",
                bytes.len(),
                MAX_AUDIO_BYTES
            )));
        }

        // Client-supplied hashes are trusted as-is (explicit trust
        // boundary); otherwise hash server-side.
        let content_hash = match request.client_hash {
            Some(hash) if !hash.trim().is_empty() => hash,
            _ => sha256_hex(&bytes),
        };

        let asset_id = Uuid::new_v4();
        let audio_key = format!("audio/{}", asset_id);
        self.blob.put(&audio_key, &bytes).await?;

        // Best-effort backup copy under a separate key
        let backup_key = format!("backup/{}", asset_id);
        let backup_key = fsm::run_best_effort("audio backup", async {
            self.blob.put(&backup_key, &bytes).await.map(|_| backup_key.clone())
        })
        .await;

        let audio = AudioRef {
            audio_key,
            content_hash,
            duration_seconds: request.duration_seconds,
            size_bytes: bytes.len() as u64,
            backup_key,
        };

        let record = Consultation::new_processing(
            request.doctor_id,
            patient.id,
            request.consultation_type,
            audio,
        );
        crate::db::consultations::insert_consultation(&self.db, &record).await?;

        tracing::info!(
            record_id = %record.id,
            patient_id = %record.patient_id,
            size_bytes = record.audio.size_bytes,
            "Consultation record created from audio upload"
        );
        self.event_bus.emit_lossy(MedscribeEvent::ConsultationCreated {
            record_id: record.id,
            patient_id: record.patient_id,
            timestamp: chrono::Utc::now(),
        });

        Ok(record)
    }

    /// Reassemble a chunked-upload session
    ///
    /// Lists the session's chunk objects (sorted key order is upload
    /// order), fetches them concurrently, and concatenates in listing
    /// order. The chunk objects are deleted before any later validation
    /// runs, so cleanup happens whether or not ingestion succeeds.
    async fn reassemble_chunks(&self, session_id: &str) -> ApiResult<Vec<u8>> {
        if session_id.trim().is_empty() || session_id.contains('/') {
            return Err(ApiError::Validation(format!(
                "Invalid chunk session id: {}",
                session_id
            )));
        }

        let prefix = format!("chunks/{}", session_id);
        let keys = self.blob.list_prefix(&prefix).await?;
        if keys.is_empty() {
            return Err(ApiError::Validation(format!(
                "Chunk session has no chunks: {}",
                session_id
            )));
        }

        tracing::debug!(session_id, chunk_count = keys.len(), "Reassembling chunk session");

        // try_join_all preserves input order, so the concatenation below
        // follows listing order regardless of fetch completion order.
        let fetched = try_join_all(keys.iter().map(|key| self.blob.get(key))).await;

        // Scoped cleanup: delete the chunk objects even when a fetch
        // failed or a later validation step will reject the upload.
        for key in &keys {
            if let Err(e) = self.blob.delete(key).await {
                tracing::warn!(key, error = %e, "Failed to delete chunk object");
            }
        }

        let chunks = fetched?;
        Ok(chunks.concat())
    }
}
