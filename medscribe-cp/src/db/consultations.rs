//! Consultation record persistence
//!
//! The ledger, extracted fields, and history window are JSON columns on
//! the consultations row. Every update is a compare-and-set on the
//! `version` column so concurrent retries of the same record cannot
//! silently overwrite each other's writes.

use medscribe_common::{Error, Result};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::models::{
    AudioRef, Consultation, ExtractedFields, HistorySummary, RecordStatus, StepLedger,
};

fn status_str(status: RecordStatus) -> &'static str {
    match status {
        RecordStatus::Processing => "PROCESSING",
        RecordStatus::Completed => "COMPLETED",
        RecordStatus::Error => "ERROR",
    }
}

fn parse_status(s: &str) -> Result<RecordStatus> {
    match s {
        "PROCESSING" => Ok(RecordStatus::Processing),
        "COMPLETED" => Ok(RecordStatus::Completed),
        "ERROR" => Ok(RecordStatus::Error),
        other => Err(Error::Internal(format!("Unknown record status: {}", other))),
    }
}

fn to_json<T: serde::Serialize>(what: &str, value: &T) -> Result<String> {
    serde_json::to_string(value)
        .map_err(|e| Error::Internal(format!("Failed to serialize {}: {}", what, e)))
}

fn from_json<T: serde::de::DeserializeOwned>(what: &str, json: &str) -> Result<T> {
    serde_json::from_str(json)
        .map_err(|e| Error::Internal(format!("Failed to deserialize {}: {}", what, e)))
}

fn parse_uuid(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s).map_err(|e| Error::Internal(format!("Invalid UUID in database: {}", e)))
}

fn parse_timestamp(s: &str) -> Result<chrono::DateTime<chrono::Utc>> {
    chrono::DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&chrono::Utc))
        .map_err(|e| Error::Internal(format!("Failed to parse timestamp: {}", e)))
}

/// Insert a freshly created consultation record
pub async fn insert_consultation(pool: &SqlitePool, record: &Consultation) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO consultations (
            id, doctor_id, patient_id, consultation_type, status,
            audio_key, content_hash, duration_seconds, size_bytes, backup_key,
            raw_transcript, cleaned_transcript, fields, original_ai_version,
            ledger, processing_error, history_window, reused_from,
            version, created_at, completed_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(record.id.to_string())
    .bind(record.doctor_id.to_string())
    .bind(record.patient_id.to_string())
    .bind(&record.consultation_type)
    .bind(status_str(record.status))
    .bind(&record.audio.audio_key)
    .bind(&record.audio.content_hash)
    .bind(record.audio.duration_seconds as i64)
    .bind(record.audio.size_bytes as i64)
    .bind(&record.audio.backup_key)
    .bind(&record.raw_transcript)
    .bind(&record.cleaned_transcript)
    .bind(
        record
            .fields
            .as_ref()
            .map(|f| to_json("fields", f))
            .transpose()?,
    )
    .bind(
        record
            .original_ai_version
            .as_ref()
            .map(|f| to_json("original_ai_version", f))
            .transpose()?,
    )
    .bind(to_json("ledger", &record.ledger)?)
    .bind(&record.processing_error)
    .bind(to_json("history_window", &record.history_window)?)
    .bind(record.reused_from.map(|id| id.to_string()))
    .bind(record.version)
    .bind(record.created_at.to_rfc3339())
    .bind(record.completed_at.map(|dt| dt.to_rfc3339()))
    .execute(pool)
    .await?;

    Ok(())
}

/// Persist the mutable fields of a record, compare-and-setting on version
///
/// `record.version` must hold the version the caller read. Returns false
/// when a concurrent writer won the race (no rows updated); on success
/// the caller should treat the stored version as `record.version + 1`.
pub async fn update_consultation_cas(pool: &SqlitePool, record: &Consultation) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE consultations SET
            status = ?,
            backup_key = ?,
            raw_transcript = ?,
            cleaned_transcript = ?,
            fields = ?,
            original_ai_version = ?,
            ledger = ?,
            processing_error = ?,
            history_window = ?,
            completed_at = ?,
            version = version + 1
        WHERE id = ? AND version = ?
        "#,
    )
    .bind(status_str(record.status))
    .bind(&record.audio.backup_key)
    .bind(&record.raw_transcript)
    .bind(&record.cleaned_transcript)
    .bind(
        record
            .fields
            .as_ref()
            .map(|f| to_json("fields", f))
            .transpose()?,
    )
    .bind(
        record
            .original_ai_version
            .as_ref()
            .map(|f| to_json("original_ai_version", f))
            .transpose()?,
    )
    .bind(to_json("ledger", &record.ledger)?)
    .bind(&record.processing_error)
    .bind(to_json("history_window", &record.history_window)?)
    .bind(record.completed_at.map(|dt| dt.to_rfc3339()))
    .bind(record.id.to_string())
    .bind(record.version)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Load a consultation by id
pub async fn load_consultation(pool: &SqlitePool, id: Uuid) -> Result<Option<Consultation>> {
    let row = sqlx::query("SELECT * FROM consultations WHERE id = ?")
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?;

    row.map(row_to_consultation).transpose()
}

/// Load a consultation only if it belongs to the given doctor
pub async fn load_consultation_owned(
    pool: &SqlitePool,
    id: Uuid,
    doctor_id: Uuid,
) -> Result<Option<Consultation>> {
    let row = sqlx::query("SELECT * FROM consultations WHERE id = ? AND doctor_id = ?")
        .bind(id.to_string())
        .bind(doctor_id.to_string())
        .fetch_optional(pool)
        .await?;

    row.map(row_to_consultation).transpose()
}

/// Summaries of the most recent other completed consultations for a patient
///
/// Each completed record self-copies its summary into its own history
/// window at finalization; that self-entry (source_record_id == record id)
/// is what this reads back.
pub async fn recent_completed_summaries(
    pool: &SqlitePool,
    patient_id: Uuid,
    exclude_record: Uuid,
    limit: usize,
) -> Result<Vec<HistorySummary>> {
    let rows = sqlx::query(
        r#"
        SELECT id, history_window FROM consultations
        WHERE patient_id = ? AND status = 'COMPLETED' AND id != ?
        ORDER BY completed_at DESC
        LIMIT ?
        "#,
    )
    .bind(patient_id.to_string())
    .bind(exclude_record.to_string())
    .bind(limit as i64)
    .fetch_all(pool)
    .await?;

    let mut summaries = Vec::new();
    for row in rows {
        let id: String = row.get("id");
        let id = parse_uuid(&id)?;
        let window: String = row.get("history_window");
        let window: Vec<HistorySummary> = from_json("history_window", &window)?;
        if let Some(own) = window.into_iter().find(|s| s.source_record_id == id) {
            summaries.push(own);
        }
    }
    Ok(summaries)
}

/// Ids of this patient's records currently mid-pipeline
pub async fn processing_record_ids(
    pool: &SqlitePool,
    patient_id: Uuid,
    exclude_record: Uuid,
) -> Result<Vec<Uuid>> {
    let rows = sqlx::query(
        "SELECT id FROM consultations WHERE patient_id = ? AND status = 'PROCESSING' AND id != ?",
    )
    .bind(patient_id.to_string())
    .bind(exclude_record.to_string())
    .fetch_all(pool)
    .await?;

    rows.into_iter()
        .map(|row| {
            let id: String = row.get("id");
            parse_uuid(&id)
        })
        .collect()
}

/// Blind overwrite of a record's history window
///
/// Used by finalization to propagate the fresh window onto the patient's
/// in-flight records; overwrites the single field and bumps the version.
pub async fn overwrite_history_window(
    pool: &SqlitePool,
    record_id: Uuid,
    window: &[HistorySummary],
) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE consultations
        SET history_window = ?, version = version + 1
        WHERE id = ?
        "#,
    )
    .bind(to_json("history_window", &window.to_vec())?)
    .bind(record_id.to_string())
    .execute(pool)
    .await?;
    Ok(())
}

fn row_to_consultation(row: sqlx::sqlite::SqliteRow) -> Result<Consultation> {
    let id: String = row.get("id");
    let doctor_id: String = row.get("doctor_id");
    let patient_id: String = row.get("patient_id");
    let status: String = row.get("status");
    let fields: Option<String> = row.get("fields");
    let original_ai_version: Option<String> = row.get("original_ai_version");
    let ledger: String = row.get("ledger");
    let history_window: String = row.get("history_window");
    let reused_from: Option<String> = row.get("reused_from");
    let created_at: String = row.get("created_at");
    let completed_at: Option<String> = row.get("completed_at");
    let duration_seconds: i64 = row.get("duration_seconds");
    let size_bytes: i64 = row.get("size_bytes");

    Ok(Consultation {
        id: parse_uuid(&id)?,
        doctor_id: parse_uuid(&doctor_id)?,
        patient_id: parse_uuid(&patient_id)?,
        consultation_type: row.get("consultation_type"),
        status: parse_status(&status)?,
        audio: AudioRef {
            audio_key: row.get("audio_key"),
            content_hash: row.get("content_hash"),
            duration_seconds: duration_seconds as u32,
            size_bytes: size_bytes as u64,
            backup_key: row.get("backup_key"),
        },
        raw_transcript: row.get("raw_transcript"),
        cleaned_transcript: row.get("cleaned_transcript"),
        fields: fields
            .map(|f| from_json::<ExtractedFields>("fields", &f))
            .transpose()?,
        original_ai_version: original_ai_version
            .map(|f| from_json::<ExtractedFields>("original_ai_version", &f))
            .transpose()?,
        ledger: from_json::<StepLedger>("ledger", &ledger)?,
        processing_error: row.get("processing_error"),
        history_window: from_json("history_window", &history_window)?,
        reused_from: reused_from.map(|s| parse_uuid(&s)).transpose()?,
        version: row.get("version"),
        created_at: parse_timestamp(&created_at)?,
        completed_at: completed_at.map(|s| parse_timestamp(&s)).transpose()?,
    })
}
