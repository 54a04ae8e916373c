//! Database access for medscribe-cp
//!
//! SQLite via sqlx. The step ledger, extracted fields, and history
//! window are embedded JSON columns on the consultations row; there is
//! no separate queue or step table.

pub mod consultations;
pub mod patients;
pub mod settings;

use anyhow::Result;
use sqlx::SqlitePool;
use std::path::Path;

/// Initialize database connection pool
///
/// Connects to medscribe.db in the root folder, creating it if missing.
pub async fn init_database_pool(db_path: &Path) -> Result<SqlitePool> {
    // Ensure parent directory exists
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Use proper SQLite URI with mode=rwc (read, write, create)
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    tracing::debug!("Connecting to database: {}", db_url);

    let pool = SqlitePool::connect(&db_url).await?;

    init_tables(&pool).await?;

    Ok(pool)
}

/// Initialize medscribe-cp tables
///
/// Creates settings, patients, and consultations tables if they don't exist.
pub async fn init_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS patients (
            id TEXT PRIMARY KEY,
            doctor_id TEXT NOT NULL,
            name TEXT NOT NULL,
            birth_date TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS consultations (
            id TEXT PRIMARY KEY,
            doctor_id TEXT NOT NULL,
            patient_id TEXT NOT NULL,
            consultation_type TEXT NOT NULL,
            status TEXT NOT NULL,
            audio_key TEXT NOT NULL,
            content_hash TEXT NOT NULL,
            duration_seconds INTEGER NOT NULL,
            size_bytes INTEGER NOT NULL,
            backup_key TEXT,
            raw_transcript TEXT,
            cleaned_transcript TEXT,
            fields TEXT,
            original_ai_version TEXT,
            ledger TEXT NOT NULL DEFAULT '[]',
            processing_error TEXT,
            history_window TEXT NOT NULL DEFAULT '[]',
            reused_from TEXT,
            version INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            completed_at TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    tracing::info!("Database tables initialized (settings, patients, consultations)");

    Ok(())
}
