//! Patient table access
//!
//! Patient rows are written by the CRUD service; this service reads
//! them for ownership checks and adapter context.

use medscribe_common::{Error, Result};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::models::Patient;

/// Load a patient only if it belongs to the given doctor
///
/// Returns None both for an absent row and an ownership mismatch, so
/// callers cannot distinguish (and leak) other doctors' patients.
pub async fn get_patient_owned(
    pool: &SqlitePool,
    patient_id: Uuid,
    doctor_id: Uuid,
) -> Result<Option<Patient>> {
    let row = sqlx::query(
        "SELECT id, doctor_id, name, birth_date FROM patients WHERE id = ? AND doctor_id = ?",
    )
    .bind(patient_id.to_string())
    .bind(doctor_id.to_string())
    .fetch_optional(pool)
    .await?;

    row.map(|row| {
        let id: String = row.get("id");
        let doctor_id: String = row.get("doctor_id");
        let birth_date: Option<String> = row.get("birth_date");
        Ok(Patient {
            id: parse_uuid(&id)?,
            doctor_id: parse_uuid(&doctor_id)?,
            name: row.get("name"),
            birth_date: birth_date
                .map(|d| {
                    chrono::NaiveDate::parse_from_str(&d, "%Y-%m-%d")
                        .map_err(|e| Error::Internal(format!("Failed to parse birth_date: {}", e)))
                })
                .transpose()?,
        })
    })
    .transpose()
}

/// Insert or replace a patient row (used by tests and sync tooling)
pub async fn save_patient(pool: &SqlitePool, patient: &Patient) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO patients (id, doctor_id, name, birth_date)
        VALUES (?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            doctor_id = excluded.doctor_id,
            name = excluded.name,
            birth_date = excluded.birth_date
        "#,
    )
    .bind(patient.id.to_string())
    .bind(patient.doctor_id.to_string())
    .bind(&patient.name)
    .bind(patient.birth_date.map(|d| d.format("%Y-%m-%d").to_string()))
    .execute(pool)
    .await?;
    Ok(())
}

fn parse_uuid(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s).map_err(|e| Error::Internal(format!("Invalid UUID in database: {}", e)))
}
