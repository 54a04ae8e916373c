//! Reuse fast-path
//!
//! Clones a completed record's outputs into a new record without
//! re-running the pipeline. The audio asset is shared by reference;
//! bytes are never copied. Deliberately not idempotent: two calls mean
//! two distinct clinical encounters and yield two records.

use sqlx::SqlitePool;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::models::{Consultation, RecordStatus};
use medscribe_common::events::{EventBus, MedscribeEvent};

pub struct ReuseService {
    db: SqlitePool,
    event_bus: EventBus,
}

impl ReuseService {
    pub fn new(db: SqlitePool, event_bus: EventBus) -> Self {
        Self { db, event_bus }
    }

    /// Clone `source_record_id` into a new completed record for
    /// `target_patient_id`
    ///
    /// The source record and the target patient are validated as two
    /// separate ownership checks; the target patient may differ from the
    /// source record's patient.
    pub async fn reuse(
        &self,
        source_record_id: Uuid,
        target_patient_id: Uuid,
        doctor_id: Uuid,
    ) -> ApiResult<Consultation> {
        let source = crate::db::consultations::load_consultation_owned(
            &self.db,
            source_record_id,
            doctor_id,
        )
        .await?
        .ok_or_else(|| {
            ApiError::NotFound(format!("Consultation not found: {}", source_record_id))
        })?;

        if source.status != RecordStatus::Completed {
            return Err(ApiError::Validation(format!(
                "Only completed consultations can be reused; {} is not",
                source_record_id
            )));
        }

        let patient =
            crate::db::patients::get_patient_owned(&self.db, target_patient_id, doctor_id)
                .await?
                .ok_or_else(|| {
                    ApiError::NotFound(format!("Patient not found: {}", target_patient_id))
                })?;

        let record = Consultation::new_reused(&source, patient.id);
        crate::db::consultations::insert_consultation(&self.db, &record).await?;

        tracing::info!(
            source_record_id = %source.id,
            new_record_id = %record.id,
            patient_id = %record.patient_id,
            "Consultation reused"
        );
        self.event_bus.emit_lossy(MedscribeEvent::ConsultationReused {
            source_record_id: source.id,
            new_record_id: record.id,
            patient_id: record.patient_id,
            timestamp: chrono::Utc::now(),
        });

        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AudioRef, ExtractedFields, Patient, StepName, StepStatus};

    async fn setup() -> (SqlitePool, EventBus, Patient, Consultation) {
        let db = SqlitePool::connect(":memory:").await.unwrap();
        crate::db::init_tables(&db).await.unwrap();

        let patient = Patient {
            id: Uuid::new_v4(),
            doctor_id: Uuid::new_v4(),
            name: "P1".to_string(),
            birth_date: None,
        };
        crate::db::patients::save_patient(&db, &patient).await.unwrap();

        let mut source = Consultation::new_processing(
            patient.doctor_id,
            patient.id,
            "general".to_string(),
            AudioRef {
                audio_key: format!("audio/{}", Uuid::new_v4()),
                content_hash: "hash".to_string(),
                duration_seconds: 60,
                size_bytes: 10,
                backup_key: None,
            },
        );
        source.raw_transcript = Some("raw".to_string());
        source.cleaned_transcript = Some("cleaned".to_string());
        source.fields = Some(ExtractedFields {
            diagnosis: Some("dx".to_string()),
            ..Default::default()
        });
        source.original_ai_version = source.fields.clone();
        source.status = RecordStatus::Completed;
        source.completed_at = Some(chrono::Utc::now());
        crate::db::consultations::insert_consultation(&db, &source)
            .await
            .unwrap();

        (db, EventBus::new(16), patient, source)
    }

    #[tokio::test]
    async fn test_reuse_clones_artifacts_and_shares_audio() {
        let (db, bus, patient, source) = setup().await;
        let service = ReuseService::new(db.clone(), bus);

        let record = service
            .reuse(source.id, patient.id, patient.doctor_id)
            .await
            .unwrap();

        assert_ne!(record.id, source.id);
        assert_eq!(record.status, RecordStatus::Completed);
        assert_eq!(record.reused_from, Some(source.id));
        assert_eq!(record.audio.audio_key, source.audio.audio_key);
        assert_eq!(record.fields, source.fields);
        assert_eq!(record.original_ai_version, source.original_ai_version);
        assert_eq!(record.ledger.len(), 1);
        assert_eq!(
            record.ledger.status_of(StepName::Reused),
            Some(StepStatus::Completed)
        );
    }

    #[tokio::test]
    async fn test_reuse_twice_yields_two_independent_records() {
        let (db, bus, patient, source) = setup().await;
        let service = ReuseService::new(db.clone(), bus);

        let a = service
            .reuse(source.id, patient.id, patient.doctor_id)
            .await
            .unwrap();
        let b = service
            .reuse(source.id, patient.id, patient.doctor_id)
            .await
            .unwrap();

        assert_ne!(a.id, b.id);
        assert_eq!(a.fields, b.fields);
        assert_eq!(a.status, RecordStatus::Completed);
        assert_eq!(b.status, RecordStatus::Completed);
    }

    #[tokio::test]
    async fn test_reuse_to_different_patient_checks_both_owners() {
        let (db, bus, patient, source) = setup().await;
        let service = ReuseService::new(db.clone(), bus);

        // Target patient owned by another doctor
        let foreign = Patient {
            id: Uuid::new_v4(),
            doctor_id: Uuid::new_v4(),
            name: "P2".to_string(),
            birth_date: None,
        };
        crate::db::patients::save_patient(&db, &foreign).await.unwrap();

        assert!(matches!(
            service.reuse(source.id, foreign.id, patient.doctor_id).await,
            Err(ApiError::NotFound(_))
        ));

        // Source record owned by another doctor
        assert!(matches!(
            service.reuse(source.id, patient.id, Uuid::new_v4()).await,
            Err(ApiError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_reuse_rejects_unfinished_source() {
        let (db, bus, patient, _source) = setup().await;
        let unfinished = Consultation::new_processing(
            patient.doctor_id,
            patient.id,
            "general".to_string(),
            AudioRef {
                audio_key: "audio/u".to_string(),
                content_hash: "h".to_string(),
                duration_seconds: 5,
                size_bytes: 5,
                backup_key: None,
            },
        );
        crate::db::consultations::insert_consultation(&db, &unfinished)
            .await
            .unwrap();

        let service = ReuseService::new(db, bus);
        assert!(matches!(
            service
                .reuse(unfinished.id, patient.id, patient.doctor_id)
                .await,
            Err(ApiError::Validation(_))
        ));
    }
}
