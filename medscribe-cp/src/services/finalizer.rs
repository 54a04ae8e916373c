//! Consultation finalization and history chaining
//!
//! Closes out a record, generates its summary (best-effort), and
//! propagates a bounded rolling history window to the patient's other
//! in-flight records so their extraction steps see fresh context.

use sqlx::SqlitePool;
use uuid::Uuid;

use super::Summarizer;
use crate::error::{ApiError, ApiResult};
use crate::fsm;
use crate::models::{
    Consultation, HistorySummary, RecordStatus, SummaryOutput, HISTORY_WINDOW_CAP,
};
use medscribe_common::events::{EventBus, MedscribeEvent};

pub struct Finalizer<S> {
    db: SqlitePool,
    event_bus: EventBus,
    summarizer: S,
}

impl<S: Summarizer> Finalizer<S> {
    pub fn new(db: SqlitePool, event_bus: EventBus, summarizer: S) -> Self {
        Self {
            db,
            event_bus,
            summarizer,
        }
    }

    /// Finalize a consultation
    ///
    /// Summary generation is optional work: its failure is logged and
    /// finalization proceeds without a summary (and without touching any
    /// history window).
    pub async fn finalize(
        &self,
        record_id: Uuid,
        doctor_id: Uuid,
    ) -> ApiResult<Option<SummaryOutput>> {
        let mut record =
            crate::db::consultations::load_consultation_owned(&self.db, record_id, doctor_id)
                .await?
                .ok_or_else(|| {
                    ApiError::NotFound(format!("Consultation not found: {}", record_id))
                })?;

        if record.status == RecordStatus::Completed {
            return Err(ApiError::Conflict(format!(
                "Consultation {} is already completed",
                record_id
            )));
        }
        let anchored = record
            .fields
            .as_ref()
            .map(|f| f.has_finalization_anchor())
            .unwrap_or(false);
        if !anchored {
            return Err(ApiError::Validation(
                "Finalization requires a chief complaint or a diagnosis".to_string(),
            ));
        }

        let summary =
            fsm::run_best_effort("summary generation", self.summarizer.summarize(&record)).await;

        fsm::check_status_transition(record.status, RecordStatus::Completed)?;
        record.status = RecordStatus::Completed;
        let completed_at = chrono::Utc::now();
        record.completed_at = Some(completed_at);

        if let Some(summary) = &summary {
            let new_entry = HistorySummary {
                source_record_id: record.id,
                date: completed_at,
                diagnosis: summary.diagnosis.clone(),
                key_points: summary.key_points.clone(),
                auto_generated: true,
                edited_by_doctor: false,
            };

            // Patient-wide rolling window: the new summary plus the most
            // recent other completed records' summaries, capped and
            // newest-first.
            let older = crate::db::consultations::recent_completed_summaries(
                &self.db,
                record.patient_id,
                record.id,
                HISTORY_WINDOW_CAP,
            )
            .await?;
            let window = Consultation::bounded_window(new_entry, older);

            // Self-copy onto this record (this is also what later
            // finalizations read back as this record's summary).
            record.history_window = window.clone();
            self.persist(&mut record).await?;

            // Overwrite the window of every other in-flight record for
            // this patient, so mid-pipeline extractions pick up fresh
            // context.
            let in_flight = crate::db::consultations::processing_record_ids(
                &self.db,
                record.patient_id,
                record.id,
            )
            .await?;
            for other_id in &in_flight {
                crate::db::consultations::overwrite_history_window(&self.db, *other_id, &window)
                    .await?;
            }
            tracing::info!(
                record_id = %record.id,
                propagated_to = in_flight.len(),
                window_len = window.len(),
                "History window propagated"
            );
        } else {
            self.persist(&mut record).await?;
        }

        tracing::info!(record_id = %record.id, summary = summary.is_some(), "Consultation finalized");
        self.event_bus.emit_lossy(MedscribeEvent::ConsultationFinalized {
            record_id: record.id,
            patient_id: record.patient_id,
            summary_generated: summary.is_some(),
            timestamp: chrono::Utc::now(),
        });

        Ok(summary)
    }

    async fn persist(&self, record: &mut Consultation) -> ApiResult<()> {
        let won = crate::db::consultations::update_consultation_cas(&self.db, record).await?;
        if !won {
            return Err(ApiError::Conflict(format!(
                "Consultation {} was modified concurrently; re-read and retry",
                record.id
            )));
        }
        record.version += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AudioRef, ExtractedFields, Patient};
    use crate::services::AdapterError;

    struct OkSummarizer;
    impl Summarizer for OkSummarizer {
        async fn summarize(&self, record: &Consultation) -> Result<SummaryOutput, AdapterError> {
            let fields = record.fields.clone().unwrap_or_default();
            Ok(SummaryOutput {
                diagnosis: fields.diagnosis,
                key_points: vec![format!("visit {}", record.id)],
            })
        }
    }

    struct FailingSummarizer;
    impl Summarizer for FailingSummarizer {
        async fn summarize(&self, _record: &Consultation) -> Result<SummaryOutput, AdapterError> {
            Err(AdapterError::Api(500, "summarizer down".to_string()))
        }
    }

    async fn setup() -> (SqlitePool, EventBus, Patient) {
        let db = SqlitePool::connect(":memory:").await.unwrap();
        crate::db::init_tables(&db).await.unwrap();
        let patient = Patient {
            id: Uuid::new_v4(),
            doctor_id: Uuid::new_v4(),
            name: "P1".to_string(),
            birth_date: None,
        };
        crate::db::patients::save_patient(&db, &patient).await.unwrap();
        (db, EventBus::new(64), patient)
    }

    async fn insert_record(
        db: &SqlitePool,
        patient: &Patient,
        diagnosis: Option<&str>,
    ) -> Consultation {
        let mut record = Consultation::new_processing(
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
        record.fields = Some(ExtractedFields {
            diagnosis: diagnosis.map(|s| s.to_string()),
            ..Default::default()
        });
        crate::db::consultations::insert_consultation(db, &record)
            .await
            .unwrap();
        record
    }

    #[tokio::test]
    async fn test_finalize_completes_and_self_copies_summary() {
        let (db, bus, patient) = setup().await;
        let record = insert_record(&db, &patient, Some("asthma")).await;

        let finalizer = Finalizer::new(db.clone(), bus, OkSummarizer);
        let summary = finalizer
            .finalize(record.id, patient.doctor_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(summary.diagnosis.as_deref(), Some("asthma"));

        let loaded = crate::db::consultations::load_consultation(&db, record.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded.status, RecordStatus::Completed);
        assert!(loaded.completed_at.is_some());
        assert_eq!(loaded.history_window.len(), 1);
        assert_eq!(loaded.history_window[0].source_record_id, record.id);
        assert!(loaded.history_window[0].auto_generated);
    }

    #[tokio::test]
    async fn test_finalize_requires_anchor_field() {
        let (db, bus, patient) = setup().await;
        let record = insert_record(&db, &patient, None).await;

        let finalizer = Finalizer::new(db.clone(), bus, OkSummarizer);
        let err = finalizer
            .finalize(record.id, patient.doctor_id)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));

        // No mutation
        let loaded = crate::db::consultations::load_consultation(&db, record.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded.status, RecordStatus::Processing);
        assert_eq!(loaded.version, 0);
    }

    #[tokio::test]
    async fn test_finalize_twice_is_conflict() {
        let (db, bus, patient) = setup().await;
        let record = insert_record(&db, &patient, Some("asthma")).await;

        let finalizer = Finalizer::new(db.clone(), bus, OkSummarizer);
        finalizer.finalize(record.id, patient.doctor_id).await.unwrap();
        assert!(matches!(
            finalizer.finalize(record.id, patient.doctor_id).await,
            Err(ApiError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_summary_failure_still_finalizes() {
        let (db, bus, patient) = setup().await;
        let record = insert_record(&db, &patient, Some("asthma")).await;

        let finalizer = Finalizer::new(db.clone(), bus, FailingSummarizer);
        let summary = finalizer
            .finalize(record.id, patient.doctor_id)
            .await
            .unwrap();
        assert!(summary.is_none());

        let loaded = crate::db::consultations::load_consultation(&db, record.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded.status, RecordStatus::Completed);
        assert!(loaded.history_window.is_empty());
    }

    #[tokio::test]
    async fn test_history_window_stays_bounded_and_propagates() {
        let (db, bus, patient) = setup().await;
        let finalizer = Finalizer::new(db.clone(), bus, OkSummarizer);

        // One record stays mid-pipeline throughout
        let in_flight = insert_record(&db, &patient, Some("pending")).await;

        // Finalize four consultations in sequence
        let mut finalized = Vec::new();
        for i in 0..4 {
            let record = insert_record(&db, &patient, Some(&format!("dx-{}", i))).await;
            finalizer.finalize(record.id, patient.doctor_id).await.unwrap();
            finalized.push(record.id);
        }

        // The in-flight record carries the three newest summaries
        let loaded = crate::db::consultations::load_consultation(&db, in_flight.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded.status, RecordStatus::Processing);
        assert_eq!(loaded.history_window.len(), HISTORY_WINDOW_CAP);
        assert_eq!(
            loaded.history_window[0].diagnosis.as_deref(),
            Some("dx-3")
        );
        for pair in loaded.history_window.windows(2) {
            assert!(pair[0].date >= pair[1].date);
        }

        // Every record's own window is bounded too
        for id in finalized {
            let rec = crate::db::consultations::load_consultation(&db, id)
                .await
                .unwrap()
                .unwrap();
            assert!(rec.history_window.len() <= HISTORY_WINDOW_CAP);
        }
    }
}
