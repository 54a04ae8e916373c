//! Step sequencer
//!
//! Runs or retries the ordered processing steps against a consultation
//! record, updating its embedded ledger. Every write goes through the
//! version compare-and-set, so two concurrent runs against the same
//! record cannot interleave silently; the loser surfaces a conflict.
//!
//! Recovery model: there is no durable job runner. A failed step leaves
//! the record inspectable (status, failing step, error message) and a
//! later retry resumes exactly the failed unit of work.

use sqlx::SqlitePool;
use uuid::Uuid;

use super::{AdapterError, Cleaner, CleaningContext, ExtractionContext, Extractor, Transcriber};
use crate::error::{ApiError, ApiResult};
use crate::fsm;
use crate::models::{Consultation, RecordStatus, StepName, StepStatus};
use crate::storage::FsBlobStore;
use medscribe_common::events::{EventBus, MedscribeEvent};

pub struct Sequencer<T, C, E> {
    db: SqlitePool,
    blob: FsBlobStore,
    event_bus: EventBus,
    transcriber: T,
    cleaner: C,
    extractor: E,
}

impl<T, C, E> Sequencer<T, C, E>
where
    T: Transcriber,
    C: Cleaner,
    E: Extractor,
{
    pub fn new(
        db: SqlitePool,
        blob: FsBlobStore,
        event_bus: EventBus,
        transcriber: T,
        cleaner: C,
        extractor: E,
    ) -> Self {
        Self {
            db,
            blob,
            event_bus,
            transcriber,
            cleaner,
            extractor,
        }
    }

    /// Execute the full pipeline in order, stopping at the first failure
    ///
    /// On the first failing step the record is left with that step marked
    /// error, `processing_error` recorded, and status ERROR; completed
    /// steps and their artifacts stay untouched. On full success the
    /// record is COMPLETED with the first-extraction snapshot written.
    pub async fn run_all(&self, record_id: Uuid, doctor_id: Uuid) -> ApiResult<Consultation> {
        let mut record = self.load_owned(record_id, doctor_id).await?;

        fsm::check_status_transition(record.status, RecordStatus::Processing)?;
        record.status = RecordStatus::Processing;

        for step in StepName::pipeline_order() {
            if let Err(err) = self.execute_step(&mut record, step).await {
                // Adapter failures were already persisted onto the
                // record; conflicts and the like pass straight through.
                if matches!(err, ApiError::Adapter(_)) {
                    record.status = RecordStatus::Error;
                    self.persist(&mut record).await?;
                    self.event_bus.emit_lossy(MedscribeEvent::PipelineFailed {
                        record_id: record.id,
                        failed_step: step.as_str().to_string(),
                        error: record.processing_error.clone().unwrap_or_default(),
                        timestamp: chrono::Utc::now(),
                    });
                }
                return Err(err);
            }
        }

        self.complete_record(&mut record).await?;
        self.event_bus.emit_lossy(MedscribeEvent::PipelineCompleted {
            record_id: record.id,
            timestamp: chrono::Utc::now(),
        });

        Ok(record)
    }

    /// Execute exactly one named step
    ///
    /// Precondition violations return before any mutation. A successful
    /// retry moves the record back to PROCESSING. Extraction is the
    /// exception: it mirrors the pipeline's terminal step, completing
    /// the record and writing the first-extraction snapshot when this is
    /// the record's first successful extraction.
    pub async fn retry_step(
        &self,
        record_id: Uuid,
        doctor_id: Uuid,
        step: StepName,
    ) -> ApiResult<Consultation> {
        let mut record = self.load_owned(record_id, doctor_id).await?;

        // Validated before any mutation
        fsm::check_step_preconditions(&record, step)?;

        self.execute_step(&mut record, step).await?;

        if step == StepName::Extraction {
            self.complete_record(&mut record).await?;
        } else {
            fsm::check_status_transition(record.status, RecordStatus::Processing)?;
            record.status = RecordStatus::Processing;
            self.persist(&mut record).await?;
        }

        Ok(record)
    }

    /// Run one step body and persist the outcome
    ///
    /// The ledger entry is upserted by name on every path, so replaying
    /// a step never duplicates history.
    async fn execute_step(&self, record: &mut Consultation, step: StepName) -> ApiResult<()> {
        // Only required-path steps are schedulable; optional work goes
        // through run_best_effort, never through the sequencer.
        if fsm::classify(step) != fsm::StepClass::Required {
            return Err(fsm::TransitionError::NotExecutable(step).into());
        }
        fsm::check_step_preconditions(record, step)?;

        record.ledger.upsert(step, StepStatus::InProgress);
        self.persist(record).await?;
        self.event_bus.emit_lossy(MedscribeEvent::StepStarted {
            record_id: record.id,
            step: step.as_str().to_string(),
            timestamp: chrono::Utc::now(),
        });
        tracing::info!(record_id = %record.id, step = %step, "Step started");

        match self.run_step_body(record, step).await {
            Ok(()) => {
                record.ledger.upsert(step, StepStatus::Completed);
                record.processing_error = None;
                self.persist(record).await?;
                self.event_bus.emit_lossy(MedscribeEvent::StepCompleted {
                    record_id: record.id,
                    step: step.as_str().to_string(),
                    timestamp: chrono::Utc::now(),
                });
                tracing::info!(record_id = %record.id, step = %step, "Step completed");
                Ok(())
            }
            Err(err) => {
                let message = format!("{}: {}", step, err);
                record.ledger.upsert(step, StepStatus::Error);
                record.processing_error = Some(message.clone());
                self.persist(record).await?;
                self.event_bus.emit_lossy(MedscribeEvent::StepFailed {
                    record_id: record.id,
                    step: step.as_str().to_string(),
                    error: message.clone(),
                    timestamp: chrono::Utc::now(),
                });
                tracing::error!(record_id = %record.id, step = %step, error = %err, "Step failed");
                Err(ApiError::Adapter(message))
            }
        }
    }

    /// The adapter call for one step; artifacts are value-overwrites
    async fn run_step_body(
        &self,
        record: &mut Consultation,
        step: StepName,
    ) -> Result<(), AdapterError> {
        match step {
            StepName::Download => {
                // The asset write was the download step's work at
                // ingestion time; confirm the asset is still readable.
                let exists = self
                    .blob
                    .exists(&record.audio.audio_key)
                    .await
                    .map_err(|e| AdapterError::Network(e.to_string()))?;
                if !exists {
                    return Err(AdapterError::Network(format!(
                        "Audio asset missing: {}",
                        record.audio.audio_key
                    )));
                }
                Ok(())
            }
            StepName::Transcription => {
                let audio = self
                    .blob
                    .get(&record.audio.audio_key)
                    .await
                    .map_err(|e| AdapterError::Network(e.to_string()))?;
                let file_name = record
                    .audio
                    .audio_key
                    .rsplit('/')
                    .next()
                    .unwrap_or("audio")
                    .to_string();
                let raw = self.transcriber.transcribe(&audio, &file_name).await?;
                record.raw_transcript = Some(raw);
                Ok(())
            }
            StepName::Cleaning => {
                let ctx = self.cleaning_context(record).await;
                // Precondition was checked; treat a missing artifact here
                // as a provider-visible failure rather than panicking.
                let raw = record.raw_transcript.clone().ok_or_else(|| {
                    AdapterError::Parse("Raw transcript missing".to_string())
                })?;
                let cleaned = self.cleaner.clean(&raw, &ctx).await?;
                record.cleaned_transcript = Some(cleaned);
                Ok(())
            }
            StepName::Extraction => {
                let ctx = self.extraction_context(record).await;
                let cleaned = record.cleaned_transcript.clone().ok_or_else(|| {
                    AdapterError::Parse("Cleaned transcript missing".to_string())
                })?;
                let fields = self.extractor.extract(&cleaned, &ctx).await?;
                record.fields = Some(fields);
                Ok(())
            }
            StepName::Reused => Err(AdapterError::Parse(
                "The reused entry is not an executable step".to_string(),
            )),
        }
    }

    /// Terminal transition shared by run_all and the extraction retry
    async fn complete_record(&self, record: &mut Consultation) -> ApiResult<()> {
        fsm::check_status_transition(record.status, RecordStatus::Completed)?;
        record.status = RecordStatus::Completed;
        record.completed_at = Some(chrono::Utc::now());
        // First successful extraction only; later retries and human
        // edits never overwrite the snapshot.
        if record.original_ai_version.is_none() {
            record.original_ai_version = record.fields.clone();
        }
        self.persist(record).await
    }

    /// Patient context is re-read per step: a retry sees the patient's
    /// current profile, not a submission-time snapshot.
    async fn cleaning_context(&self, record: &Consultation) -> CleaningContext {
        match crate::db::patients::get_patient_owned(&self.db, record.patient_id, record.doctor_id)
            .await
        {
            Ok(Some(patient)) => CleaningContext {
                patient_age: patient.age_years(chrono::Utc::now()),
                patient_name: Some(patient.name),
            },
            _ => CleaningContext::default(),
        }
    }

    async fn extraction_context(&self, record: &Consultation) -> ExtractionContext {
        let base = self.cleaning_context(record).await;
        ExtractionContext {
            patient_name: base.patient_name,
            patient_age: base.patient_age,
            history_window: record.history_window.clone(),
        }
    }

    async fn load_owned(&self, record_id: Uuid, doctor_id: Uuid) -> ApiResult<Consultation> {
        crate::db::consultations::load_consultation_owned(&self.db, record_id, doctor_id)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("Consultation not found: {}", record_id)))
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
    use crate::fsm::TransitionError;
    use crate::models::{AudioRef, ExtractedFields, Patient};
    use tempfile::TempDir;

    // Mock adapters

    struct OkTranscriber(&'static str);
    impl Transcriber for OkTranscriber {
        async fn transcribe(&self, _audio: &[u8], _file: &str) -> Result<String, AdapterError> {
            Ok(self.0.to_string())
        }
    }

    struct OkCleaner;
    impl Cleaner for OkCleaner {
        async fn clean(&self, raw: &str, _ctx: &CleaningContext) -> Result<String, AdapterError> {
            Ok(format!("cleaned: {}", raw))
        }
    }

    struct OkExtractor(ExtractedFields);
    impl Extractor for OkExtractor {
        async fn extract(
            &self,
            _text: &str,
            _ctx: &ExtractionContext,
        ) -> Result<ExtractedFields, AdapterError> {
            Ok(self.0.clone())
        }
    }

    struct FailingExtractor;
    impl Extractor for FailingExtractor {
        async fn extract(
            &self,
            _text: &str,
            _ctx: &ExtractionContext,
        ) -> Result<ExtractedFields, AdapterError> {
            Err(AdapterError::Api(429, "quota exhausted".to_string()))
        }
    }

    fn sample_fields() -> ExtractedFields {
        ExtractedFields {
            diagnosis: Some("acute otitis media".to_string()),
            chief_complaint: Some("ear pain".to_string()),
            plan: Some("amoxicillin 10 days".to_string()),
            ..Default::default()
        }
    }

    struct Fixture {
        _dir: TempDir,
        db: SqlitePool,
        blob: FsBlobStore,
        event_bus: EventBus,
        record_id: Uuid,
        doctor_id: Uuid,
    }

    async fn setup() -> Fixture {
        let db = SqlitePool::connect(":memory:").await.unwrap();
        crate::db::init_tables(&db).await.unwrap();

        let dir = TempDir::new().unwrap();
        let blob = FsBlobStore::new(dir.path());
        let event_bus = EventBus::new(64);

        let doctor_id = Uuid::new_v4();
        let patient = Patient {
            id: Uuid::new_v4(),
            doctor_id,
            name: "P1".to_string(),
            birth_date: None,
        };
        crate::db::patients::save_patient(&db, &patient).await.unwrap();

        let audio_key = format!("audio/{}", Uuid::new_v4());
        blob.put(&audio_key, b"fake audio bytes").await.unwrap();

        let record = Consultation::new_processing(
            doctor_id,
            patient.id,
            "general".to_string(),
            AudioRef {
                audio_key,
                content_hash: "hash".to_string(),
                duration_seconds: 600,
                size_bytes: 16,
                backup_key: None,
            },
        );
        crate::db::consultations::insert_consultation(&db, &record)
            .await
            .unwrap();

        Fixture {
            _dir: dir,
            db,
            blob,
            event_bus,
            record_id: record.id,
            doctor_id,
        }
    }

    fn sequencer<E: Extractor>(
        fx: &Fixture,
        extractor: E,
    ) -> Sequencer<OkTranscriber, OkCleaner, E> {
        Sequencer::new(
            fx.db.clone(),
            fx.blob.clone(),
            fx.event_bus.clone(),
            OkTranscriber("raw transcript"),
            OkCleaner,
            extractor,
        )
    }

    #[tokio::test]
    async fn test_run_all_happy_path() {
        let fx = setup().await;
        let seq = sequencer(&fx, OkExtractor(sample_fields()));

        let record = seq.run_all(fx.record_id, fx.doctor_id).await.unwrap();

        assert_eq!(record.status, RecordStatus::Completed);
        assert_eq!(record.ledger.len(), 4);
        assert!(record.ledger.all_pipeline_steps_completed());
        assert_eq!(record.raw_transcript.as_deref(), Some("raw transcript"));
        assert_eq!(
            record.cleaned_transcript.as_deref(),
            Some("cleaned: raw transcript")
        );
        assert_eq!(record.fields, Some(sample_fields()));
        assert_eq!(record.original_ai_version, Some(sample_fields()));
        assert!(record.completed_at.is_some());
    }

    #[tokio::test]
    async fn test_extraction_failure_preserves_earlier_artifacts() {
        let fx = setup().await;
        let seq = sequencer(&fx, FailingExtractor);

        let err = seq.run_all(fx.record_id, fx.doctor_id).await.unwrap_err();
        assert!(matches!(err, ApiError::Adapter(_)));

        let record = crate::db::consultations::load_consultation(&fx.db, fx.record_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.status, RecordStatus::Error);
        assert!(record.processing_error.as_deref().unwrap().contains("quota"));
        assert_eq!(
            record.ledger.status_of(StepName::Extraction),
            Some(StepStatus::Error)
        );
        // Earlier artifacts intact, not cleared
        assert!(record.raw_transcript.is_some());
        assert!(record.cleaned_transcript.is_some());
        assert_eq!(
            record.ledger.status_of(StepName::Cleaning),
            Some(StepStatus::Completed)
        );
    }

    #[tokio::test]
    async fn test_retry_extraction_before_cleaning_is_precondition_error() {
        let fx = setup().await;
        let seq = sequencer(&fx, OkExtractor(sample_fields()));

        let before = crate::db::consultations::load_consultation(&fx.db, fx.record_id)
            .await
            .unwrap()
            .unwrap();

        let err = seq
            .retry_step(fx.record_id, fx.doctor_id, StepName::Extraction)
            .await
            .unwrap_err();
        match err {
            ApiError::Precondition(TransitionError::MissingPrerequisite { run_first, .. }) => {
                assert_eq!(run_first, StepName::Cleaning)
            }
            other => panic!("Unexpected error: {:?}", other),
        }

        // No mutation occurred
        let after = crate::db::consultations::load_consultation(&fx.db, fx.record_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(after.version, before.version);
        assert_eq!(after.ledger.len(), before.ledger.len());
    }

    #[tokio::test]
    async fn test_retry_recovers_failed_pipeline() {
        let fx = setup().await;

        // First run fails at extraction
        let seq = sequencer(&fx, FailingExtractor);
        seq.run_all(fx.record_id, fx.doctor_id).await.unwrap_err();

        // Retrying only the failed step succeeds and completes the record
        let seq = sequencer(&fx, OkExtractor(sample_fields()));
        let record = seq
            .retry_step(fx.record_id, fx.doctor_id, StepName::Extraction)
            .await
            .unwrap();

        assert_eq!(record.status, RecordStatus::Completed);
        assert_eq!(record.original_ai_version, Some(sample_fields()));
        assert!(record.processing_error.is_none());
        // Ledger still has exactly one extraction entry
        assert_eq!(record.ledger.len(), 4);
    }

    #[tokio::test]
    async fn test_second_extraction_keeps_original_snapshot() {
        let fx = setup().await;
        let seq = sequencer(&fx, OkExtractor(sample_fields()));
        seq.run_all(fx.record_id, fx.doctor_id).await.unwrap();

        let changed = ExtractedFields {
            diagnosis: Some("revised diagnosis".to_string()),
            ..sample_fields()
        };
        let seq = sequencer(&fx, OkExtractor(changed.clone()));
        let record = seq
            .retry_step(fx.record_id, fx.doctor_id, StepName::Extraction)
            .await
            .unwrap();

        assert_eq!(record.fields, Some(changed));
        // Snapshot still holds the first extraction output
        assert_eq!(record.original_ai_version, Some(sample_fields()));
    }

    #[tokio::test]
    async fn test_retry_non_terminal_step_returns_to_processing() {
        let fx = setup().await;
        let seq = sequencer(&fx, FailingExtractor);
        seq.run_all(fx.record_id, fx.doctor_id).await.unwrap_err();

        let record = seq
            .retry_step(fx.record_id, fx.doctor_id, StepName::Cleaning)
            .await
            .unwrap();
        assert_eq!(record.status, RecordStatus::Processing);
        assert_eq!(
            record.ledger.status_of(StepName::Cleaning),
            Some(StepStatus::Completed)
        );
        // The extraction error entry from the failed run is untouched
        assert_eq!(
            record.ledger.status_of(StepName::Extraction),
            Some(StepStatus::Error)
        );
    }

    #[tokio::test]
    async fn test_reused_entry_is_not_schedulable() {
        let fx = setup().await;
        let seq = sequencer(&fx, OkExtractor(sample_fields()));
        assert!(matches!(
            seq.retry_step(fx.record_id, fx.doctor_id, StepName::Reused)
                .await,
            Err(ApiError::Precondition(TransitionError::NotExecutable(_)))
        ));
    }

    #[tokio::test]
    async fn test_unknown_record_is_not_found() {
        let fx = setup().await;
        let seq = sequencer(&fx, OkExtractor(sample_fields()));
        assert!(matches!(
            seq.run_all(Uuid::new_v4(), fx.doctor_id).await,
            Err(ApiError::NotFound(_))
        ));
    }
}
