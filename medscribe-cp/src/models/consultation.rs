//! Consultation processing record and step ledger
//!
//! A consultation progresses through four ordered steps:
//! DOWNLOAD → TRANSCRIPTION → CLEANING → EXTRACTION
//!
//! The ledger records exactly one entry per step name (upsert-by-key),
//! so any step can be retried without duplicating history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Maximum number of prior-consultation summaries carried per record
pub const HISTORY_WINDOW_CAP: usize = 3;

/// Overall record status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RecordStatus {
    /// Pipeline not yet finished (or recovered from error via retry)
    Processing,
    /// All artifacts produced, or record closed by finalization/reuse
    Completed,
    /// A pipeline step failed; inspect the ledger for which one
    Error,
}

/// Fixed vocabulary of processing steps
///
/// `Reused` is the synthetic ledger entry seeded by the reuse fast-path;
/// it never executes as a pipeline step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepName {
    Download,
    Transcription,
    Cleaning,
    Extraction,
    Reused,
}

impl StepName {
    /// Stable string form, matching the serde representation
    pub fn as_str(&self) -> &'static str {
        match self {
            StepName::Download => "download",
            StepName::Transcription => "transcription",
            StepName::Cleaning => "cleaning",
            StepName::Extraction => "extraction",
            StepName::Reused => "reused",
        }
    }

    /// Pipeline steps in execution order (excludes the synthetic `reused`)
    pub fn pipeline_order() -> [StepName; 4] {
        [
            StepName::Download,
            StepName::Transcription,
            StepName::Cleaning,
            StepName::Extraction,
        ]
    }
}

impl std::str::FromStr for StepName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "download" => Ok(StepName::Download),
            "transcription" => Ok(StepName::Transcription),
            "cleaning" => Ok(StepName::Cleaning),
            "extraction" => Ok(StepName::Extraction),
            "reused" => Ok(StepName::Reused),
            other => Err(format!("Unknown step name: {}", other)),
        }
    }
}

impl std::fmt::Display for StepName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of a single ledger entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    InProgress,
    Completed,
    Error,
}

/// One ledger entry: a step name with its current status and timestamp
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub step: StepName,
    pub status: StepStatus,
    pub timestamp: DateTime<Utc>,
}

/// Ordered, upsert-by-name record of step statuses
///
/// Structural guarantee: no step name ever appears twice. Re-running a
/// step replaces its entry in place; a first run appends.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepLedger {
    entries: Vec<LedgerEntry>,
}

impl StepLedger {
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    /// Insert or replace the entry for `step`
    pub fn upsert(&mut self, step: StepName, status: StepStatus) {
        let entry = LedgerEntry {
            step,
            status,
            timestamp: Utc::now(),
        };
        match self.entries.iter_mut().find(|e| e.step == step) {
            Some(existing) => *existing = entry,
            None => self.entries.push(entry),
        }
    }

    /// Status of `step`, if it has an entry
    pub fn status_of(&self, step: StepName) -> Option<StepStatus> {
        self.entries
            .iter()
            .find(|e| e.step == step)
            .map(|e| e.status)
    }

    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// True when every pipeline step is marked completed
    pub fn all_pipeline_steps_completed(&self) -> bool {
        StepName::pipeline_order()
            .iter()
            .all(|s| self.status_of(*s) == Some(StepStatus::Completed))
    }
}

/// Reference to the uploaded audio asset in the blob store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioRef {
    /// Primary asset key
    pub audio_key: String,
    /// SHA-256 hex of the audio bytes (client-supplied hashes are trusted)
    pub content_hash: String,
    /// Recording length in seconds
    pub duration_seconds: u32,
    /// Total byte size after reassembly
    pub size_bytes: u64,
    /// Best-effort backup copy key, if the backup write succeeded
    pub backup_key: Option<String>,
}

/// Structured clinical fields extracted from the cleaned transcript
///
/// Every field is optional: the extractor must leave a field `None` when
/// the transcript contains no evidence for it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractedFields {
    pub diagnosis: Option<String>,
    pub chief_complaint: Option<String>,
    pub history: Option<String>,
    pub physical_exam: Option<String>,
    pub plan: Option<String>,
    pub measurements: Option<String>,
    pub development_notes: Option<String>,
}

impl ExtractedFields {
    /// True when at least one of chief complaint or diagnosis is present
    /// (the finalization precondition)
    pub fn has_finalization_anchor(&self) -> bool {
        self.chief_complaint.is_some() || self.diagnosis.is_some()
    }
}

/// Auto-generated summary of a finalized consultation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryOutput {
    pub diagnosis: Option<String>,
    pub key_points: Vec<String>,
}

/// One entry of the rolling history window
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistorySummary {
    pub source_record_id: Uuid,
    pub date: DateTime<Utc>,
    pub diagnosis: Option<String>,
    pub key_points: Vec<String>,
    pub auto_generated: bool,
    pub edited_by_doctor: bool,
}

/// The consultation processing record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Consultation {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub patient_id: Uuid,
    pub consultation_type: String,

    pub status: RecordStatus,
    pub audio: AudioRef,

    /// Raw speech-to-text output
    pub raw_transcript: Option<String>,
    /// Normalized transcript (filler removal, medical-term correction)
    pub cleaned_transcript: Option<String>,
    /// Structured fields, possibly edited by the doctor afterwards
    pub fields: Option<ExtractedFields>,
    /// Immutable snapshot of the first successful extraction output
    pub original_ai_version: Option<ExtractedFields>,

    pub ledger: StepLedger,
    /// Last recorded failure message
    pub processing_error: Option<String>,

    /// Rolling window of prior-consultation summaries, newest first, ≤3
    pub history_window: Vec<HistorySummary>,

    /// Source record id when created via the reuse fast-path
    pub reused_from: Option<Uuid>,

    /// Optimistic-concurrency token; every persisted write compare-and-sets
    pub version: i64,

    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Consultation {
    /// New record created by audio ingestion
    ///
    /// Status starts at PROCESSING with the download step already
    /// completed (the asset write is the download step's work).
    pub fn new_processing(
        doctor_id: Uuid,
        patient_id: Uuid,
        consultation_type: String,
        audio: AudioRef,
    ) -> Self {
        let mut ledger = StepLedger::new();
        ledger.upsert(StepName::Download, StepStatus::Completed);

        Self {
            id: Uuid::new_v4(),
            doctor_id,
            patient_id,
            consultation_type,
            status: RecordStatus::Processing,
            audio,
            raw_transcript: None,
            cleaned_transcript: None,
            fields: None,
            original_ai_version: None,
            ledger,
            processing_error: None,
            history_window: Vec::new(),
            reused_from: None,
            version: 0,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    /// New record cloned from a completed source via the reuse fast-path
    ///
    /// Artifacts and the audio reference are copied; the audio bytes are
    /// shared, never duplicated. The ledger holds the single synthetic
    /// `reused` entry.
    pub fn new_reused(source: &Consultation, target_patient_id: Uuid) -> Self {
        let mut ledger = StepLedger::new();
        ledger.upsert(StepName::Reused, StepStatus::Completed);

        Self {
            id: Uuid::new_v4(),
            doctor_id: source.doctor_id,
            patient_id: target_patient_id,
            consultation_type: source.consultation_type.clone(),
            status: RecordStatus::Completed,
            audio: source.audio.clone(),
            raw_transcript: source.raw_transcript.clone(),
            cleaned_transcript: source.cleaned_transcript.clone(),
            fields: source.fields.clone(),
            original_ai_version: source.original_ai_version.clone(),
            ledger,
            processing_error: None,
            history_window: Vec::new(),
            reused_from: Some(source.id),
            version: 0,
            created_at: Utc::now(),
            completed_at: Some(Utc::now()),
        }
    }

    /// Push a summary onto a history window, keeping it bounded and
    /// newest-first
    pub fn bounded_window(
        new_entry: HistorySummary,
        older: impl IntoIterator<Item = HistorySummary>,
    ) -> Vec<HistorySummary> {
        let mut window = vec![new_entry];
        window.extend(older);
        window.sort_by(|a, b| b.date.cmp(&a.date));
        window.truncate(HISTORY_WINDOW_CAP);
        window
    }
}
