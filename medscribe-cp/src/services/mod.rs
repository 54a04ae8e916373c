//! Services for medscribe-cp
//!
//! AI provider clients (transcription, cleaning, extraction,
//! summarization) and the domain services that orchestrate them
//! (ingestion, step sequencer, finalizer, reuse).
//!
//! Adapters are side-effect-free calls: `(input, context) -> output`.
//! The sequencer owns all persistence; no adapter ever writes to
//! storage or the database.

pub mod chat;
pub mod cleaner;
pub mod extractor;
pub mod finalizer;
pub mod ingestion;
pub mod reuse;
pub mod sequencer;
pub mod summarizer;
pub mod transcriber;

pub use cleaner::CleaningClient;
pub use extractor::ExtractionClient;
pub use finalizer::Finalizer;
pub use ingestion::{IngestionService, UploadSource};
pub use reuse::ReuseService;
pub use sequencer::Sequencer;
pub use summarizer::SummaryClient;
pub use transcriber::SpeechClient;

use crate::models::{Consultation, ExtractedFields, HistorySummary, SummaryOutput};
use thiserror::Error;

/// External AI provider failure
///
/// Provider-specific failures (HTTP errors, malformed payloads, quota)
/// are mapped into this taxonomy at the client boundary.
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error {0}: {1}")]
    Api(u16, String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("No API key configured")]
    MissingApiKey,
}

/// Patient context handed to cleaning
#[derive(Debug, Clone, Default)]
pub struct CleaningContext {
    pub patient_name: Option<String>,
    pub patient_age: Option<u32>,
}

/// Patient context handed to extraction
///
/// Includes the rolling history window so recent consultations inform
/// the extraction (retries re-read the patient's current profile).
#[derive(Debug, Clone, Default)]
pub struct ExtractionContext {
    pub patient_name: Option<String>,
    pub patient_age: Option<u32>,
    pub history_window: Vec<HistorySummary>,
}

/// Speech-to-text adapter contract
pub trait Transcriber: Send + Sync {
    fn transcribe(
        &self,
        audio: &[u8],
        file_name: &str,
    ) -> impl std::future::Future<Output = Result<String, AdapterError>> + Send;
}

/// Transcript normalization adapter contract
pub trait Cleaner: Send + Sync {
    fn clean(
        &self,
        raw_text: &str,
        ctx: &CleaningContext,
    ) -> impl std::future::Future<Output = Result<String, AdapterError>> + Send;
}

/// Structured-field extraction adapter contract
///
/// The output must leave a field `None` when the text contains no
/// evidence for it; fabricated values are a correctness violation.
pub trait Extractor: Send + Sync {
    fn extract(
        &self,
        cleaned_text: &str,
        ctx: &ExtractionContext,
    ) -> impl std::future::Future<Output = Result<ExtractedFields, AdapterError>> + Send;
}

/// Consultation summarization adapter contract (best-effort, used only
/// by finalization)
pub trait Summarizer: Send + Sync {
    fn summarize(
        &self,
        record: &Consultation,
    ) -> impl std::future::Future<Output = Result<SummaryOutput, AdapterError>> + Send;
}
