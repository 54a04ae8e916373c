//! Data models for medscribe-cp

pub mod consultation;
pub mod patient;

pub use consultation::{
    AudioRef, Consultation, ExtractedFields, HistorySummary, LedgerEntry, RecordStatus, StepLedger,
    StepName, StepStatus, SummaryOutput, HISTORY_WINDOW_CAP,
};
pub use patient::Patient;
