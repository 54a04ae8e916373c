//! Processing state machine
//!
//! Centralizes every status and ledger transition rule so all mutation
//! paths (pipeline run, single-step retry, finalization, reuse) validate
//! the same way instead of re-implementing the rules per handler.

use crate::models::{Consultation, RecordStatus, StepName};
use std::future::Future;

/// Violation of a state-machine rule
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    /// Record status transition not permitted
    #[error("Invalid status transition: {from:?} -> {to:?}")]
    InvalidStatus { from: RecordStatus, to: RecordStatus },

    /// A step was requested before its prerequisite artifact exists;
    /// `run_first` names the step that must complete first
    #[error("Step '{step}' requires the '{run_first}' step to complete first")]
    MissingPrerequisite { step: StepName, run_first: StepName },

    /// The synthetic `reused` step can never be executed
    #[error("Step '{0}' is not executable")]
    NotExecutable(StepName),
}

/// Whether a step sits on the required path or is best-effort
///
/// Required-step failure halts the pipeline and marks the record ERROR;
/// optional work is logged and never affects the required path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepClass {
    Required,
    Optional,
}

/// Classification of the executable pipeline steps
pub fn classify(step: StepName) -> StepClass {
    match step {
        StepName::Download
        | StepName::Transcription
        | StepName::Cleaning
        | StepName::Extraction => StepClass::Required,
        // Synthetic entry, never scheduled
        StepName::Reused => StepClass::Optional,
    }
}

/// Validate a record status transition
///
/// PROCESSING and ERROR move freely between the three states (retries
/// recover ERROR records; a terminal extraction completes them).
/// COMPLETED only re-opens to PROCESSING via an explicit step retry.
pub fn check_status_transition(
    from: RecordStatus,
    to: RecordStatus,
) -> Result<(), TransitionError> {
    let allowed = match (from, to) {
        (RecordStatus::Processing, _) => true,
        (RecordStatus::Error, _) => true,
        (RecordStatus::Completed, RecordStatus::Processing) => true,
        (RecordStatus::Completed, RecordStatus::Completed) => true,
        (RecordStatus::Completed, RecordStatus::Error) => false,
    };
    if allowed {
        Ok(())
    } else {
        Err(TransitionError::InvalidStatus { from, to })
    }
}

/// Validate that `step` may execute against the record's current artifacts
///
/// Cleaning requires the raw transcript; extraction requires the cleaned
/// transcript. The error names the step to run first so the caller can
/// surface an actionable message.
pub fn check_step_preconditions(
    record: &Consultation,
    step: StepName,
) -> Result<(), TransitionError> {
    match step {
        StepName::Download | StepName::Transcription => Ok(()),
        StepName::Cleaning => {
            if record.raw_transcript.is_some() {
                Ok(())
            } else {
                Err(TransitionError::MissingPrerequisite {
                    step,
                    run_first: StepName::Transcription,
                })
            }
        }
        StepName::Extraction => {
            if record.cleaned_transcript.is_some() {
                Ok(())
            } else {
                Err(TransitionError::MissingPrerequisite {
                    step,
                    run_first: StepName::Cleaning,
                })
            }
        }
        StepName::Reused => Err(TransitionError::NotExecutable(step)),
    }
}

/// Run optional side work, converting failure into a warning
///
/// The optional-vs-required distinction is structural: callers cannot
/// accidentally put best-effort work on the required path, because this
/// helper swallows the error by construction.
pub async fn run_best_effort<T, E, F>(what: &str, fut: F) -> Option<T>
where
    E: std::fmt::Display,
    F: Future<Output = Result<T, E>>,
{
    match fut.await {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(task = what, error = %e, "Best-effort task failed, continuing");
            None
        }
    }
}
