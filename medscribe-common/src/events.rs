//! Event types for the medscribe event system

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Medscribe event types
///
/// Events are broadcast on the [`EventBus`] and relayed to SSE clients so
/// a UI can follow a consultation through its processing steps without
/// polling.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum MedscribeEvent {
    /// A consultation record was created by audio ingestion
    ConsultationCreated {
        record_id: Uuid,
        patient_id: Uuid,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A processing step began executing
    StepStarted {
        record_id: Uuid,
        step: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A processing step finished successfully
    StepCompleted {
        record_id: Uuid,
        step: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A processing step failed
    StepFailed {
        record_id: Uuid,
        step: String,
        error: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// The full pipeline completed and the record holds extracted fields
    PipelineCompleted {
        record_id: Uuid,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// The pipeline stopped at a failing step
    PipelineFailed {
        record_id: Uuid,
        failed_step: String,
        error: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A consultation was finalized (with or without an auto summary)
    ConsultationFinalized {
        record_id: Uuid,
        patient_id: Uuid,
        summary_generated: bool,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A completed consultation was cloned via the reuse fast-path
    ConsultationReused {
        source_record_id: Uuid,
        new_record_id: Uuid,
        patient_id: Uuid,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl MedscribeEvent {
    /// Event name used as the SSE `event:` field
    pub fn event_name(&self) -> &'static str {
        match self {
            MedscribeEvent::ConsultationCreated { .. } => "ConsultationCreated",
            MedscribeEvent::StepStarted { .. } => "StepStarted",
            MedscribeEvent::StepCompleted { .. } => "StepCompleted",
            MedscribeEvent::StepFailed { .. } => "StepFailed",
            MedscribeEvent::PipelineCompleted { .. } => "PipelineCompleted",
            MedscribeEvent::PipelineFailed { .. } => "PipelineFailed",
            MedscribeEvent::ConsultationFinalized { .. } => "ConsultationFinalized",
            MedscribeEvent::ConsultationReused { .. } => "ConsultationReused",
        }
    }
}

/// Broadcast event bus shared by all handlers and background tasks
///
/// Wraps `tokio::sync::broadcast`, providing:
/// - Non-blocking publish (slow subscribers don't block producers)
/// - Multiple concurrent subscribers
/// - Automatic cleanup when subscribers drop
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<MedscribeEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with the given channel capacity
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<MedscribeEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists,
    /// `Err` if no subscriber is listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: MedscribeEvent,
    ) -> std::result::Result<usize, broadcast::error::SendError<MedscribeEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring whether anyone is listening
    ///
    /// Progress events are non-critical; it is acceptable for them to be
    /// dropped when no SSE client is connected.
    pub fn emit_lossy(&self, event: MedscribeEvent) {
        if self.tx.send(event).is_err() {
            tracing::trace!("Event emitted with no subscribers");
        }
    }

    /// Configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
