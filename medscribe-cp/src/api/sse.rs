//! Server-Sent Events (SSE) for pipeline progress streaming

use axum::{
    extract::State,
    response::sse::{Event, Sse},
};
use futures::stream::Stream;
use std::convert::Infallible;

use crate::AppState;
use medscribe_common::sse::event_bus_sse_stream;

/// GET /events - SSE stream of consultation lifecycle events
///
/// Streams events:
/// - ConsultationCreated
/// - StepStarted / StepCompleted / StepFailed
/// - PipelineCompleted / PipelineFailed
/// - ConsultationFinalized
/// - ConsultationReused
pub async fn event_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    event_bus_sse_stream("medscribe-cp", &state.event_bus)
}
