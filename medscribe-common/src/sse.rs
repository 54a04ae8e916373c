//! Server-Sent Events (SSE) utilities
//!
//! Bridges the [`EventBus`](crate::events::EventBus) to an axum SSE
//! response with heartbeat keep-alive.

use crate::events::EventBus;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use std::convert::Infallible;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Create an SSE stream that relays every event published on the bus
///
/// Each event is serialized as JSON with its variant name as the SSE
/// `event:` field. Lagged subscribers skip missed events and continue.
pub fn event_bus_sse_stream(
    service_name: &'static str,
    event_bus: &EventBus,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    info!("New SSE client connected to {} events", service_name);
    let mut rx = event_bus.subscribe();

    let stream = async_stream::stream! {
        // Initial connected status so clients can show link state
        yield Ok(Event::default()
            .event("ConnectionStatus")
            .data("connected"));

        loop {
            match rx.recv().await {
                Ok(event) => {
                    let name = event.event_name();
                    match serde_json::to_string(&event) {
                        Ok(json) => {
                            debug!(event = name, "SSE: relaying event");
                            yield Ok(Event::default().event(name).data(json));
                        }
                        Err(e) => {
                            warn!(event = name, error = %e, "SSE: failed to serialize event");
                        }
                    }
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "SSE: subscriber lagged, events dropped");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => {
                    info!("SSE: event bus closed, ending stream");
                    break;
                }
            }
        }
    };

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("heartbeat"),
    )
}
