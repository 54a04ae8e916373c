//! medscribe-cp - Consultation Processing Service
//!
//! Ingests recorded clinical encounters (audio), converts them into
//! structured clinical data through a chain of external AI calls, and
//! persists enough intermediate state that any step can fail and later
//! be retried without redoing completed work or re-uploading the audio.
//!
//! Integrates with the medscribe UI via HTTP REST + SSE.

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod fsm;
pub mod models;
pub mod services;
pub mod storage;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::config::ProviderConfig;
use crate::services::{
    CleaningClient, ExtractionClient, Finalizer, IngestionService, ReuseService, Sequencer,
    SpeechClient, SummaryClient,
};
use crate::storage::FsBlobStore;
use medscribe_common::events::EventBus;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Event bus for SSE broadcasting
    pub event_bus: EventBus,
    /// Blob store for audio assets, chunk staging, and backups
    pub blob: FsBlobStore,
    /// AI provider settings
    pub provider: ProviderConfig,
    /// Shared HTTP client for provider calls
    pub http: reqwest::Client,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(
        db: SqlitePool,
        event_bus: EventBus,
        blob: FsBlobStore,
        provider: ProviderConfig,
    ) -> Self {
        Self {
            db,
            event_bus,
            blob,
            provider,
            http: reqwest::Client::new(),
            startup_time: Utc::now(),
        }
    }

    /// Ingestion service over this state
    pub fn ingestion(&self) -> IngestionService {
        IngestionService::new(self.db.clone(), self.blob.clone(), self.event_bus.clone())
    }

    /// Step sequencer wired to the production provider clients
    pub fn sequencer(&self) -> Sequencer<SpeechClient, CleaningClient, ExtractionClient> {
        Sequencer::new(
            self.db.clone(),
            self.blob.clone(),
            self.event_bus.clone(),
            SpeechClient::new(self.http.clone(), self.provider.clone()),
            CleaningClient::new(self.http.clone(), self.provider.clone()),
            ExtractionClient::new(self.http.clone(), self.provider.clone()),
        )
    }

    /// Finalizer wired to the production summary client
    pub fn finalizer(&self) -> Finalizer<SummaryClient> {
        Finalizer::new(
            self.db.clone(),
            self.event_bus.clone(),
            SummaryClient::new(self.http.clone(), self.provider.clone()),
        )
    }

    /// Reuse fast-path service
    pub fn reuse_service(&self) -> ReuseService {
        ReuseService::new(self.db.clone(), self.event_bus.clone())
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::get;

    Router::new()
        .merge(api::upload_routes())
        .merge(api::pipeline_routes())
        .merge(api::finalize_routes())
        .merge(api::reuse_routes())
        .merge(api::consultation_routes())
        .route("/events", get(api::event_stream))
        .merge(api::health_routes())
        .with_state(state)
}
