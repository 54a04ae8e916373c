//! medscribe-cp - Consultation Processing Service
//!
//! Turns recorded clinical encounters into structured clinical data via
//! a retryable pipeline of external AI calls, and serves the results to
//! the medscribe UI over HTTP REST + SSE.

use anyhow::Result;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use medscribe_common::events::EventBus;
use medscribe_cp::storage::FsBlobStore;
use medscribe_cp::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting medscribe-cp (Consultation Processing) service");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    // Resolve and prepare the root folder (database + blob store)
    let root_folder = medscribe_common::config::resolve_root_folder(None, "MEDSCRIBE_ROOT_FOLDER")?;
    medscribe_common::config::ensure_root_folder(&root_folder)?;

    let db_path = medscribe_common::config::database_path(&root_folder);
    info!("Database: {}", db_path.display());

    let db_pool = medscribe_cp::db::init_database_pool(&db_path).await?;
    info!("Database connection established");

    // Provider settings: Database -> ENV -> TOML
    let toml_config = medscribe_cp::config::TomlConfig::load();
    let provider = medscribe_cp::config::resolve_provider_config(&db_pool, &toml_config).await?;
    info!("Provider endpoint: {}", provider.base_url);

    // Event bus for SSE broadcasting
    let event_bus = EventBus::new(100);

    let blob = FsBlobStore::new(&root_folder);

    let state = AppState::new(db_pool, event_bus, blob, provider);
    let app = medscribe_cp::build_router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:6142").await?;
    info!("Listening on http://127.0.0.1:6142");
    info!("Health check: http://127.0.0.1:6142/health");

    axum::serve(listener, app).await?;

    Ok(())
}
