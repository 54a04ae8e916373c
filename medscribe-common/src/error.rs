//! Error handling shared by the medscribe services
//!
//! Service crates wrap this in their own API error types; the variants
//! here cover the storage and configuration failures every service hits.

use thiserror::Error;

/// Shared result alias
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// SQLite query or connection failure
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Filesystem failure (blob store, config files)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Bad or missing configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Referenced row or blob does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Caller-supplied value rejected before any mutation
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Invariant violation inside the service, such as corrupt persisted
    /// JSON or an unparseable stored id
    #[error("Internal error: {0}")]
    Internal(String),
}
