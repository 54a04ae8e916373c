//! # Medscribe Common Library
//!
//! Shared code for the medscribe services including:
//! - Error types (Error enum, Result alias)
//! - Event types (MedscribeEvent enum) and the EventBus
//! - Configuration loading and root folder resolution
//! - SSE utilities

pub mod config;
pub mod error;
pub mod events;
pub mod sse;

pub use error::{Error, Result};
