//! Configuration resolution for medscribe-cp
//!
//! Upload limits are compiled constants; AI provider settings resolve
//! through three tiers with Database → ENV → TOML priority, so an
//! operator can rotate a key without editing files.

use medscribe_common::{Error, Result};
use serde::Deserialize;
use sqlx::{Pool, Sqlite};
use std::path::Path;
use tracing::{info, warn};

/// Maximum accepted audio size after chunk reassembly (200 MB)
pub const MAX_AUDIO_BYTES: u64 = 200 * 1024 * 1024;

/// Maximum accepted recording duration (2.5 hours)
pub const MAX_DURATION_SECONDS: u32 = 9000;

/// AI provider connection settings
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Base URL of the AI provider API
    pub base_url: String,
    /// Bearer token for the provider
    pub api_key: String,
    /// Model used for speech-to-text
    pub transcription_model: String,
    /// Model used for transcript cleaning and extraction
    pub text_model: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: String::new(),
            transcription_model: "whisper-1".to_string(),
            text_model: "gpt-4o-mini".to_string(),
        }
    }
}

/// TOML config file contents (all keys optional)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlConfig {
    pub root_folder: Option<String>,
    pub provider_base_url: Option<String>,
    pub provider_api_key: Option<String>,
    pub transcription_model: Option<String>,
    pub text_model: Option<String>,
}

impl TomlConfig {
    /// Load the platform config file, returning defaults when absent
    pub fn load() -> Self {
        match medscribe_common::config::find_config_file() {
            Ok(path) => Self::load_from(&path).unwrap_or_default(),
            Err(_) => Self::default(),
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| Error::Config(format!("Invalid config file: {}", e)))
    }
}

fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}

/// Resolve the AI provider API key from 3-tier configuration
///
/// Priority: Database → ENV (`MEDSCRIBE_PROVIDER_API_KEY`) → TOML
pub async fn resolve_provider_api_key(
    db: &Pool<Sqlite>,
    toml_config: &TomlConfig,
) -> Result<Option<String>> {
    let db_key = crate::db::settings::get_setting(db, "cp_provider_api_key").await?;
    let env_key = std::env::var("MEDSCRIBE_PROVIDER_API_KEY").ok();
    let toml_key = toml_config.provider_api_key.clone();

    let sources: Vec<&str> = [
        db_key.as_deref().filter(|k| is_valid_key(k)).map(|_| "database"),
        env_key.as_deref().filter(|k| is_valid_key(k)).map(|_| "environment"),
        toml_key.as_deref().filter(|k| is_valid_key(k)).map(|_| "TOML"),
    ]
    .into_iter()
    .flatten()
    .collect();

    if sources.len() > 1 {
        warn!(
            "Provider API key found in multiple sources: {}. Using database (highest priority).",
            sources.join(", ")
        );
    }

    for (key, source) in [(db_key, "database"), (env_key, "environment"), (toml_key, "TOML")] {
        if let Some(key) = key {
            if is_valid_key(&key) {
                info!("Provider API key loaded from {}", source);
                return Ok(Some(key));
            }
        }
    }

    Ok(None)
}

/// Build the full provider configuration
///
/// Non-secret settings come from TOML/env with compiled defaults; a
/// missing API key is tolerated at startup (adapter calls will fail with
/// an adapter error until one is configured).
pub async fn resolve_provider_config(
    db: &Pool<Sqlite>,
    toml_config: &TomlConfig,
) -> Result<ProviderConfig> {
    let defaults = ProviderConfig::default();

    let api_key = resolve_provider_api_key(db, toml_config)
        .await?
        .unwrap_or_default();
    if api_key.is_empty() {
        warn!("No provider API key configured; AI steps will fail until one is set");
    }

    Ok(ProviderConfig {
        base_url: std::env::var("MEDSCRIBE_PROVIDER_BASE_URL")
            .ok()
            .or_else(|| toml_config.provider_base_url.clone())
            .unwrap_or(defaults.base_url),
        api_key,
        transcription_model: toml_config
            .transcription_model
            .clone()
            .unwrap_or(defaults.transcription_model),
        text_model: toml_config
            .text_model
            .clone()
            .unwrap_or(defaults.text_model),
    })
}
