//! Speech-to-text client

use super::{AdapterError, Transcriber};
use crate::config::ProviderConfig;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    text: String,
}

/// Speech-to-text over the provider's audio transcription endpoint
#[derive(Debug, Clone)]
pub struct SpeechClient {
    http: reqwest::Client,
    config: ProviderConfig,
}

impl SpeechClient {
    pub fn new(http: reqwest::Client, config: ProviderConfig) -> Self {
        Self { http, config }
    }
}

impl Transcriber for SpeechClient {
    async fn transcribe(&self, audio: &[u8], file_name: &str) -> Result<String, AdapterError> {
        if self.config.api_key.is_empty() {
            return Err(AdapterError::MissingApiKey);
        }

        let part = reqwest::multipart::Part::bytes(audio.to_vec()).file_name(file_name.to_string());
        let form = reqwest::multipart::Form::new()
            .text("model", self.config.transcription_model.clone())
            .part("file", part);

        let url = format!(
            "{}/audio/transcriptions",
            self.config.base_url.trim_end_matches('/')
        );
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| AdapterError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AdapterError::Api(status.as_u16(), body));
        }

        let parsed: TranscriptionResponse = response
            .json()
            .await
            .map_err(|e| AdapterError::Parse(e.to_string()))?;

        if parsed.text.trim().is_empty() {
            return Err(AdapterError::Parse(
                "Provider returned an empty transcript".to_string(),
            ));
        }

        Ok(parsed.text)
    }
}
