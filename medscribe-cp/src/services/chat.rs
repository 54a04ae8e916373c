//! Chat-completion plumbing shared by the text adapters
//!
//! Cleaning, extraction, and summarization all run as one-shot
//! chat-completion calls against the configured provider.

use super::AdapterError;
use crate::config::ProviderConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat<'a>>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

/// Issue a single chat-completion request and return the reply text
///
/// `json_output` asks the provider for a JSON-object response (used by
/// extraction and summarization, whose replies are parsed structurally).
pub async fn chat_complete(
    http: &reqwest::Client,
    config: &ProviderConfig,
    system_prompt: &str,
    user_content: &str,
    json_output: bool,
) -> Result<String, AdapterError> {
    if config.api_key.is_empty() {
        return Err(AdapterError::MissingApiKey);
    }

    let request = ChatRequest {
        model: &config.text_model,
        messages: vec![
            ChatMessage {
                role: "system",
                content: system_prompt,
            },
            ChatMessage {
                role: "user",
                content: user_content,
            },
        ],
        temperature: 0.0,
        response_format: json_output.then_some(ResponseFormat { kind: "json_object" }),
    };

    let url = format!("{}/chat/completions", config.base_url.trim_end_matches('/'));
    let response = http
        .post(&url)
        .bearer_auth(&config.api_key)
        .json(&request)
        .send()
        .await
        .map_err(|e| AdapterError::Network(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(AdapterError::Api(status.as_u16(), body));
    }

    let parsed: ChatResponse = response
        .json()
        .await
        .map_err(|e| AdapterError::Parse(e.to_string()))?;

    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| AdapterError::Parse("Provider returned no completion".to_string()))
}
