//! Transcript cleaning client
//!
//! Normalizes the raw speech-to-text output: removes filler and
//! repetitions, fixes medical terminology misrecognitions, and keeps
//! the clinical content verbatim otherwise.

use super::{chat::chat_complete, AdapterError, Cleaner, CleaningContext};
use crate::config::ProviderConfig;

const SYSTEM_PROMPT: &str = "You clean up transcripts of recorded clinical consultations. \
Remove filler words, false starts, and repetitions. Correct obvious speech-to-text errors \
in medical terminology. Do not summarize, reorder, or invent content; keep everything the \
speakers actually said. Reply with the cleaned transcript only.";

#[derive(Debug, Clone)]
pub struct CleaningClient {
    http: reqwest::Client,
    config: ProviderConfig,
}

impl CleaningClient {
    pub fn new(http: reqwest::Client, config: ProviderConfig) -> Self {
        Self { http, config }
    }

    fn user_content(raw_text: &str, ctx: &CleaningContext) -> String {
        let mut content = String::new();
        if let Some(name) = &ctx.patient_name {
            content.push_str(&format!("Patient name: {}\n", name));
        }
        if let Some(age) = ctx.patient_age {
            content.push_str(&format!("Patient age: {} years\n", age));
        }
        content.push_str("Transcript:\n");
        content.push_str(raw_text);
        content
    }
}

impl Cleaner for CleaningClient {
    async fn clean(&self, raw_text: &str, ctx: &CleaningContext) -> Result<String, AdapterError> {
        let content = Self::user_content(raw_text, ctx);
        let cleaned =
            chat_complete(&self.http, &self.config, SYSTEM_PROMPT, &content, false).await?;
        if cleaned.trim().is_empty() {
            return Err(AdapterError::Parse(
                "Provider returned an empty cleaned transcript".to_string(),
            ));
        }
        Ok(cleaned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_content_includes_patient_context() {
        let ctx = CleaningContext {
            patient_name: Some("Ana".to_string()),
            patient_age: Some(6),
        };
        let content = CleaningClient::user_content("uh the the patient", &ctx);
        assert!(content.contains("Patient name: Ana"));
        assert!(content.contains("Patient age: 6 years"));
        assert!(content.ends_with("uh the the patient"));
    }
}
