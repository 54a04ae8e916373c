//! Consultation summarization client
//!
//! Produces the `{diagnosis, key_points[]}` summary used by
//! finalization for the rolling history window. Best-effort by
//! classification: callers run it through the optional-step path.

use super::{chat::chat_complete, AdapterError, Summarizer};
use crate::config::ProviderConfig;
use crate::models::{Consultation, SummaryOutput};

const SYSTEM_PROMPT: &str = "You summarize a structured clinical consultation record. \
Reply with a JSON object: {\"diagnosis\": string or null, \"key_points\": array of short \
strings}. Key points are the facts a doctor needs at the next visit (findings, treatment, \
follow-up). Use only information present in the record.";

#[derive(Debug, Clone)]
pub struct SummaryClient {
    http: reqwest::Client,
    config: ProviderConfig,
}

impl SummaryClient {
    pub fn new(http: reqwest::Client, config: ProviderConfig) -> Self {
        Self { http, config }
    }

    fn user_content(record: &Consultation) -> String {
        let fields = record.fields.clone().unwrap_or_default();
        let mut content = String::new();
        let mut push_field = |label: &str, value: &Option<String>| {
            if let Some(value) = value {
                content.push_str(&format!("{}: {}\n", label, value));
            }
        };
        push_field("Chief complaint", &fields.chief_complaint);
        push_field("Diagnosis", &fields.diagnosis);
        push_field("History", &fields.history);
        push_field("Physical exam", &fields.physical_exam);
        push_field("Plan", &fields.plan);
        push_field("Measurements", &fields.measurements);
        push_field("Development notes", &fields.development_notes);
        content
    }
}

impl Summarizer for SummaryClient {
    async fn summarize(&self, record: &Consultation) -> Result<SummaryOutput, AdapterError> {
        let content = Self::user_content(record);
        let reply = chat_complete(&self.http, &self.config, SYSTEM_PROMPT, &content, true).await?;
        serde_json::from_str(&reply)
            .map_err(|e| AdapterError::Parse(format!("Invalid summary payload: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AudioRef, ExtractedFields};
    use uuid::Uuid;

    #[test]
    fn test_user_content_skips_absent_fields() {
        let mut record = Consultation::new_processing(
            Uuid::new_v4(),
            Uuid::new_v4(),
            "general".into(),
            AudioRef {
                audio_key: "audio/x".into(),
                content_hash: "00".into(),
                duration_seconds: 1,
                size_bytes: 1,
                backup_key: None,
            },
        );
        record.fields = Some(ExtractedFields {
            diagnosis: Some("bronchiolitis".to_string()),
            chief_complaint: None,
            ..Default::default()
        });

        let content = SummaryClient::user_content(&record);
        assert!(content.contains("Diagnosis: bronchiolitis"));
        assert!(!content.contains("Chief complaint"));
    }
}
