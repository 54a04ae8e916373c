//! Structured-field extraction client
//!
//! Turns a cleaned transcript into the structured clinical fields. The
//! provider contract requires `null` for any field the transcript does
//! not evidence; those nulls deserialize to `None` and are preserved.

use super::{chat::chat_complete, AdapterError, ExtractionContext, Extractor};
use crate::config::ProviderConfig;
use crate::models::ExtractedFields;

const SYSTEM_PROMPT: &str = "You extract structured clinical data from a consultation \
transcript. Reply with a JSON object with exactly these keys: diagnosis, chief_complaint, \
history, physical_exam, plan, measurements, development_notes. Each value is a string or \
null. A field must be null unless the transcript explicitly supports it; never infer or \
invent clinical findings.";

#[derive(Debug, Clone)]
pub struct ExtractionClient {
    http: reqwest::Client,
    config: ProviderConfig,
}

impl ExtractionClient {
    pub fn new(http: reqwest::Client, config: ProviderConfig) -> Self {
        Self { http, config }
    }

    fn user_content(cleaned_text: &str, ctx: &ExtractionContext) -> String {
        let mut content = String::new();
        if let Some(name) = &ctx.patient_name {
            content.push_str(&format!("Patient name: {}\n", name));
        }
        if let Some(age) = ctx.patient_age {
            content.push_str(&format!("Patient age: {} years\n", age));
        }
        if !ctx.history_window.is_empty() {
            content.push_str("Recent consultations (newest first):\n");
            for summary in &ctx.history_window {
                content.push_str(&format!(
                    "- {}: {}; key points: {}\n",
                    summary.date.format("%Y-%m-%d"),
                    summary.diagnosis.as_deref().unwrap_or("no diagnosis recorded"),
                    summary.key_points.join("; "),
                ));
            }
        }
        content.push_str("Transcript:\n");
        content.push_str(cleaned_text);
        content
    }
}

impl Extractor for ExtractionClient {
    async fn extract(
        &self,
        cleaned_text: &str,
        ctx: &ExtractionContext,
    ) -> Result<ExtractedFields, AdapterError> {
        let content = Self::user_content(cleaned_text, ctx);
        let reply = chat_complete(&self.http, &self.config, SYSTEM_PROMPT, &content, true).await?;
        serde_json::from_str(&reply)
            .map_err(|e| AdapterError::Parse(format!("Invalid extraction payload: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::HistorySummary;
    use uuid::Uuid;

    #[test]
    fn test_user_content_carries_history_window() {
        let ctx = ExtractionContext {
            patient_name: None,
            patient_age: Some(4),
            history_window: vec![HistorySummary {
                source_record_id: Uuid::new_v4(),
                date: chrono::Utc::now(),
                diagnosis: Some("otitis media".to_string()),
                key_points: vec!["fever 38.5".to_string(), "amoxicillin started".to_string()],
                auto_generated: true,
                edited_by_doctor: false,
            }],
        };
        let content = ExtractionClient::user_content("text", &ctx);
        assert!(content.contains("otitis media"));
        assert!(content.contains("amoxicillin started"));
    }

    #[test]
    fn test_null_fields_deserialize_to_none() {
        let reply = r#"{"diagnosis":"viral pharyngitis","chief_complaint":"sore throat",
            "history":null,"physical_exam":null,"plan":"rest and fluids",
            "measurements":null,"development_notes":null}"#;
        let fields: ExtractedFields = serde_json::from_str(reply).unwrap();
        assert_eq!(fields.diagnosis.as_deref(), Some("viral pharyngitis"));
        assert!(fields.history.is_none());
        assert!(fields.measurements.is_none());
    }
}
