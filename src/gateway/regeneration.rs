//! Concept regeneration: ask for a better label for one concept
//!
//! Applying the suggestion (relabel, then verify the new label) is the
//! caller's workflow; see `session::EditorSession::regenerate_node`.

use super::reply::{excerpt, parse_object, reply_text};
use super::{require_label, GatewayError};
use crate::llm::{CompletionRequest, LanguageModel, Task};
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
struct RawSuggestion {
    #[serde(default)]
    suggestion: Option<String>,
}

/// Concept label → improved label, or `None` when the service declines.
#[derive(Clone)]
pub struct RegenerationGateway {
    model: Arc<dyn LanguageModel>,
    max_tokens: u32,
}

impl RegenerationGateway {
    pub fn new(model: Arc<dyn LanguageModel>, max_tokens: u32) -> Self {
        Self { model, max_tokens }
    }

    fn prompt(concept: &str) -> String {
        format!(
            r#"Given this medical concept: "{concept}"

Provide an improved, medically accurate version of this concept. Make it:
- Precise, using proper medical terminology
- Clear and concise (2-5 words)
- Accurate according to current medical knowledge

Return a JSON object:
{{
  "suggestion": "improved concept name"
}}

Return ONLY the JSON object."#
        )
    }

    /// Request a replacement label.
    ///
    /// An absent or blank suggestion is reported as `None`. A suggestion equal
    /// to the input is still returned so the caller re-verifies it.
    pub async fn regenerate(&self, concept: &str) -> Result<Option<String>, GatewayError> {
        let concept = require_label(concept)?;

        let request =
            CompletionRequest::new(Task::Regenerate, Self::prompt(concept), self.max_tokens);
        let completion = self.model.complete(&request).await?;
        let text = reply_text(&completion).ok_or_else(|| {
            GatewayError::MalformedResponse("no text response in reply".to_string())
        })?;

        let raw: RawSuggestion = parse_object(text).map_err(|e| {
            tracing::warn!(concept, reply = excerpt(text), "unparsable regeneration reply");
            e
        })?;

        let suggestion = raw
            .suggestion
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        match &suggestion {
            Some(s) => tracing::info!(concept, suggestion = %s, "concept regenerated"),
            None => tracing::info!(concept, "service declined to suggest a new label"),
        }
        Ok(suggestion)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockModel;

    fn gateway(reply: &str) -> RegenerationGateway {
        RegenerationGateway::new(
            Arc::new(MockModel::new().with_reply(Task::Regenerate, reply)),
            1024,
        )
    }

    #[tokio::test]
    async fn returns_suggestion() {
        let gw = gateway("```json\n{\"suggestion\": \"Acute MI\"}\n```");
        assert_eq!(gw.regenerate("heart attack").await.unwrap().as_deref(), Some("Acute MI"));
    }

    #[tokio::test]
    async fn blank_or_missing_suggestion_is_declined() {
        assert_eq!(gateway(r#"{"suggestion": "  "}"#).regenerate("x").await.unwrap(), None);
        assert_eq!(gateway(r#"{"suggestion": null}"#).regenerate("x").await.unwrap(), None);
        assert_eq!(gateway(r#"{}"#).regenerate("x").await.unwrap(), None);
    }

    #[tokio::test]
    async fn unchanged_suggestion_is_returned() {
        let gw = gateway(r#"{"suggestion": "Angina Pectoris"}"#);
        assert_eq!(
            gw.regenerate("Angina Pectoris").await.unwrap().as_deref(),
            Some("Angina Pectoris")
        );
    }

    #[tokio::test]
    async fn prose_reply_is_malformed() {
        let gw = gateway("I think a better name would be Acute MI.");
        let err = gw.regenerate("heart attack").await.unwrap_err();
        assert!(matches!(err, GatewayError::MalformedResponse(_)));
    }
}
