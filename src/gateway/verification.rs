//! Concept verification: one label in, a verdict with citations out

use super::reply::{excerpt, parse_object, reply_text};
use super::{require_label, GatewayError};
use crate::graph::{Source, VerificationResult, REPUTABLE_DOMAINS};
use crate::llm::{CompletionRequest, LanguageModel, Task};
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
struct RawVerdict {
    verified: bool,
    summary: String,
    #[serde(default)]
    suggestion: Option<String>,
    #[serde(default)]
    sources: Vec<RawSource>,
}

#[derive(Debug, Deserialize)]
struct RawSource {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    domain: Option<String>,
}

/// Host part of a URL, without scheme, port, path or a leading `www.`.
fn host_of(url: &str) -> Option<String> {
    let rest = url.split_once("://").map(|(_, r)| r).unwrap_or(url);
    let host = rest
        .split(['/', '?', '#'])
        .next()?
        .rsplit('@')
        .next()?
        .split(':')
        .next()?
        .trim_start_matches("www.")
        .to_lowercase();
    if host.is_empty() {
        None
    } else {
        Some(host)
    }
}

impl RawVerdict {
    fn into_result(self) -> VerificationResult {
        let sources = self
            .sources
            .into_iter()
            .filter_map(|raw| {
                let url = raw.url.filter(|u| !u.trim().is_empty())?;
                let domain = raw
                    .domain
                    .filter(|d| !d.trim().is_empty())
                    .or_else(|| host_of(&url))
                    .unwrap_or_default();
                Some(Source {
                    title: raw
                        .title
                        .filter(|t| !t.trim().is_empty())
                        .unwrap_or_else(|| domain.clone()),
                    url,
                    domain,
                })
            })
            .collect();

        VerificationResult {
            verified: self.verified,
            summary: self.summary,
            suggestion: self
                .suggestion
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty() && s != "null"),
            sources,
            checked_at: Some(chrono::Utc::now()),
        }
    }
}

/// Concept label → verdict, summary, optional correction and sources.
#[derive(Clone)]
pub struct VerificationGateway {
    model: Arc<dyn LanguageModel>,
    max_tokens: u32,
}

impl VerificationGateway {
    pub fn new(model: Arc<dyn LanguageModel>, max_tokens: u32) -> Self {
        Self { model, max_tokens }
    }

    fn prompt(concept: &str) -> String {
        format!(
            r#"As a medical expert, verify the accuracy of this medical concept: "{concept}"

Provide:
1. Whether this is accurate medical information (true/false)
2. A brief 2-3 sentence summary of the concept
3. A corrected version of the concept if one is needed
4. 2-3 reputable medical sources that discuss this concept, from domains such as: {domains}

Return a JSON object:
{{
  "verified": boolean,
  "summary": "explanation",
  "suggestion": "corrected version if needed, or null",
  "sources": [
    {{"title": "Source title", "url": "full URL", "domain": "domain name"}}
  ]
}}

Return ONLY the JSON object."#,
            domains = REPUTABLE_DOMAINS.join(", "),
        )
    }

    /// Verify a single concept label.
    pub async fn verify(&self, concept: &str) -> Result<VerificationResult, GatewayError> {
        let concept = require_label(concept)?;

        let request =
            CompletionRequest::new(Task::Verify, Self::prompt(concept), self.max_tokens);
        let completion = self.model.complete(&request).await?;
        let text = reply_text(&completion).ok_or_else(|| {
            GatewayError::MalformedResponse("no text response in reply".to_string())
        })?;

        let raw: RawVerdict = parse_object(text).map_err(|e| {
            tracing::warn!(concept, reply = excerpt(text), "unparsable verification reply");
            e
        })?;
        let result = raw.into_result();

        let unlisted = result.sources.iter().filter(|s| !s.is_reputable()).count();
        if unlisted > 0 {
            tracing::debug!(concept, unlisted, "verification cites domains outside the reputable list");
        }
        tracing::info!(concept, verified = result.verified, sources = result.sources.len(), "concept verified");
        Ok(result)
    }
}
