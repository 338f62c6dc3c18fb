//! Reply handling shared by the gateways
//!
//! The service is asked for a bare JSON object but often wraps it in a
//! markdown code fence. The fence is stripped, then the text is parsed into
//! the gateway's wire type. Nothing is trusted until it has parsed.

use super::GatewayError;
use crate::llm::Completion;
use regex_lite::Regex;
use serde::de::DeserializeOwned;
use std::sync::OnceLock;

fn opening_fence() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^```[A-Za-z]*[ \t]*\r?\n?").expect("static regex"))
}

fn closing_fence() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\r?\n?```[ \t]*$").expect("static regex"))
}

/// Remove an optional ```` ```json ```` / ```` ``` ```` wrapper.
///
/// Unfenced text comes back trimmed and otherwise untouched.
pub fn strip_fences(text: &str) -> &str {
    let trimmed = text.trim();
    if !trimmed.starts_with("```") {
        return trimmed;
    }
    let start = opening_fence().find(trimmed).map(|m| m.end()).unwrap_or(0);
    let body = &trimmed[start..];
    let end = closing_fence()
        .find(body)
        .map(|m| m.start())
        .unwrap_or(body.len());
    body[..end].trim()
}

/// The reply's primary text block.
pub fn reply_text(completion: &Completion) -> Option<&str> {
    completion.first_text().filter(|t| !t.trim().is_empty())
}

/// Strip fences and parse into `T`.
///
/// Only JSON objects are accepted; arrays, scalars and syntax errors are
/// `MalformedResponse`.
pub fn parse_object<T: DeserializeOwned>(text: &str) -> Result<T, GatewayError> {
    let body = strip_fences(text);
    let value: serde_json::Value = serde_json::from_str(body)
        .map_err(|e| GatewayError::MalformedResponse(format!("invalid JSON: {}", e)))?;
    if !value.is_object() {
        return Err(GatewayError::MalformedResponse(
            "expected a JSON object".to_string(),
        ));
    }
    serde_json::from_value(value)
        .map_err(|e| GatewayError::MalformedResponse(format!("unexpected shape: {}", e)))
}

/// Shorten reply text for log lines.
pub(crate) fn excerpt(text: &str) -> &str {
    match text.char_indices().nth(200) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
