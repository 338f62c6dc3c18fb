//! Gateways to the language-model service
//!
//! Each gateway makes one round trip per call: build a single instruction,
//! send it, strip the optional code fence from the textual reply, and validate
//! the shape before returning typed data. No retries.

pub mod extraction;
pub mod regeneration;
pub mod reply;
pub mod verification;

use crate::llm::{LanguageModel, LlmError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub use extraction::ExtractionGateway;
pub use regeneration::RegenerationGateway;
pub use verification::VerificationGateway;

/// Errors from gateway calls.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("upstream call failed: {0}")]
    UpstreamCallFailed(#[from] LlmError),
    #[error("extraction failed: {0}")]
    ExtractionFailed(String),
    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

impl GatewayError {
    /// Stable machine-readable code for the HTTP boundary.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "input_missing",
            Self::UpstreamCallFailed(_) => "upstream_call_failed",
            Self::ExtractionFailed(_) => "extraction_failed",
            Self::MalformedResponse(_) => "malformed_response",
        }
    }
}

/// Max-token budget per gateway
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenBudgets {
    pub extraction: u32,
    pub verification: u32,
    pub regeneration: u32,
}

impl Default for TokenBudgets {
    fn default() -> Self {
        Self {
            extraction: 4096,
            verification: 2048,
            regeneration: 1024,
        }
    }
}

/// The three gateways, sharing one model client.
#[derive(Clone)]
pub struct Gateways {
    pub extraction: ExtractionGateway,
    pub verification: VerificationGateway,
    pub regeneration: RegenerationGateway,
}

impl Gateways {
    pub fn new(model: Arc<dyn LanguageModel>, budgets: TokenBudgets) -> Self {
        Self {
            extraction: ExtractionGateway::new(model.clone(), budgets.extraction),
            verification: VerificationGateway::new(model.clone(), budgets.verification),
            regeneration: RegenerationGateway::new(model, budgets.regeneration),
        }
    }
}

/// Reject empty or whitespace-only concept labels.
pub(crate) fn require_label(label: &str) -> Result<&str, GatewayError> {
    let trimmed = label.trim();
    if trimmed.is_empty() {
        return Err(GatewayError::InvalidInput("No concept provided".to_string()));
    }
    Ok(trimmed)
}
