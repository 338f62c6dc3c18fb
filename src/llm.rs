//! Language-model client: the boundary with the external text-generation service
//!
//! Defines the client trait and the request/reply types the gateways use.
//! Two implementations:
//! - `AnthropicModel`: posts to the Messages HTTP API (production)
//! - `MockModel`: returns preconfigured replies per task (testing)
//!
//! The service enforces no schema. Replies are text blocks that the gateways
//! validate before anything reaches the graph.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;

/// Which gateway is asking.
///
/// Carried on every request so mocks can answer per task and logs can tell
/// the round trips apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Task {
    Extract,
    Verify,
    Regenerate,
}

impl std::fmt::Display for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Extract => write!(f, "extract"),
            Self::Verify => write!(f, "verify"),
            Self::Regenerate => write!(f, "regenerate"),
        }
    }
}

/// A single-instruction request.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub task: Task,
    /// The natural-language instruction plus its context
    pub prompt: String,
    pub max_tokens: u32,
}

impl CompletionRequest {
    pub fn new(task: Task, prompt: impl Into<String>, max_tokens: u32) -> Self {
        Self {
            task,
            prompt: prompt.into(),
            max_tokens,
        }
    }
}

/// A block of the reply's content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text { text: String },
    #[serde(other)]
    Other,
}

/// The service's reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Completion {
    pub content: Vec<ContentBlock>,
}

impl Completion {
    /// A reply consisting of one text block.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ContentBlock::Text { text: text.into() }],
        }
    }

    /// The primary content: the first text block, if any.
    pub fn first_text(&self) -> Option<&str> {
        self.content.iter().find_map(|block| match block {
            ContentBlock::Text { text } => Some(text.as_str()),
            ContentBlock::Other => None,
        })
    }
}

/// Errors from language-model calls.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("language model not available: {0}")]
    Unavailable(String),
    #[error("request failed: {0}")]
    Request(String),
    #[error("service returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("reply decode error: {0}")]
    Decode(String),
}

/// Client trait for the text-generation service.
///
/// Abstracts over transport (HTTP, mock) so gateways don't depend on how the
/// service is reached.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Send one request and wait for the whole reply.
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, LlmError>;
}

/// Connection settings for [`AnthropicModel`].
#[derive(Debug, Clone)]
pub struct AnthropicSettings {
    pub api_base: String,
    pub api_key: Option<String>,
    pub model: String,
    pub api_version: String,
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: [Message<'a>; 1],
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

/// Messages API client.
pub struct AnthropicModel {
    http: reqwest::Client,
    settings: AnthropicSettings,
}

impl AnthropicModel {
    pub fn new(settings: AnthropicSettings) -> Self {
        Self {
            http: reqwest::Client::new(),
            settings,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/messages", self.settings.api_base.trim_end_matches('/'))
    }
}

#[async_trait]
impl LanguageModel for AnthropicModel {
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, LlmError> {
        let api_key = self
            .settings
            .api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| LlmError::Unavailable("ANTHROPIC_API_KEY is not set".to_string()))?;

        let body = MessagesRequest {
            model: &self.settings.model,
            max_tokens: request.max_tokens,
            messages: [Message {
                role: "user",
                content: &request.prompt,
            }],
        };

        tracing::debug!(
            task = %request.task,
            prompt_len = request.prompt.len(),
            "sending completion request"
        );

        let response = self
            .http
            .post(self.endpoint())
            .header("x-api-key", api_key)
            .header("anthropic-version", &self.settings.api_version)
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let completion = response
            .json::<Completion>()
            .await
            .map_err(|e| LlmError::Decode(e.to_string()))?;
        tracing::debug!(task = %request.task, blocks = completion.content.len(), "completion received");
        Ok(completion)
    }
}

/// Mock model for testing: returns preconfigured replies.
pub struct MockModel {
    replies: HashMap<Task, Result<Completion, String>>,
    prompts: Mutex<Vec<(Task, String)>>,
}

impl MockModel {
    pub fn new() -> Self {
        Self {
            replies: HashMap::new(),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Register a text reply for a task.
    pub fn with_reply(self, task: Task, text: impl Into<String>) -> Self {
        self.with_completion(task, Completion::text(text))
    }

    /// Register a full reply for a task.
    pub fn with_completion(mut self, task: Task, completion: Completion) -> Self {
        self.replies.insert(task, Ok(completion));
        self
    }

    /// Register a failure for a task.
    pub fn with_failure(mut self, task: Task, message: impl Into<String>) -> Self {
        self.replies.insert(task, Err(message.into()));
        self
    }

    /// Number of requests received for a task.
    pub fn calls(&self, task: Task) -> usize {
        self.prompts
            .lock()
            .map(|p| p.iter().filter(|(t, _)| *t == task).count())
            .unwrap_or(0)
    }

    /// Prompts received for a task, in order.
    pub fn prompts(&self, task: Task) -> Vec<String> {
        self.prompts
            .lock()
            .map(|p| {
                p.iter()
                    .filter(|(t, _)| *t == task)
                    .map(|(_, prompt)| prompt.clone())
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl Default for MockModel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LanguageModel for MockModel {
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, LlmError> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push((request.task, request.prompt.clone()));
        }
        match self.replies.get(&request.task) {
            Some(Ok(completion)) => Ok(completion.clone()),
            Some(Err(message)) => Err(LlmError::Request(format!(
                "mock failure for task '{}': {}",
                request.task, message
            ))),
            None => Err(LlmError::Unavailable(format!(
                "no mock reply for task '{}'",
                request.task
            ))),
        }
    }
}
