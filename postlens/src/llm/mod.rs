use serde::{Deserialize, Serialize};

pub mod remote;

/// Core trait for LLM providers.
///
/// A single-shot, stateless request/response call. Implementations own their
/// transport concerns (auth, timeout); callers only see `ModelCallError`.
#[async_trait::async_trait]
pub trait LlmProvider: Send + Sync {
    /// Generate a completion for the given request
    async fn generate(&self, request: LlmRequest) -> Result<LlmResponse, ModelCallError>;

    /// Model identifier used when the response does not report one
    fn model(&self) -> &str;
}

/// Request structure for LLM generation
#[derive(Debug, Clone)]
pub struct LlmRequest {
    pub system_prompt: Option<String>,
    pub prompt: String,
    pub max_tokens: Option<usize>,
    pub temperature: Option<f32>,
    pub timeout_seconds: Option<u64>,
}

/// Response from LLM generation
#[derive(Debug, Clone)]
pub struct LlmResponse {
    pub content: String,
    pub usage: UsageMetadata,
    pub model: String,
}

/// Token usage metadata
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UsageMetadata {
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
    pub total_tokens: usize,
}

/// Failure talking to the external model
#[derive(Debug, thiserror::Error)]
pub enum ModelCallError {
    #[error("no LLM provider configured")]
    NotConfigured,
    #[error("LLM request timed out after {0}s")]
    Timeout(u64),
    #[error("LLM HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("LLM API error {status}: {body}")]
    Api { status: u16, body: String },
    #[error("invalid LLM response: {0}")]
    InvalidResponse(String),
}
