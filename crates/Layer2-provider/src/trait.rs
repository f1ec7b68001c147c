//! Provider trait and common types

use crate::error::ProviderError;
use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::pin::Pin;

/// Events emitted during streaming
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// Text content delta
    Text(String),

    /// Token usage update
    Usage(TokenUsage),

    /// Stream completed
    Done,

    /// Error occurred
    Error(ProviderError),
}

/// Token usage reported by a backend
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

/// Model information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    /// Model ID (e.g., "gemini-2.5-flash")
    pub id: String,

    /// Provider name (e.g., "gemini")
    pub provider: String,

    /// Display name
    pub display_name: String,

    /// Context window size (tokens)
    pub context_window: u32,

    /// Max output tokens
    pub max_output_tokens: u32,
}

impl ModelInfo {
    /// Create a basic model info
    pub fn new(id: impl Into<String>, provider: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            display_name: id.clone(),
            id,
            provider: provider.into(),
            context_window: 128000,
            max_output_tokens: 8192,
        }
    }

    pub(crate) fn named(
        id: &str,
        provider: &str,
        display_name: &str,
        context_window: u32,
        max_output_tokens: u32,
    ) -> Self {
        Self {
            id: id.to_string(),
            provider: provider.to_string(),
            display_name: display_name.to_string(),
            context_window,
            max_output_tokens,
        }
    }
}

/// Provider metadata
#[derive(Debug, Clone)]
pub struct ProviderMetadata {
    /// Provider ID (e.g., "anthropic")
    pub id: String,

    /// Display name (e.g., "Anthropic")
    pub display_name: String,

    /// Known models
    pub models: Vec<ModelInfo>,

    /// Default model ID
    pub default_model: String,

    /// Environment variable holding the API key
    pub api_key_env: &'static str,

    /// Endpoint base URL
    pub base_url: String,
}

/// One text-generation call
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    /// Fully rendered prompt
    pub prompt: String,

    pub temperature: f32,

    pub max_tokens: u32,

    /// Ask the backend for JSON output when it supports a native switch
    pub structured_output: bool,
}

impl CompletionRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            temperature: 0.1,
            max_tokens: 8192,
            structured_output: false,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_structured_output(mut self, structured: bool) -> Self {
        self.structured_output = structured;
        self
    }
}

/// LLM Provider trait
///
/// Implement this trait to add support for a new LLM backend.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Get provider metadata
    fn metadata(&self) -> &ProviderMetadata;

    /// Get current model information
    fn model(&self) -> &ModelInfo;

    /// Send a prompt and get a streaming response
    fn stream(
        &self,
        request: CompletionRequest,
    ) -> Pin<Box<dyn Stream<Item = StreamEvent> + Send + '_>>;

    /// Send a prompt and get a complete response (non-streaming)
    async fn complete(&self, request: CompletionRequest)
        -> Result<ProviderResponse, ProviderError>;

    /// Whether credentials are present; makes no network call
    fn is_configured(&self) -> bool;
}

/// Complete response from provider (for non-streaming)
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderResponse {
    /// Text content
    pub content: String,

    /// Token usage
    pub usage: TokenUsage,

    /// Finish reason
    pub finish_reason: FinishReason,

    /// Model used
    pub model: String,
}

impl ProviderResponse {
    /// A plain text response, used by in-process providers
    pub fn text(content: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            usage: TokenUsage::default(),
            finish_reason: FinishReason::Stop,
            model: model.into(),
        }
    }
}

/// Reason for completion finishing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FinishReason {
    /// Completed naturally
    Stop,

    /// Hit max tokens limit
    MaxTokens,

    /// Content filtered
    ContentFilter,

    /// Unknown/other
    #[default]
    Other,
}
