//! # genforge-provider
//!
//! LLM provider abstraction layer for GenForge.
//!
//! ## Features
//! - SSE streaming for incremental responses, cancellable by the caller
//! - Retry with exponential backoff and error classification
//! - Gemini, OpenAI, DeepSeek (OpenAI-compatible) and Anthropic backends
//! - JSON output hint passed through to backends that support it

pub mod client;
pub mod error;
pub mod gateway;
pub mod providers;
pub mod retry;
pub mod r#trait;

// Core traits and types
pub use client::{CallOptions, ContentEvent, ProviderClient, ProviderConfig};
pub use gateway::{Gateway, ProviderKind};
pub use r#trait::{
    CompletionRequest, FinishReason, ModelInfo, Provider, ProviderMetadata, ProviderResponse,
    StreamEvent, TokenUsage,
};

// Error and retry
pub use error::{GenerateError, ProviderError};
pub use retry::{with_retry, RetryClassification, RetryConfig, RetryFailure, RetryableError};

// Provider implementations
pub use providers::anthropic::AnthropicProvider;
pub use providers::gemini::GeminiProvider;
pub use providers::openai::OpenAiProvider;

// Cancellation handle used by the streaming APIs
pub use tokio_util::sync::CancellationToken;
