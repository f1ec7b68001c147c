//! LLM Provider implementations

pub mod anthropic;
pub mod gemini;
pub mod openai;
mod sse;

use crate::error::ProviderError;
use reqwest::Client;
use std::time::Duration;

/// Shared HTTP client construction
pub(crate) fn build_client(timeout: Duration) -> Result<Client, ProviderError> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| ProviderError::NotConfigured(format!("Failed to create HTTP client: {}", e)))
}

/// Map a transport error from reqwest
pub(crate) fn transport_error(e: reqwest::Error, timeout: Duration) -> ProviderError {
    if e.is_timeout() {
        ProviderError::Timeout(timeout.as_millis() as u64)
    } else {
        ProviderError::Network(e.to_string())
    }
}
