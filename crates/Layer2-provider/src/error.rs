//! Provider-specific error types
//!
//! `ProviderError` describes one failed call to a backend. `GenerateError`
//! is what [`crate::ProviderClient`] reports once its retry policy has run.

use crate::retry::{RetryClassification, RetryableError};
use thiserror::Error;

/// Errors that can occur during a single provider call
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    /// API key is missing or invalid
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Rate limit exceeded
    #[error("Rate limit exceeded{}", .retry_after_ms.map(|ms| format!(", retry after {}ms", ms)).unwrap_or_default())]
    RateLimited { retry_after_ms: Option<u64> },

    /// Quota or billing limit reached
    #[error("Quota exceeded: {0}")]
    QuotaExceeded(String),

    /// Invalid request (bad parameters, malformed body)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Server error (5xx)
    #[error("Server error: {0}")]
    ServerError(String),

    /// Network error (connection failed, DNS, etc.)
    #[error("Network error: {0}")]
    Network(String),

    /// The call did not finish within the configured timeout
    #[error("Request timed out after {0}ms")]
    Timeout(u64),

    /// Streaming error
    #[error("Stream error: {0}")]
    StreamError(String),

    /// Response body could not be understood
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// The backend answered with blank text
    #[error("Provider returned an empty response")]
    EmptyResponse,

    /// Provider not configured
    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    /// Unknown error
    #[error("Unknown error: {0}")]
    Unknown(String),
}

/// Message fragments that mark a failure as permanent regardless of variant
const NON_RETRYABLE_MARKERS: &[&str] = &[
    "api key",
    "api_key",
    "authentication",
    "unauthorized",
    "permission denied",
    "quota",
    "billing",
    "invalid request",
    "invalid argument",
    "malformed",
];

impl RetryableError for ProviderError {
    fn classify(&self) -> RetryClassification {
        match self {
            // Rate limited - retry after the hinted delay
            ProviderError::RateLimited { retry_after_ms } => RetryClassification::RateLimited {
                retry_after_ms: *retry_after_ms,
            },

            // Permanent by kind
            ProviderError::Authentication(_)
            | ProviderError::QuotaExceeded(_)
            | ProviderError::InvalidRequest(_)
            | ProviderError::NotConfigured(_) => RetryClassification::NoRetry,

            // Transient unless the message says otherwise
            _ if self.has_permanent_marker() => RetryClassification::NoRetry,
            _ => RetryClassification::Retry,
        }
    }
}

impl ProviderError {
    /// Create from HTTP status code and body
    pub fn from_http_status(status: u16, body: &str) -> Self {
        match status {
            401 | 403 => ProviderError::Authentication(body.to_string()),
            402 => ProviderError::QuotaExceeded(body.to_string()),
            408 => ProviderError::Network(format!("HTTP 408: {}", body)),
            429 => ProviderError::RateLimited {
                retry_after_ms: extract_retry_after(body),
            },
            400 | 404 | 422 => ProviderError::InvalidRequest(body.to_string()),
            500..=599 => ProviderError::ServerError(body.to_string()),
            _ => ProviderError::Unknown(format!("HTTP {}: {}", status, body)),
        }
    }

    /// Whether the retry policy will try again after this error
    pub fn is_retryable(&self) -> bool {
        self.classify() != RetryClassification::NoRetry
    }

    fn has_permanent_marker(&self) -> bool {
        let message = self.to_string().to_lowercase();
        NON_RETRYABLE_MARKERS
            .iter()
            .any(|marker| message.contains(marker))
    }
}

/// Try to extract retry-after value from error body (in milliseconds)
fn extract_retry_after(body: &str) -> Option<u64> {
    if let Ok(json) = serde_json::from_str::<serde_json::Value>(body) {
        if let Some(secs) = json
            .get("error")
            .and_then(|e| e.get("retry_after"))
            .and_then(|v| v.as_f64())
        {
            return Some((secs * 1000.0) as u64);
        }
    }

    if let Some(idx) = body.find("retry") {
        let num_str: String = body[idx..]
            .chars()
            .skip_while(|c| !c.is_ascii_digit())
            .take_while(|c| c.is_ascii_digit() || *c == '.')
            .collect();

        if let Ok(secs) = num_str.parse::<f64>() {
            return Some((secs * 1000.0) as u64);
        }
    }

    None
}

// ============================================================================
// Client-level errors
// ============================================================================

/// Final outcome of a failed [`crate::ProviderClient`] operation
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GenerateError {
    /// Prompt rejected before any call was made
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The last attempt returned blank text
    #[error("Provider returned an empty response after {attempts} attempt(s)")]
    EmptyResponse { attempts: u32 },

    /// Retries exhausted or a non-retryable error was hit
    #[error("Provider failed after {attempts} attempt(s): {source}")]
    Exhausted {
        attempts: u32,
        #[source]
        source: ProviderError,
    },

    /// The caller cancelled the operation
    #[error("Generation cancelled")]
    Cancelled,
}

impl GenerateError {
    /// Build the terminal error for a failed attempt loop
    pub fn from_last_attempt(attempts: u32, last: ProviderError) -> Self {
        match last {
            ProviderError::EmptyResponse => GenerateError::EmptyResponse { attempts },
            source => GenerateError::Exhausted { attempts, source },
        }
    }
}
