//! Caller-facing error taxonomy of the generation pipeline

use genforge_provider::GenerateError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, GenerationError>;

/// Why a generation or validation request failed
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GenerationError {
    // ========================================================================
    // Request
    // ========================================================================
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Unsupported framework: {0}")]
    UnsupportedFramework(String),

    // ========================================================================
    // Provider
    // ========================================================================
    /// All attempts failed, or a non-retryable provider error was hit
    #[error("{0}")]
    ProviderExhausted(GenerateError),

    #[error("Provider returned an empty response after {attempts} attempt(s)")]
    EmptyResponse { attempts: u32 },

    // ========================================================================
    // Response parsing
    // ========================================================================
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Response contained no files")]
    NoFilesProduced,

    // ========================================================================
    // Other
    // ========================================================================
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Generation cancelled")]
    Cancelled,
}

/// Coarse error class reported to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    InvalidInput,
    ProviderExhausted,
    EmptyResponse,
    MalformedResponse,
    NoFilesProduced,
    ConfigurationError,
    Cancelled,
}

/// Serialisable `{category, message}` error object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub category: ErrorCategory,
    pub message: String,
}

impl GenerationError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            GenerationError::InvalidInput(_) | GenerationError::UnsupportedFramework(_) => {
                ErrorCategory::InvalidInput
            }
            GenerationError::ProviderExhausted(_) => ErrorCategory::ProviderExhausted,
            GenerationError::EmptyResponse { .. } => ErrorCategory::EmptyResponse,
            GenerationError::MalformedResponse(_) => ErrorCategory::MalformedResponse,
            GenerationError::NoFilesProduced => ErrorCategory::NoFilesProduced,
            GenerationError::Configuration(_) => ErrorCategory::ConfigurationError,
            GenerationError::Cancelled => ErrorCategory::Cancelled,
        }
    }

    pub fn to_body(&self) -> ErrorBody {
        ErrorBody {
            category: self.category(),
            message: self.to_string(),
        }
    }

    /// Whether the caller may reasonably try the same request again
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            GenerationError::ProviderExhausted(_)
                | GenerationError::EmptyResponse { .. }
                | GenerationError::MalformedResponse(_)
                | GenerationError::NoFilesProduced
        )
    }
}

impl From<GenerateError> for GenerationError {
    fn from(e: GenerateError) -> Self {
        match e {
            GenerateError::InvalidInput(msg) => GenerationError::InvalidInput(msg),
            GenerateError::EmptyResponse { attempts } => GenerationError::EmptyResponse { attempts },
            GenerateError::Cancelled => GenerationError::Cancelled,
            exhausted @ GenerateError::Exhausted { .. } => {
                GenerationError::ProviderExhausted(exhausted)
            }
        }
    }
}

impl From<genforge_foundation::Error> for GenerationError {
    fn from(e: genforge_foundation::Error) -> Self {
        match e {
            genforge_foundation::Error::InvalidInput(msg) => GenerationError::InvalidInput(msg),
            other => GenerationError::Configuration(other.to_string()),
        }
    }
}
