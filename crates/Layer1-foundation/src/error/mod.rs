//! Error types for GenForge
//!
//! Foundation-level errors shared by every layer.

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// GenForge foundation error type
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration
    // ========================================================================
    #[error("Configuration error: {0}")]
    Config(String),

    // ========================================================================
    // Service container
    // ========================================================================
    #[error("Service not registered: {0}")]
    NotRegistered(String),

    #[error("Circular dependency detected: {}", .chain.join(" -> "))]
    CircularDependency { chain: Vec<String> },

    #[error("Service '{token}' is not of type {expected}")]
    ServiceType { token: String, expected: &'static str },

    // ========================================================================
    // Cache / storage
    // ========================================================================
    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Storage error: {0}")]
    Storage(String),

    // ========================================================================
    // General
    // ========================================================================
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Helper for container type mismatches
    pub fn service_type<T: ?Sized>(token: impl Into<String>) -> Self {
        Error::ServiceType {
            token: token.into(),
            expected: std::any::type_name::<T>(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_circular_dependency_message_names_chain() {
        let err = Error::CircularDependency {
            chain: vec!["a".into(), "b".into(), "a".into()],
        };
        assert_eq!(err.to_string(), "Circular dependency detected: a -> b -> a");
    }

    #[test]
    fn test_service_type_names_expected_type() {
        let err = Error::service_type::<String>("settings");
        assert!(err.to_string().contains("alloc::string::String"));
    }
}
