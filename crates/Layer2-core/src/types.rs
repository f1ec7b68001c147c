//! Request and result types shared by the generation pipeline
//!
//! Field names serialise in camelCase so the JSON matches what the editor
//! front end sends and expects back.

use crate::error::GenerationError;
use genforge_foundation::{serialized_size, ApproxSize};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Generated or existing project files, keyed by path
pub type FileMap = BTreeMap<String, String>;

// ============================================================================
// Framework
// ============================================================================

/// Target framework of a generation request
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Framework {
    React,
    Vue,
    Svelte,
    Angular,
    Nodejs,
}

impl Framework {
    pub const ALL: [Framework; 5] = [
        Framework::React,
        Framework::Vue,
        Framework::Svelte,
        Framework::Angular,
        Framework::Nodejs,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Framework::React => "react",
            Framework::Vue => "vue",
            Framework::Svelte => "svelte",
            Framework::Angular => "angular",
            Framework::Nodejs => "nodejs",
        }
    }
}

impl fmt::Display for Framework {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Framework {
    type Err = GenerationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Framework::ALL
            .into_iter()
            .find(|f| f.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| GenerationError::UnsupportedFramework(wanted.to_string()))
    }
}

// ============================================================================
// Conversation history
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

impl ChatRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
        }
    }
}

/// One turn of the conversation that led to a request
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

// ============================================================================
// Generation
// ============================================================================

/// A code generation request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    pub prompt: String,
    pub framework: Framework,
    #[serde(default)]
    pub history: Vec<ChatMessage>,
    #[serde(default)]
    pub current_files: FileMap,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>, framework: Framework) -> Self {
        Self {
            prompt: prompt.into(),
            framework,
            history: Vec::new(),
            current_files: FileMap::new(),
        }
    }

    pub fn with_history(mut self, history: Vec<ChatMessage>) -> Self {
        self.history = history;
        self
    }

    pub fn with_files(mut self, files: FileMap) -> Self {
        self.current_files = files;
        self
    }

    /// Reject requests that can never produce a useful prompt
    pub fn validate(&self) -> Result<(), GenerationError> {
        if self.prompt.trim().is_empty() {
            return Err(GenerationError::InvalidInput(
                "Prompt must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Generated project files plus the model's explanation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationResult {
    pub files: FileMap,
    pub message: String,
    #[serde(default)]
    pub suggestions: Vec<String>,
}

impl ApproxSize for GenerationResult {
    fn approx_size(&self) -> usize {
        serialized_size(self)
    }
}

// ============================================================================
// Validation
// ============================================================================

/// A code review request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationRequest {
    pub files: FileMap,
    pub framework: Framework,
}

impl ValidationRequest {
    pub fn new(files: FileMap, framework: Framework) -> Self {
        Self { files, framework }
    }

    pub fn validate(&self) -> Result<(), GenerationError> {
        if self.files.is_empty() {
            return Err(GenerationError::InvalidInput(
                "No files to validate".to_string(),
            ));
        }
        Ok(())
    }
}

/// Review outcome returned by the model
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub is_valid: bool,
    #[serde(default)]
    pub errors: Vec<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
    #[serde(default)]
    pub suggestions: Vec<String>,
}

impl ApproxSize for ValidationResult {
    fn approx_size(&self) -> usize {
        serialized_size(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_framework_parse() {
        assert_eq!("React".parse::<Framework>().unwrap(), Framework::React);
        assert_eq!(" nodejs ".parse::<Framework>().unwrap(), Framework::Nodejs);

        let err = "ember".parse::<Framework>().unwrap_err();
        assert!(matches!(err, GenerationError::UnsupportedFramework(ref f) if f == "ember"));
    }

    #[test]
    fn test_request_deserializes_camel_case() {
        let request: GenerationRequest = serde_json::from_str(
            r#"{
                "prompt": "Create a hello world page",
                "framework": "react",
                "history": [{"role": "user", "content": "hi"}],
                "currentFiles": {"src/App.tsx": "export {}"}
            }"#,
        )
        .unwrap();

        assert_eq!(request.framework, Framework::React);
        assert_eq!(request.history, vec![ChatMessage::user("hi")]);
        assert_eq!(request.current_files.len(), 1);
    }

    #[test]
    fn test_request_optional_fields_default() {
        let request: GenerationRequest =
            serde_json::from_str(r#"{"prompt": "x", "framework": "vue"}"#).unwrap();
        assert!(request.history.is_empty());
        assert!(request.current_files.is_empty());
    }

    #[test]
    fn test_request_validation() {
        assert!(GenerationRequest::new("  ", Framework::React).validate().is_err());
        assert!(GenerationRequest::new("todo app", Framework::React)
            .validate()
            .is_ok());
        assert!(ValidationRequest::new(FileMap::new(), Framework::Vue)
            .validate()
            .is_err());
    }

    #[test]
    fn test_validation_result_serializes_camel_case() {
        let result = ValidationResult {
            is_valid: true,
            ..Default::default()
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["isValid"], true);
    }
}
