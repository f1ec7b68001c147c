//! # Response repair
//!
//! Turns raw model text into typed results.
//!
//! ```text
//! raw text ──► json_candidates ──► parse ──ok──────────────┐
//!                  ▲                 │ err                  ▼
//!                  │                 └► repair_json ► parse ► normalize files
//!                  │  next candidate              │ err
//!                  └──────────────────────────────┤
//!                                                 ▼ none left
//!                                          MalformedResponse
//! ```
//!
//! - [`extract`] - JSON location and the single repair pass
//! - [`normalize`] - file payload shapes

pub mod extract;
pub mod normalize;

use crate::error::{GenerationError, Result};
use crate::types::{GenerationResult, ValidationResult};
use serde_json::Value;
use tracing::{debug, warn};

pub use extract::{json_candidates, repair_json};
pub use normalize::{normalize_files, FilesPayload};

/// Message used when the model gives no explanation
pub const DEFAULT_MESSAGE: &str = "Code generated successfully";

/// Parses and repairs provider output
#[derive(Debug, Clone, Default)]
pub struct ResponseRepairer;

impl ResponseRepairer {
    pub fn new() -> Self {
        Self
    }

    /// Parse the JSON document in `raw`.
    ///
    /// Candidates are tried in order, each parsed as-is and then after at
    /// most one repair pass. The first candidate's error is reported when
    /// none of them parse.
    pub fn parse_json(&self, raw: &str) -> Result<Value> {
        let mut first_failure = None;

        for candidate in json_candidates(raw) {
            let parse_error = match serde_json::from_str::<Value>(candidate) {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };

            debug!(error = %parse_error, len = candidate.len(), "Candidate is not valid JSON, repairing");
            match serde_json::from_str::<Value>(&repair_json(candidate)) {
                Ok(value) => return Ok(value),
                Err(repaired_error) => {
                    first_failure.get_or_insert((parse_error, repaired_error));
                }
            }
        }

        let message = match first_failure {
            Some((parse_error, repaired_error)) => {
                warn!(
                    first_error = %parse_error,
                    repaired_error = %repaired_error,
                    "Response could not be repaired"
                );
                repaired_error.to_string()
            }
            None => "Response is empty".to_string(),
        };
        Err(GenerationError::MalformedResponse(message))
    }

    /// Parse a generation response into files, message and suggestions
    pub fn parse_generation(&self, raw: &str) -> Result<GenerationResult> {
        let document = self.parse_json(raw)?;

        let files = normalize_files(&document);
        if files.is_empty() {
            return Err(GenerationError::NoFilesProduced);
        }

        let message = ["explanation", "message"]
            .iter()
            .find_map(|field| document.get(*field).and_then(Value::as_str))
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or(DEFAULT_MESSAGE)
            .to_string();

        let suggestions = string_list(document.get("suggestions"));

        debug!(files = files.len(), suggestions = suggestions.len(), "Generation response parsed");
        Ok(GenerationResult {
            files,
            message,
            suggestions,
        })
    }

    /// Parse a validation response
    ///
    /// A missing validity flag is derived from whether any errors were
    /// reported.
    pub fn parse_validation(&self, raw: &str) -> Result<ValidationResult> {
        let document = self.parse_json(raw)?;
        if !document.is_object() {
            return Err(GenerationError::MalformedResponse(
                "Validation response is not a JSON object".to_string(),
            ));
        }

        let errors = string_list(document.get("errors"));
        let warnings = string_list(document.get("warnings"));
        let suggestions = string_list(document.get("suggestions"));
        let is_valid = ["is_valid", "isValid", "valid"]
            .iter()
            .find_map(|field| document.get(*field).and_then(Value::as_bool))
            .unwrap_or(errors.is_empty());

        Ok(ValidationResult {
            is_valid,
            errors,
            warnings,
            suggestions,
        })
    }
}

/// Strings from a JSON array; other items are rendered as compact JSON
fn string_list(value: Option<&Value>) -> Vec<String> {
    let Some(Value::Array(items)) = value else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| match item {
            Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
            Value::String(_) | Value::Null => None,
            other => Some(other.to_string()),
        })
        .collect()
}
