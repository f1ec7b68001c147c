//! Cache keys for generation and validation requests

use crate::types::{GenerationRequest, ValidationRequest};
use genforge_foundation::Fingerprint;

/// Key for a generation request.
///
/// Built from the framework, the first `prompt_chars` characters of the
/// prompt, the history (role and content) and the sorted current-file
/// paths. File contents are not part of the key.
pub fn generation_key(request: &GenerationRequest, prompt_chars: usize) -> String {
    let prefix: String = request.prompt.trim().chars().take(prompt_chars).collect();

    let mut prompt = Fingerprint::new();
    prompt.push_str(&prefix);

    let mut history = Fingerprint::with_capacity(request.history.len() * 2);
    for message in &request.history {
        history.push_str(message.role.as_str()).push_str(&message.content);
    }

    // BTreeMap keys iterate sorted
    let mut paths = Fingerprint::with_capacity(request.current_files.len());
    for path in request.current_files.keys() {
        paths.push_str(path);
    }

    format!(
        "generate:{}:{}:{}:{}",
        request.framework,
        prompt.to_hex(),
        history.to_hex(),
        paths.to_hex()
    )
}

/// Key for a validation request: framework plus every path and content
pub fn validation_key(request: &ValidationRequest) -> String {
    let mut files = Fingerprint::with_capacity(request.files.len() * 2);
    for (path, content) in &request.files {
        files.push_str(path).push_str(content);
    }
    format!("validate:{}:{}", request.framework, files.to_hex())
}
