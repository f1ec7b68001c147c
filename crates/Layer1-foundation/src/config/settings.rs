//! GenForge settings
//!
//! Layered load: built-in defaults, global JSON, project JSON, then
//! environment variables. File layers are deep-merged as JSON so a partial
//! file only overrides the keys it names.

use crate::storage::JsonStore;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// Settings file name inside the global/project directories
pub const SETTINGS_FILE: &str = "config.json";

/// Provider ids with a known credential variable
pub const KNOWN_PROVIDERS: [&str; 4] = ["gemini", "openai", "anthropic", "deepseek"];

// ============================================================================
// Settings
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default)]
    pub provider: ProviderSettings,

    #[serde(default)]
    pub cache: CacheSettings,

    #[serde(default)]
    pub generation: GenerationSettings,
}

/// LLM backend selection, credentials and call policy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderSettings {
    /// Provider id (gemini, openai, anthropic, deepseek)
    #[serde(default = "default_provider")]
    pub default_provider: String,

    /// Model override; each provider has its own default
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Base URL override for OpenAI-compatible endpoints
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gemini_api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub openai_api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anthropic_api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deepseek_api_key: Option<String>,

    /// Per-attempt timeout
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Total attempts per generation call
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// First backoff delay; doubles per attempt
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,

    #[serde(default = "default_retry_max_delay_ms")]
    pub retry_max_delay_ms: u64,

    /// Prompts longer than this (in characters) are rejected before any call
    #[serde(default = "default_max_prompt_chars")]
    pub max_prompt_chars: usize,
}

/// Response cache sizing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheSettings {
    #[serde(default = "default_cache_max_entries")]
    pub max_entries: usize,

    /// Approximate byte budget (0 = unlimited)
    #[serde(default = "default_cache_max_bytes")]
    pub max_bytes: usize,

    /// Interval of the background expiry sweep (0 = disabled)
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

/// Orchestration policy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationSettings {
    #[serde(default = "default_generation_ttl_secs")]
    pub generation_ttl_secs: u64,

    #[serde(default = "default_validation_ttl_secs")]
    pub validation_ttl_secs: u64,

    /// Collapse concurrent identical cache misses into one provider call
    #[serde(default = "default_single_flight")]
    pub single_flight: bool,

    /// Number of prompt characters that participate in the cache key
    #[serde(default = "default_key_prompt_chars")]
    pub key_prompt_chars: usize,
}

fn default_provider() -> String {
    "gemini".to_string()
}
fn default_timeout_ms() -> u64 {
    60_000
}
fn default_max_retries() -> u32 {
    3
}
fn default_temperature() -> f32 {
    0.1
}
fn default_max_tokens() -> u32 {
    8192
}
fn default_retry_base_delay_ms() -> u64 {
    1000
}
fn default_retry_max_delay_ms() -> u64 {
    30_000
}
fn default_max_prompt_chars() -> usize {
    200_000
}
fn default_cache_max_entries() -> usize {
    500
}
fn default_cache_max_bytes() -> usize {
    64 * 1024 * 1024
} // 64MB
fn default_sweep_interval_secs() -> u64 {
    300
}
fn default_generation_ttl_secs() -> u64 {
    300
}
fn default_validation_ttl_secs() -> u64 {
    600
}
fn default_single_flight() -> bool {
    true
}
fn default_key_prompt_chars() -> usize {
    100
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            default_provider: default_provider(),
            model: None,
            base_url: None,
            gemini_api_key: None,
            openai_api_key: None,
            anthropic_api_key: None,
            deepseek_api_key: None,
            timeout_ms: default_timeout_ms(),
            max_retries: default_max_retries(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            retry_max_delay_ms: default_retry_max_delay_ms(),
            max_prompt_chars: default_max_prompt_chars(),
        }
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            max_entries: default_cache_max_entries(),
            max_bytes: default_cache_max_bytes(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            generation_ttl_secs: default_generation_ttl_secs(),
            validation_ttl_secs: default_validation_ttl_secs(),
            single_flight: default_single_flight(),
            key_prompt_chars: default_key_prompt_chars(),
        }
    }
}

impl ProviderSettings {
    /// Credential for a provider id, ignoring blank values
    pub fn api_key_for(&self, provider: &str) -> Option<&str> {
        let key = match provider {
            "gemini" => self.gemini_api_key.as_deref(),
            "openai" => self.openai_api_key.as_deref(),
            "anthropic" => self.anthropic_api_key.as_deref(),
            "deepseek" => self.deepseek_api_key.as_deref(),
            _ => None,
        };
        key.filter(|k| !k.trim().is_empty())
    }

    /// Providers that have a credential configured, in a fixed order
    pub fn configured_providers(&self) -> Vec<&'static str> {
        KNOWN_PROVIDERS
            .iter()
            .copied()
            .filter(|p| self.api_key_for(p).is_some())
            .collect()
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl CacheSettings {
    pub fn sweep_interval(&self) -> Option<Duration> {
        (self.sweep_interval_secs > 0).then(|| Duration::from_secs(self.sweep_interval_secs))
    }
}

impl GenerationSettings {
    pub fn generation_ttl(&self) -> Duration {
        Duration::from_secs(self.generation_ttl_secs)
    }

    pub fn validation_ttl(&self) -> Duration {
        Duration::from_secs(self.validation_ttl_secs)
    }
}

// ============================================================================
// Load / merge
// ============================================================================

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults, then global file, then project file, then environment
    pub fn load() -> Result<Self> {
        let mut layers = Vec::new();

        if let Ok(global) = JsonStore::global() {
            if let Some(value) = global.load_optional::<Value>(SETTINGS_FILE)? {
                debug!("Loaded global settings from {}", global.base_dir().display());
                layers.push(value);
            }
        }

        if let Ok(project) = JsonStore::current_project() {
            if let Some(value) = project.load_optional::<Value>(SETTINGS_FILE)? {
                debug!("Loaded project settings from {}", project.base_dir().display());
                layers.push(value);
            }
        }

        let mut settings = Self::from_layers(layers)?;
        settings.apply_env();
        Ok(settings)
    }

    /// Load settings from explicit JSON stores (no environment)
    pub fn load_from(stores: &[JsonStore]) -> Result<Self> {
        let mut layers = Vec::new();
        for store in stores {
            if let Some(value) = store.load_optional::<Value>(SETTINGS_FILE)? {
                layers.push(value);
            }
        }
        Self::from_layers(layers)
    }

    fn from_layers(layers: Vec<Value>) -> Result<Self> {
        let mut merged = serde_json::to_value(Self::default())?;
        for layer in layers {
            merge_json(&mut merged, layer);
        }
        serde_json::from_value(merged).map_err(|e| Error::Config(format!("Invalid settings: {}", e)))
    }

    /// Apply process environment overrides
    pub fn apply_env(&mut self) {
        self.apply_env_with(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary variable lookup
    pub fn apply_env_with<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = non_empty("GEMINI_API_KEY") {
            self.provider.gemini_api_key = Some(v);
        }
        if let Some(v) = non_empty("OPENAI_API_KEY") {
            self.provider.openai_api_key = Some(v);
        }
        if let Some(v) = non_empty("ANTHROPIC_API_KEY") {
            self.provider.anthropic_api_key = Some(v);
        }
        if let Some(v) = non_empty("DEEPSEEK_API_KEY") {
            self.provider.deepseek_api_key = Some(v);
        }
        if let Some(v) = non_empty("DEFAULT_LLM_PROVIDER") {
            self.provider.default_provider = v.trim().to_lowercase();
        }
        if let Some(v) = non_empty("GENFORGE_MODEL") {
            self.provider.model = Some(v);
        }
        if let Some(v) = non_empty("GENFORGE_TIMEOUT_MS").and_then(|v| v.parse().ok()) {
            self.provider.timeout_ms = v;
        }
        if let Some(v) = non_empty("GENFORGE_MAX_RETRIES").and_then(|v| v.parse().ok()) {
            self.provider.max_retries = v;
        }
        if let Some(v) = non_empty("GENFORGE_CACHE_MAX_ENTRIES").and_then(|v| v.parse().ok()) {
            self.cache.max_entries = v;
        }
        if let Some(v) = non_empty("GENFORGE_GENERATION_TTL_SECS").and_then(|v| v.parse().ok()) {
            self.generation.generation_ttl_secs = v;
        }
        if let Some(v) = non_empty("GENFORGE_VALIDATION_TTL_SECS").and_then(|v| v.parse().ok()) {
            self.generation.validation_ttl_secs = v;
        }
    }

    /// Startup validation: the selected provider must exist and have a credential
    pub fn validate(&self) -> Result<()> {
        let provider = self.provider.default_provider.as_str();
        if !KNOWN_PROVIDERS.contains(&provider) {
            return Err(Error::Config(format!(
                "Unknown provider '{}'. Expected one of: {}",
                provider,
                KNOWN_PROVIDERS.join(", ")
            )));
        }

        if self.provider.api_key_for(provider).is_none() {
            let configured = self.provider.configured_providers();
            return Err(Error::Config(if configured.is_empty() {
                "No LLM providers configured. Set GEMINI_API_KEY, OPENAI_API_KEY, ANTHROPIC_API_KEY or DEEPSEEK_API_KEY.".to_string()
            } else {
                format!(
                    "Provider '{}' has no API key. Configured providers: {}",
                    provider,
                    configured.join(", ")
                )
            }));
        }

        if self.provider.max_retries == 0 {
            return Err(Error::Config("maxRetries must be at least 1".to_string()));
        }
        if self.cache.max_entries == 0 {
            return Err(Error::Config("cache.maxEntries must be at least 1".to_string()));
        }

        Ok(())
    }
}

/// Recursively merge `overlay` into `base`; objects merge key by key,
/// everything else is replaced.
fn merge_json(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(&key) {
                    Some(existing) => merge_json(existing, value),
                    None => {
                        base_map.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.provider.default_provider, "gemini");
        assert_eq!(settings.provider.max_retries, 3);
        assert_eq!(settings.generation.generation_ttl_secs, 300);
        assert_eq!(settings.generation.validation_ttl_secs, 600);
        assert!(settings.generation.single_flight);
    }

    #[test]
    fn test_env_overrides() {
        let mut settings = Settings::default();
        settings.apply_env_with(env(&[
            ("OPENAI_API_KEY", "sk-test"),
            ("DEFAULT_LLM_PROVIDER", " OpenAI "),
            ("GENFORGE_MAX_RETRIES", "5"),
            ("GENFORGE_GENERATION_TTL_SECS", "not-a-number"),
        ]));

        assert_eq!(settings.provider.default_provider, "openai");
        assert_eq!(settings.provider.api_key_for("openai"), Some("sk-test"));
        assert_eq!(settings.provider.max_retries, 5);
        assert_eq!(settings.generation.generation_ttl_secs, 300);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_validate_missing_key_is_config_error() {
        let settings = Settings::default();
        let err = settings.validate().unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().contains("No LLM providers configured"));
    }

    #[test]
    fn test_validate_names_configured_alternatives() {
        let mut settings = Settings::default();
        settings.provider.anthropic_api_key = Some("key".into());
        let err = settings.validate().unwrap_err();
        assert!(err.to_string().contains("anthropic"));
    }

    #[test]
    fn test_blank_key_is_not_configured() {
        let mut settings = Settings::default();
        settings.provider.gemini_api_key = Some("   ".into());
        assert!(settings.provider.configured_providers().is_empty());
    }

    #[test]
    fn test_partial_file_layers_merge() {
        let global = tempfile::tempdir().unwrap();
        let project = tempfile::tempdir().unwrap();

        let global_store = JsonStore::new(global.path());
        global_store
            .save(
                SETTINGS_FILE,
                &serde_json::json!({
                    "provider": { "defaultProvider": "anthropic", "timeoutMs": 1000 },
                    "cache": { "maxEntries": 10 }
                }),
            )
            .unwrap();

        let project_store = JsonStore::new(project.path());
        project_store
            .save(
                SETTINGS_FILE,
                &serde_json::json!({ "provider": { "timeoutMs": 2500 } }),
            )
            .unwrap();

        let settings = Settings::load_from(&[global_store, project_store]).unwrap();
        assert_eq!(settings.provider.default_provider, "anthropic");
        assert_eq!(settings.provider.timeout_ms, 2500);
        assert_eq!(settings.cache.max_entries, 10);
        assert_eq!(settings.cache.sweep_interval_secs, 300);
    }

    #[test]
    fn test_invalid_layer_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::new(dir.path());
        store
            .save(SETTINGS_FILE, &serde_json::json!({ "provider": { "maxRetries": "many" } }))
            .unwrap();
        let err = Settings::load_from(&[store]).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
