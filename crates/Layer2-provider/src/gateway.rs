//! LLM Gateway - builds and routes to configured providers
//!
//! The Gateway owns every provider that has credentials and knows which one
//! is the default for generation.

use crate::{
    providers::{
        anthropic::{self, AnthropicProvider},
        gemini::{self, GeminiProvider},
        openai::{self, OpenAiProvider},
    },
    Provider,
};
use genforge_foundation::{Error, ProviderSettings, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info};

/// Supported backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Gemini,
    OpenAi,
    Anthropic,
    DeepSeek,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 4] = [
        ProviderKind::Gemini,
        ProviderKind::OpenAi,
        ProviderKind::Anthropic,
        ProviderKind::DeepSeek,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Gemini => "gemini",
            ProviderKind::OpenAi => "openai",
            ProviderKind::Anthropic => "anthropic",
            ProviderKind::DeepSeek => "deepseek",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            ProviderKind::Gemini => gemini::DEFAULT_MODEL,
            ProviderKind::OpenAi => openai::DEFAULT_MODEL,
            ProviderKind::Anthropic => anthropic::DEFAULT_MODEL,
            ProviderKind::DeepSeek => openai::DEEPSEEK_DEFAULT_MODEL,
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        ProviderKind::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| Error::Config(format!("Unknown LLM provider '{}'", s)))
    }
}

/// Gateway that manages multiple LLM providers
pub struct Gateway {
    providers: BTreeMap<ProviderKind, Arc<dyn Provider>>,
    default_provider: ProviderKind,
}

impl fmt::Debug for Gateway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Gateway")
            .field("providers", &self.providers.keys().collect::<Vec<_>>())
            .field("default_provider", &self.default_provider)
            .finish()
    }
}

impl Gateway {
    /// Build every provider that has a credential.
    ///
    /// The model and base URL overrides apply to the default provider only.
    pub fn from_settings(settings: &ProviderSettings) -> Result<Self> {
        let default_provider: ProviderKind = settings.default_provider.parse()?;
        let timeout = settings.timeout();
        let mut providers: BTreeMap<ProviderKind, Arc<dyn Provider>> = BTreeMap::new();

        for kind in ProviderKind::ALL {
            let Some(api_key) = settings.api_key_for(kind.as_str()) else {
                continue;
            };

            let is_default = kind == default_provider;
            let model = settings
                .model
                .as_deref()
                .filter(|_| is_default)
                .unwrap_or(kind.default_model());
            let base_url = settings.base_url.as_deref().filter(|_| is_default);

            let provider: Arc<dyn Provider> = match kind {
                ProviderKind::Gemini => {
                    let p = GeminiProvider::new(api_key, model, timeout).map_err(config_error)?;
                    Arc::new(match base_url {
                        Some(url) => p.with_base_url(url),
                        None => p,
                    })
                }
                ProviderKind::OpenAi => {
                    let p = OpenAiProvider::new(api_key, model, timeout).map_err(config_error)?;
                    Arc::new(match base_url {
                        Some(url) => p.with_base_url(url),
                        None => p,
                    })
                }
                ProviderKind::DeepSeek => {
                    let p =
                        OpenAiProvider::deepseek(api_key, model, timeout).map_err(config_error)?;
                    Arc::new(match base_url {
                        Some(url) => p.with_base_url(url),
                        None => p,
                    })
                }
                ProviderKind::Anthropic => {
                    let p =
                        AnthropicProvider::new(api_key, model, timeout).map_err(config_error)?;
                    Arc::new(match base_url {
                        Some(url) => p.with_base_url(url),
                        None => p,
                    })
                }
            };

            debug!(provider = %kind, model, "Provider configured");
            providers.insert(kind, provider);
        }

        if providers.is_empty() {
            return Err(Error::Config(
                "No LLM providers configured. Set GEMINI_API_KEY, OPENAI_API_KEY, ANTHROPIC_API_KEY or DEEPSEEK_API_KEY.".to_string(),
            ));
        }

        if !providers.contains_key(&default_provider) {
            return Err(Error::Config(format!(
                "Default provider '{}' has no API key",
                default_provider
            )));
        }

        info!(
            default = %default_provider,
            available = providers.len(),
            "Gateway ready"
        );

        Ok(Self {
            providers,
            default_provider,
        })
    }

    /// Gateway over a single, already-built provider
    pub fn with_provider(kind: ProviderKind, provider: Arc<dyn Provider>) -> Self {
        let mut providers: BTreeMap<ProviderKind, Arc<dyn Provider>> = BTreeMap::new();
        providers.insert(kind, provider);
        Self {
            providers,
            default_provider: kind,
        }
    }

    pub fn default_kind(&self) -> ProviderKind {
        self.default_provider
    }

    /// The provider used for generation
    pub fn default_provider(&self) -> Result<Arc<dyn Provider>> {
        self.get(self.default_provider)
    }

    pub fn get(&self, kind: ProviderKind) -> Result<Arc<dyn Provider>> {
        self.providers
            .get(&kind)
            .cloned()
            .ok_or_else(|| Error::Config(format!("Provider '{}' is not configured", kind)))
    }

    /// Providers with credentials, in a fixed order
    pub fn available_providers(&self) -> Vec<ProviderKind> {
        self.providers
            .iter()
            .filter(|(_, p)| p.is_configured())
            .map(|(kind, _)| *kind)
            .collect()
    }
}

fn config_error(e: crate::ProviderError) -> Error {
    Error::Config(e.to_string())
}
