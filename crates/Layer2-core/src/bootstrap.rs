//! Composition root
//!
//! Every long-lived component is built here, once, and handed to the
//! orchestrator through the [`ServiceContainer`]. Nothing else in the crate
//! constructs shared services.
//!
//! ```text
//! settings ──► gateway ──► provider_client ──┐
//!    │                                       ├──► orchestrator
//!    ├──────► generation_cache ──────────────┤
//!    ├──────► validation_cache ──────────────┤
//!    └──────► prompt_builder ────────────────┤
//!             response_repairer ─────────────┘
//!             template_provider
//! ```

use crate::orchestrator::{GenerationOrchestrator, OrchestratorSettings};
use crate::prompt::PromptBuilder;
use crate::repair::ResponseRepairer;
use crate::template::{StaticTemplateProvider, TemplateProvider};
use crate::types::{GenerationResult, ValidationResult};
use genforge_foundation::{
    ApproxSize, CacheSettings, CacheStore, CacheStoreConfig, Lifetime, Result, ServiceContainer,
    Settings,
};
use genforge_provider::{Gateway, ProviderClient, ProviderConfig};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Container tokens
pub mod tokens {
    pub const SETTINGS: &str = "settings";
    pub const GATEWAY: &str = "gateway";
    pub const PROVIDER_CLIENT: &str = "provider_client";
    pub const GENERATION_CACHE: &str = "generation_cache";
    pub const VALIDATION_CACHE: &str = "validation_cache";
    pub const PROMPT_BUILDER: &str = "prompt_builder";
    pub const RESPONSE_REPAIRER: &str = "response_repairer";
    pub const TEMPLATE_PROVIDER: &str = "template_provider";
    pub const ORCHESTRATOR: &str = "orchestrator";
}

/// A cache store plus its background sweeper
#[derive(Debug)]
pub struct ManagedCache<V> {
    pub store: Arc<CacheStore<V>>,
    sweeper: Option<Arc<JoinHandle<()>>>,
}

impl<V> Clone for ManagedCache<V> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            sweeper: self.sweeper.clone(),
        }
    }
}

impl<V: Clone + ApproxSize + Send + Sync + 'static> ManagedCache<V> {
    /// Build a store from settings; the sweeper only starts inside a tokio
    /// runtime.
    pub fn from_settings(settings: &CacheSettings) -> Self {
        let store = Arc::new(CacheStore::with_config(CacheStoreConfig::with_limits(
            settings.max_entries,
            settings.max_bytes,
        )));

        let sweeper = match (
            settings.sweep_interval(),
            tokio::runtime::Handle::try_current(),
        ) {
            (Some(interval), Ok(_)) => Some(Arc::new(store.spawn_sweeper(interval))),
            _ => None,
        };

        Self { store, sweeper }
    }

    pub fn has_sweeper(&self) -> bool {
        self.sweeper.is_some()
    }

    pub fn stop(&self) {
        if let Some(sweeper) = &self.sweeper {
            sweeper.abort();
        }
    }
}

/// Register every service for `settings`.
///
/// Nothing is built until first resolve, so a missing credential only
/// surfaces when the gateway is needed. Re-register a token afterwards to
/// substitute a component.
pub fn register_services(container: &ServiceContainer, settings: Settings) {
    container.register_instance(tokens::SETTINGS, Arc::new(settings));

    container.register(tokens::GATEWAY, Lifetime::Singleton, |r| {
        let settings: Arc<Settings> = r.resolve(tokens::SETTINGS)?;
        Ok(Arc::new(Gateway::from_settings(&settings.provider)?))
    });

    container.register(tokens::PROVIDER_CLIENT, Lifetime::Singleton, |r| {
        let settings: Arc<Settings> = r.resolve(tokens::SETTINGS)?;
        let gateway: Arc<Gateway> = r.resolve(tokens::GATEWAY)?;
        let provider = gateway.default_provider()?;
        let config = ProviderConfig::from_settings(&settings.provider, provider.model().id.clone());
        debug!(provider = %gateway.default_kind(), model = %config.model, "Provider client built");
        Ok(Arc::new(ProviderClient::new(provider, config)))
    });

    container.register_with_teardown(
        tokens::GENERATION_CACHE,
        Lifetime::Singleton,
        |r| {
            let settings: Arc<Settings> = r.resolve(tokens::SETTINGS)?;
            Ok(ManagedCache::<GenerationResult>::from_settings(&settings.cache))
        },
        |cache: &ManagedCache<GenerationResult>| cache.stop(),
    );

    container.register_with_teardown(
        tokens::VALIDATION_CACHE,
        Lifetime::Singleton,
        |r| {
            let settings: Arc<Settings> = r.resolve(tokens::SETTINGS)?;
            Ok(ManagedCache::<ValidationResult>::from_settings(&settings.cache))
        },
        |cache: &ManagedCache<ValidationResult>| cache.stop(),
    );

    container.register(tokens::PROMPT_BUILDER, Lifetime::Singleton, |r| {
        let settings: Arc<Settings> = r.resolve(tokens::SETTINGS)?;
        Ok(Arc::new(
            PromptBuilder::new().with_max_chars(settings.provider.max_prompt_chars),
        ))
    });

    // Stateless, so a fresh one per consumer is fine
    container.register(tokens::RESPONSE_REPAIRER, Lifetime::Transient, |_| {
        Ok(Arc::new(ResponseRepairer::new()))
    });

    container.register(tokens::TEMPLATE_PROVIDER, Lifetime::Singleton, |_| {
        Ok(Arc::new(StaticTemplateProvider::new()) as Arc<dyn TemplateProvider>)
    });

    container.register(tokens::ORCHESTRATOR, Lifetime::Singleton, |r| {
        let settings: Arc<Settings> = r.resolve(tokens::SETTINGS)?;
        let gateway: Arc<Gateway> = r.resolve(tokens::GATEWAY)?;
        let client: Arc<ProviderClient> = r.resolve(tokens::PROVIDER_CLIENT)?;
        let generation: ManagedCache<GenerationResult> = r.resolve(tokens::GENERATION_CACHE)?;
        let validation: ManagedCache<ValidationResult> = r.resolve(tokens::VALIDATION_CACHE)?;
        let prompts: Arc<PromptBuilder> = r.resolve(tokens::PROMPT_BUILDER)?;
        let repairer: Arc<ResponseRepairer> = r.resolve(tokens::RESPONSE_REPAIRER)?;

        let available = gateway
            .available_providers()
            .into_iter()
            .map(|kind| kind.to_string())
            .collect();

        Ok(Arc::new(
            GenerationOrchestrator::new(
                client,
                generation.store,
                validation.store,
                OrchestratorSettings::from(&settings.generation),
            )
            .with_prompt_builder(prompts)
            .with_repairer(repairer)
            .with_available_providers(available),
        ))
    });

    info!(services = container.tokens().len(), "Services registered");
}

/// Container with every service registered for `settings`
pub fn build_container(settings: Settings) -> ServiceContainer {
    let container = ServiceContainer::new();
    register_services(&container, settings);
    container
}

/// Resolve the orchestrator, building its dependency graph on first use
pub fn orchestrator(container: &ServiceContainer) -> Result<Arc<GenerationOrchestrator>> {
    container.resolve(tokens::ORCHESTRATOR)
}

/// Resolve the template provider
pub fn template_provider(container: &ServiceContainer) -> Result<Arc<dyn TemplateProvider>> {
    container.resolve(tokens::TEMPLATE_PROVIDER)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Framework;
    use genforge_foundation::Error;

    fn settings_with_key() -> Settings {
        let mut settings = Settings::default();
        settings.provider.default_provider = "openai".to_string();
        settings.provider.openai_api_key = Some("test-key".to_string());
        settings
    }

    #[tokio::test]
    async fn test_orchestrator_resolves_as_singleton() {
        let container = build_container(settings_with_key());

        let a = orchestrator(&container).unwrap();
        let b = orchestrator(&container).unwrap();
        assert!(Arc::ptr_eq(&a, &b));

        let client: Arc<ProviderClient> = container.resolve(tokens::PROVIDER_CLIENT).unwrap();
        assert_eq!(client.provider_name(), "openai");
        assert_eq!(client.model(), "gpt-4o-mini");

        container.dispose();
    }

    #[tokio::test]
    async fn test_repairer_is_transient() {
        let container = build_container(settings_with_key());
        let a: Arc<ResponseRepairer> = container.resolve(tokens::RESPONSE_REPAIRER).unwrap();
        let b: Arc<ResponseRepairer> = container.resolve(tokens::RESPONSE_REPAIRER).unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
    }

    #[tokio::test]
    async fn test_missing_credentials_fail_on_resolve() {
        let container = build_container(Settings::default());

        let err = orchestrator(&container).unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        // Components without provider dependencies still resolve
        let templates = template_provider(&container).unwrap();
        assert!(!templates.scaffold(Framework::Vue).is_empty());
    }

    #[tokio::test]
    async fn test_dispose_stops_cache_sweepers() {
        let container = build_container(settings_with_key());
        let cache: ManagedCache<GenerationResult> =
            container.resolve(tokens::GENERATION_CACHE).unwrap();
        assert!(cache.has_sweeper());

        container.dispose();

        let sweeper = cache.sweeper.as_ref().unwrap();
        for _ in 0..10 {
            if sweeper.is_finished() {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert!(sweeper.is_finished());
        assert!(!container.is_registered(tokens::ORCHESTRATOR));
    }

    #[test]
    fn test_cache_outside_runtime_has_no_sweeper() {
        let cache = ManagedCache::<ValidationResult>::from_settings(&CacheSettings::default());
        assert!(!cache.has_sweeper());
    }
}
