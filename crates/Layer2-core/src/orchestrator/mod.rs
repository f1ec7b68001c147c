//! # Generation orchestrator
//!
//! Top-level entry point of the pipeline.
//!
//! ```text
//! request ──► cache ──hit──────────────────────────────────────► result
//!               │ miss
//!               ▼
//!         [single-flight] ► PromptBuilder ► ProviderClient ► ResponseRepairer
//!                                                                  │
//!                                                        cache write ► result
//! ```
//!
//! Cache failures degrade to a miss. Streaming results are never cached.
//!
//! - [`key`] - cache keys
//! - [`flight`] - in-flight de-duplication
//! - [`narration`] - narration filter for streaming

pub mod flight;
pub mod key;
pub mod narration;

use crate::error::{GenerationError, Result};
use crate::prompt::PromptBuilder;
use crate::repair::ResponseRepairer;
use crate::types::{GenerationRequest, GenerationResult, ValidationRequest, ValidationResult};
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use futures::StreamExt;
use genforge_foundation::{CacheStats, GenerationSettings, ResponseCache};
use genforge_provider::{CallOptions, CancellationToken, ContentEvent, ProviderClient};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

pub use flight::SingleFlight;
pub use key::{generation_key, validation_key};
pub use narration::NarrationFilter;

// ============================================================================
// Settings
// ============================================================================

/// Orchestrator policy
#[derive(Debug, Clone, PartialEq)]
pub struct OrchestratorSettings {
    pub generation_ttl: Duration,
    pub validation_ttl: Duration,
    /// Share one provider call between concurrent identical misses
    pub single_flight: bool,
    /// Prompt characters that take part in the cache key
    pub key_prompt_chars: usize,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self::from(&GenerationSettings::default())
    }
}

impl From<&GenerationSettings> for OrchestratorSettings {
    fn from(settings: &GenerationSettings) -> Self {
        Self {
            generation_ttl: settings.generation_ttl(),
            validation_ttl: settings.validation_ttl(),
            single_flight: settings.single_flight,
            key_prompt_chars: settings.key_prompt_chars,
        }
    }
}

// ============================================================================
// Events and reports
// ============================================================================

/// Items produced by [`GenerationOrchestrator::generate_code_stream`]
#[derive(Debug, Clone, PartialEq)]
pub enum GenerationEvent {
    /// Human-readable text streamed by the model
    Narration(String),
    /// Final parsed result; always the last event on success
    Completed(GenerationResult),
    /// Terminal failure
    Failed(GenerationError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
}

#[derive(Debug, Clone, Serialize)]
pub struct CacheHealth {
    pub generation: CacheStats,
    pub validation: CacheStats,
}

/// Snapshot returned by [`GenerationOrchestrator::health`]
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub status: HealthStatus,
    pub provider: String,
    pub model: String,
    pub available_providers: Vec<String>,
    pub provider_reachable: bool,
    pub cache: CacheHealth,
    pub checked_at: DateTime<Utc>,
}

// ============================================================================
// Orchestrator
// ============================================================================

pub type GenerationCache = Arc<dyn ResponseCache<GenerationResult>>;
pub type ValidationCache = Arc<dyn ResponseCache<ValidationResult>>;

/// Runs generation and validation requests end to end
pub struct GenerationOrchestrator {
    client: Arc<ProviderClient>,
    prompts: Arc<PromptBuilder>,
    repairer: Arc<ResponseRepairer>,
    generation_cache: GenerationCache,
    validation_cache: ValidationCache,
    settings: OrchestratorSettings,
    available_providers: Vec<String>,
    generation_flights: SingleFlight<Result<GenerationResult>>,
    validation_flights: SingleFlight<Result<ValidationResult>>,
}

impl std::fmt::Debug for GenerationOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationOrchestrator")
            .field("client", &self.client)
            .field("generation_cache", &self.generation_cache.backend_name())
            .field("settings", &self.settings)
            .finish()
    }
}

impl GenerationOrchestrator {
    pub fn new(
        client: Arc<ProviderClient>,
        generation_cache: GenerationCache,
        validation_cache: ValidationCache,
        settings: OrchestratorSettings,
    ) -> Self {
        let available_providers = vec![client.provider_name().to_string()];
        Self {
            client,
            prompts: Arc::new(PromptBuilder::new()),
            repairer: Arc::new(ResponseRepairer::new()),
            generation_cache,
            validation_cache,
            settings,
            available_providers,
            generation_flights: SingleFlight::new(),
            validation_flights: SingleFlight::new(),
        }
    }

    pub fn with_prompt_builder(mut self, prompts: Arc<PromptBuilder>) -> Self {
        self.prompts = prompts;
        self
    }

    pub fn with_repairer(mut self, repairer: Arc<ResponseRepairer>) -> Self {
        self.repairer = repairer;
        self
    }

    /// Providers reported by [`GenerationOrchestrator::health`]
    pub fn with_available_providers(mut self, providers: Vec<String>) -> Self {
        self.available_providers = providers;
        self
    }

    pub fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    // ------------------------------------------------------------------------
    // Generation
    // ------------------------------------------------------------------------

    /// Generate files for a request, serving repeats from the cache
    pub async fn generate_code(&self, request: &GenerationRequest) -> Result<GenerationResult> {
        let span = info_span!(
            "generate_code",
            request_id = %Uuid::new_v4(),
            framework = %request.framework
        );

        async move {
            request.validate()?;
            let key = generation_key(request, self.settings.key_prompt_chars);

            if let Some(hit) = cache_get(self.generation_cache.as_ref(), &key).await {
                info!(key = %key, "Cache hit");
                return Ok(hit);
            }
            debug!(key = %key, "Cache miss");

            if !self.settings.single_flight {
                return self.generate_uncached(request, &key).await;
            }

            let key = key.as_str();
            self.generation_flights
                .run(key, move || async move {
                    // A flight that finished just before this one started
                    // may already have filled the cache
                    if let Some(hit) = cache_get(self.generation_cache.as_ref(), key).await {
                        return Ok(hit);
                    }
                    self.generate_uncached(request, key).await
                })
                .await
        }
        .instrument(span)
        .await
    }

    async fn generate_uncached(
        &self,
        request: &GenerationRequest,
        key: &str,
    ) -> Result<GenerationResult> {
        let prompt = self.prompts.build_generation_prompt(request)?;

        let raw = self
            .client
            .generate_content(&prompt, &CallOptions::structured())
            .await
            .map_err(|e| {
                warn!(error = %e, "Provider call failed");
                GenerationError::from(e)
            })?;

        let result = self.repairer.parse_generation(&raw).map_err(|e| {
            warn!(error = %e, response_len = raw.len(), "Response could not be parsed");
            e
        })?;

        cache_set(
            self.generation_cache.as_ref(),
            key,
            result.clone(),
            self.settings.generation_ttl,
        )
        .await;

        info!(
            files = result.files.len(),
            suggestions = result.suggestions.len(),
            "Code generated"
        );
        Ok(result)
    }

    /// Stream narration while generating, ending with
    /// [`GenerationEvent::Completed`] or [`GenerationEvent::Failed`].
    ///
    /// Nothing produced here is read from or written to the cache.
    pub fn generate_code_stream(
        &self,
        request: GenerationRequest,
        cancel: CancellationToken,
    ) -> BoxStream<'_, GenerationEvent> {
        let span = info_span!(
            "generate_code_stream",
            request_id = %Uuid::new_v4(),
            framework = %request.framework
        );

        Box::pin(async_stream::stream! {
            let prompt = match self.prompts.build_generation_prompt(&request) {
                Ok(prompt) => prompt,
                Err(e) => {
                    yield GenerationEvent::Failed(e);
                    return;
                }
            };

            let mut filter = NarrationFilter::new();
            let mut upstream = self
                .client
                .stream_content(prompt, CallOptions::structured(), cancel);
            let mut final_text: Option<String> = None;
            let mut narrated = 0usize;

            while let Some(event) = upstream.next().await {
                match event {
                    Ok(ContentEvent::Chunk(text)) => {
                        if filter.accept(&text) {
                            narrated += text.len();
                            yield GenerationEvent::Narration(text);
                        }
                    }
                    Ok(ContentEvent::Done(text)) => {
                        final_text = Some(text);
                        break;
                    }
                    Err(e) => {
                        warn!(parent: &span, error = %e, "Streaming generation failed");
                        yield GenerationEvent::Failed(e.into());
                        return;
                    }
                }
            }
            drop(upstream);

            let text = match final_text {
                Some(text) => text,
                None => {
                    yield GenerationEvent::Failed(GenerationError::MalformedResponse(
                        "Stream ended without a result".to_string(),
                    ));
                    return;
                }
            };

            match self.repairer.parse_generation(&text) {
                Ok(result) => {
                    info!(
                        parent: &span,
                        files = result.files.len(),
                        narrated,
                        "Code generated (streaming)"
                    );
                    yield GenerationEvent::Completed(result);
                }
                Err(e) => {
                    warn!(parent: &span, error = %e, "Streamed response could not be parsed");
                    yield GenerationEvent::Failed(e);
                }
            }
        })
    }

    /// Callback form of [`GenerationOrchestrator::generate_code_stream`].
    ///
    /// Callback errors are logged and do not stop generation.
    pub async fn generate_code_with_streaming<F>(
        &self,
        request: GenerationRequest,
        cancel: CancellationToken,
        mut on_chunk: F,
    ) -> Result<GenerationResult>
    where
        F: FnMut(&str) -> anyhow::Result<()>,
    {
        let mut events = self.generate_code_stream(request, cancel);

        while let Some(event) = events.next().await {
            match event {
                GenerationEvent::Narration(text) => {
                    if let Err(e) = on_chunk(&text) {
                        warn!(error = %e, "Narration callback failed");
                    }
                }
                GenerationEvent::Completed(result) => return Ok(result),
                GenerationEvent::Failed(e) => return Err(e),
            }
        }

        Err(GenerationError::MalformedResponse(
            "Stream ended without a result".to_string(),
        ))
    }

    // ------------------------------------------------------------------------
    // Validation
    // ------------------------------------------------------------------------

    /// Review files, serving repeats from the cache
    pub async fn validate_code(&self, request: &ValidationRequest) -> Result<ValidationResult> {
        let span = info_span!(
            "validate_code",
            request_id = %Uuid::new_v4(),
            framework = %request.framework,
            files = request.files.len()
        );

        async move {
            request.validate()?;
            let key = validation_key(request);

            if let Some(hit) = cache_get(self.validation_cache.as_ref(), &key).await {
                info!(key = %key, "Cache hit");
                return Ok(hit);
            }
            debug!(key = %key, "Cache miss");

            if !self.settings.single_flight {
                return self.validate_uncached(request, &key).await;
            }

            let key = key.as_str();
            self.validation_flights
                .run(key, move || async move {
                    if let Some(hit) = cache_get(self.validation_cache.as_ref(), key).await {
                        return Ok(hit);
                    }
                    self.validate_uncached(request, key).await
                })
                .await
        }
        .instrument(span)
        .await
    }

    async fn validate_uncached(
        &self,
        request: &ValidationRequest,
        key: &str,
    ) -> Result<ValidationResult> {
        let prompt = self.prompts.build_validation_prompt(request)?;

        let raw = self
            .client
            .generate_content(&prompt, &CallOptions::structured())
            .await
            .map_err(|e| {
                warn!(error = %e, "Provider call failed");
                GenerationError::from(e)
            })?;

        let result = self.repairer.parse_validation(&raw)?;

        cache_set(
            self.validation_cache.as_ref(),
            key,
            result.clone(),
            self.settings.validation_ttl,
        )
        .await;

        info!(
            is_valid = result.is_valid,
            errors = result.errors.len(),
            warnings = result.warnings.len(),
            "Code validated"
        );
        Ok(result)
    }

    // ------------------------------------------------------------------------
    // Health
    // ------------------------------------------------------------------------

    /// Probe the provider and collect cache counters
    pub async fn health(&self) -> HealthReport {
        let provider_reachable = self.client.is_available().await;
        let status = if provider_reachable {
            HealthStatus::Healthy
        } else {
            HealthStatus::Degraded
        };

        HealthReport {
            status,
            provider: self.client.provider_name().to_string(),
            model: self.client.model().to_string(),
            available_providers: self.available_providers.clone(),
            provider_reachable,
            cache: CacheHealth {
                generation: self.generation_cache.stats(),
                validation: self.validation_cache.stats(),
            },
            checked_at: Utc::now(),
        }
    }
}

// ============================================================================
// Cache access that never fails a request
// ============================================================================

async fn cache_get<V>(cache: &dyn ResponseCache<V>, key: &str) -> Option<V> {
    match cache.get(key).await {
        Ok(value) => value,
        Err(e) => {
            warn!(
                backend = cache.backend_name(),
                error = %e,
                "Cache read failed, treating as miss"
            );
            None
        }
    }
}

async fn cache_set<V>(cache: &dyn ResponseCache<V>, key: &str, value: V, ttl: Duration) {
    if let Err(e) = cache.set(key, value, ttl).await {
        warn!(
            backend = cache.backend_name(),
            error = %e,
            "Cache write failed, result not cached"
        );
    }
}
