//! Resilient front door to a single [`Provider`]
//!
//! `ProviderClient` owns the call policy: prompt validation, a timeout per
//! attempt, retry with exponential backoff, blank-response detection and the
//! streaming fallback. Providers themselves only translate one request into
//! one HTTP exchange.

use crate::error::{GenerateError, ProviderError};
use crate::retry::{with_retry, RetryConfig};
use crate::r#trait::{CompletionRequest, Provider, StreamEvent};
use futures::stream::BoxStream;
use futures::StreamExt;
use genforge_foundation::ProviderSettings;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Prompt used by the availability probe
const PROBE_PROMPT: &str = "Hello";
const PROBE_MAX_TOKENS: u32 = 16;

/// Call policy for a [`ProviderClient`]
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderConfig {
    pub model: String,
    pub timeout_ms: u64,
    /// Total attempts per call, including the first
    pub max_retries: u32,
    pub temperature: f32,
    pub max_tokens: u32,
    pub retry_base_delay_ms: u64,
    pub retry_max_delay_ms: u64,
    /// Prompts longer than this (in characters) are rejected
    pub max_prompt_chars: usize,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self::from_settings(&ProviderSettings::default(), "")
    }
}

impl ProviderConfig {
    pub fn from_settings(settings: &ProviderSettings, model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            timeout_ms: settings.timeout_ms,
            max_retries: settings.max_retries,
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
            retry_base_delay_ms: settings.retry_base_delay_ms,
            retry_max_delay_ms: settings.retry_max_delay_ms,
            max_prompt_chars: settings.max_prompt_chars,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_attempts: self.max_retries.max(1),
            initial_delay_ms: self.retry_base_delay_ms,
            max_delay_ms: self.retry_max_delay_ms,
            ..RetryConfig::default()
        }
    }
}

/// Per-call overrides
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallOptions {
    /// Ask the backend for JSON output
    pub structured_output: bool,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl CallOptions {
    pub fn structured() -> Self {
        Self {
            structured_output: true,
            ..Default::default()
        }
    }
}

/// Items produced by [`ProviderClient::stream_content`]
#[derive(Debug, Clone, PartialEq)]
pub enum ContentEvent {
    /// A piece of streamed text
    Chunk(String),
    /// Final text; the accumulated chunks, or the fallback response
    Done(String),
}

/// Retrying, timeout-bounded client over one provider
pub struct ProviderClient {
    provider: Arc<dyn Provider>,
    config: ProviderConfig,
}

impl std::fmt::Debug for ProviderClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderClient")
            .field("provider", &self.provider.metadata().id)
            .field("config", &self.config)
            .finish()
    }
}

enum StreamStep {
    Cancelled,
    IdleTimeout,
    Event(Option<StreamEvent>),
}

impl ProviderClient {
    pub fn new(provider: Arc<dyn Provider>, config: ProviderConfig) -> Self {
        Self { provider, config }
    }

    pub fn provider_name(&self) -> &str {
        &self.provider.metadata().id
    }

    pub fn model(&self) -> &str {
        &self.provider.model().id
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    fn validate_prompt(&self, prompt: &str) -> Result<(), GenerateError> {
        if prompt.trim().is_empty() {
            return Err(GenerateError::InvalidInput(
                "Prompt must not be empty".to_string(),
            ));
        }
        let length = prompt.chars().count();
        if length > self.config.max_prompt_chars {
            return Err(GenerateError::InvalidInput(format!(
                "Prompt is {} characters, maximum is {}",
                length, self.config.max_prompt_chars
            )));
        }
        Ok(())
    }

    fn request(&self, prompt: &str, options: &CallOptions) -> CompletionRequest {
        CompletionRequest::new(prompt)
            .with_temperature(options.temperature.unwrap_or(self.config.temperature))
            .with_max_tokens(options.max_tokens.unwrap_or(self.config.max_tokens))
            .with_structured_output(options.structured_output)
    }

    async fn attempt(&self, attempt: u32, request: CompletionRequest) -> Result<String, ProviderError> {
        debug!(
            provider = self.provider_name(),
            model = self.model(),
            attempt,
            prompt_len = request.prompt.len(),
            "Calling provider"
        );

        let response = tokio::time::timeout(self.config.timeout(), self.provider.complete(request))
            .await
            .map_err(|_| ProviderError::Timeout(self.config.timeout_ms))??;

        if response.content.trim().is_empty() {
            return Err(ProviderError::EmptyResponse);
        }
        Ok(response.content)
    }

    /// Generate text with the full retry policy
    pub async fn generate_content(
        &self,
        prompt: &str,
        options: &CallOptions,
    ) -> Result<String, GenerateError> {
        self.validate_prompt(prompt)?;
        let request = self.request(prompt, options);
        let retry = self.config.retry_config();

        let text = with_retry(&retry, "generate_content", |attempt| {
            let request = request.clone();
            async move { self.attempt(attempt, request).await }
        })
        .await
        .map_err(|failure| GenerateError::from_last_attempt(failure.attempts, failure.error))?;

        info!(
            provider = self.provider_name(),
            prompt_len = prompt.len(),
            response_len = text.len(),
            "Content generated"
        );
        Ok(text)
    }

    /// Stream text chunks, ending with [`ContentEvent::Done`].
    ///
    /// A stream-level failure (error event, idle timeout, blank stream)
    /// switches to [`ProviderClient::generate_content`]; chunks already
    /// yielded are not repeated. Cancelling `cancel` ends the stream with
    /// [`GenerateError::Cancelled`].
    pub fn stream_content(
        &self,
        prompt: String,
        options: CallOptions,
        cancel: CancellationToken,
    ) -> BoxStream<'_, Result<ContentEvent, GenerateError>> {
        Box::pin(async_stream::stream! {
            if let Err(e) = self.validate_prompt(&prompt) {
                yield Err(e);
                return;
            }

            let idle_timeout = self.config.timeout();
            let mut accumulated = String::new();
            let mut failure: Option<ProviderError> = None;
            let mut upstream = self.provider.stream(self.request(&prompt, &options));

            loop {
                let step = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => StreamStep::Cancelled,
                    next = tokio::time::timeout(idle_timeout, upstream.next()) => match next {
                        Ok(event) => StreamStep::Event(event),
                        Err(_) => StreamStep::IdleTimeout,
                    },
                };

                match step {
                    StreamStep::Cancelled => {
                        debug!("Stream cancelled by caller");
                        yield Err(GenerateError::Cancelled);
                        return;
                    }
                    StreamStep::IdleTimeout => {
                        failure = Some(ProviderError::Timeout(self.config.timeout_ms));
                        break;
                    }
                    StreamStep::Event(None) | StreamStep::Event(Some(StreamEvent::Done)) => break,
                    StreamStep::Event(Some(StreamEvent::Text(text))) => {
                        accumulated.push_str(&text);
                        yield Ok(ContentEvent::Chunk(text));
                    }
                    StreamStep::Event(Some(StreamEvent::Usage(usage))) => {
                        debug!(
                            input_tokens = usage.input_tokens,
                            output_tokens = usage.output_tokens,
                            "Stream usage"
                        );
                    }
                    StreamStep::Event(Some(StreamEvent::Error(e))) => {
                        failure = Some(e);
                        break;
                    }
                }
            }
            drop(upstream);

            if failure.is_none() && accumulated.trim().is_empty() {
                failure = Some(ProviderError::EmptyResponse);
            }

            let error = match failure {
                Some(error) => error,
                None => {
                    yield Ok(ContentEvent::Done(accumulated));
                    return;
                }
            };

            warn!(
                provider = self.provider_name(),
                error = %error,
                streamed_len = accumulated.len(),
                "Streaming failed, falling back to a non-streaming call"
            );

            let fallback = tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(GenerateError::Cancelled),
                result = self.generate_content(&prompt, &options) => result,
            };
            yield fallback.map(ContentEvent::Done);
        })
    }

    /// Callback form of [`ProviderClient::stream_content`].
    ///
    /// Callback errors are logged and do not interrupt the stream. Returns
    /// the final text.
    pub async fn generate_content_stream<F>(
        &self,
        prompt: &str,
        options: &CallOptions,
        cancel: CancellationToken,
        mut on_chunk: F,
    ) -> Result<String, GenerateError>
    where
        F: FnMut(&str) -> anyhow::Result<()>,
    {
        let mut stream = self.stream_content(prompt.to_string(), options.clone(), cancel);

        while let Some(event) = stream.next().await {
            match event? {
                ContentEvent::Chunk(text) => {
                    if let Err(e) = on_chunk(&text) {
                        warn!(error = %e, "Chunk callback failed");
                    }
                }
                ContentEvent::Done(text) => return Ok(text),
            }
        }

        Err(GenerateError::from_last_attempt(
            1,
            ProviderError::StreamError("Stream ended without a result".to_string()),
        ))
    }

    /// Probe the backend with a tiny request. Never fails.
    pub async fn is_available(&self) -> bool {
        if !self.provider.is_configured() {
            return false;
        }

        let request = CompletionRequest::new(PROBE_PROMPT)
            .with_temperature(self.config.temperature)
            .with_max_tokens(PROBE_MAX_TOKENS);

        match tokio::time::timeout(self.config.timeout(), self.provider.complete(request)).await {
            Ok(Ok(response)) => !response.content.trim().is_empty(),
            Ok(Err(e)) => {
                warn!(provider = self.provider_name(), error = %e, "Availability probe failed");
                false
            }
            Err(_) => {
                warn!(provider = self.provider_name(), "Availability probe timed out");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::r#trait::{ModelInfo, ProviderMetadata, ProviderResponse};
    use async_trait::async_trait;
    use futures::Stream;
    use std::collections::VecDeque;
    use std::pin::Pin;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    /// Provider that replays scripted outcomes
    struct ScriptedProvider {
        metadata: ProviderMetadata,
        model: ModelInfo,
        replies: Mutex<VecDeque<Result<String, ProviderError>>>,
        stream_script: Mutex<Vec<StreamEvent>>,
        delay: Duration,
        calls: AtomicU32,
        last_request: Mutex<Option<CompletionRequest>>,
    }

    impl ScriptedProvider {
        fn new(replies: Vec<Result<String, ProviderError>>) -> Self {
            Self {
                metadata: ProviderMetadata {
                    id: "scripted".into(),
                    display_name: "Scripted".into(),
                    models: vec![],
                    default_model: "scripted-1".into(),
                    api_key_env: "SCRIPTED_API_KEY",
                    base_url: "memory://".into(),
                },
                model: ModelInfo::new("scripted-1", "scripted"),
                replies: Mutex::new(replies.into()),
                stream_script: Mutex::new(vec![]),
                delay: Duration::ZERO,
                calls: AtomicU32::new(0),
                last_request: Mutex::new(None),
            }
        }

        fn with_stream(self, events: Vec<StreamEvent>) -> Self {
            *self.stream_script.lock().unwrap() = events;
            self
        }

        fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Provider for ScriptedProvider {
        fn metadata(&self) -> &ProviderMetadata {
            &self.metadata
        }

        fn model(&self) -> &ModelInfo {
            &self.model
        }

        fn stream(
            &self,
            _request: CompletionRequest,
        ) -> Pin<Box<dyn Stream<Item = StreamEvent> + Send + '_>> {
            let events = self.stream_script.lock().unwrap().clone();
            Box::pin(futures::stream::iter(events))
        }

        async fn complete(
            &self,
            request: CompletionRequest,
        ) -> Result<ProviderResponse, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_request.lock().unwrap() = Some(request);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            let reply = self
                .replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(ProviderError::Unknown("script exhausted".into())));
            reply.map(|text| ProviderResponse::text(text, "scripted-1"))
        }

        fn is_configured(&self) -> bool {
            true
        }
    }

    fn client(provider: Arc<ScriptedProvider>) -> ProviderClient {
        ProviderClient::new(
            provider,
            ProviderConfig {
                model: "scripted-1".into(),
                ..ProviderConfig::default()
            },
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_until_success() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            Err(ProviderError::ServerError("busy".into())),
            Err(ProviderError::Network("reset".into())),
            Ok("{\"files\":{}}".into()),
        ]));
        let client = client(provider.clone());

        let text = client
            .generate_content("build a page", &CallOptions::default())
            .await
            .unwrap();

        assert_eq!(text, "{\"files\":{}}");
        assert_eq!(provider.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_api_key_error_is_not_retried() {
        let provider = Arc::new(ScriptedProvider::new(vec![Err(ProviderError::Unknown(
            "Invalid API key".into(),
        ))]));
        let client = client(provider.clone());

        let err = client
            .generate_content("build a page", &CallOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(err, GenerateError::Exhausted { attempts: 1, .. }));
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_blank_responses_exhaust_as_empty() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            Ok("".into()),
            Ok("   ".into()),
            Ok("\n".into()),
        ]));
        let client = client(provider.clone());

        let err = client
            .generate_content("build a page", &CallOptions::default())
            .await
            .unwrap_err();

        assert_eq!(err, GenerateError::EmptyResponse { attempts: 3 });
    }

    #[tokio::test(start_paused = true)]
    async fn test_blank_then_failure_reports_last_error() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            Ok("".into()),
            Err(ProviderError::Authentication("bad key".into())),
        ]));
        let client = client(provider.clone());

        let err = client
            .generate_content("build a page", &CallOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            GenerateError::Exhausted {
                attempts: 2,
                source: ProviderError::Authentication(_)
            }
        ));
    }

    #[tokio::test]
    async fn test_invalid_prompts_make_no_calls() {
        let provider = Arc::new(ScriptedProvider::new(vec![]));
        let mut config = ProviderConfig::default();
        config.max_prompt_chars = 10;
        let client = ProviderClient::new(provider.clone(), config);

        assert!(matches!(
            client.generate_content("   ", &CallOptions::default()).await,
            Err(GenerateError::InvalidInput(_))
        ));
        assert!(matches!(
            client
                .generate_content("this prompt is too long", &CallOptions::default())
                .await,
            Err(GenerateError::InvalidInput(_))
        ));
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_attempt_times_out_and_retries() {
        let provider = Arc::new(
            ScriptedProvider::new(vec![Ok("late".into()), Ok("late".into()), Ok("late".into())])
                .with_delay(Duration::from_secs(120)),
        );
        let client = client(provider.clone());

        let err = client
            .generate_content("build a page", &CallOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            GenerateError::Exhausted {
                attempts: 3,
                source: ProviderError::Timeout(_)
            }
        ));
        assert_eq!(provider.calls(), 3);
    }

    #[tokio::test]
    async fn test_structured_hint_reaches_provider() {
        let provider = Arc::new(ScriptedProvider::new(vec![Ok("{}".into())]));
        let client = client(provider.clone());

        client
            .generate_content("build a page", &CallOptions::structured())
            .await
            .unwrap();

        let request = provider.last_request.lock().unwrap().clone().unwrap();
        assert!(request.structured_output);
        assert_eq!(request.max_tokens, 8192);
    }

    #[tokio::test]
    async fn test_stream_forwards_chunks_and_ignores_callback_errors() {
        let provider = Arc::new(ScriptedProvider::new(vec![]).with_stream(vec![
            StreamEvent::Text("Hello ".into()),
            StreamEvent::Text("world".into()),
            StreamEvent::Done,
        ]));
        let client = client(provider.clone());

        let mut seen = Vec::new();
        let text = client
            .generate_content_stream(
                "say hi",
                &CallOptions::default(),
                CancellationToken::new(),
                |chunk| {
                    seen.push(chunk.to_string());
                    anyhow::bail!("display closed")
                },
            )
            .await
            .unwrap();

        assert_eq!(text, "Hello world");
        assert_eq!(seen, vec!["Hello ", "world"]);
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn test_stream_error_falls_back_to_generate() {
        let provider = Arc::new(
            ScriptedProvider::new(vec![Ok("full answer".into())]).with_stream(vec![
                StreamEvent::Text("partial".into()),
                StreamEvent::Error(ProviderError::StreamError("dropped".into())),
            ]),
        );
        let client = client(provider.clone());

        let events: Vec<_> = client
            .stream_content("q".into(), CallOptions::default(), CancellationToken::new())
            .collect()
            .await;

        assert_eq!(
            events,
            vec![
                Ok(ContentEvent::Chunk("partial".into())),
                Ok(ContentEvent::Done("full answer".into())),
            ]
        );
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_blank_stream_falls_back() {
        let provider = Arc::new(
            ScriptedProvider::new(vec![Ok("answer".into())]).with_stream(vec![StreamEvent::Done]),
        );
        let client = client(provider.clone());

        let text = client
            .generate_content_stream("q", &CallOptions::default(), CancellationToken::new(), |_| {
                Ok(())
            })
            .await
            .unwrap();
        assert_eq!(text, "answer");
    }

    #[tokio::test]
    async fn test_cancelled_stream_ends_with_cancelled() {
        let provider = Arc::new(
            ScriptedProvider::new(vec![]).with_stream(vec![StreamEvent::Text("never".into())]),
        );
        let client = client(provider);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let events: Vec<_> = client
            .stream_content("q".into(), CallOptions::default(), cancel)
            .collect()
            .await;

        assert_eq!(events, vec![Err(GenerateError::Cancelled)]);
    }

    #[tokio::test]
    async fn test_is_available() {
        let up = Arc::new(ScriptedProvider::new(vec![Ok("Hi".into())]));
        assert!(client(up).is_available().await);

        let down = Arc::new(ScriptedProvider::new(vec![Err(ProviderError::Network(
            "refused".into(),
        ))]));
        assert!(!client(down).is_available().await);
    }
}
