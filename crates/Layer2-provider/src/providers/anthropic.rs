//! Anthropic (Claude) provider implementation with SSE streaming

use super::{build_client, sse, transport_error};
use crate::{
    error::ProviderError,
    r#trait::{
        CompletionRequest, FinishReason, ModelInfo, Provider, ProviderMetadata,
        ProviderResponse, StreamEvent, TokenUsage,
    },
};
use async_trait::async_trait;
use futures::{Stream, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use std::time::Duration;

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
pub const DEFAULT_MODEL: &str = "claude-3-5-sonnet-20241022";

/// Anthropic Claude provider
pub struct AnthropicProvider {
    client: Client,
    api_key: String,
    metadata: ProviderMetadata,
    current_model: ModelInfo,
    base_url: String,
    timeout: Duration,
}

impl AnthropicProvider {
    /// Create a new Anthropic provider
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let model_id = model.into();

        let models = Self::available_models();
        let current_model = models
            .iter()
            .find(|m| m.id == model_id)
            .cloned()
            .unwrap_or_else(|| ModelInfo::new(&model_id, "anthropic"));

        Ok(Self {
            client: build_client(timeout)?,
            api_key: api_key.into(),
            metadata: ProviderMetadata {
                id: "anthropic".to_string(),
                display_name: "Anthropic".to_string(),
                models,
                default_model: DEFAULT_MODEL.to_string(),
                api_key_env: "ANTHROPIC_API_KEY",
                base_url: ANTHROPIC_API_URL.to_string(),
            },
            current_model,
            base_url: ANTHROPIC_API_URL.to_string(),
            timeout,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self.metadata.base_url = self.base_url.clone();
        self
    }

    fn available_models() -> Vec<ModelInfo> {
        vec![
            ModelInfo::named(
                "claude-3-5-sonnet-20241022",
                "anthropic",
                "Claude 3.5 Sonnet",
                200000,
                8192,
            ),
            ModelInfo::named(
                "claude-3-5-haiku-20241022",
                "anthropic",
                "Claude 3.5 Haiku",
                200000,
                8192,
            ),
            ModelInfo::named(
                "claude-sonnet-4-20250514",
                "anthropic",
                "Claude Sonnet 4",
                200000,
                16000,
            ),
        ]
    }

    fn build_request(&self, request: &CompletionRequest, stream: bool) -> AnthropicRequest {
        AnthropicRequest {
            model: self.current_model.id.clone(),
            max_tokens: request.max_tokens,
            temperature: Some(request.temperature),
            messages: vec![AnthropicMessage {
                role: "user".to_string(),
                content: request.prompt.clone(),
            }],
            stream,
        }
    }

    /// Make HTTP request to Anthropic API
    async fn make_request(
        &self,
        request: &AnthropicRequest,
    ) -> Result<reqwest::Response, ProviderError> {
        let response = self
            .client
            .post(&self.base_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(request)
            .send()
            .await
            .map_err(|e| transport_error(e, self.timeout))?;

        let status = response.status().as_u16();

        if status != 200 {
            let body = response.text().await.unwrap_or_default();
            return Err(Self::parse_error_response(status, &body));
        }

        Ok(response)
    }

    fn parse_error_response(status: u16, body: &str) -> ProviderError {
        if let Ok(error_response) = serde_json::from_str::<AnthropicErrorResponse>(body) {
            let message = error_response.error.message;
            return match error_response.error.error_type.as_str() {
                "authentication_error" | "permission_error" => {
                    ProviderError::Authentication(message)
                }
                "rate_limit_error" => ProviderError::RateLimited {
                    retry_after_ms: None,
                },
                "invalid_request_error" if message.to_lowercase().contains("credit") => {
                    ProviderError::QuotaExceeded(message)
                }
                "invalid_request_error" | "not_found_error" => {
                    ProviderError::InvalidRequest(message)
                }
                "overloaded_error" | "api_error" => ProviderError::ServerError(message),
                _ => ProviderError::from_http_status(status, &message),
            };
        }
        ProviderError::from_http_status(status, body)
    }

    /// Parse SSE event line
    /// Decode one event payload; anything unrecognised is ignored
    fn parse_event(data: &str) -> AnthropicStreamEvent {
        serde_json::from_str(data).unwrap_or(AnthropicStreamEvent::Other)
    }
}

#[async_trait]
impl Provider for AnthropicProvider {
    fn metadata(&self) -> &ProviderMetadata {
        &self.metadata
    }

    fn model(&self) -> &ModelInfo {
        &self.current_model
    }

    fn stream(
        &self,
        request: CompletionRequest,
    ) -> Pin<Box<dyn Stream<Item = StreamEvent> + Send + '_>> {
        let body = self.build_request(&request, true);

        Box::pin(async_stream::stream! {
            let response = match self.make_request(&body).await {
                Ok(r) => r,
                Err(e) => {
                    yield StreamEvent::Error(e);
                    return;
                }
            };

            let mut usage = TokenUsage::default();
            let mut payloads = Box::pin(sse::data_payloads(response));

            while let Some(payload) = payloads.next().await {
                let event = match payload {
                    Ok(data) => Self::parse_event(&data),
                    Err(e) => {
                        yield StreamEvent::Error(e);
                        return;
                    }
                };

                match event {
                    AnthropicStreamEvent::ContentBlockDelta {
                        delta: ContentDelta::TextDelta { text },
                    } => {
                        yield StreamEvent::Text(text);
                    }
                    AnthropicStreamEvent::MessageStart { message } => {
                        if let Some(u) = message.usage {
                            usage.input_tokens = u.input_tokens;
                        }
                    }
                    AnthropicStreamEvent::MessageDelta { usage: Some(u) } => {
                        usage.output_tokens = u.output_tokens;
                    }
                    AnthropicStreamEvent::MessageStop => {
                        yield StreamEvent::Usage(usage);
                        yield StreamEvent::Done;
                        return;
                    }
                    AnthropicStreamEvent::Error { error } => {
                        yield StreamEvent::Error(ProviderError::StreamError(error.message));
                        return;
                    }
                    _ => {}
                }
            }

            // Stream ended without MessageStop
            yield StreamEvent::Usage(usage);
            yield StreamEvent::Done;
        })
    }

    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> Result<ProviderResponse, ProviderError> {
        let body = self.build_request(&request, false);
        let response = self.make_request(&body).await?;

        let api_response: AnthropicResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        let content: String = api_response
            .content
            .into_iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text),
                ContentBlock::Other => None,
            })
            .collect();

        let finish_reason = match api_response.stop_reason.as_deref() {
            Some("end_turn") | Some("stop_sequence") => FinishReason::Stop,
            Some("max_tokens") => FinishReason::MaxTokens,
            _ => FinishReason::Other,
        };

        Ok(ProviderResponse {
            content,
            usage: TokenUsage {
                input_tokens: api_response.usage.input_tokens,
                output_tokens: api_response.usage.output_tokens,
            },
            finish_reason,
            model: api_response.model,
        })
    }

    fn is_configured(&self) -> bool {
        !self.api_key.is_empty()
    }
}

// ============================================================================
// Anthropic API Types
// ============================================================================

#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    messages: Vec<AnthropicMessage>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ContentDelta {
    #[serde(rename = "text_delta")]
    TextDelta { text: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<ContentBlock>,
    model: String,
    stop_reason: Option<String>,
    usage: AnthropicUsage,
}

#[derive(Debug, Deserialize)]
struct AnthropicUsage {
    #[serde(default)]
    input_tokens: u32,
    #[serde(default)]
    output_tokens: u32,
}

// SSE Event types
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum AnthropicStreamEvent {
    #[serde(rename = "message_start")]
    MessageStart { message: MessageStartData },
    #[serde(rename = "content_block_delta")]
    ContentBlockDelta { delta: ContentDelta },
    #[serde(rename = "message_delta")]
    MessageDelta { usage: Option<AnthropicUsage> },
    #[serde(rename = "message_stop")]
    MessageStop,
    #[serde(rename = "error")]
    Error { error: ErrorData },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct MessageStartData {
    usage: Option<AnthropicUsage>,
}

#[derive(Debug, Deserialize)]
struct ErrorData {
    message: String,
}

#[derive(Debug, Deserialize)]
struct AnthropicErrorResponse {
    error: AnthropicErrorBody,
}

#[derive(Debug, Deserialize)]
struct AnthropicErrorBody {
    #[serde(rename = "type")]
    error_type: String,
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_text_delta() {
        let data = r#"{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"Hi"}}"#;
        match AnthropicProvider::parse_event(data) {
            AnthropicStreamEvent::ContentBlockDelta {
                delta: ContentDelta::TextDelta { text },
            } => assert_eq!(text, "Hi"),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_unknown_events_are_tolerated() {
        assert!(matches!(
            AnthropicProvider::parse_event(r#"{"type":"ping"}"#),
            AnthropicStreamEvent::Other
        ));
        assert!(matches!(
            AnthropicProvider::parse_event("not json"),
            AnthropicStreamEvent::Other
        ));
    }

    #[test]
    fn test_error_mapping() {
        let body = r#"{"type":"error","error":{"type":"authentication_error","message":"invalid x-api-key"}}"#;
        assert!(matches!(
            AnthropicProvider::parse_error_response(401, body),
            ProviderError::Authentication(_)
        ));
        let body = r#"{"type":"error","error":{"type":"overloaded_error","message":"Overloaded"}}"#;
        assert!(AnthropicProvider::parse_error_response(529, body).is_retryable());
    }

    #[test]
    fn test_default_model_known() {
        let provider =
            AnthropicProvider::new("key", DEFAULT_MODEL, Duration::from_secs(5)).unwrap();
        assert_eq!(provider.model().display_name, "Claude 3.5 Sonnet");
    }
}
