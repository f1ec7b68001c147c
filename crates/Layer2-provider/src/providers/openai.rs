//! OpenAI chat-completions provider with SSE streaming support
//!
//! Also serves OpenAI-compatible endpoints such as DeepSeek through
//! [`OpenAiProvider::deepseek`].

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

const DEFAULT_API_URL: &str = "https://api.openai.com/v1/chat/completions";
const DEEPSEEK_API_URL: &str = "https://api.deepseek.com/chat/completions";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEEPSEEK_DEFAULT_MODEL: &str = "deepseek-chat";

/// OpenAI provider with SSE streaming support
pub struct OpenAiProvider {
    client: Client,
    api_key: String,
    model_info: ModelInfo,
    metadata: ProviderMetadata,
    base_url: String,
    timeout: Duration,
}

impl OpenAiProvider {
    /// Create a new OpenAI provider
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let model_id = model.into();

        Ok(Self {
            client: build_client(timeout)?,
            api_key: api_key.into(),
            model_info: Self::get_model_info(&model_id, "openai"),
            metadata: Self::openai_metadata(),
            base_url: DEFAULT_API_URL.to_string(),
            timeout,
        })
    }

    /// DeepSeek through its OpenAI-compatible API
    pub fn deepseek(
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let model_id = model.into();

        Ok(Self {
            client: build_client(timeout)?,
            api_key: api_key.into(),
            model_info: Self::get_model_info(&model_id, "deepseek"),
            metadata: Self::deepseek_metadata(),
            base_url: DEEPSEEK_API_URL.to_string(),
            timeout,
        })
    }

    /// Create with custom base URL (for OpenAI-compatible APIs)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self.metadata.base_url = self.base_url.clone();
        self
    }

    fn openai_metadata() -> ProviderMetadata {
        ProviderMetadata {
            id: "openai".to_string(),
            display_name: "OpenAI".to_string(),
            models: vec![
                Self::get_model_info("gpt-4o-mini", "openai"),
                Self::get_model_info("gpt-4o", "openai"),
            ],
            default_model: DEFAULT_MODEL.to_string(),
            api_key_env: "OPENAI_API_KEY",
            base_url: DEFAULT_API_URL.to_string(),
        }
    }

    fn deepseek_metadata() -> ProviderMetadata {
        ProviderMetadata {
            id: "deepseek".to_string(),
            display_name: "DeepSeek".to_string(),
            models: vec![
                Self::get_model_info("deepseek-chat", "deepseek"),
                Self::get_model_info("deepseek-coder", "deepseek"),
            ],
            default_model: DEEPSEEK_DEFAULT_MODEL.to_string(),
            api_key_env: "DEEPSEEK_API_KEY",
            base_url: DEEPSEEK_API_URL.to_string(),
        }
    }

    fn get_model_info(model_id: &str, provider: &str) -> ModelInfo {
        match model_id {
            "gpt-4o" => ModelInfo::named(model_id, provider, "GPT-4o", 128000, 16384),
            "gpt-4o-mini" => ModelInfo::named(model_id, provider, "GPT-4o Mini", 128000, 16384),
            "deepseek-chat" => ModelInfo::named(model_id, provider, "DeepSeek Chat", 64000, 8192),
            "deepseek-coder" => {
                ModelInfo::named(model_id, provider, "DeepSeek Coder", 64000, 8192)
            }
            _ => ModelInfo::new(model_id, provider),
        }
    }

    fn build_request(&self, request: &CompletionRequest, stream: bool) -> OpenAiRequest {
        OpenAiRequest {
            model: self.model_info.id.clone(),
            messages: vec![OpenAiMessage {
                role: "user".to_string(),
                content: Some(request.prompt.clone()),
            }],
            max_tokens: Some(request.max_tokens),
            temperature: Some(request.temperature),
            response_format: request.structured_output.then(|| ResponseFormat {
                format_type: "json_object".to_string(),
            }),
            stream,
            stream_options: stream.then_some(StreamOptions {
                include_usage: true,
            }),
        }
    }

    /// Parse error response from an OpenAI-compatible API
    fn parse_error_response(status: reqwest::StatusCode, body: &str) -> ProviderError {
        if let Ok(error_response) = serde_json::from_str::<OpenAiErrorResponse>(body) {
            let error = error_response.error;
            let message = error.message;

            return match error.code.as_deref() {
                Some("rate_limit_exceeded") => ProviderError::RateLimited {
                    retry_after_ms: None,
                },
                Some("invalid_api_key") => ProviderError::Authentication(message),
                Some("insufficient_quota") => ProviderError::QuotaExceeded(message),
                Some("context_length_exceeded") | Some("model_not_found") => {
                    ProviderError::InvalidRequest(message)
                }
                _ => ProviderError::from_http_status(status.as_u16(), &message),
            };
        }

        ProviderError::from_http_status(status.as_u16(), body)
    }

    fn post(&self, body: &OpenAiRequest) -> reqwest::RequestBuilder {
        self.client
            .post(&self.base_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(body)
    }
}

#[async_trait]
impl Provider for OpenAiProvider {
    fn metadata(&self) -> &ProviderMetadata {
        &self.metadata
    }

    fn model(&self) -> &ModelInfo {
        &self.model_info
    }

    fn stream(
        &self,
        request: CompletionRequest,
    ) -> Pin<Box<dyn Stream<Item = StreamEvent> + Send + '_>> {
        let body = self.build_request(&request, true);

        Box::pin(async_stream::stream! {
            let response = match self
                .post(&body)
                .header("Accept", "text/event-stream")
                .send()
                .await
            {
                Ok(resp) => resp,
                Err(e) => {
                    yield StreamEvent::Error(transport_error(e, self.timeout));
                    return;
                }
            };

            if !response.status().is_success() {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                yield StreamEvent::Error(Self::parse_error_response(status, &body));
                return;
            }

            let mut total_usage = TokenUsage::default();
            let mut payloads = Box::pin(sse::data_payloads(response));

            while let Some(payload) = payloads.next().await {
                let data = match payload {
                    Ok(data) => data,
                    Err(e) => {
                        yield StreamEvent::Error(e);
                        return;
                    }
                };

                match serde_json::from_str::<OpenAiStreamChunk>(&data) {
                    Ok(chunk) => {
                        for choice in chunk.choices {
                            if let Some(content) = choice.delta.content.filter(|c| !c.is_empty()) {
                                yield StreamEvent::Text(content);
                            }
                        }

                        // Usage arrives in the final chunk
                        if let Some(usage) = chunk.usage {
                            total_usage = usage.into();
                        }
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Failed to parse SSE chunk");
                    }
                }
            }

            yield StreamEvent::Usage(total_usage);
            yield StreamEvent::Done;
        })
    }

    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> Result<ProviderResponse, ProviderError> {
        let body = self.build_request(&request, false);

        let response = self
            .post(&body)
            .send()
            .await
            .map_err(|e| transport_error(e, self.timeout))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Self::parse_error_response(status, &body));
        }

        let api_response: OpenAiResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        let choice =
            api_response.choices.into_iter().next().ok_or_else(|| {
                ProviderError::InvalidResponse("No choices in response".to_string())
            })?;

        let finish_reason = match choice.finish_reason.as_deref() {
            Some("stop") => FinishReason::Stop,
            Some("length") => FinishReason::MaxTokens,
            Some("content_filter") => FinishReason::ContentFilter,
            _ => FinishReason::Other,
        };

        Ok(ProviderResponse {
            content: choice.message.content.unwrap_or_default(),
            usage: api_response.usage.map(Into::into).unwrap_or_default(),
            finish_reason,
            model: self.model_info.id.clone(),
        })
    }

    fn is_configured(&self) -> bool {
        !self.api_key.is_empty()
    }
}

// ============================================================================
// OpenAI API Types
// ============================================================================

#[derive(Debug, Serialize)]
struct OpenAiRequest {
    model: String,
    messages: Vec<OpenAiMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream_options: Option<StreamOptions>,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: String,
}

#[derive(Debug, Serialize)]
struct StreamOptions {
    include_usage: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenAiMessage {
    role: String,
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
    #[serde(default)]
    usage: Option<OpenAiUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

impl From<OpenAiUsage> for TokenUsage {
    fn from(usage: OpenAiUsage) -> Self {
        TokenUsage {
            input_tokens: usage.prompt_tokens,
            output_tokens: usage.completion_tokens,
        }
    }
}

#[derive(Debug, Deserialize)]
struct OpenAiStreamChunk {
    #[serde(default)]
    choices: Vec<OpenAiStreamChoice>,
    #[serde(default)]
    usage: Option<OpenAiUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAiStreamChoice {
    delta: OpenAiDelta,
}

#[derive(Debug, Deserialize)]
struct OpenAiDelta {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiErrorResponse {
    error: OpenAiError,
}

#[derive(Debug, Deserialize)]
struct OpenAiError {
    message: String,
    code: Option<String>,
}
