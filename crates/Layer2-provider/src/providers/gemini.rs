//! Google Gemini provider implementation with SSE streaming support

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

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Google Gemini provider
pub struct GeminiProvider {
    client: Client,
    api_key: String,
    model_info: ModelInfo,
    metadata: ProviderMetadata,
    base_url: String,
    timeout: Duration,
}

impl GeminiProvider {
    /// Create a new Gemini provider
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let model_id = model.into();

        Ok(Self {
            client: build_client(timeout)?,
            api_key: api_key.into(),
            model_info: Self::get_model_info(&model_id),
            metadata: Self::create_metadata(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout,
        })
    }

    /// Point at a different endpoint root
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self.metadata.base_url = self.base_url.clone();
        self
    }

    fn create_metadata() -> ProviderMetadata {
        ProviderMetadata {
            id: "gemini".to_string(),
            display_name: "Google Gemini".to_string(),
            models: vec![
                Self::get_model_info("gemini-2.5-flash"),
                Self::get_model_info("gemini-2.5-pro"),
                Self::get_model_info("gemini-2.0-flash"),
                Self::get_model_info("gemini-1.5-flash"),
            ],
            default_model: DEFAULT_MODEL.to_string(),
            api_key_env: "GEMINI_API_KEY",
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    fn get_model_info(model_id: &str) -> ModelInfo {
        match model_id {
            "gemini-2.5-flash" => {
                ModelInfo::named(model_id, "gemini", "Gemini 2.5 Flash", 1048576, 65536)
            }
            "gemini-2.5-pro" => {
                ModelInfo::named(model_id, "gemini", "Gemini 2.5 Pro", 1048576, 65536)
            }
            "gemini-2.0-flash" => {
                ModelInfo::named(model_id, "gemini", "Gemini 2.0 Flash", 1048576, 8192)
            }
            "gemini-1.5-flash" => {
                ModelInfo::named(model_id, "gemini", "Gemini 1.5 Flash", 1048576, 8192)
            }
            _ => ModelInfo::new(model_id, "gemini"),
        }
    }

    fn generate_url(&self, stream: bool) -> String {
        if stream {
            format!(
                "{}/models/{}:streamGenerateContent?alt=sse&key={}",
                self.base_url, self.model_info.id, self.api_key
            )
        } else {
            format!(
                "{}/models/{}:generateContent?key={}",
                self.base_url, self.model_info.id, self.api_key
            )
        }
    }

    fn build_request(&self, request: &CompletionRequest) -> GeminiRequest {
        GeminiRequest {
            contents: vec![GeminiContent {
                role: "user".to_string(),
                parts: vec![GeminiPart {
                    text: request.prompt.clone(),
                }],
            }],
            generation_config: GeminiGenerationConfig {
                max_output_tokens: Some(request.max_tokens),
                temperature: Some(request.temperature),
                response_mime_type: request
                    .structured_output
                    .then(|| "application/json".to_string()),
            },
        }
    }

    fn parse_error_response(status: reqwest::StatusCode, body: &str) -> ProviderError {
        if let Ok(error_response) = serde_json::from_str::<GeminiErrorResponse>(body) {
            let error = error_response.error;
            let message = error.message;

            return match error.status.as_deref() {
                Some("RESOURCE_EXHAUSTED") => {
                    if message.to_lowercase().contains("quota") {
                        ProviderError::QuotaExceeded(message)
                    } else {
                        ProviderError::RateLimited {
                            retry_after_ms: None,
                        }
                    }
                }
                Some("INVALID_ARGUMENT") | Some("FAILED_PRECONDITION") => {
                    ProviderError::InvalidRequest(message)
                }
                Some("PERMISSION_DENIED") | Some("UNAUTHENTICATED") => {
                    ProviderError::Authentication(message)
                }
                _ => ProviderError::from_http_status(status.as_u16(), &message),
            };
        }

        ProviderError::from_http_status(status.as_u16(), body)
    }

    fn candidate_text(candidate: GeminiCandidate) -> String {
        candidate
            .content
            .map(|c| c.parts.into_iter().map(|p| p.text).collect::<String>())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Provider for GeminiProvider {
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
        let body = self.build_request(&request);
        let url = self.generate_url(true);

        Box::pin(async_stream::stream! {
            let response = match self
                .client
                .post(&url)
                .header("Content-Type", "application/json")
                .json(&body)
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

                let chunk = match serde_json::from_str::<GeminiStreamChunk>(&data) {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        tracing::warn!(error = %e, "Failed to parse Gemini chunk");
                        continue;
                    }
                };

                for text in chunk
                    .candidates
                    .unwrap_or_default()
                    .into_iter()
                    .map(Self::candidate_text)
                    .filter(|text| !text.is_empty())
                {
                    yield StreamEvent::Text(text);
                }

                if let Some(usage) = chunk.usage_metadata {
                    total_usage = usage.into();
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
        let body = self.build_request(&request);
        let url = self.generate_url(false);

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error(e, self.timeout))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Self::parse_error_response(status, &body));
        }

        let api_response: GeminiResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        let usage = api_response.usage_metadata.unwrap_or_default().into();

        let candidate = api_response.candidates.into_iter().next().ok_or_else(|| {
            ProviderError::InvalidResponse("No candidates in response".to_string())
        })?;

        let finish_reason = match candidate.finish_reason.as_deref() {
            Some("STOP") => FinishReason::Stop,
            Some("MAX_TOKENS") => FinishReason::MaxTokens,
            Some("SAFETY") | Some("RECITATION") => FinishReason::ContentFilter,
            _ => FinishReason::Other,
        };

        Ok(ProviderResponse {
            content: Self::candidate_text(candidate),
            usage,
            finish_reason,
            model: self.model_info.id.clone(),
        })
    }

    fn is_configured(&self) -> bool {
        !self.api_key.is_empty()
    }
}

// ============================================================================
// Gemini API Types
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    generation_config: GeminiGenerationConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiContent {
    #[serde(default)]
    role: String,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiPart {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    #[serde(default)]
    usage_metadata: Option<GeminiUsageMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiStreamChunk {
    #[serde(default)]
    candidates: Option<Vec<GeminiCandidate>>,
    #[serde(default)]
    usage_metadata: Option<GeminiUsageMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    content: Option<GeminiContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiUsageMetadata {
    prompt_token_count: Option<u32>,
    candidates_token_count: Option<u32>,
}

impl From<GeminiUsageMetadata> for TokenUsage {
    fn from(usage: GeminiUsageMetadata) -> Self {
        TokenUsage {
            input_tokens: usage.prompt_token_count.unwrap_or(0),
            output_tokens: usage.candidates_token_count.unwrap_or(0),
        }
    }
}

#[derive(Debug, Deserialize)]
struct GeminiErrorResponse {
    error: GeminiError,
}

#[derive(Debug, Deserialize)]
struct GeminiError {
    message: String,
    status: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> GeminiProvider {
        GeminiProvider::new("test-key", DEFAULT_MODEL, Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_generate_url() {
        let provider = provider();
        let url = provider.generate_url(false);
        assert!(url.contains("gemini-2.5-flash:generateContent"));
        assert!(provider.generate_url(true).contains("alt=sse"));
    }

    #[test]
    fn test_structured_output_sets_mime_type() {
        let provider = provider();
        let body = provider.build_request(
            &CompletionRequest::new("hi").with_structured_output(true),
        );
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(
            json["generationConfig"]["responseMimeType"],
            "application/json"
        );

        let plain = serde_json::to_value(provider.build_request(&CompletionRequest::new("hi")))
            .unwrap();
        assert!(plain["generationConfig"].get("responseMimeType").is_none());
    }

    #[test]
    fn test_error_mapping() {
        let body = r#"{"error":{"code":403,"message":"API key not valid","status":"PERMISSION_DENIED"}}"#;
        assert!(matches!(
            GeminiProvider::parse_error_response(reqwest::StatusCode::FORBIDDEN, body),
            ProviderError::Authentication(_)
        ));

        let body = r#"{"error":{"code":429,"message":"Too many requests","status":"RESOURCE_EXHAUSTED"}}"#;
        assert!(matches!(
            GeminiProvider::parse_error_response(reqwest::StatusCode::TOO_MANY_REQUESTS, body),
            ProviderError::RateLimited { .. }
        ));
    }
}
