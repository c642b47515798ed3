//! OpenAI chat completions provider.
//!
//! Sends role-tagged messages (text and inline images) to
//! `{api_base_url}/chat/completions` and returns the first choice's text.
//! One attempt per call: no retries and no streaming.

use super::{ChatCompletion, ChatMessage, ChatProvider, ChatRequest, ProviderError};
use crate::config::OpenAiConfig;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// OpenAI chat provider.
pub struct OpenAiChatProvider {
    config: OpenAiConfig,
    client: Client,
}

impl OpenAiChatProvider {
    pub fn new(config: OpenAiConfig) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ProviderError::NetworkError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    fn api_url(&self) -> String {
        format!(
            "{}/chat/completions",
            self.config.api_base_url.trim_end_matches('/')
        )
    }

    fn api_key(&self) -> Result<&str, ProviderError> {
        self.config
            .api_key
            .as_ref()
            .map(|key| key.expose_secret().as_str())
            .filter(|key| !key.is_empty())
            .ok_or_else(|| ProviderError::NotConfigured("OPENAI_API_KEY is not set".to_string()))
    }
}

#[async_trait]
impl ChatProvider for OpenAiChatProvider {
    async fn complete(&self, request: &ChatRequest) -> Result<ChatCompletion, ProviderError> {
        let api_key = self.api_key()?;

        let body = ChatCompletionRequest {
            model: &self.config.model,
            messages: &request.messages,
            max_tokens: request.max_tokens,
        };

        tracing::debug!(
            model = %self.config.model,
            message_count = request.messages.len(),
            has_image = request.has_image(),
            max_tokens = request.max_tokens,
            "Sending request to OpenAI chat completions"
        );

        let response = self
            .client
            .post(self.api_url())
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::NetworkError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();

            if status == StatusCode::TOO_MANY_REQUESTS {
                return Err(ProviderError::RateLimited);
            }

            let message = serde_json::from_str::<ApiErrorResponse>(&error_text)
                .map(|body| body.error.message)
                .unwrap_or(error_text);

            tracing::error!(status = %status, error = %message, "OpenAI API returned an error");

            return Err(ProviderError::ApiError(format!(
                "OpenAI API error {}: {}",
                status, message
            )));
        }

        let api_response: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::ApiError(format!("Failed to parse response: {}", e)))?;

        let choice = api_response
            .choices
            .into_iter()
            .next()
            .ok_or(ProviderError::EmptyResponse)?;

        let text = choice
            .message
            .content
            .filter(|text| !text.trim().is_empty())
            .ok_or(ProviderError::EmptyResponse)?;

        if choice.finish_reason.as_deref() == Some("length") {
            tracing::warn!(
                max_tokens = request.max_tokens,
                "Completion truncated at the output token limit"
            );
        }

        let usage = api_response.usage.unwrap_or_default();

        Ok(ChatCompletion {
            text,
            model: api_response
                .model
                .unwrap_or_else(|| self.config.model.clone()),
            input_tokens: usage.prompt_tokens,
            output_tokens: usage.completion_tokens,
        })
    }

    fn is_configured(&self) -> bool {
        self.api_key().is_ok()
    }

    fn model(&self) -> &str {
        &self.config.model
    }
}

// ============================================================================
// OpenAI API Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}
