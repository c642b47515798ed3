//! Chat model provider abstractions and implementations.
//!
//! Readings are produced by a hosted multimodal chat model. The trait keeps
//! handlers independent of the backend so tests can swap in the mock.

pub mod mock;
pub mod openai;

use async_trait::async_trait;
use serde::Serialize;
use service_core::error::AppError;
use thiserror::Error;

/// Error type for provider operations.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Rate limited")]
    RateLimited,

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Model returned no content")]
    EmptyResponse,
}

impl ProviderError {
    /// Short label used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            ProviderError::NotConfigured(_) => "not_configured",
            ProviderError::ApiError(_) => "api_error",
            ProviderError::RateLimited => "rate_limited",
            ProviderError::NetworkError(_) => "network_error",
            ProviderError::EmptyResponse => "empty_response",
        }
    }
}

impl From<ProviderError> for AppError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::NotConfigured(msg) => AppError::ConfigError(anyhow::anyhow!(msg)),
            ProviderError::RateLimited => {
                AppError::ServiceUnavailable("Model provider rate limited the request".to_string())
            }
            other => AppError::BadGateway(format!("Model call failed: {}", other)),
        }
    }
}

/// Who a chat message is from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

/// One piece of multimodal user content.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageUrl {
    pub url: String,
}

/// Message content: plain text or a list of parts.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: MessageContent,
}

impl ChatMessage {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: MessageContent::Text(text.into()),
        }
    }

    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: MessageContent::Text(text.into()),
        }
    }

    pub fn user_with_image(text: impl Into<String>, image_url: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: MessageContent::Parts(vec![
                ContentPart::Text { text: text.into() },
                ContentPart::ImageUrl {
                    image_url: ImageUrl {
                        url: image_url.into(),
                    },
                },
            ]),
        }
    }

    pub fn has_image(&self) -> bool {
        match &self.content {
            MessageContent::Text(_) => false,
            MessageContent::Parts(parts) => parts
                .iter()
                .any(|part| matches!(part, ContentPart::ImageUrl { .. })),
        }
    }

    /// Concatenated text of the message, ignoring images.
    pub fn text(&self) -> String {
        match &self.content {
            MessageContent::Text(text) => text.clone(),
            MessageContent::Parts(parts) => parts
                .iter()
                .filter_map(|part| match part {
                    ContentPart::Text { text } => Some(text.as_str()),
                    ContentPart::ImageUrl { .. } => None,
                })
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

/// A complete prompt ready to send to a chat model.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
}

impl ChatRequest {
    pub fn has_image(&self) -> bool {
        self.messages.iter().any(ChatMessage::has_image)
    }
}

/// Result of a successful completion.
#[derive(Debug, Clone)]
pub struct ChatCompletion {
    pub text: String,
    pub model: String,
    pub input_tokens: u32,
    pub output_tokens: u32,
}

/// Trait for chat completion providers (e.g., OpenAI).
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Run a single completion and return the first choice's text.
    async fn complete(&self, request: &ChatRequest) -> Result<ChatCompletion, ProviderError>;

    /// Whether credentials are present; checked before any request is handled.
    fn is_configured(&self) -> bool;

    /// Model identifier requests are sent to.
    fn model(&self) -> &str;
}
