//! Mock provider implementation for testing.

use super::{ChatCompletion, ChatProvider, ChatRequest, ProviderError};
use async_trait::async_trait;
use std::sync::Mutex;

/// What the mock answers with.
#[derive(Debug, Clone)]
enum MockBehavior {
    Reply(String),
    Fail(String),
    RateLimited,
}

/// Mock chat provider for testing. Records every request it receives.
pub struct MockChatProvider {
    configured: bool,
    behavior: MockBehavior,
    requests: Mutex<Vec<ChatRequest>>,
}

impl MockChatProvider {
    /// A configured provider answering every request with `reply`.
    pub fn replying(reply: impl Into<String>) -> Self {
        Self {
            configured: true,
            behavior: MockBehavior::Reply(reply.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// A provider with no API key.
    pub fn unconfigured() -> Self {
        Self {
            configured: false,
            ..Self::replying("")
        }
    }

    /// A configured provider whose upstream call fails.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            behavior: MockBehavior::Fail(message.into()),
            ..Self::replying("")
        }
    }

    pub fn rate_limited() -> Self {
        Self {
            behavior: MockBehavior::RateLimited,
            ..Self::replying("")
        }
    }

    /// Requests received so far, oldest first.
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.requests().len()
    }
}

#[async_trait]
impl ChatProvider for MockChatProvider {
    async fn complete(&self, request: &ChatRequest) -> Result<ChatCompletion, ProviderError> {
        if !self.configured {
            return Err(ProviderError::NotConfigured(
                "Mock chat provider not configured".to_string(),
            ));
        }

        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }

        match &self.behavior {
            MockBehavior::Reply(text) => Ok(ChatCompletion {
                text: text.clone(),
                model: self.model().to_string(),
                input_tokens: request
                    .messages
                    .iter()
                    .map(|m| m.text().len() as u32 / 4)
                    .sum(),
                output_tokens: text.len() as u32 / 4,
            }),
            MockBehavior::Fail(message) => Err(ProviderError::ApiError(message.clone())),
            MockBehavior::RateLimited => Err(ProviderError::RateLimited),
        }
    }

    fn is_configured(&self) -> bool {
        self.configured
    }

    fn model(&self) -> &str {
        "mock-model"
    }
}
