//! Provider client: persona text generation over an OpenAI-compatible
//! chat-completions endpoint.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::persona::PersonaConfig;

/// Errors from provider calls.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    /// Network or HTTP-level failure.
    #[error("provider request failed: {0}")]
    Request(String),

    /// The provider rejected the call with a rate limit.
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// The response body did not carry generated text.
    #[error("response parse error: {0}")]
    Parse(String),
}

impl ProviderError {
    /// Whether the caller's retry policy should attempt the call again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Request(_) | Self::RateLimited(_))
    }
}

/// One message in a provider conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: &str) -> Self {
        Self {
            role: "system".to_string(),
            content: content.to_string(),
        }
    }

    pub fn user(content: &str) -> Self {
        Self {
            role: "user".to_string(),
            content: content.to_string(),
        }
    }
}

/// Generates text for a persona from an immutable context snapshot.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    async fn get_response(
        &self,
        persona: &PersonaConfig,
        context: &[ChatMessage],
    ) -> Result<String, ProviderError>;
}

/// Bounded exponential backoff for retryable provider errors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Retries after the first attempt (2 means 3 attempts total).
    pub max_retries: u32,
    /// Delay before the first retry; doubles per subsequent retry.
    pub base_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay_ms: 250,
        }
    }
}

impl RetryPolicy {
    /// Total attempts including the initial call.
    pub fn attempts(&self) -> u32 {
        self.max_retries + 1
    }

    /// Backoff delay after the given zero-indexed failed attempt.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.base_delay_ms.saturating_mul(1u64 << attempt.min(16)))
    }
}

/// OpenAI-compatible chat-completions client.
pub struct HttpProviderClient {
    endpoint: String,
    api_key: Option<String>,
    max_tokens: u32,
    temperature: f32,
    client: reqwest::Client,
}

impl HttpProviderClient {
    pub fn new(endpoint: &str, api_key: Option<String>) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            api_key,
            max_tokens: 500,
            temperature: 0.7,
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(60))
                .build()
                .expect("failed to build HTTP client"),
        }
    }

    pub fn with_sampling(mut self, max_tokens: u32, temperature: f32) -> Self {
        self.max_tokens = max_tokens;
        self.temperature = temperature;
        self
    }
}

#[async_trait]
impl ProviderClient for HttpProviderClient {
    async fn get_response(
        &self,
        persona: &PersonaConfig,
        context: &[ChatMessage],
    ) -> Result<String, ProviderError> {
        let request_body = serde_json::json!({
            "model": persona.model,
            "messages": context,
            "max_tokens": self.max_tokens,
            "temperature": self.temperature,
        });

        let mut request = self.client.post(&self.endpoint).json(&request_body);
        if let Some(ref key) = self.api_key {
            request = request.header("Authorization", format!("Bearer {}", key));
        }

        let response = request
            .send()
            .await
            .map_err(|e| ProviderError::Request(e.to_string()))?;

        let status = response.status();
        if status.as_u16() == 429 {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::RateLimited(body));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Request(format!(
                "provider returned {}: {}",
                status, body
            )));
        }

        let resp_json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))?;

        resp_json
            .pointer("/choices/0/message/content")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .ok_or_else(|| {
                ProviderError::Parse("response carried no message content".to_string())
            })
    }
}
