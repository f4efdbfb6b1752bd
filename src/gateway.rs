//! Upstream Model Gateway
//!
//! Text in, completion out, against an OpenAI-compatible chat-completions
//! endpoint. Owns retry with exponential backoff for transient failures.
//! Knows nothing about query semantics.

use crate::config::GatewayConfig;
use crate::error::{AssistantError, Result};
use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;
use tracing::{info, warn};

/// One generation request.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub prompt: String,
    pub max_output_tokens: u32,
    pub temperature: f32,
    /// Overrides the gateway's configured model when set.
    pub model: Option<String>,
}

/// Boundary to the external text-generation service.
#[async_trait]
pub trait ModelGateway: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<String>;
}

/// Failure classification for one upstream call.
enum CallFailure {
    /// Server-side or explicit-unavailable status.
    Transient(String),
    /// No response at all.
    Network(String),
    /// Client-class status; retrying cannot help.
    Terminal(String),
}

/// Backoff before retrying `attempt` (0-based). Server-side failures wait
/// 2^attempt seconds; network failures add a flat 500 ms on top.
pub fn backoff_delay(attempt: u32, network_failure: bool) -> Duration {
    let base = Duration::from_secs(1 << attempt.min(16));
    if network_failure {
        base + Duration::from_millis(500)
    } else {
        base
    }
}

/// HTTP implementation of the gateway.
pub struct HttpModelGateway {
    client: reqwest::Client,
    config: GatewayConfig,
}

impl HttpModelGateway {
    pub fn new(config: GatewayConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    async fn call_once(
        &self,
        request: &GenerationRequest,
    ) -> std::result::Result<String, CallFailure> {
        let model = request.model.as_deref().unwrap_or(&self.config.model);
        let body = json!({
            "model": model,
            "messages": [
                {"role": "user", "content": request.prompt}
            ],
            "temperature": request.temperature,
            "max_tokens": request.max_output_tokens,
        });

        let response = self
            .client
            .post(format!("{}/chat/completions", self.config.base_url))
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| CallFailure::Network(e.to_string()))?;

        let status = response.status();
        if status.is_server_error() {
            return Err(CallFailure::Transient(format!("upstream status {}", status)));
        }
        if status.is_client_error() {
            return Err(CallFailure::Terminal(format!("upstream status {}", status)));
        }

        let payload: serde_json::Value = response
            .json()
            .await
            .map_err(|e| CallFailure::Transient(format!("unreadable upstream body: {}", e)))?;

        payload["choices"][0]["message"]["content"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| CallFailure::Transient("no content in upstream response".to_string()))
    }
}

#[async_trait]
impl ModelGateway for HttpModelGateway {
    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        let mut last_failure = String::new();
        let tries = self.config.max_retries.max(1);

        for attempt in 0..tries {
            match self.call_once(request).await {
                Ok(text) => {
                    info!(attempt, "upstream generation succeeded");
                    return Ok(text);
                }
                Err(CallFailure::Terminal(msg)) => {
                    warn!(attempt, %msg, "upstream rejected the request");
                    return Err(AssistantError::UpstreamRejected(msg));
                }
                Err(CallFailure::Transient(msg)) => {
                    warn!(attempt, %msg, "transient upstream failure");
                    last_failure = msg;
                    if attempt + 1 < tries {
                        tokio::time::sleep(backoff_delay(attempt, false)).await;
                    }
                }
                Err(CallFailure::Network(msg)) => {
                    warn!(attempt, %msg, "network failure reaching upstream");
                    last_failure = msg;
                    if attempt + 1 < tries {
                        tokio::time::sleep(backoff_delay(attempt, true)).await;
                    }
                }
            }
        }

        Err(AssistantError::UpstreamUnavailable(last_failure))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_is_monotonic() {
        let mut previous = Duration::ZERO;
        for attempt in 0..6 {
            let delay = backoff_delay(attempt, false);
            assert!(delay >= previous);
            previous = delay;
        }
    }

    #[test]
    fn test_backoff_doubles_per_attempt() {
        assert_eq!(backoff_delay(0, false), Duration::from_secs(1));
        assert_eq!(backoff_delay(1, false), Duration::from_secs(2));
        assert_eq!(backoff_delay(2, false), Duration::from_secs(4));
    }

    #[test]
    fn test_network_backoff_adds_flat_delay() {
        assert_eq!(
            backoff_delay(1, true),
            Duration::from_secs(2) + Duration::from_millis(500)
        );
    }
}
