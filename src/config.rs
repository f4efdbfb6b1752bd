//! Configuration
//!
//! Gateway credentials come from the environment; pipeline tuning has
//! compiled defaults the caller can override.

use std::time::Duration;

/// Upstream model gateway configuration, built once at process start.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub max_retries: u32,
}

impl GatewayConfig {
    pub fn new(api_key: String, base_url: String, model: String) -> Self {
        Self {
            api_key,
            base_url,
            model,
            max_retries: 3,
        }
    }

    /// Load from environment variables (reads `.env` if present).
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();

        let api_key =
            std::env::var("OPENAI_API_KEY").unwrap_or_else(|_| "dummy-api-key".to_string());
        let base_url = std::env::var("OPENAI_BASE_URL")
            .unwrap_or_else(|_| "https://api.openai.com/v1".to_string());
        let model =
            std::env::var("ASSISTANT_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string());

        Self::new(api_key, base_url, model)
    }
}

/// Pipeline tuning knobs.
#[derive(Debug, Clone)]
pub struct AssistantConfig {
    /// Maximum generate/validate/execute attempts per request.
    pub max_attempts: u8,
    /// Fixed delay before every attempt after the first.
    pub retry_delay: Duration,
    /// Token cap for query generation.
    pub generation_max_tokens: u32,
    /// Token cap for the narrative answer.
    pub interpretation_max_tokens: u32,
    pub generation_temperature: f32,
    pub interpretation_temperature: f32,
    /// Byte budget for caller-supplied conversation context.
    pub context_budget_bytes: usize,
    /// Optional wall-clock bound on the whole pipeline run.
    pub deadline: Option<Duration>,
    /// When the narrative call fails, return the dataset anyway.
    pub degrade_on_interpretation_failure: bool,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_delay: Duration::from_millis(500),
            generation_max_tokens: 600,
            interpretation_max_tokens: 900,
            generation_temperature: 0.1,
            interpretation_temperature: 0.4,
            context_budget_bytes: 16 * 1024,
            deadline: None,
            degrade_on_interpretation_failure: true,
        }
    }
}
