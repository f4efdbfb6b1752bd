//! Pipeline Controller
//!
//! End-to-end entry point: identity check, context clamp, correction loop,
//! interpretation, wire-shaped reply. No raw error ever crosses this
//! boundary; every failure maps to a stable user-facing message.

use crate::config::AssistantConfig;
use crate::context::clamp_context;
use crate::correction::{CorrectionLoop, LoopContext};
use crate::error::AssistantError;
use crate::executor::DataAccess;
use crate::gateway::ModelGateway;
use crate::interpreter::{self, InterpretationInput};
use crate::schema::SchemaCatalog;
use crate::security::policy::{Identity, SecurityPolicy};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// One inbound question.
#[derive(Debug, Clone)]
pub struct AssistantRequest {
    /// Caller identity; absence is an authentication failure.
    pub identity: Option<Identity>,
    pub question: String,
    /// Opaque accumulated context from prior turns, maintained by the caller.
    pub previous_context: Option<String>,
    /// Optional model override for both generation calls.
    pub model: Option<String>,
}

/// The externally visible outcome.
#[derive(Debug, Clone, Serialize)]
pub struct AssistantReply {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AssistantReply {
    fn success(query: String, data: Value, response: String) -> Self {
        Self {
            ok: true,
            query: Some(query),
            data: Some(data),
            response: Some(response),
            error: None,
        }
    }

    fn failure(error: impl Into<String>, query: Option<String>) -> Self {
        Self {
            ok: false,
            query,
            data: None,
            response: None,
            error: Some(error.into()),
        }
    }
}

/// The natural-language data assistant.
pub struct Assistant {
    gateway: Arc<dyn ModelGateway>,
    data: Arc<dyn DataAccess>,
    policy: SecurityPolicy,
    catalog: SchemaCatalog,
    config: AssistantConfig,
}

impl Assistant {
    pub fn new(gateway: Arc<dyn ModelGateway>, data: Arc<dyn DataAccess>) -> Self {
        Self::with_config(gateway, data, AssistantConfig::default())
    }

    pub fn with_config(
        gateway: Arc<dyn ModelGateway>,
        data: Arc<dyn DataAccess>,
        config: AssistantConfig,
    ) -> Self {
        Self {
            gateway,
            data,
            policy: SecurityPolicy::new(),
            catalog: SchemaCatalog::new(),
            config,
        }
    }

    /// Answer one question. Always returns a structured reply.
    pub async fn ask(&self, request: AssistantRequest) -> AssistantReply {
        let request_id = Uuid::new_v4();
        info!(%request_id, question = %request.question, "assistant request");

        let identity = match &request.identity {
            Some(identity) => identity.clone(),
            None => {
                warn!(%request_id, "request without identity");
                return reply_for_error(AssistantError::AuthenticationMissing);
            }
        };

        let outcome = match self.config.deadline {
            Some(deadline) => {
                match tokio::time::timeout(deadline, self.run(&identity, &request)).await {
                    Ok(reply) => reply,
                    Err(_) => reply_for_error(AssistantError::DeadlineExceeded),
                }
            }
            None => self.run(&identity, &request).await,
        };

        info!(%request_id, ok = outcome.ok, "assistant reply");
        outcome
    }

    async fn run(&self, identity: &Identity, request: &AssistantRequest) -> AssistantReply {
        let context = request
            .previous_context
            .as_deref()
            .map(|c| clamp_context(c, self.config.context_budget_bytes));

        let loop_ctx = LoopContext {
            gateway: self.gateway.as_ref(),
            data: self.data.as_ref(),
            policy: &self.policy,
            catalog: &self.catalog,
            identity,
            previous_context: context,
            model: request.model.as_deref(),
            max_output_tokens: self.config.generation_max_tokens,
            temperature: self.config.generation_temperature,
        };

        let correction = CorrectionLoop::new(self.config.max_attempts, self.config.retry_delay);
        let outcome = match correction.run(&request.question, &loop_ctx).await {
            Ok(outcome) => outcome,
            Err(e) => return reply_for_error(e),
        };
        info!(attempts = outcome.attempts.len(), "query loop finished");

        let interpretation = interpreter::interpret(
            self.gateway.as_ref(),
            &InterpretationInput {
                question: &request.question,
                query: &outcome.query,
                dataset: &outcome.data,
                identity,
                previous_context: context,
                model: request.model.as_deref(),
                max_output_tokens: self.config.interpretation_max_tokens,
                temperature: self.config.interpretation_temperature,
            },
        )
        .await;

        match interpretation {
            Ok(narrative) => AssistantReply::success(outcome.query, outcome.data, narrative),
            Err(e) if self.config.degrade_on_interpretation_failure => {
                warn!(%e, "interpretation failed; returning raw dataset");
                AssistantReply::success(
                    outcome.query,
                    outcome.data,
                    "The query succeeded, but a narrative answer could not be generated. The raw data is attached.".to_string(),
                )
            }
            Err(_) => AssistantReply::failure(
                "Your question was answered by the data layer, but the answer could not be formatted. Please try again.",
                Some(outcome.query),
            ),
        }
    }
}

fn reply_for_error(error: AssistantError) -> AssistantReply {
    match error {
        AssistantError::AuthenticationMissing => {
            AssistantReply::failure("Authentication required.", None)
        }
        AssistantError::UpstreamUnavailable(_) => AssistantReply::failure(
            "The assistant is temporarily unavailable. Please try again in a moment.",
            None,
        ),
        AssistantError::UpstreamRejected(_) => {
            AssistantReply::failure("The assistant could not process this request.", None)
        }
        AssistantError::Synthesis(_) => AssistantReply::failure(
            "I could not turn that question into a data query. Try rephrasing it.",
            None,
        ),
        AssistantError::PolicyViolation { reason, candidate } => AssistantReply::failure(
            format!("The generated query was blocked: {}.", reason),
            Some(candidate),
        ),
        AssistantError::MaxAttemptsExceeded {
            attempts,
            query,
            error,
        } => AssistantReply::failure(
            format!(
                "The query could not be executed after {} attempts: {}.",
                attempts, error
            ),
            Some(query),
        ),
        AssistantError::DeadlineExceeded => {
            AssistantReply::failure("The request took too long and was cancelled.", None)
        }
        other => {
            warn!(%other, "unexpected pipeline error");
            AssistantReply::failure("Something went wrong while answering your question.", None)
        }
    }
}
