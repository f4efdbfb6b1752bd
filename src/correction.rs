//! Correction Loop
//!
//! Orchestrates generate → extract → validate → execute with bounded
//! attempts. Only execution failures trigger regeneration; synthesis and
//! policy failures are terminal, so the model never gets a chance to
//! negotiate around policy.

use crate::error::{AssistantError, Result};
use crate::executor::{self, DataAccess};
use crate::gateway::{GenerationRequest, ModelGateway};
use crate::query_ir;
use crate::schema::SchemaCatalog;
use crate::security::policy::{Identity, SecurityPolicy};
use crate::security::validator;
use crate::synthesizer;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{info, warn};

/// One generate/validate/execute iteration, immutable once recorded.
#[derive(Debug, Clone, Serialize)]
pub struct QueryAttempt {
    pub ordinal: u8,
    pub candidate: String,
    pub outcome: AttemptOutcome,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub enum AttemptOutcome {
    Rejected(String),
    Failed(String),
    Succeeded,
}

/// Everything the loop needs for one request.
pub struct LoopContext<'a> {
    pub gateway: &'a dyn ModelGateway,
    pub data: &'a dyn DataAccess,
    pub policy: &'a SecurityPolicy,
    pub catalog: &'a SchemaCatalog,
    pub identity: &'a Identity,
    pub previous_context: Option<&'a str>,
    pub model: Option<&'a str>,
    pub max_output_tokens: u32,
    pub temperature: f32,
}

/// Successful loop result.
pub struct LoopOutcome {
    pub query: String,
    pub data: Value,
    pub attempts: Vec<QueryAttempt>,
}

/// Bounded self-correcting execution loop.
pub struct CorrectionLoop {
    max_attempts: u8,
    retry_delay: Duration,
}

impl CorrectionLoop {
    pub fn new(max_attempts: u8, retry_delay: Duration) -> Self {
        Self {
            max_attempts,
            retry_delay,
        }
    }

    pub async fn run(&self, question: &str, ctx: &LoopContext<'_>) -> Result<LoopOutcome> {
        let mut attempts: Vec<QueryAttempt> = Vec::new();
        let mut last_failure: Option<(String, String)> = None;

        for attempt in 1..=self.max_attempts {
            if attempt > 1 {
                tokio::time::sleep(self.retry_delay).await;
            }
            info!(attempt, max = self.max_attempts, "query attempt");

            let prompt = match &last_failure {
                None => synthesizer::build_generation_prompt(
                    question,
                    ctx.identity,
                    ctx.catalog,
                    ctx.previous_context,
                ),
                Some((failed_candidate, error)) => synthesizer::build_correction_prompt(
                    question,
                    failed_candidate,
                    error,
                    attempt,
                    ctx.identity,
                    ctx.catalog,
                    ctx.previous_context,
                ),
            };

            let completion = ctx
                .gateway
                .generate(&GenerationRequest {
                    prompt,
                    max_output_tokens: ctx.max_output_tokens,
                    temperature: ctx.temperature,
                    model: ctx.model.map(|m| m.to_string()),
                })
                .await?;

            let candidate = synthesizer::extract_candidate(&completion)?;
            let role_class = ctx.identity.role.class();

            if let Err(e) = validator::validate_candidate(&candidate, ctx.policy) {
                warn!(attempt, %candidate, "candidate rejected by policy");
                attempts.push(record(attempt, &candidate, AttemptOutcome::Rejected(e.to_string())));
                return Err(e);
            }

            let ir = query_ir::parse_candidate(&candidate)?;

            if let Err(e) = validator::validate_ir(&ir, role_class, ctx.policy, ctx.catalog) {
                warn!(attempt, %candidate, "parsed query rejected by policy");
                attempts.push(record(attempt, &candidate, AttemptOutcome::Rejected(e.to_string())));
                return Err(e);
            }

            match executor::execute(&ir, ctx.data).await {
                Ok(dataset) => {
                    info!(attempt, "query executed");
                    attempts.push(record(attempt, &candidate, AttemptOutcome::Succeeded));
                    return Ok(LoopOutcome {
                        query: candidate,
                        data: dataset,
                        attempts,
                    });
                }
                Err(AssistantError::Execution(message)) => {
                    warn!(attempt, %message, "execution failed");
                    attempts.push(record(
                        attempt,
                        &candidate,
                        AttemptOutcome::Failed(message.clone()),
                    ));
                    if attempt == self.max_attempts {
                        return Err(AssistantError::MaxAttemptsExceeded {
                            attempts: self.max_attempts,
                            query: candidate,
                            error: message,
                        });
                    }
                    last_failure = Some((candidate, message));
                }
                Err(other) => return Err(other),
            }
        }

        // max_attempts >= 1 makes the loop body return on its final pass.
        Err(AssistantError::Execution("no attempts were made".to_string()))
    }
}

fn record(ordinal: u8, candidate: &str, outcome: AttemptOutcome) -> QueryAttempt {
    QueryAttempt {
        ordinal,
        candidate: candidate.to_string(),
        outcome,
        at: Utc::now(),
    }
}
