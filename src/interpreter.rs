//! Interpretation Generator
//!
//! Turns the executed query's dataset back into a natural-language answer.
//! One gateway call, no correction loop: if this fails the pipeline decides
//! whether to degrade or fail.

use crate::error::{AssistantError, Result};
use crate::gateway::{GenerationRequest, ModelGateway};
use crate::security::policy::{Identity, RoleClass};
use serde_json::Value;
use tracing::info;

pub struct InterpretationInput<'a> {
    pub question: &'a str,
    pub query: &'a str,
    pub dataset: &'a Value,
    pub identity: &'a Identity,
    pub previous_context: Option<&'a str>,
    pub model: Option<&'a str>,
    pub max_output_tokens: u32,
    pub temperature: f32,
}

/// Build the formatting prompt for the final answer.
pub fn build_interpretation_prompt(input: &InterpretationInput<'_>) -> String {
    let dataset = serde_json::to_string(input.dataset)
        .unwrap_or_else(|_| "<unserializable dataset>".to_string());

    let mut parts = Vec::new();

    parts.push(
        "You explain learning-platform query results to a non-technical user.".to_string(),
    );
    parts.push(format!(
        "The user is {} ({}).",
        input.identity.display_name,
        input.identity.role.as_str()
    ));

    if let Some(context) = input.previous_context.filter(|c| !c.trim().is_empty()) {
        parts.push("\nPREVIOUS CONVERSATION:".to_string());
        parts.push(context.to_string());
    }

    parts.push("\nQUESTION:".to_string());
    parts.push(input.question.to_string());
    parts.push("\nEXECUTED QUERY:".to_string());
    parts.push(input.query.to_string());
    parts.push("\nRESULT DATA (JSON):".to_string());
    parts.push(dataset);

    parts.push("\nFORMATTING RULES:".to_string());
    parts.push("- Answer in plain language, grounded only in the result data.".to_string());
    parts.push(
        "- If the data is a list of choices the user must narrow down, say so and list them."
            .to_string(),
    );
    parts.push(
        "- Render timestamps as UTC in the form `14 Mar 2026, 09:30`; never echo raw ISO strings."
            .to_string(),
    );
    parts.push(
        "- Shape: one sentence for a single value or record; a short bullet list for a few homogeneous records; a markdown table for larger homogeneous sets."
            .to_string(),
    );
    if input.identity.role.class() == RoleClass::Restricted {
        parts.push("- The data is already scoped to the user's own records; speak to them directly.".to_string());
    }
    parts.push("- Never mention the query, collections, or field names.".to_string());

    parts.join("\n")
}

/// Produce the narrative answer for an executed query.
pub async fn interpret(
    gateway: &dyn ModelGateway,
    input: &InterpretationInput<'_>,
) -> Result<String> {
    let prompt = build_interpretation_prompt(input);
    info!("generating interpretation");

    let narrative = gateway
        .generate(&GenerationRequest {
            prompt,
            max_output_tokens: input.max_output_tokens,
            temperature: input.temperature,
            model: input.model.map(|m| m.to_string()),
        })
        .await
        .map_err(|e| AssistantError::Interpretation(e.to_string()))?;

    Ok(narrative.trim().to_string())
}
