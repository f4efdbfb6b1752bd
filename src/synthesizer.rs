//! Query Synthesizer
//!
//! Builds the generation prompt and reduces the model's raw completion to a
//! single candidate query expression. Extraction is deterministic and does
//! not depend on the model having followed the output instructions.

use crate::error::{AssistantError, Result};
use crate::query_ir::QUERY_ROOT;
use crate::schema::SchemaCatalog;
use crate::security::policy::{Identity, RoleClass};
use lazy_static::lazy_static;
use regex::Regex;

/// Build the prompt for the initial query generation.
pub fn build_generation_prompt(
    question: &str,
    identity: &Identity,
    catalog: &SchemaCatalog,
    previous_context: Option<&str>,
) -> String {
    let mut parts = Vec::new();

    parts.push("You translate questions about a learning platform into a single read-only query.".to_string());
    parts.push(String::new());
    parts.push(catalog.describe());
    parts.push(String::new());

    parts.push("CALLER:".to_string());
    parts.push(format!(
        "- id: {}, username: {}, name: {}, role: {}",
        identity.id,
        identity.username,
        identity.display_name,
        identity.role.as_str()
    ));

    parts.push("\nACCESS RULES:".to_string());
    match identity.role.class() {
        RoleClass::Elevated => {
            parts.push("- The caller is staff and may query records across the organization.".to_string());
        }
        RoleClass::Restricted => {
            parts.push("- The caller is a student and may only see their own records.".to_string());
            parts.push(format!(
                "- Filters on user-owned collections must scope to userId = \"{}\".",
                identity.id
            ));
        }
    }
    parts.push("- Read operations only: findMany, findFirst, findUnique, count, aggregate, groupBy.".to_string());
    parts.push("- findMany/findFirst/findUnique must declare a select projection.".to_string());
    parts.push("- Never reference credential fields (passwords, tokens, secrets).".to_string());

    if let Some(context) = previous_context.filter(|c| !c.trim().is_empty()) {
        parts.push("\nPREVIOUS CONVERSATION:".to_string());
        parts.push(context.to_string());
    }

    parts.push("\nQUESTION:".to_string());
    parts.push(question.to_string());

    parts.push("\nOUTPUT FORMAT (CRITICAL):".to_string());
    parts.push(format!(
        "- Respond with exactly one expression starting with `{}` in the form db.<collection>.<operation>({{ ... }});",
        QUERY_ROOT
    ));
    parts.push("- The argument must be one object literal with keys like where, select, orderBy, take, by.".to_string());
    parts.push("- No prose, no code fences, no explanation, no variable assignment.".to_string());

    parts.join("\n")
}

/// Build the prompt for a regeneration attempt after an execution failure.
pub fn build_correction_prompt(
    question: &str,
    failed_candidate: &str,
    error_message: &str,
    attempt: u8,
    identity: &Identity,
    catalog: &SchemaCatalog,
    previous_context: Option<&str>,
) -> String {
    let mut parts = Vec::new();

    parts.push(format!(
        "RETRY ATTEMPT {}: your previous query failed at execution.",
        attempt
    ));
    parts.push(format!("Failed query: {}", failed_candidate));
    parts.push(format!("Execution error: {}", error_message));
    parts.push("Fix the query so it executes, keeping the same intent.".to_string());
    parts.push(String::new());
    parts.push(build_generation_prompt(
        question,
        identity,
        catalog,
        previous_context,
    ));

    parts.join("\n")
}

lazy_static! {
    static ref CANDIDATE_HEAD: Regex =
        Regex::new(r"db\.[A-Za-z_][A-Za-z0-9_]*\.[A-Za-z]+\(").unwrap();
}

/// Reduce a raw completion to the candidate expression. The expression is
/// anchored on its `db.<collection>.<operation>(` head and cut at the
/// matching closing parenthesis, so code fences, `await`/assignment
/// prefixes, and prose on either side (even prose containing `db.` or a
/// semicolon) are all ignored. Idempotent: applying it to an already-clean
/// candidate returns the candidate unchanged.
pub fn extract_candidate(completion: &str) -> Result<String> {
    let head = CANDIDATE_HEAD.find(completion).ok_or_else(|| {
        AssistantError::Synthesis("invalid query format: no db. expression found".to_string())
    })?;

    let tail = &completion[head.start()..];
    let end = balanced_call_end(tail)?;
    Ok(tail[..end].to_string())
}

/// Index one past the parenthesis closing the call that opens in `tail`.
/// Parentheses inside string literals do not count toward the balance.
fn balanced_call_end(tail: &str) -> Result<usize> {
    let mut depth = 0usize;
    let mut in_string: Option<char> = None;
    let mut escaped = false;

    for (i, ch) in tail.char_indices() {
        if let Some(quote) = in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == quote {
                in_string = None;
            }
            continue;
        }
        match ch {
            '"' | '\'' => in_string = Some(ch),
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Ok(i + ch.len_utf8());
                }
            }
            _ => {}
        }
    }

    Err(AssistantError::Synthesis(
        "invalid query format: unbalanced parentheses".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security::policy::Role;

    fn identity(role: Role) -> Identity {
        Identity::new("u-1", "sam", role)
    }

    #[test]
    fn test_extract_plain_expression() {
        let candidate =
            extract_candidate("db.course.findMany({ select: { title: true } });").unwrap();
        assert_eq!(candidate, "db.course.findMany({ select: { title: true } })");
    }

    #[test]
    fn test_extract_strips_fences_and_await() {
        let completion = "```javascript\nawait db.course.count();\n```";
        assert_eq!(extract_candidate(completion).unwrap(), "db.course.count()");
    }

    #[test]
    fn test_extract_strips_assignment_prefix() {
        let completion = "const result = await db.user.count({ where: { role: \"STUDENT\" } });";
        assert_eq!(
            extract_candidate(completion).unwrap(),
            "db.user.count({ where: { role: \"STUDENT\" } })"
        );
    }

    #[test]
    fn test_extract_ignores_surrounding_prose() {
        let completion = "Here is the query you need:\ndb.course.count();\nHope this helps!";
        assert_eq!(extract_candidate(completion).unwrap(), "db.course.count()");
    }

    #[test]
    fn test_extract_is_idempotent() {
        let completion = "```js\nawait db.assignment.findMany({ select: { title: true } });\n```";
        let once = extract_candidate(completion).unwrap();
        let twice = extract_candidate(&once).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_extract_rejects_completion_without_root() {
        let err = extract_candidate("SELECT * FROM course;").unwrap_err();
        assert!(matches!(err, AssistantError::Synthesis(_)));
    }

    #[test]
    fn test_extract_skips_db_mention_in_leading_prose() {
        let completion =
            "Using the db. accessor as instructed:\ndb.course.count();\nDone.";
        assert_eq!(extract_candidate(completion).unwrap(), "db.course.count()");
    }

    #[test]
    fn test_extract_ignores_semicolons_in_trailing_prose() {
        let completion = "db.course.count();\nNote: adjust the filter; ask again if needed.";
        assert_eq!(extract_candidate(completion).unwrap(), "db.course.count()");
    }

    #[test]
    fn test_extract_keeps_parentheses_inside_string_literals() {
        let completion =
            r#"db.course.findMany({ where: { title: "Algebra (I)" }, select: { title: true } });"#;
        assert_eq!(
            extract_candidate(completion).unwrap(),
            r#"db.course.findMany({ where: { title: "Algebra (I)" }, select: { title: true } })"#
        );
    }

    #[test]
    fn test_extract_rejects_unbalanced_call() {
        let err = extract_candidate("db.course.findMany({ select: { title: true }").unwrap_err();
        assert!(matches!(err, AssistantError::Synthesis(_)));
    }

    #[test]
    fn test_generation_prompt_embeds_scope_for_students() {
        let prompt = build_generation_prompt(
            "what are my grades?",
            &identity(Role::Student),
            &SchemaCatalog::new(),
            None,
        );
        assert!(prompt.contains("userId = \"u-1\""));
        assert!(prompt.contains("AVAILABLE COLLECTIONS"));
        assert!(prompt.contains("what are my grades?"));
    }

    #[test]
    fn test_generation_prompt_includes_context_when_present() {
        let prompt = build_generation_prompt(
            "and last week?",
            &identity(Role::Teacher),
            &SchemaCatalog::new(),
            Some("Q: attendance today? A: 12 present"),
        );
        assert!(prompt.contains("PREVIOUS CONVERSATION"));
        assert!(prompt.contains("12 present"));
    }

    #[test]
    fn test_correction_prompt_carries_error_detail() {
        let prompt = build_correction_prompt(
            "how many courses?",
            "db.course.count({ where: { archived: true } })",
            "unknown field 'archived'",
            2,
            &identity(Role::Admin),
            &SchemaCatalog::new(),
            None,
        );
        assert!(prompt.contains("RETRY ATTEMPT 2"));
        assert!(prompt.contains("unknown field 'archived'"));
        assert!(prompt.contains("db.course.count"));
    }
}
