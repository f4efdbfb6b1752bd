//! Query Intermediate Representation
//!
//! Candidates are never evaluated as code. The synthesizer's cleaned text is
//! parsed into this closed representation and anything that does not fit the
//! grammar is rejected before validation or execution.

use crate::error::{AssistantError, Result};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Root token the model must begin its output with.
pub const QUERY_ROOT: &str = "db.";

/// The enumerated read operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    FindMany,
    FindFirst,
    FindUnique,
    Count,
    Aggregate,
    GroupBy,
}

impl Operation {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "findMany" => Some(Operation::FindMany),
            "findFirst" => Some(Operation::FindFirst),
            "findUnique" => Some(Operation::FindUnique),
            "count" => Some(Operation::Count),
            "aggregate" => Some(Operation::Aggregate),
            "groupBy" => Some(Operation::GroupBy),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::FindMany => "findMany",
            Operation::FindFirst => "findFirst",
            Operation::FindUnique => "findUnique",
            Operation::Count => "count",
            Operation::Aggregate => "aggregate",
            Operation::GroupBy => "groupBy",
        }
    }

    /// Record-returning operations must declare an explicit projection.
    pub fn requires_projection(&self) -> bool {
        matches!(
            self,
            Operation::FindMany | Operation::FindFirst | Operation::FindUnique
        )
    }
}

/// A parsed, structurally closed query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryIr {
    pub collection: String,
    pub operation: Operation,
    pub args: Map<String, Value>,
}

impl QueryIr {
    pub fn filter(&self) -> Option<&Value> {
        self.args.get("where")
    }

    pub fn projection(&self) -> Option<&Value> {
        self.args.get("select")
    }

    /// Canonical text form, used for diagnostics and the reply's query field.
    pub fn render(&self) -> String {
        let args = Value::Object(self.args.clone());
        format!("db.{}.{}({})", self.collection, self.operation.as_str(), args)
    }
}

lazy_static! {
    static ref QUERY_HEAD: Regex =
        Regex::new(r"(?s)^db\.([A-Za-z_][A-Za-z0-9_]*)\.([A-Za-z]+)\((.*)\)$").unwrap();
}

/// Parse a cleaned candidate into the IR.
pub fn parse_candidate(candidate: &str) -> Result<QueryIr> {
    let caps = QUERY_HEAD.captures(candidate.trim()).ok_or_else(|| {
        AssistantError::Synthesis(format!(
            "candidate does not match db.<collection>.<operation>(...): {}",
            candidate
        ))
    })?;

    let collection = caps[1].to_string();
    let op_name = &caps[2];
    let operation = Operation::from_str(op_name).ok_or_else(|| {
        AssistantError::Synthesis(format!("unsupported operation '{}'", op_name))
    })?;

    let args_text = caps[3].trim();
    let args = if args_text.is_empty() {
        Map::new()
    } else {
        let normalized = normalize_object_literal(args_text);
        match serde_json::from_str::<Value>(&normalized) {
            Ok(Value::Object(map)) => map,
            Ok(_) => {
                return Err(AssistantError::Synthesis(
                    "query arguments must be a single object".to_string(),
                ))
            }
            Err(e) => {
                return Err(AssistantError::Synthesis(format!(
                    "malformed query arguments: {}",
                    e
                )))
            }
        }
    };

    Ok(QueryIr {
        collection,
        operation,
        args,
    })
}

/// Rewrite a JS-style object literal into strict JSON: bare keys get quoted
/// and single-quoted strings become double-quoted. Content already in JSON
/// form passes through unchanged.
pub fn normalize_object_literal(src: &str) -> String {
    let mut out = String::with_capacity(src.len() + 16);
    let chars: Vec<char> = src.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '"' | '\'' => {
                let quote = c;
                let mut literal = String::new();
                i += 1;
                while i < chars.len() {
                    let ch = chars[i];
                    if ch == '\\' && i + 1 < chars.len() {
                        // An escaped single quote needs no escape in JSON.
                        if quote == '\'' && chars[i + 1] == '\'' {
                            literal.push('\'');
                        } else {
                            literal.push(ch);
                            literal.push(chars[i + 1]);
                        }
                        i += 2;
                        continue;
                    }
                    if ch == quote {
                        break;
                    }
                    literal.push(ch);
                    i += 1;
                }
                i += 1; // closing quote
                out.push('"');
                if quote == '\'' {
                    out.push_str(&literal.replace('"', "\\\""));
                } else {
                    out.push_str(&literal);
                }
                out.push('"');
            }
            c if c.is_ascii_alphabetic() || c == '_' || c == '$' => {
                let start = i;
                while i < chars.len()
                    && (chars[i].is_ascii_alphanumeric() || chars[i] == '_' || chars[i] == '$')
                {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                let mut j = i;
                while j < chars.len() && chars[j].is_whitespace() {
                    j += 1;
                }
                if j < chars.len() && chars[j] == ':' {
                    out.push('"');
                    out.push_str(&word);
                    out.push('"');
                } else {
                    out.push_str(&word);
                }
            }
            _ => {
                out.push(c);
                i += 1;
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_find_many_with_select() {
        let ir = parse_candidate(
            r#"db.course.findMany({ where: { teacherId: "t1" }, select: { title: true } })"#,
        )
        .unwrap();
        assert_eq!(ir.collection, "course");
        assert_eq!(ir.operation, Operation::FindMany);
        assert!(ir.projection().is_some());
        assert_eq!(ir.filter().unwrap()["teacherId"], "t1");
    }

    #[test]
    fn test_parse_count_with_empty_args() {
        let ir = parse_candidate("db.course.count()").unwrap();
        assert_eq!(ir.operation, Operation::Count);
        assert!(ir.args.is_empty());
    }

    #[test]
    fn test_parse_strict_json_args() {
        let ir = parse_candidate(
            r#"db.submission.groupBy({"by": ["status"], "where": {"score": null}})"#,
        )
        .unwrap();
        assert_eq!(ir.operation, Operation::GroupBy);
        assert_eq!(ir.args["by"][0], "status");
    }

    #[test]
    fn test_reject_unsupported_operation() {
        let err = parse_candidate("db.course.explode({})").unwrap_err();
        assert!(matches!(err, AssistantError::Synthesis(_)));
    }

    #[test]
    fn test_reject_non_object_args() {
        let err = parse_candidate("db.course.findMany([1, 2])").unwrap_err();
        assert!(matches!(err, AssistantError::Synthesis(_)));
    }

    #[test]
    fn test_normalize_bare_keys_and_single_quotes() {
        let normalized =
            normalize_object_literal(r#"{ where: { status: 'GRADED' }, take: 5 }"#);
        let value: Value = serde_json::from_str(&normalized).unwrap();
        assert_eq!(value["where"]["status"], "GRADED");
        assert_eq!(value["take"], 5);
    }

    #[test]
    fn test_normalize_preserves_json() {
        let src = r#"{"where": {"a": true}, "select": {"b": false}}"#;
        let normalized = normalize_object_literal(src);
        let a: Value = serde_json::from_str(src).unwrap();
        let b: Value = serde_json::from_str(&normalized).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_render_round_trips_through_parse() {
        let ir = parse_candidate(r#"db.user.count({ where: { role: "STUDENT" } })"#).unwrap();
        let rendered = ir.render();
        let reparsed = parse_candidate(&rendered).unwrap();
        assert_eq!(reparsed.collection, ir.collection);
        assert_eq!(reparsed.args, ir.args);
    }
}
