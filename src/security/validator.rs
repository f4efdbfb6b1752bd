//! Security Validator
//!
//! Pure, deterministic candidate checks. No network, no data layer. Two
//! layers: textual rules over the cleaned candidate (first violation wins),
//! then structural rules over the parsed IR. A candidate that fails either
//! layer is never executed.

use crate::error::{AssistantError, Result};
use crate::query_ir::QueryIr;
use crate::schema::SchemaCatalog;
use crate::security::policy::{RoleClass, SecurityPolicy};
use serde_json::Value;
use tracing::debug;

fn violation(reason: impl Into<String>, candidate: &str) -> AssistantError {
    AssistantError::PolicyViolation {
        reason: reason.into(),
        candidate: candidate.to_string(),
    }
}

/// Textual rules, applied in order to the cleaned candidate text. These
/// rules are role-invariant: mutations, missing projections, and sensitive
/// fragments are rejected for every caller.
pub fn validate_candidate(candidate: &str, policy: &SecurityPolicy) -> Result<()> {
    debug!("validating candidate text");

    // 1. Mutating and raw call shapes are rejected for every role.
    for shape in policy.blocked_call_shapes {
        if candidate.contains(shape) {
            return Err(violation(
                format!(
                    "read-only system: '{}' is not allowed",
                    shape.trim_matches(|c| c == '.' || c == '(')
                ),
                candidate,
            ));
        }
    }

    // 2. Record-returning operations must declare a field projection.
    let is_find_shaped = policy
        .projection_required_shapes
        .iter()
        .any(|shape| candidate.contains(shape));
    if is_find_shaped && !has_projection_marker(candidate) {
        return Err(violation(
            "queries must use select: an explicit field projection is required",
            candidate,
        ));
    }

    // 3. Sensitive field fragments, any casing.
    let lowered = candidate.to_lowercase();
    for fragment in policy.sensitive_fragments {
        if lowered.contains(fragment) {
            return Err(violation(
                format!("sensitive fields are not allowed: '{}'", fragment),
                candidate,
            ));
        }
    }

    Ok(())
}

fn has_projection_marker(candidate: &str) -> bool {
    candidate.contains("select:") || candidate.contains("\"select\"")
}

/// Structural rules over the parsed IR. Field names are checked directly
/// against the catalog, so fragments hidden by concatenation or casing in
/// the raw text cannot slip through.
pub fn validate_ir(
    ir: &QueryIr,
    role: RoleClass,
    policy: &SecurityPolicy,
    catalog: &SchemaCatalog,
) -> Result<()> {
    debug!(?role, collection = %ir.collection, op = ir.operation.as_str(), "validating parsed query");

    let rendered = ir.render();

    if !catalog.contains(&ir.collection) {
        return Err(violation(
            format!("unknown collection '{}'", ir.collection),
            &rendered,
        ));
    }

    let op = ir.operation.as_str();
    if !policy.operations_for(role).contains(&op) {
        return Err(violation(
            format!("operation '{}' is not permitted for this role", op),
            &rendered,
        ));
    }

    if ir.operation.requires_projection() {
        let select = match ir.projection() {
            Some(Value::Object(map)) if !map.is_empty() => map,
            _ => {
                return Err(violation(
                    "queries must use select: an explicit field projection is required",
                    &rendered,
                ))
            }
        };

        for (field, value) in select {
            if is_sensitive(field, policy) {
                return Err(violation(
                    format!("sensitive fields are not allowed: '{}'", field),
                    &rendered,
                ));
            }
            if !catalog.field_exists(&ir.collection, field) {
                return Err(violation(
                    format!("field '{}' does not exist on '{}'", field, ir.collection),
                    &rendered,
                ));
            }
            if !matches!(value, Value::Bool(true)) {
                return Err(violation(
                    format!("projection entry '{}' must be `true`", field),
                    &rendered,
                ));
            }
        }
    }

    // Every key anywhere in the arguments (filters, ordering, grouping) is
    // checked against the sensitive blocklist.
    for key in collect_keys(&Value::Object(ir.args.clone())) {
        if is_sensitive(&key, policy) {
            return Err(violation(
                format!("sensitive fields are not allowed: '{}'", key),
                &rendered,
            ));
        }
    }

    Ok(())
}

fn is_sensitive(field: &str, policy: &SecurityPolicy) -> bool {
    let lowered = field.to_lowercase();
    policy
        .sensitive_fragments
        .iter()
        .any(|fragment| lowered.contains(fragment))
}

fn collect_keys(value: &Value) -> Vec<String> {
    let mut keys = Vec::new();
    match value {
        Value::Object(map) => {
            for (k, v) in map {
                keys.push(k.clone());
                keys.extend(collect_keys(v));
            }
        }
        Value::Array(items) => {
            for item in items {
                keys.extend(collect_keys(item));
            }
        }
        _ => {}
    }
    keys
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query_ir::parse_candidate;

    fn check(candidate: &str) -> Result<()> {
        validate_candidate(candidate, &SecurityPolicy::new())
    }

    fn reason(result: Result<()>) -> String {
        match result.unwrap_err() {
            AssistantError::PolicyViolation { reason, .. } => reason,
            other => panic!("expected policy violation, got {:?}", other),
        }
    }

    #[test]
    fn test_mutations_rejected() {
        for candidate in [
            "db.user.updateMany({ where: {}, data: {} })",
            "db.course.create({ data: {} })",
            "db.submission.delete({ where: { id: \"1\" } })",
            "db.user.upsert({})",
            "answer: db.user.deleteMany({})",
        ] {
            assert!(reason(check(candidate)).contains("read-only"));
        }
    }

    #[test]
    fn test_raw_queries_rejected() {
        let r = reason(check("db.user.queryRaw(\"SELECT 1\")"));
        assert!(r.contains("read-only"));
    }

    #[test]
    fn test_find_without_select_rejected() {
        let r = reason(check("db.course.findMany({ where: { title: \"Algebra\" } })"));
        assert!(r.contains("select"));
    }

    #[test]
    fn test_find_with_select_passes_projection_rule() {
        assert!(check("db.course.findMany({ select: { title: true } })").is_ok());
        assert!(check(r#"db.course.findMany({"select": {"title": true}})"#).is_ok());
    }

    #[test]
    fn test_sensitive_fragments_rejected_any_casing() {
        for candidate in [
            "db.user.findMany({ select: { password: true } })",
            "db.user.findMany({ select: { PassWord: true } })",
            "db.user.findMany({ select: { refreshToken: true } })",
            "db.user.findFirst({ select: { id: true }, where: { otpCode: \"1\" } })",
        ] {
            let r = reason(check(candidate));
            assert!(r.contains("sensitive"));
        }
    }

    #[test]
    fn test_count_without_projection_is_ok() {
        assert!(check("db.course.count()").is_ok());
        assert!(check("db.submission.count({ where: { status: \"GRADED\" } })").is_ok());
    }

    #[test]
    fn test_mutation_rule_wins_over_projection_rule() {
        // A mutating candidate with no select reports read-only first.
        let r = reason(check("db.user.updateMany({ data: {} })"));
        assert!(r.contains("read-only"));
    }

    #[test]
    fn test_default_policy_allows_every_read_op_for_both_classes() {
        let policy = SecurityPolicy::new();
        let catalog = SchemaCatalog::new();
        for candidate in [
            "db.course.findMany({ select: { title: true } })",
            "db.course.findFirst({ select: { title: true } })",
            "db.course.findUnique({ where: { id: \"c1\" }, select: { title: true } })",
            "db.course.count()",
            "db.submission.aggregate({ _avg: { score: true } })",
            "db.submission.groupBy({ by: [\"status\"] })",
        ] {
            let ir = parse_candidate(candidate).unwrap();
            for role in [RoleClass::Elevated, RoleClass::Restricted] {
                assert!(validate_ir(&ir, role, &policy, &catalog).is_ok());
            }
        }
    }

    #[test]
    fn test_operation_set_is_consulted_per_role_class() {
        let policy = SecurityPolicy {
            restricted_operations: &["count"],
            ..SecurityPolicy::new()
        };
        let catalog = SchemaCatalog::new();
        let ir = parse_candidate("db.course.findMany({ select: { title: true } })").unwrap();

        assert!(validate_ir(&ir, RoleClass::Elevated, &policy, &catalog).is_ok());
        let err = validate_ir(&ir, RoleClass::Restricted, &policy, &catalog).unwrap_err();
        match err {
            AssistantError::PolicyViolation { reason, .. } => {
                assert!(reason.contains("not permitted"));
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_empty_operation_set_rejects_everything() {
        let policy = SecurityPolicy {
            elevated_operations: &[],
            restricted_operations: &[],
            ..SecurityPolicy::new()
        };
        let catalog = SchemaCatalog::new();
        let ir = parse_candidate("db.course.count()").unwrap();
        for role in [RoleClass::Elevated, RoleClass::Restricted] {
            assert!(validate_ir(&ir, role, &policy, &catalog).is_err());
        }
    }

    #[test]
    fn test_ir_unknown_collection_rejected() {
        let ir = parse_candidate("db.invoice.count()").unwrap();
        let err = validate_ir(
            &ir,
            RoleClass::Elevated,
            &SecurityPolicy::new(),
            &SchemaCatalog::new(),
        )
        .unwrap_err();
        assert!(matches!(err, AssistantError::PolicyViolation { .. }));
    }

    #[test]
    fn test_ir_unknown_projected_field_rejected() {
        let ir =
            parse_candidate("db.course.findMany({ select: { nickname: true } })").unwrap();
        let err = validate_ir(
            &ir,
            RoleClass::Elevated,
            &SecurityPolicy::new(),
            &SchemaCatalog::new(),
        )
        .unwrap_err();
        match err {
            AssistantError::PolicyViolation { reason, .. } => {
                assert!(reason.contains("does not exist"));
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_ir_sensitive_filter_key_rejected() {
        // Fragment smuggled into a filter key rather than the projection.
        let ir = parse_candidate(
            r#"db.user.findMany({ select: { id: true }, where: { apiSecret: "x" } })"#,
        )
        .unwrap();
        let err = validate_ir(
            &ir,
            RoleClass::Restricted,
            &SecurityPolicy::new(),
            &SchemaCatalog::new(),
        )
        .unwrap_err();
        match err {
            AssistantError::PolicyViolation { reason, .. } => {
                assert!(reason.contains("sensitive"));
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_ir_valid_query_passes() {
        let ir = parse_candidate(
            r#"db.assignment.findMany({ where: { courseId: "c1" }, select: { title: true, dueDate: true } })"#,
        )
        .unwrap();
        assert!(validate_ir(
            &ir,
            RoleClass::Restricted,
            &SecurityPolicy::new(),
            &SchemaCatalog::new(),
        )
        .is_ok());
    }
}
