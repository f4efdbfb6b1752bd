//! Security Policy Definitions

use serde::{Deserialize, Serialize};

/// Platform role carried on the caller's identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    Admin,
    Teacher,
    Student,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Teacher => "teacher",
            Role::Student => "student",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "admin" => Role::Admin,
            "teacher" => Role::Teacher,
            _ => Role::Student,
        }
    }

    /// Coarse permission tier governing which policy branch applies.
    pub fn class(&self) -> RoleClass {
        match self {
            Role::Admin | Role::Teacher => RoleClass::Elevated,
            Role::Student => RoleClass::Restricted,
        }
    }
}

/// Coarse permission tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoleClass {
    Elevated,
    Restricted,
}

/// Caller identity supplied by the authentication boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identity {
    pub id: String,
    pub username: String,
    pub role: Role,
    pub display_name: String,
}

impl Identity {
    pub fn new(id: impl Into<String>, username: impl Into<String>, role: Role) -> Self {
        let username = username.into();
        Self {
            id: id.into(),
            display_name: username.clone(),
            username,
            role,
        }
    }
}

/// Process-wide, read-only query policy. Evaluated identically regardless of
/// which model produced the candidate; never relaxed by attempt count.
#[derive(Debug, Clone)]
pub struct SecurityPolicy {
    /// Read operations an elevated caller may invoke.
    pub elevated_operations: &'static [&'static str],
    /// Read operations a restricted caller may invoke.
    pub restricted_operations: &'static [&'static str],
    /// Call shapes that are always rejected, any role.
    pub blocked_call_shapes: &'static [&'static str],
    /// Operations that must declare an explicit field projection.
    pub projection_required_shapes: &'static [&'static str],
    /// Case-insensitive field-name fragments that must never appear.
    pub sensitive_fragments: &'static [&'static str],
}

pub const ALLOWED_OPERATIONS: &[&str] = &[
    "findMany",
    "findFirst",
    "findUnique",
    "count",
    "aggregate",
    "groupBy",
];

pub const BLOCKED_CALL_SHAPES: &[&str] = &[
    ".create(",
    ".createMany(",
    ".update(",
    ".updateMany(",
    ".delete(",
    ".deleteMany(",
    ".upsert(",
    ".executeRaw(",
    ".queryRaw(",
];

pub const PROJECTION_REQUIRED_SHAPES: &[&str] = &[".findMany(", ".findFirst(", ".findUnique("];

pub const SENSITIVE_FRAGMENTS: &[&str] = &[
    "password",
    "access_token",
    "accesstoken",
    "refresh_token",
    "refreshtoken",
    "id_token",
    "idtoken",
    "token_type",
    "auth",
    "p256dh",
    "secret",
    "key",
    "otp",
];

impl SecurityPolicy {
    pub fn new() -> Self {
        Self {
            elevated_operations: ALLOWED_OPERATIONS,
            restricted_operations: ALLOWED_OPERATIONS,
            blocked_call_shapes: BLOCKED_CALL_SHAPES,
            projection_required_shapes: PROJECTION_REQUIRED_SHAPES,
            sensitive_fragments: SENSITIVE_FRAGMENTS,
        }
    }

    /// The read operations permitted for a role class.
    pub fn operations_for(&self, class: RoleClass) -> &'static [&'static str] {
        match class {
            RoleClass::Elevated => self.elevated_operations,
            RoleClass::Restricted => self.restricted_operations,
        }
    }
}

impl Default for SecurityPolicy {
    fn default() -> Self {
        Self::new()
    }
}
