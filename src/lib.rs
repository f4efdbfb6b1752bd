//! Natural-language data assistant for a learning platform.
//!
//! A caller-authenticated user asks a question in plain language; the
//! pipeline synthesizes a constrained read-only query via an upstream model,
//! validates it against a security policy, executes it through an opaque
//! data-access capability with bounded self-correction, and renders the
//! result as a natural-language answer.

pub mod config;
pub mod context;
pub mod correction;
pub mod error;
pub mod executor;
pub mod gateway;
pub mod interpreter;
pub mod observability;
pub mod pipeline;
pub mod query_ir;
pub mod schema;
pub mod security;
pub mod synthesizer;

pub use config::{AssistantConfig, GatewayConfig};
pub use error::{AssistantError, Result};
pub use pipeline::{Assistant, AssistantReply, AssistantRequest};
pub use security::policy::{Identity, Role, RoleClass};
