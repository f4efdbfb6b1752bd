//! Sandboxed Executor
//!
//! Dispatches a validated query against the data-access capability. The
//! capability is the only handle the query ever touches; every failure it
//! raises is converted to an execution error, never propagated raw.

use crate::error::{AssistantError, Result};
use crate::query_ir::{Operation, QueryIr};
use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

/// Read-only query capability over named record collections. Implementations
/// must expose no mutation operations and must fail on malformed filters or
/// projections rather than silently returning wrong data.
#[async_trait]
pub trait DataAccess: Send + Sync {
    async fn find_many(&self, collection: &str, args: &Value) -> Result<Value>;
    async fn find_first(&self, collection: &str, args: &Value) -> Result<Value>;
    async fn find_unique(&self, collection: &str, args: &Value) -> Result<Value>;
    async fn count(&self, collection: &str, args: &Value) -> Result<Value>;
    async fn aggregate(&self, collection: &str, args: &Value) -> Result<Value>;
    async fn group_by(&self, collection: &str, args: &Value) -> Result<Value>;
}

/// Execute a validated query. Does not retry; regeneration on failure is the
/// correction loop's responsibility.
pub async fn execute(ir: &QueryIr, data: &dyn DataAccess) -> Result<Value> {
    debug!(collection = %ir.collection, op = ir.operation.as_str(), "executing query");

    let args = Value::Object(ir.args.clone());
    let outcome = match ir.operation {
        Operation::FindMany => data.find_many(&ir.collection, &args).await,
        Operation::FindFirst => data.find_first(&ir.collection, &args).await,
        Operation::FindUnique => data.find_unique(&ir.collection, &args).await,
        Operation::Count => data.count(&ir.collection, &args).await,
        Operation::Aggregate => data.aggregate(&ir.collection, &args).await,
        Operation::GroupBy => data.group_by(&ir.collection, &args).await,
    };

    outcome.map_err(|e| match e {
        AssistantError::Execution(message) => AssistantError::Execution(message),
        other => AssistantError::Execution(other.to_string()),
    })
}
