//! Tool system for the federation service.
//!
//! Every tool declares a JSON Schema for its arguments, turns a call into a
//! `TaskDefinition`, runs one execution strategy through the shared
//! [`Federation`](crate::federation::Federation) and shapes the response envelope.
//!
//! Calls go through [`ToolManager`], which sanitizes arguments, consults the
//! result cache and validates input before a handler runs.

mod agent_status;
mod code_review;
mod debug_issue;
mod manager;
mod optimize_performance;
mod parallel_task;

pub use agent_status::AgentStatus;
pub use code_review::CodeReview;
pub use debug_issue::DebugIssue;
pub use manager::ToolManager;
pub use optimize_performance::OptimizePerformance;
pub use parallel_task::ParallelTask;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::Span;

use crate::error::FederationError;
use crate::task::ParallelTaskResult;

/// Per-call context handed to every handler.
///
/// Carries the request's logging span instead of a process-wide logger: the
/// manager runs the handler inside `span`, so events from strategies and
/// backends are attributed to this request.
#[derive(Debug, Clone)]
pub struct ToolContext {
    pub request_id: String,
    pub span: Span,
}

impl ToolContext {
    pub fn new(request_id: impl Into<String>) -> Self {
        let request_id = request_id.into();
        let span = tracing::info_span!("request", request_id = %request_id);
        Self { request_id, span }
    }

    /// Context with a fresh random request id.
    pub fn generate() -> Self {
        Self::new(uuid::Uuid::new_v4().to_string())
    }
}

/// Success envelope: `{ success, ...payload }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub success: bool,
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

impl ToolResult {
    pub fn new(success: bool, payload: Value) -> Self {
        let payload = match payload {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                let mut map = Map::new();
                map.insert("result".to_string(), other);
                map
            }
        };
        Self { success, payload }
    }

    /// Envelope whose `success` is "at least one backend succeeded".
    pub fn from_strategy(result: &ParallelTaskResult, payload: Value) -> Self {
        Self::new(result.any_success(), payload)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.payload.get(key)
    }

    pub fn to_value(&self) -> Value {
        let mut map = self.payload.clone();
        map.insert("success".to_string(), Value::Bool(self.success));
        Value::Object(map)
    }
}

/// Listing entry for the transport layer.
#[derive(Debug, Clone, Serialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

/// A callable federation tool.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool.
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON Schema for the tool's arguments.
    fn input_schema(&self) -> Value;

    /// Run the tool. `args` are already sanitized and schema-valid.
    async fn handle(&self, args: Value, ctx: &ToolContext) -> Result<ToolResult, FederationError>;
}

/// Required string argument; the schema has already enforced presence.
pub(crate) fn str_arg<'a>(args: &'a Value, key: &str) -> &'a str {
    args[key].as_str().unwrap_or_default()
}

/// Optional non-blank string argument.
pub(crate) fn opt_str_arg(args: &Value, key: &str) -> Option<String> {
    args[key]
        .as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// `code` inside a markdown fence tagged with `language`.
pub(crate) fn fenced(code: &str, language: Option<&str>) -> String {
    format!("```{}\n{}\n```", language.unwrap_or_default(), code.trim_end())
}

/// Names of the backends whose call succeeded, in `code`, `analysis` order.
pub(crate) fn succeeded_backends(result: &ParallelTaskResult) -> Vec<&'static str> {
    use crate::task::AgentKind;
    [AgentKind::Code, AgentKind::Analysis]
        .into_iter()
        .filter(|kind| result.succeeded(*kind))
        .map(|kind| kind.as_str())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_fenced() {
        assert_eq!(fenced("fn main() {}\n", Some("rust")), "```rust\nfn main() {}\n```");
        assert_eq!(fenced("x", None), "```\nx\n```");
    }

    #[test]
    fn test_tool_result_flattens_payload() {
        let result = ToolResult::new(true, json!({"review": "ok"}));
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value, json!({"success": true, "review": "ok"}));
        assert_eq!(result.to_value(), value);
    }

    #[test]
    fn test_definition_wire_name() {
        let def = ToolDefinition {
            name: "t".to_string(),
            description: "d".to_string(),
            input_schema: json!({"type": "object"}),
        };
        let value = serde_json::to_value(&def).unwrap();
        assert!(value.get("inputSchema").is_some());
    }
}
