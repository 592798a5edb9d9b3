//! Diagnose with the analysis agent, then fix with the code agent.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{fenced, opt_str_arg, str_arg, Tool, ToolContext, ToolResult};
use crate::error::FederationError;
use crate::federation::Federation;
use crate::task::{StrategyKind, TaskDefinition};

pub struct DebugIssue {
    federation: Arc<Federation>,
}

impl DebugIssue {
    pub fn new(federation: Arc<Federation>) -> Self {
        Self { federation }
    }
}

#[async_trait]
impl Tool for DebugIssue {
    fn name(&self) -> &str {
        "debug_issue"
    }

    fn description(&self) -> &str {
        "Debug an issue in two steps: the analysis agent diagnoses the root cause, \
         then the code agent writes a fix using that diagnosis."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "error": {
                    "type": "string",
                    "minLength": 1,
                    "description": "Error message or symptom"
                },
                "code": {
                    "type": "string",
                    "description": "Optional: the code where the issue occurs"
                },
                "language": { "type": "string" },
                "context": {
                    "type": "string",
                    "description": "Optional: steps to reproduce, environment"
                }
            },
            "required": ["error"]
        })
    }

    async fn handle(&self, args: Value, _ctx: &ToolContext) -> Result<ToolResult, FederationError> {
        let error = str_arg(&args, "error");
        let language = opt_str_arg(&args, "language");
        let code = opt_str_arg(&args, "code")
            .map(|c| format!("\n\nCode:\n{}", fenced(&c, language.as_deref())))
            .unwrap_or_default();
        let context = opt_str_arg(&args, "context")
            .map(|c| format!("\n\nContext: {}", c))
            .unwrap_or_default();

        let task = TaskDefinition::new("debug_issue", "Debug issue", error.to_string())
            .with_analysis_prompt(format!(
                "Diagnose the root cause of this issue. Explain what fails and why.\n\n\
                 Error: {}{}{}",
                error, code, context
            ))
            .with_code_prompt(format!(
                "Write a fix for this issue and explain the change.\n\nError: {}{}{}",
                error, code, context
            ));

        let result = self.federation.run(StrategyKind::Sequential, &task).await?;
        let aggregated = &result.aggregated_result;

        Ok(ToolResult::from_strategy(
            &result,
            json!({
                "diagnosis": aggregated["analysis"],
                "fixes": aggregated["implementation"],
                "workflow": aggregated["workflow"],
                "executionTimeMs": result.execution_time_ms,
            }),
        ))
    }
}
