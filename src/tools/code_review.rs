//! Dual review: the analysis agent reviews while the code agent proposes fixes.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{fenced, opt_str_arg, str_arg, succeeded_backends, Tool, ToolContext, ToolResult};
use crate::error::FederationError;
use crate::federation::Federation;
use crate::task::{AggregationStrategy, StrategyKind, TaskDefinition};

pub struct CodeReview {
    federation: Arc<Federation>,
}

impl CodeReview {
    pub fn new(federation: Arc<Federation>) -> Self {
        Self { federation }
    }
}

#[async_trait]
impl Tool for CodeReview {
    fn name(&self) -> &str {
        "code_review"
    }

    fn description(&self) -> &str {
        "Review code with both agents in parallel: the analysis agent reports issues, \
         the code agent proposes concrete fixes."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "code": { "type": "string", "minLength": 1, "description": "The code to review" },
                "language": { "type": "string", "description": "Programming language of the code" },
                "focus": {
                    "type": "string",
                    "description": "Optional: what to focus on (e.g. security, performance)"
                },
                "context": { "type": "string", "description": "Optional: background on the code" }
            },
            "required": ["code"]
        })
    }

    async fn handle(&self, args: Value, _ctx: &ToolContext) -> Result<ToolResult, FederationError> {
        let code = str_arg(&args, "code");
        let language = opt_str_arg(&args, "language");
        let focus = opt_str_arg(&args, "focus")
            .map(|f| format!(" Focus on: {}.", f))
            .unwrap_or_default();
        let context = opt_str_arg(&args, "context")
            .map(|c| format!("\n\nContext: {}", c))
            .unwrap_or_default();
        let block = fenced(code, language.as_deref());

        let task = TaskDefinition::new(
            "code_review",
            "Code review",
            format!("Review of {} code", language.as_deref().unwrap_or("unspecified")),
        )
        .with_parallel(true)
        .with_aggregation(AggregationStrategy::Merge)
        .with_analysis_prompt(format!(
            "Review the following code. Report bugs, security issues and maintainability problems, \
             ordered by severity.{}{}\n\n{}",
            focus, context, block
        ))
        .with_code_prompt(format!(
            "Propose concrete fixes for any problems in the following code. \
             Return the corrected code and a short note per change.{}{}\n\n{}",
            focus, context, block
        ));

        let result = self.federation.run(StrategyKind::Parallel, &task).await?;
        let aggregated = &result.aggregated_result;

        Ok(ToolResult::from_strategy(
            &result,
            json!({
                "review": aggregated["analysis"],
                "fixes": aggregated["code"],
                "validation": {
                    "status": aggregated["summary"]["status"],
                    "reviewers": succeeded_backends(&result),
                },
                "executionTimeMs": result.execution_time_ms,
            }),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StrategySettings;
    use crate::strategy::test_support::{agents, ScriptedAgent};
    use crate::task::AgentKind;

    #[tokio::test]
    async fn test_review_with_one_failed_reviewer() {
        let code = ScriptedAgent::failing(AgentKind::Code, "exit 1");
        let analysis = ScriptedAgent::ok(AgentKind::Analysis, json!("looks fine"));
        let federation = Arc::new(Federation::new(
            agents(&code, &analysis),
            StrategySettings::default(),
        ));

        let result = CodeReview::new(federation)
            .handle(json!({"code": "fn main() {}", "language": "rust"}), &ToolContext::generate())
            .await
            .unwrap();

        assert!(result.success);
        assert_eq!(result.get("review"), Some(&json!("looks fine")));
        assert_eq!(result.payload["validation"]["status"], "partial_success");
        assert_eq!(result.payload["validation"]["reviewers"], json!(["analysis"]));
        assert!(code.last_prompt().unwrap().contains("```rust\nfn main() {}\n```"));
    }
}
