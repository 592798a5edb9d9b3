//! Performance optimization with the code agent, falling back to analysis.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{fenced, opt_str_arg, str_arg, Tool, ToolContext, ToolResult};
use crate::error::FederationError;
use crate::federation::Federation;
use crate::task::{AgentKind, ParallelTaskResult, StrategyKind, TaskDefinition};

pub struct OptimizePerformance {
    federation: Arc<Federation>,
}

impl OptimizePerformance {
    pub fn new(federation: Arc<Federation>) -> Self {
        Self { federation }
    }
}

#[async_trait]
impl Tool for OptimizePerformance {
    fn name(&self) -> &str {
        "optimize_performance"
    }

    fn description(&self) -> &str {
        "Optimize code for performance. The code agent rewrites the code; if it fails, \
         the analysis agent suggests optimizations instead."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "code": { "type": "string", "minLength": 1, "description": "The code to optimize" },
                "language": { "type": "string" },
                "goals": {
                    "type": "string",
                    "description": "Optional: what to optimize for (latency, memory, throughput)"
                }
            },
            "required": ["code"]
        })
    }

    async fn handle(&self, args: Value, _ctx: &ToolContext) -> Result<ToolResult, FederationError> {
        let code = str_arg(&args, "code");
        let language = opt_str_arg(&args, "language");
        let goals = opt_str_arg(&args, "goals")
            .map(|g| format!(" Optimize for: {}.", g))
            .unwrap_or_default();
        let block = fenced(code, language.as_deref());

        let task = TaskDefinition::new(
            "optimize_performance",
            "Optimize performance",
            "Performance optimization",
        )
        .with_fallback(AgentKind::Code)
        .with_code_prompt(format!(
            "Rewrite the following code for better performance without changing its behavior. \
             List each optimization and its expected impact.{}\n\n{}",
            goals, block
        ))
        .with_analysis_prompt(format!(
            "Identify performance bottlenecks in the following code and suggest optimizations, \
             most impactful first.{}\n\n{}",
            goals, block
        ));

        let result = self.federation.run(StrategyKind::Fallback, &task).await?;
        let fallback_used = result.code_result.is_some() && result.analysis_result.is_some();

        Ok(ToolResult::from_strategy(
            &result,
            json!({
                "optimizations": result.aggregated_result,
                "performance": {
                    "source": data_source(&result),
                    "executionTimeMs": result.execution_time_ms,
                    "fallbackUsed": fallback_used,
                },
            }),
        ))
    }
}

/// Backend whose data ended up in `optimizations`.
fn data_source(result: &ParallelTaskResult) -> Option<&'static str> {
    let code_failed = result.code_result.as_ref().map_or(true, |r| !r.success);
    if result.succeeded(AgentKind::Analysis) && code_failed {
        Some(AgentKind::Analysis.as_str())
    } else if result.succeeded(AgentKind::Code) {
        Some(AgentKind::Code.as_str())
    } else {
        None
    }
}
