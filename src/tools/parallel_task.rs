//! General-purpose federated task with a caller-chosen strategy.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{Tool, ToolContext, ToolResult};
use crate::error::FederationError;
use crate::federation::Federation;
use crate::task::{AgentKind, AggregationStrategy, StrategyKind, TaskDefinition};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ParallelTaskArgs {
    title: String,
    description: String,
    code_agent_prompt: Option<String>,
    analysis_agent_prompt: Option<String>,
    #[serde(default)]
    aggregation_strategy: AggregationStrategy,
    #[serde(default)]
    execution_strategy: StrategyKind,
    fallback_strategy: Option<AgentKind>,
    #[serde(default)]
    sandbox: bool,
    code_model: Option<String>,
    analysis_model: Option<String>,
}

/// Send prompts to one or both backends under any strategy.
pub struct ParallelTask {
    federation: Arc<Federation>,
}

impl ParallelTask {
    pub fn new(federation: Arc<Federation>) -> Self {
        Self { federation }
    }
}

#[async_trait]
impl Tool for ParallelTask {
    fn name(&self) -> &str {
        "parallel_task"
    }

    fn description(&self) -> &str {
        "Run a task on the code agent and/or the analysis agent. Choose the execution strategy \
         (parallel, fallback or sequential) and how results are aggregated."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "title": { "type": "string", "minLength": 1, "description": "Short task title" },
                "description": { "type": "string", "description": "What the task is about" },
                "codeAgentPrompt": { "type": "string", "description": "Prompt for the code agent" },
                "analysisAgentPrompt": {
                    "type": "string",
                    "description": "Prompt for the analysis agent"
                },
                "aggregationStrategy": {
                    "type": "string",
                    "enum": ["merge", "prioritize_code", "prioritize_analysis", "custom"],
                    "default": "merge"
                },
                "executionStrategy": {
                    "type": "string",
                    "enum": ["parallel", "fallback", "sequential"],
                    "default": "parallel"
                },
                "fallbackStrategy": {
                    "type": "string",
                    "enum": ["code", "analysis"],
                    "description": "Primary agent for the fallback strategy (default: code)"
                },
                "sandbox": { "type": "boolean", "default": false },
                "codeModel": { "type": "string" },
                "analysisModel": { "type": "string" }
            },
            "required": ["title", "description"]
        })
    }

    async fn handle(&self, args: Value, _ctx: &ToolContext) -> Result<ToolResult, FederationError> {
        let args: ParallelTaskArgs = serde_json::from_value(args).map_err(|e| {
            let error = json!({ "path": "", "message": e.to_string() });
            FederationError::invalid_input(self.name(), vec![error])
        })?;

        let mut task = TaskDefinition::new("parallel_task", args.title, args.description)
            .with_parallel(args.execution_strategy == StrategyKind::Parallel)
            .with_aggregation(args.aggregation_strategy)
            .with_sandbox(args.sandbox)
            .with_model(AgentKind::Code, args.code_model)
            .with_model(AgentKind::Analysis, args.analysis_model);
        if let Some(prompt) = args.code_agent_prompt {
            task = task.with_code_prompt(prompt);
        }
        if let Some(prompt) = args.analysis_agent_prompt {
            task = task.with_analysis_prompt(prompt);
        }
        if let Some(primary) = args.fallback_strategy {
            task = task.with_fallback(primary);
        }

        let result = self.federation.run(args.execution_strategy, &task).await?;

        Ok(ToolResult::from_strategy(
            &result,
            json!({
                "title": task.title,
                "strategyUsed": result.strategy_used,
                "aggregatedResult": result.aggregated_result,
                "codeResult": result.code_result,
                "analysisResult": result.analysis_result,
                "executionTimeMs": result.execution_time_ms,
            }),
        ))
    }
}
