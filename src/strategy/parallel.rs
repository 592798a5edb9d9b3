use std::time::Instant;

use async_trait::async_trait;
use tracing::info;

use super::{aggregate, ExecutionStrategy, StrategySettings};
use crate::backend::AgentSet;
use crate::error::FederationError;
use crate::task::{AgentKind, ParallelTaskResult, StrategyKind, TaskDefinition, TaskResult};

/// Runs every defined prompt concurrently and waits for all of them.
pub struct ParallelStrategy;

#[async_trait]
impl ExecutionStrategy for ParallelStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Parallel
    }

    async fn execute(
        &self,
        task: &TaskDefinition,
        agents: &AgentSet,
        settings: &StrategySettings,
    ) -> Result<ParallelTaskResult, FederationError> {
        let started = Instant::now();
        info!("Running '{}' in parallel", task.title);

        let (code_result, analysis_result) = tokio::join!(
            run_if_defined(task, agents, settings, AgentKind::Code),
            run_if_defined(task, agents, settings, AgentKind::Analysis),
        );

        let aggregated_result = aggregate(
            task.aggregation_strategy,
            code_result.as_ref(),
            analysis_result.as_ref(),
        );

        Ok(ParallelTaskResult {
            code_result,
            analysis_result,
            aggregated_result,
            execution_time_ms: crate::util::millis(started.elapsed()),
            strategy_used: StrategyKind::Parallel,
        })
    }
}

async fn run_if_defined(
    task: &TaskDefinition,
    agents: &AgentSet,
    settings: &StrategySettings,
    kind: AgentKind,
) -> Option<TaskResult> {
    let prompt = task.prompt_for(kind)?;
    let result = agents
        .execute(kind, prompt, &task.options_for(kind), settings.parallel_timeout_for(kind))
        .await;
    Some(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::test_support::{agents, ScriptedAgent};
    use serde_json::json;
    use std::time::Duration;

    fn settings() -> StrategySettings {
        StrategySettings {
            code_timeout: Duration::from_millis(500),
            analysis_timeout: Duration::from_millis(500),
            parallel_timeout: Duration::from_millis(20),
            fallback_enabled: true,
        }
    }

    #[tokio::test]
    async fn test_partial_failure_waits_for_both() {
        let code = ScriptedAgent::build(AgentKind::Code, Ok(json!("A")), Duration::from_millis(10));
        let analysis = ScriptedAgent::build(
            AgentKind::Analysis,
            Ok(json!("B")),
            Duration::from_millis(200),
        );
        let task = TaskDefinition::new("parallel", "T", "D")
            .with_code_prompt("do X")
            .with_analysis_prompt("analyze Y");

        let result = ParallelStrategy
            .execute(&task, &agents(&code, &analysis), &settings())
            .await
            .unwrap();

        assert!(result.succeeded(AgentKind::Code));
        assert!(!result.succeeded(AgentKind::Analysis));
        assert_eq!(result.aggregated_result["code"], "A");
        assert_eq!(result.aggregated_result["summary"]["status"], "partial_success");
        assert!(result.aggregated_result["analysis"]["error"].is_string());
        assert_eq!(result.strategy_used, StrategyKind::Parallel);
    }

    #[tokio::test]
    async fn test_only_defined_prompts_run() {
        let code = ScriptedAgent::ok(AgentKind::Code, json!("A"));
        let analysis = ScriptedAgent::ok(AgentKind::Analysis, json!("B"));
        let task = TaskDefinition::new("parallel", "T", "D").with_code_prompt("do X");

        let result = ParallelStrategy
            .execute(&task, &agents(&code, &analysis), &settings())
            .await
            .unwrap();

        assert_eq!(code.calls(), 1);
        assert_eq!(analysis.calls(), 0);
        assert!(result.analysis_result.is_none());
    }

    #[tokio::test]
    async fn test_no_prompts_yields_explicit_error_value() {
        let code = ScriptedAgent::ok(AgentKind::Code, json!("A"));
        let analysis = ScriptedAgent::ok(AgentKind::Analysis, json!("B"));
        let task = TaskDefinition::new("parallel", "T", "D");

        let result = ParallelStrategy
            .execute(&task, &agents(&code, &analysis), &settings())
            .await
            .unwrap();

        assert_eq!(result.aggregated_result, json!({"error": "No results from either agent"}));
        assert!(!result.any_success());
    }
}
