use std::time::Instant;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{info, warn};

use super::{ExecutionStrategy, StrategySettings};
use crate::backend::AgentSet;
use crate::error::FederationError;
use crate::task::{AgentKind, ParallelTaskResult, StrategyKind, TaskDefinition, TaskResult};

/// Calls the primary backend; the secondary runs only when the primary fails,
/// fallback is enabled and the task has a prompt for it.
pub struct FallbackStrategy;

#[async_trait]
impl ExecutionStrategy for FallbackStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Fallback
    }

    async fn execute(
        &self,
        task: &TaskDefinition,
        agents: &AgentSet,
        settings: &StrategySettings,
    ) -> Result<ParallelTaskResult, FederationError> {
        let started = Instant::now();
        let preferred = task.fallback_strategy.unwrap_or(AgentKind::Code);

        // A missing primary prompt promotes the secondary to sole call.
        let primary = match (task.prompt_for(preferred), task.prompt_for(preferred.other())) {
            (Some(_), _) => preferred,
            (None, Some(_)) => preferred.other(),
            (None, None) => {
                return Err(FederationError::configuration(format!(
                    "Task '{}' defines no prompt for fallback execution",
                    task.title
                ))
                .with_context("primary", preferred.as_str()));
            }
        };
        let secondary = primary.other();

        let primary_result = call(task, agents, settings, primary).await;

        let secondary_result = if primary_result.success || primary != preferred {
            None
        } else if !settings.fallback_enabled {
            info!("{} agent failed and fallback is disabled", primary);
            None
        } else if task.prompt_for(secondary).is_none() {
            None
        } else {
            warn!(
                "{} agent failed ({}), falling back to {} agent",
                primary,
                primary_result.error_message(),
                secondary
            );
            Some(call(task, agents, settings, secondary).await)
        };

        let aggregated_result = match &secondary_result {
            Some(r) if r.success => r.data.clone().unwrap_or(Value::Null),
            _ => primary_result.data.clone().unwrap_or(Value::Null),
        };

        let (code_result, analysis_result) = match primary {
            AgentKind::Code => (Some(primary_result), secondary_result),
            AgentKind::Analysis => (secondary_result, Some(primary_result)),
        };

        Ok(ParallelTaskResult {
            code_result,
            analysis_result,
            aggregated_result,
            execution_time_ms: crate::util::millis(started.elapsed()),
            strategy_used: StrategyKind::Fallback,
        })
    }
}

async fn call(
    task: &TaskDefinition,
    agents: &AgentSet,
    settings: &StrategySettings,
    kind: AgentKind,
) -> TaskResult {
    let prompt = task.prompt_for(kind).unwrap_or_default();
    agents
        .execute(kind, prompt, &task.options_for(kind), settings.timeout_for(kind))
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::strategy::test_support::{agents, ScriptedAgent};
    use serde_json::json;

    fn settings(fallback_enabled: bool) -> StrategySettings {
        StrategySettings {
            fallback_enabled,
            ..StrategySettings::default()
        }
    }

    fn task() -> TaskDefinition {
        TaskDefinition::new("optimize", "T", "D")
            .with_code_prompt("optimize")
            .with_analysis_prompt("profile")
            .with_fallback(AgentKind::Code)
    }

    #[tokio::test]
    async fn test_disabled_fallback_never_calls_secondary() {
        let code = ScriptedAgent::failing(AgentKind::Code, "exit 1");
        let analysis = ScriptedAgent::ok(AgentKind::Analysis, json!("B"));

        let result = FallbackStrategy
            .execute(&task(), &agents(&code, &analysis), &settings(false))
            .await
            .unwrap();

        assert_eq!(code.calls(), 1);
        assert_eq!(analysis.calls(), 0);
        assert!(result.analysis_result.is_none());
        assert_eq!(result.aggregated_result, Value::Null);
        assert_eq!(result.strategy_used, StrategyKind::Fallback);
    }

    #[tokio::test]
    async fn test_secondary_runs_after_primary_failure() {
        let code = ScriptedAgent::failing(AgentKind::Code, "exit 1");
        let analysis = ScriptedAgent::ok(AgentKind::Analysis, json!("B"));

        let result = FallbackStrategy
            .execute(&task(), &agents(&code, &analysis), &settings(true))
            .await
            .unwrap();

        assert_eq!(analysis.calls(), 1);
        assert_eq!(result.aggregated_result, json!("B"));
        assert!(!result.succeeded(AgentKind::Code));
    }

    #[tokio::test]
    async fn test_primary_success_skips_secondary() {
        let code = ScriptedAgent::ok(AgentKind::Code, json!("A"));
        let analysis = ScriptedAgent::ok(AgentKind::Analysis, json!("B"));

        let result = FallbackStrategy
            .execute(&task(), &agents(&code, &analysis), &settings(true))
            .await
            .unwrap();

        assert_eq!(analysis.calls(), 0);
        assert_eq!(result.aggregated_result, json!("A"));
    }

    #[tokio::test]
    async fn test_missing_primary_prompt_runs_secondary_alone() {
        let code = ScriptedAgent::ok(AgentKind::Code, json!("A"));
        let analysis = ScriptedAgent::ok(AgentKind::Analysis, json!("B"));
        let task = TaskDefinition::new("optimize", "T", "D").with_analysis_prompt("profile");

        let result = FallbackStrategy
            .execute(&task, &agents(&code, &analysis), &settings(true))
            .await
            .unwrap();

        assert_eq!(code.calls(), 0);
        assert_eq!(result.aggregated_result, json!("B"));
    }

    #[tokio::test]
    async fn test_no_prompts_is_configuration_error() {
        let code = ScriptedAgent::ok(AgentKind::Code, json!("A"));
        let analysis = ScriptedAgent::ok(AgentKind::Analysis, json!("B"));
        let task = TaskDefinition::new("optimize", "T", "D");

        let err = FallbackStrategy
            .execute(&task, &agents(&code, &analysis), &settings(true))
            .await
            .unwrap_err();

        assert_eq!(err.kind, ErrorKind::Configuration);
        assert!(!err.retryable);
    }
}
