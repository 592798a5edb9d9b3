use std::time::Instant;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{info, warn};

use super::{ExecutionStrategy, StrategySettings};
use crate::backend::AgentSet;
use crate::error::FederationError;
use crate::task::{AgentKind, ParallelTaskResult, StrategyKind, TaskDefinition, TaskResult};

/// Analyze, then implement: successful analysis output is appended to the
/// code prompt.
pub struct SequentialStrategy;

#[async_trait]
impl ExecutionStrategy for SequentialStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Sequential
    }

    async fn execute(
        &self,
        task: &TaskDefinition,
        agents: &AgentSet,
        settings: &StrategySettings,
    ) -> Result<ParallelTaskResult, FederationError> {
        let started = Instant::now();

        let analysis_result = match task.prompt_for(AgentKind::Analysis) {
            Some(prompt) => Some(run(task, agents, settings, AgentKind::Analysis, prompt).await),
            None => None,
        };

        let code_result = match task.prompt_for(AgentKind::Code) {
            Some(prompt) => {
                let prompt = with_analysis_context(prompt, analysis_result.as_ref());
                Some(run(task, agents, settings, AgentKind::Code, &prompt).await)
            }
            None => None,
        };

        let aggregated_result = json!({
            "analysis": data_of(analysis_result.as_ref()),
            "implementation": data_of(code_result.as_ref()),
            "workflow": "sequential",
        });

        Ok(ParallelTaskResult {
            code_result,
            analysis_result,
            aggregated_result,
            execution_time_ms: crate::util::millis(started.elapsed()),
            strategy_used: StrategyKind::Sequential,
        })
    }
}

async fn run(
    task: &TaskDefinition,
    agents: &AgentSet,
    settings: &StrategySettings,
    kind: AgentKind,
    prompt: &str,
) -> TaskResult {
    info!("Sequential step: {} agent", kind);
    agents
        .execute(kind, prompt, &task.options_for(kind), settings.timeout_for(kind))
        .await
}

fn with_analysis_context(prompt: &str, analysis: Option<&TaskResult>) -> String {
    let Some(data) = analysis.filter(|r| r.success).and_then(|r| r.data.as_ref()) else {
        if analysis.is_some() {
            warn!("Analysis failed; code agent runs without analysis context");
        }
        return prompt.to_string();
    };
    let serialized = match data {
        Value::String(s) => s.clone(),
        other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
    };
    format!("{}\n\nAnalysis context:\n{}", prompt, serialized)
}

fn data_of(result: Option<&TaskResult>) -> Value {
    result.and_then(|r| r.data.clone()).unwrap_or(Value::Null)
}
