//! The federated backend pair and the settings strategies run under.

use std::sync::Arc;

use serde_json::{json, Value};
use tracing::info;

use crate::backend::{AgentManager, AgentSet, CliAgent};
use crate::config::{Config, StrategySettings};
use crate::error::FederationError;
use crate::strategy::strategy_for;
use crate::task::{AgentKind, ParallelTaskResult, StrategyKind, TaskDefinition};

/// Shared by every tool handler; holds no per-call state.
pub struct Federation {
    agents: AgentSet,
    settings: StrategySettings,
}

impl Federation {
    pub fn new(agents: AgentSet, settings: StrategySettings) -> Self {
        Self { agents, settings }
    }

    /// Build the CLI backends described by `config` and keep the ones that
    /// answer a ping.
    ///
    /// # Errors
    /// `AgentUnavailable` when neither backend answers.
    pub async fn connect(config: &Config) -> Result<Self, FederationError> {
        let code: Arc<dyn AgentManager> =
            Arc::new(CliAgent::new(AgentKind::Code, config.code_agent.clone()));
        let analysis: Arc<dyn AgentManager> =
            Arc::new(CliAgent::new(AgentKind::Analysis, config.analysis_agent.clone()));

        info!(
            "Probing backends ({} attempts, {}ms timeout)",
            config.ping_attempts,
            config.ping_timeout.as_millis()
        );
        let agents =
            AgentSet::probe(code, analysis, config.ping_timeout, config.ping_attempts).await?;
        Ok(Self::new(agents, config.strategy.clone()))
    }

    pub fn agents(&self) -> &AgentSet {
        &self.agents
    }

    pub fn settings(&self) -> &StrategySettings {
        &self.settings
    }

    /// Run `task` with the `kind` strategy.
    pub async fn run(
        &self,
        kind: StrategyKind,
        task: &TaskDefinition,
    ) -> Result<ParallelTaskResult, FederationError> {
        info!("Executing '{}' ({}) with {} strategy", task.title, task.task_type, kind);
        strategy_for(kind).execute(task, &self.agents, &self.settings).await
    }

    /// Availability and timeout summary for status reporting.
    pub fn status(&self) -> Value {
        json!({
            "agents": {
                "code": self.agents.is_available(AgentKind::Code),
                "analysis": self.agents.is_available(AgentKind::Analysis),
            },
            "fallbackEnabled": self.settings.fallback_enabled,
            "timeouts": {
                "codeMs": crate::util::millis(self.settings.code_timeout),
                "analysisMs": crate::util::millis(self.settings.analysis_timeout),
                "parallelMs": crate::util::millis(self.settings.parallel_timeout),
            },
        })
    }
}
