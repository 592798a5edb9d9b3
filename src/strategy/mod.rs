//! Execution strategies - how one task is spread over the two backends.
//!
//! # Strategies
//! - **ParallelStrategy**: both prompts at once, wait for every call to settle
//! - **FallbackStrategy**: primary backend first, secondary only when it fails
//! - **SequentialStrategy**: analysis first, its output feeds the code prompt
//!
//! # Invariants
//! - A failed backend call never becomes an `Err`; strategies always return a
//!   well-formed `ParallelTaskResult` and leave the success decision to the caller
//! - Strategies hold no per-call state and may be shared across concurrent calls

mod aggregate;
mod fallback;
mod parallel;
mod sequential;

pub use aggregate::aggregate;
pub use fallback::FallbackStrategy;
pub use parallel::ParallelStrategy;
pub use sequential::SequentialStrategy;

pub use crate::config::StrategySettings;

use async_trait::async_trait;

use crate::backend::AgentSet;
use crate::error::FederationError;
use crate::task::{ParallelTaskResult, StrategyKind, TaskDefinition};

#[async_trait]
pub trait ExecutionStrategy: Send + Sync {
    fn kind(&self) -> StrategyKind;

    /// Run `task` against `agents`.
    ///
    /// # Errors
    /// Only for tasks that cannot run at all (no prompt for the chosen path).
    async fn execute(
        &self,
        task: &TaskDefinition,
        agents: &AgentSet,
        settings: &StrategySettings,
    ) -> Result<ParallelTaskResult, FederationError>;
}

/// The strategy implementing `kind`.
pub fn strategy_for(kind: StrategyKind) -> &'static dyn ExecutionStrategy {
    match kind {
        StrategyKind::Parallel => &ParallelStrategy,
        StrategyKind::Fallback => &FallbackStrategy,
        StrategyKind::Sequential => &SequentialStrategy,
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    //! Scripted backends shared by the strategy tests.

    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;
    use serde_json::Value;

    use crate::backend::{AgentManager, AgentOptions, AgentSet};
    use crate::task::{AgentKind, TaskResult};

    pub struct ScriptedAgent {
        pub kind: AgentKind,
        pub reply: Result<Value, String>,
        pub delay: Duration,
        pub prompts: Mutex<Vec<String>>,
    }

    impl ScriptedAgent {
        pub fn ok(kind: AgentKind, data: Value) -> Arc<Self> {
            Self::build(kind, Ok(data), Duration::ZERO)
        }

        pub fn failing(kind: AgentKind, error: &str) -> Arc<Self> {
            Self::build(kind, Err(error.to_string()), Duration::ZERO)
        }

        pub fn build(kind: AgentKind, reply: Result<Value, String>, delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                kind,
                reply,
                delay,
                prompts: Mutex::new(Vec::new()),
            })
        }

        pub fn calls(&self) -> usize {
            self.prompts.lock().unwrap().len()
        }

        pub fn last_prompt(&self) -> Option<String> {
            self.prompts.lock().unwrap().last().cloned()
        }
    }

    #[async_trait]
    impl AgentManager for ScriptedAgent {
        fn kind(&self) -> AgentKind {
            self.kind
        }

        fn name(&self) -> &str {
            self.kind.as_str()
        }

        async fn execute_task(
            &self,
            prompt: &str,
            _options: &AgentOptions,
            timeout: Duration,
        ) -> TaskResult {
            self.prompts.lock().unwrap().push(prompt.to_string());
            if self.delay > timeout {
                tokio::time::sleep(timeout).await;
                let message = format!(
                    "Timeout: {} agent did not respond within {}ms",
                    self.kind,
                    timeout.as_millis()
                );
                return TaskResult::failure(self.kind, message, timeout);
            }
            tokio::time::sleep(self.delay).await;
            match &self.reply {
                Ok(data) => TaskResult::success(self.kind, data.clone(), self.delay),
                Err(e) => TaskResult::failure(self.kind, e.clone(), self.delay),
            }
        }
    }

    pub fn agents(code: &Arc<ScriptedAgent>, analysis: &Arc<ScriptedAgent>) -> AgentSet {
        let code: Arc<dyn AgentManager> = code.clone();
        let analysis: Arc<dyn AgentManager> = analysis.clone();
        AgentSet::new(Some(code), Some(analysis))
    }
}
