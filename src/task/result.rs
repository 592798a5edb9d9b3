//! Results of agent calls and of whole strategies.
//!
//! # Invariants
//! - A successful `TaskResult` has `error == None`
//! - A failed `TaskResult` has `data == None` and a non-empty `error`

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{AgentKind, StrategyKind};

/// Who produced a [`TaskResult`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultSource {
    Code,
    Analysis,
    /// Synthetic summary built by a strategy
    Parallel,
}

impl From<AgentKind> for ResultSource {
    fn from(kind: AgentKind) -> Self {
        match kind {
            AgentKind::Code => Self::Code,
            AgentKind::Analysis => Self::Analysis,
        }
    }
}

/// Outcome of exactly one agent call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub execution_time_ms: u64,
    pub source: ResultSource,
}

impl TaskResult {
    pub fn success(source: impl Into<ResultSource>, data: Value, elapsed: Duration) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            execution_time_ms: crate::util::millis(elapsed),
            source: source.into(),
        }
    }

    pub fn failure(
        source: impl Into<ResultSource>,
        error: impl Into<String>,
        elapsed: Duration,
    ) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
            execution_time_ms: crate::util::millis(elapsed),
            source: source.into(),
        }
    }

    /// Error text, or a generic message for failures without one.
    pub fn error_message(&self) -> &str {
        self.error.as_deref().unwrap_or("unknown error")
    }
}

/// The unit every execution strategy returns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParallelTaskResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_result: Option<TaskResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis_result: Option<TaskResult>,
    pub aggregated_result: Value,
    pub execution_time_ms: u64,
    pub strategy_used: StrategyKind,
}

impl ParallelTaskResult {
    pub fn result_for(&self, kind: AgentKind) -> Option<&TaskResult> {
        match kind {
            AgentKind::Code => self.code_result.as_ref(),
            AgentKind::Analysis => self.analysis_result.as_ref(),
        }
    }

    pub fn succeeded(&self, kind: AgentKind) -> bool {
        self.result_for(kind).map(|r| r.success).unwrap_or(false)
    }

    /// Whether at least one backend call succeeded.
    pub fn any_success(&self) -> bool {
        self.succeeded(AgentKind::Code) || self.succeeded(AgentKind::Analysis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_failure_serializes_without_data() {
        let result = TaskResult::failure(AgentKind::Code, "exit 2", Duration::from_millis(40));
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(
            value,
            json!({"success": false, "error": "exit 2", "executionTimeMs": 40, "source": "code"})
        );
    }

    #[test]
    fn test_any_success() {
        let result = ParallelTaskResult {
            code_result: Some(TaskResult::failure(AgentKind::Code, "x", Duration::ZERO)),
            analysis_result: Some(TaskResult::success(
                AgentKind::Analysis,
                json!("B"),
                Duration::ZERO,
            )),
            aggregated_result: Value::Null,
            execution_time_ms: 0,
            strategy_used: StrategyKind::Parallel,
        };
        assert!(result.any_success());
        assert!(!result.succeeded(AgentKind::Code));
    }
}
