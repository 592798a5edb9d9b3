//! Logical task handed to an execution strategy.

use serde::{Deserialize, Serialize};

use crate::backend::AgentOptions;

/// One of the two federated backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentKind {
    /// Code generation and editing
    Code,
    /// Analysis and review
    Analysis,
}

impl AgentKind {
    /// The other backend.
    pub fn other(self) -> Self {
        match self {
            Self::Code => Self::Analysis,
            Self::Analysis => Self::Code,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Code => "code",
            Self::Analysis => "analysis",
        }
    }
}

impl std::fmt::Display for AgentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How two backend results are combined into one outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationStrategy {
    /// Keep both results side by side with a status summary
    #[default]
    Merge,
    /// Code data if code succeeded, otherwise analysis data
    PrioritizeCode,
    /// Analysis data if analysis succeeded, otherwise code data
    PrioritizeAnalysis,
    /// Hand both raw results to the tool handler
    Custom,
}

/// Which execution strategy ran (or should run) a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    #[default]
    Parallel,
    Fallback,
    Sequential,
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Parallel => write!(f, "parallel"),
            Self::Fallback => write!(f, "fallback"),
            Self::Sequential => write!(f, "sequential"),
        }
    }
}

/// A single logical task for one or both backends.
///
/// Built with the `with_*` methods and not modified afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDefinition {
    #[serde(rename = "type")]
    pub task_type: String,
    pub title: String,
    pub description: String,
    pub code_agent_prompt: Option<String>,
    pub analysis_agent_prompt: Option<String>,
    pub parallel: bool,
    pub fallback_strategy: Option<AgentKind>,
    pub aggregation_strategy: AggregationStrategy,
    /// Ask backends that support it to run sandboxed
    #[serde(default)]
    pub sandbox: bool,
    pub code_model: Option<String>,
    pub analysis_model: Option<String>,
}

impl TaskDefinition {
    pub fn new(
        task_type: impl Into<String>,
        title: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            task_type: task_type.into(),
            title: title.into(),
            description: description.into(),
            code_agent_prompt: None,
            analysis_agent_prompt: None,
            parallel: false,
            fallback_strategy: None,
            aggregation_strategy: AggregationStrategy::default(),
            sandbox: false,
            code_model: None,
            analysis_model: None,
        }
    }

    pub fn with_code_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.code_agent_prompt = Some(prompt.into());
        self
    }

    pub fn with_analysis_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.analysis_agent_prompt = Some(prompt.into());
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn with_fallback(mut self, primary: AgentKind) -> Self {
        self.fallback_strategy = Some(primary);
        self
    }

    pub fn with_aggregation(mut self, aggregation: AggregationStrategy) -> Self {
        self.aggregation_strategy = aggregation;
        self
    }

    pub fn with_sandbox(mut self, sandbox: bool) -> Self {
        self.sandbox = sandbox;
        self
    }

    pub fn with_model(mut self, kind: AgentKind, model: Option<String>) -> Self {
        match kind {
            AgentKind::Code => self.code_model = model,
            AgentKind::Analysis => self.analysis_model = model,
        }
        self
    }

    /// Prompt defined for `kind`, if any. Blank prompts count as undefined.
    pub fn prompt_for(&self, kind: AgentKind) -> Option<&str> {
        let prompt = match kind {
            AgentKind::Code => self.code_agent_prompt.as_deref(),
            AgentKind::Analysis => self.analysis_agent_prompt.as_deref(),
        };
        prompt.filter(|p| !p.trim().is_empty())
    }

    /// Per-call options for `kind`.
    pub fn options_for(&self, kind: AgentKind) -> AgentOptions {
        let model = match kind {
            AgentKind::Code => self.code_model.clone(),
            AgentKind::Analysis => self.analysis_model.clone(),
        };
        AgentOptions {
            model,
            sandbox: self.sandbox,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_prompt_is_undefined() {
        let task = TaskDefinition::new("t", "T", "D")
            .with_code_prompt("   ")
            .with_analysis_prompt("analyze");
        assert_eq!(task.prompt_for(AgentKind::Code), None);
        assert_eq!(task.prompt_for(AgentKind::Analysis), Some("analyze"));
    }

    #[test]
    fn test_options_follow_kind() {
        let task = TaskDefinition::new("t", "T", "D")
            .with_sandbox(true)
            .with_model(AgentKind::Analysis, Some("pro".to_string()));
        assert_eq!(task.options_for(AgentKind::Analysis).model.as_deref(), Some("pro"));
        assert_eq!(task.options_for(AgentKind::Code).model, None);
        assert!(task.options_for(AgentKind::Code).sandbox);
    }

    #[test]
    fn test_wire_names() {
        assert_eq!(
            serde_json::to_value(AggregationStrategy::PrioritizeCode).unwrap(),
            "prioritize_code"
        );
        let parsed: StrategyKind = serde_json::from_value(serde_json::json!("sequential")).unwrap();
        assert_eq!(parsed, StrategyKind::Sequential);
        assert_eq!(AgentKind::Code.other(), AgentKind::Analysis);
    }
}
