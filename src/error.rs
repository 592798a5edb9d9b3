//! Federation error taxonomy with retry classification.
//!
//! Every failure the federation core can surface is a [`FederationError`]: one
//! tagged struct whose `kind` fixes the wire code and whose `retryable` flag is
//! decided when the error is built. Callers dispatch on `kind`, never on type.

use std::time::Duration;

use serde::Serialize;
use serde_json::{json, Map, Value};
use thiserror::Error;

/// Classification of federation errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// A backend call did not finish within its deadline - transient
    Timeout,
    /// A backend could not be reached or is not participating - transient
    AgentUnavailable,
    /// A backend ran but the task itself failed
    TaskExecution,
    /// Invalid settings or an impossible task shape
    Configuration,
    /// No tool registered under the requested name
    ToolNotFound,
    /// Tool arguments failed schema validation
    InvalidInput,
    /// An external service failed; retryable only if its cause is
    UpstreamService,
    /// Result cache failure
    Cache,
    /// Anything else
    Unknown,
}

impl ErrorKind {
    /// Whether errors of this kind are retryable when no cause says otherwise.
    pub fn default_retryable(&self) -> bool {
        matches!(self, ErrorKind::Timeout | ErrorKind::AgentUnavailable)
    }

    /// Stable machine-readable code used in failure envelopes.
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::Timeout => "TIMEOUT",
            ErrorKind::AgentUnavailable => "AGENT_UNAVAILABLE",
            ErrorKind::TaskExecution => "TASK_EXECUTION_ERROR",
            ErrorKind::Configuration => "CONFIGURATION_ERROR",
            ErrorKind::ToolNotFound => "TOOL_NOT_FOUND",
            ErrorKind::InvalidInput => "INVALID_INPUT",
            ErrorKind::UpstreamService => "UPSTREAM_SERVICE_ERROR",
            ErrorKind::Cache => "CACHE_ERROR",
            ErrorKind::Unknown => "UNKNOWN_ERROR",
        }
    }

    /// HTTP-equivalent status for the transport layer.
    pub fn status(&self) -> u16 {
        match self {
            ErrorKind::Timeout => 408,
            ErrorKind::AgentUnavailable => 503,
            ErrorKind::ToolNotFound => 404,
            ErrorKind::InvalidInput => 400,
            ErrorKind::UpstreamService => 502,
            ErrorKind::TaskExecution
            | ErrorKind::Configuration
            | ErrorKind::Cache
            | ErrorKind::Unknown => 500,
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::Timeout => write!(f, "Timeout"),
            ErrorKind::AgentUnavailable => write!(f, "Agent unavailable"),
            ErrorKind::TaskExecution => write!(f, "Task execution failed"),
            ErrorKind::Configuration => write!(f, "Configuration error"),
            ErrorKind::ToolNotFound => write!(f, "Tool not found"),
            ErrorKind::InvalidInput => write!(f, "Invalid tool input"),
            ErrorKind::UpstreamService => write!(f, "Upstream service error"),
            ErrorKind::Cache => write!(f, "Cache error"),
            ErrorKind::Unknown => write!(f, "Unknown error"),
        }
    }
}

/// Error raised anywhere in the federation core.
///
/// Built at the point of failure and propagated as-is.
#[derive(Debug, Clone, Error, Serialize)]
#[error("{kind}: {message}")]
pub struct FederationError {
    pub kind: ErrorKind,
    pub message: String,
    pub context: Map<String, Value>,
    pub retryable: bool,
}

impl FederationError {
    /// Create an error of `kind` with that kind's default retryability.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            context: Map::new(),
            retryable: kind.default_retryable(),
        }
    }

    /// A call that exceeded its deadline.
    pub fn timeout(operation: &str, timeout: Duration) -> Self {
        Self::new(
            ErrorKind::Timeout,
            format!(
                "{} timed out after {}ms",
                operation,
                crate::util::millis(timeout)
            ),
        )
        .with_context("operation", operation)
        .with_context("timeoutMs", crate::util::millis(timeout))
    }

    /// A backend that cannot take work.
    pub fn agent_unavailable(agent: &str, reason: impl Into<String>) -> Self {
        Self::new(
            ErrorKind::AgentUnavailable,
            format!("{} agent is unavailable: {}", agent, reason.into()),
        )
        .with_context("agent", agent)
    }

    pub fn task_execution(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::TaskExecution, message)
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Configuration, message)
    }

    pub fn tool_not_found(name: &str) -> Self {
        Self::new(ErrorKind::ToolNotFound, format!("Unknown tool: {}", name))
            .with_context("tool", name)
    }

    /// Schema violation; `errors` carries one entry per failing field.
    pub fn invalid_input(tool: &str, errors: Vec<Value>) -> Self {
        Self::new(
            ErrorKind::InvalidInput,
            format!("Invalid input for tool '{}'", tool),
        )
        .with_context("tool", tool)
        .with_context("errors", errors)
    }

    /// Failure of an external service. Retryable only when `cause` is.
    pub fn upstream(
        service: &str,
        message: impl Into<String>,
        cause: Option<&FederationError>,
    ) -> Self {
        let mut err =
            Self::new(ErrorKind::UpstreamService, message).with_context("service", service);
        err.retryable = cause.map(|c| c.retryable).unwrap_or(false);
        if let Some(cause) = cause {
            err = err.with_context("cause", cause.to_string());
        }
        err
    }

    pub fn cache(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Cache, message)
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unknown, message)
    }

    /// Attach a context entry. Consumes the error so context is only set while building.
    pub fn with_context(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.context.insert(key.to_string(), value.into());
        self
    }

    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    pub fn status(&self) -> u16 {
        self.kind.status()
    }

    /// Failure envelope returned to the transport layer for this error.
    pub fn envelope(&self, tool: &str, elapsed: Duration) -> Value {
        json!({
            "success": false,
            "error": {
                "message": self.message,
                "code": self.code(),
                "status": self.status(),
                "context": self.context,
            },
            "tool": tool,
            "executionTimeMs": crate::util::millis(elapsed),
            "timestamp": chrono::Utc::now().to_rfc3339(),
        })
    }
}
