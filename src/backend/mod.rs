pub mod cli;

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracing::{error, info, warn};

use crate::error::FederationError;
use crate::retry::RetryPolicy;
use crate::task::{AgentKind, TaskResult};

pub use cli::{CliAgent, CliAgentConfig, PromptMode};

/// Per-call options forwarded to a backend.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AgentOptions {
    /// Model override; the backend's default model is used when `None`
    pub model: Option<String>,
    pub sandbox: bool,
}

/// A single external reasoning backend.
///
/// # Invariants
/// - `execute_task()` never fails: every failure mode (spawn error, non-zero
///   exit, timeout) is returned as a `TaskResult` with `success == false`
/// - Implementations hold no per-call mutable state and may be shared freely
#[async_trait]
pub trait AgentManager: Send + Sync {
    fn kind(&self) -> AgentKind;

    /// Human-readable backend name for logs.
    fn name(&self) -> &str;

    async fn execute_task(
        &self,
        prompt: &str,
        options: &AgentOptions,
        timeout: Duration,
    ) -> TaskResult;

    /// Liveness check used once at startup.
    async fn ping(&self, timeout: Duration) -> bool {
        self.execute_task("ping", &AgentOptions::default(), timeout)
            .await
            .success
    }
}

/// The backends participating in this session.
#[derive(Clone, Default)]
pub struct AgentSet {
    code: Option<Arc<dyn AgentManager>>,
    analysis: Option<Arc<dyn AgentManager>>,
}

impl AgentSet {
    pub fn new(
        code: Option<Arc<dyn AgentManager>>,
        analysis: Option<Arc<dyn AgentManager>>,
    ) -> Self {
        Self { code, analysis }
    }

    pub fn get(&self, kind: AgentKind) -> Option<&Arc<dyn AgentManager>> {
        match kind {
            AgentKind::Code => self.code.as_ref(),
            AgentKind::Analysis => self.analysis.as_ref(),
        }
    }

    pub fn is_available(&self, kind: AgentKind) -> bool {
        self.get(kind).is_some()
    }

    /// Run `prompt` on the `kind` backend. A backend excluded at startup yields
    /// a failed result instead of a call.
    pub async fn execute(
        &self,
        kind: AgentKind,
        prompt: &str,
        options: &AgentOptions,
        timeout: Duration,
    ) -> TaskResult {
        match self.get(kind) {
            Some(agent) => agent.execute_task(prompt, options, timeout).await,
            None => {
                let err = FederationError::agent_unavailable(
                    kind.as_str(),
                    "not participating in this session",
                );
                TaskResult::failure(kind, err.to_string(), Duration::ZERO)
            }
        }
    }

    /// Ping both backends concurrently and keep the ones that answer.
    ///
    /// Each ping gets `attempts` tries. Fails with `AgentUnavailable` when no
    /// backend answers, since no strategy can produce a result then.
    pub async fn probe(
        code: Arc<dyn AgentManager>,
        analysis: Arc<dyn AgentManager>,
        ping_timeout: Duration,
        attempts: u32,
    ) -> Result<Self, FederationError> {
        let (code_ok, analysis_ok) = tokio::join!(
            ping_with_retry(&code, ping_timeout, attempts),
            ping_with_retry(&analysis, ping_timeout, attempts),
        );

        if !code_ok && !analysis_ok {
            error!(
                "Neither the {} nor the {} backend answered a ping; no execution strategy can run",
                code.name(),
                analysis.name()
            );
            return Err(FederationError::agent_unavailable(
                "code and analysis",
                "both backends failed their startup ping",
            ));
        }

        Ok(Self {
            code: code_ok.then_some(code),
            analysis: analysis_ok.then_some(analysis),
        })
    }
}

async fn ping_with_retry(
    agent: &Arc<dyn AgentManager>,
    timeout: Duration,
    attempts: u32,
) -> bool {
    let started = Instant::now();
    let policy = RetryPolicy::new(attempts.max(1), Duration::from_millis(500));
    let result = policy
        .run(|| {
            let agent = Arc::clone(agent);
            async move {
                if agent.ping(timeout).await {
                    Ok(())
                } else {
                    Err(FederationError::agent_unavailable(agent.name(), "ping failed").into())
                }
            }
        })
        .await;

    match result {
        Ok(()) => {
            info!(
                "{} backend is available ({}ms)",
                agent.name(),
                started.elapsed().as_millis()
            );
            true
        }
        Err(e) => {
            warn!("{} backend excluded from this session: {}", agent.name(), e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedAgent {
        kind: AgentKind,
        alive: bool,
        calls: AtomicUsize,
    }

    impl FixedAgent {
        fn new(kind: AgentKind, alive: bool) -> Arc<Self> {
            Arc::new(Self {
                kind,
                alive,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl AgentManager for FixedAgent {
        fn kind(&self) -> AgentKind {
            self.kind
        }

        fn name(&self) -> &str {
            self.kind.as_str()
        }

        async fn execute_task(
            &self,
            _prompt: &str,
            _options: &AgentOptions,
            _timeout: Duration,
        ) -> TaskResult {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.alive {
                TaskResult::success(self.kind, json!("pong"), Duration::ZERO)
            } else {
                TaskResult::failure(self.kind, "down", Duration::ZERO)
            }
        }
    }

    #[tokio::test]
    async fn test_probe_keeps_live_backends() {
        let code = FixedAgent::new(AgentKind::Code, true);
        let analysis = FixedAgent::new(AgentKind::Analysis, false);

        let set = AgentSet::probe(code.clone(), analysis.clone(), Duration::from_secs(1), 1)
            .await
            .unwrap();

        assert!(set.is_available(AgentKind::Code));
        assert!(!set.is_available(AgentKind::Analysis));
    }

    #[tokio::test]
    async fn test_probe_fails_when_both_down() {
        let code = FixedAgent::new(AgentKind::Code, false);
        let analysis = FixedAgent::new(AgentKind::Analysis, false);

        let err = AgentSet::probe(code.clone(), analysis.clone(), Duration::from_secs(1), 2)
            .await
            .err()
            .unwrap();

        assert_eq!(err.kind, crate::error::ErrorKind::AgentUnavailable);
        // Unavailability is retryable, so each backend is pinged `attempts` times.
        assert_eq!(code.calls.load(Ordering::SeqCst), 2);
        assert_eq!(analysis.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_excluded_backend_yields_failed_result() {
        let code: Arc<dyn AgentManager> = FixedAgent::new(AgentKind::Code, true);
        let set = AgentSet::new(Some(code), None);
        let result = set
            .execute(
                AgentKind::Analysis,
                "review",
                &AgentOptions::default(),
                Duration::from_secs(1),
            )
            .await;

        assert!(!result.success);
        assert!(result.error_message().contains("unavailable"));
    }
}
