//! Subprocess-backed agent: runs a reasoning CLI once per task.
//!
//! The call races a timer against process completion. By default the timer
//! winning only abandons the call; the child keeps running detached until it
//! exits on its own. With `kill_on_timeout` the child is killed instead.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::json;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::{AgentManager, AgentOptions};
use crate::task::{AgentKind, TaskResult};
use crate::util::truncate_chars;

/// How the prompt reaches the CLI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptMode {
    /// Written to stdin, which is then closed
    Stdin,
    /// Passed as the value of a flag, e.g. `--prompt <text>`
    Flag(String),
    /// Passed as the last positional argument after `--`
    Positional,
}

/// Configuration for a CLI backend.
#[derive(Debug, Clone)]
pub struct CliAgentConfig {
    pub cli_path: String,
    /// Fixed arguments placed before any per-call flags
    pub args: Vec<String>,
    pub prompt_mode: PromptMode,
    pub model_flag: Option<String>,
    /// Flag added when sandboxing is requested; `None` if the CLI has none
    pub sandbox_flag: Option<String>,
    pub default_model: Option<String>,
    pub working_dir: Option<PathBuf>,
    pub kill_on_timeout: bool,
}

impl CliAgentConfig {
    /// Code backend: `claude --print`, prompt on stdin.
    pub fn code_default() -> Self {
        Self {
            cli_path: "claude".to_string(),
            args: vec!["--print".to_string()],
            prompt_mode: PromptMode::Stdin,
            model_flag: Some("--model".to_string()),
            sandbox_flag: None,
            default_model: None,
            working_dir: None,
            kill_on_timeout: false,
        }
    }

    /// Analysis backend: `gemini --prompt <prompt>`.
    pub fn analysis_default() -> Self {
        Self {
            cli_path: "gemini".to_string(),
            args: Vec::new(),
            prompt_mode: PromptMode::Flag("--prompt".to_string()),
            model_flag: Some("--model".to_string()),
            sandbox_flag: Some("--sandbox".to_string()),
            default_model: None,
            working_dir: None,
            kill_on_timeout: false,
        }
    }

    pub fn default_for(kind: AgentKind) -> Self {
        match kind {
            AgentKind::Code => Self::code_default(),
            AgentKind::Analysis => Self::analysis_default(),
        }
    }
}

/// Agent that spawns `config.cli_path` for every task.
pub struct CliAgent {
    kind: AgentKind,
    name: String,
    config: CliAgentConfig,
}

impl CliAgent {
    pub fn new(kind: AgentKind, config: CliAgentConfig) -> Self {
        let name = format!("{} ({})", kind, config.cli_path);
        Self { kind, name, config }
    }

    pub fn config(&self) -> &CliAgentConfig {
        &self.config
    }

    fn build_command(&self, prompt: &str, model: Option<&str>, sandbox: bool) -> Command {
        let mut cmd = Command::new(&self.config.cli_path);
        cmd.args(&self.config.args)
            .stdin(if self.config.prompt_mode == PromptMode::Stdin {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(self.config.kill_on_timeout);

        if let Some(dir) = &self.config.working_dir {
            cmd.current_dir(dir);
        }

        if let (Some(flag), Some(m)) = (&self.config.model_flag, model) {
            cmd.arg(flag).arg(m);
        }

        if sandbox {
            match &self.config.sandbox_flag {
                Some(flag) => {
                    cmd.arg(flag);
                }
                None => debug!("{} has no sandbox flag; running unsandboxed", self.name),
            }
        }

        match &self.config.prompt_mode {
            PromptMode::Stdin => {}
            PromptMode::Flag(flag) => {
                cmd.arg(flag).arg(prompt);
            }
            // Guard prompts starting with '-'
            PromptMode::Positional => {
                cmd.arg("--").arg(prompt);
            }
        }

        cmd
    }
}

#[async_trait]
impl AgentManager for CliAgent {
    fn kind(&self) -> AgentKind {
        self.kind
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn execute_task(
        &self,
        prompt: &str,
        options: &AgentOptions,
        timeout: Duration,
    ) -> TaskResult {
        let started = Instant::now();
        let model = options
            .model
            .clone()
            .or_else(|| self.config.default_model.clone());

        let mut cmd = self.build_command(prompt, model.as_deref(), options.sandbox);

        info!(
            "Spawning {} CLI: model={:?}, sandbox={}, timeout_ms={}",
            self.kind,
            model,
            options.sandbox,
            timeout.as_millis()
        );

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                error!("Failed to spawn {} CLI: {}", self.kind, e);
                return TaskResult::failure(
                    self.kind,
                    format!(
                        "Failed to spawn {} CLI: {}. Is it installed at '{}'?",
                        self.kind, e, self.config.cli_path
                    ),
                    started.elapsed(),
                );
            }
        };

        // Write the prompt and close stdin so the CLI sees EOF.
        if let Some(mut stdin) = child.stdin.take() {
            let msg = prompt.to_string();
            let kind = self.kind;
            tokio::spawn(async move {
                if let Err(e) = stdin.write_all(msg.as_bytes()).await {
                    warn!("Failed to write prompt to {} CLI stdin: {}", kind, e);
                }
            });
        }

        let cancel = CancellationToken::new();
        let cancelled = cancel.clone();
        // Detached so the process outlives an abandoned call unless cancelled.
        let waiter = tokio::spawn(async move {
            tokio::select! {
                output = child.wait_with_output() => Some(output),
                // Dropping the child here kills it (kill_on_drop).
                _ = cancelled.cancelled() => None,
            }
        });

        let outcome = match tokio::time::timeout(timeout, waiter).await {
            Ok(joined) => joined,
            Err(_) => {
                if self.config.kill_on_timeout {
                    cancel.cancel();
                    warn!(
                        "{} CLI timed out after {}ms; process killed",
                        self.kind,
                        timeout.as_millis()
                    );
                } else {
                    warn!(
                        "{} CLI timed out after {}ms; process left running",
                        self.kind,
                        timeout.as_millis()
                    );
                }
                return TaskResult::failure(
                    self.kind,
                    format!(
                        "Timeout: {} agent did not respond within {}ms",
                        self.kind,
                        timeout.as_millis()
                    ),
                    started.elapsed(),
                );
            }
        };

        let output = match outcome {
            Ok(Some(Ok(output))) => output,
            Ok(Some(Err(e))) => {
                error!("Failed to wait for {} CLI: {}", self.kind, e);
                return TaskResult::failure(
                    self.kind,
                    format!("Failed to collect {} CLI output: {}", self.kind, e),
                    started.elapsed(),
                );
            }
            Ok(None) => {
                return TaskResult::failure(
                    self.kind,
                    format!("{} CLI was cancelled", self.kind),
                    started.elapsed(),
                );
            }
            Err(e) => {
                error!("{} CLI waiter task failed: {}", self.kind, e);
                return TaskResult::failure(
                    self.kind,
                    format!("{} CLI waiter task failed: {}", self.kind, e),
                    started.elapsed(),
                );
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        if !output.status.success() {
            let code = output
                .status
                .code()
                .map(|c| c.to_string())
                .unwrap_or_else(|| "signal".to_string());
            warn!("{} CLI exited with status: {}", self.kind, output.status);
            return TaskResult::failure(
                self.kind,
                format!(
                    "{} CLI exited with code {}: {}",
                    self.kind,
                    code,
                    truncate_chars(stderr.trim(), 2000)
                ),
                started.elapsed(),
            );
        }

        debug!(
            "{} CLI finished in {}ms ({} bytes of output)",
            self.kind,
            started.elapsed().as_millis(),
            stdout.len()
        );

        TaskResult::success(
            self.kind,
            json!({
                "output": stdout,
                "model": model,
                "sandbox": options.sandbox,
                "timestamp": chrono::Utc::now().to_rfc3339(),
            }),
            started.elapsed(),
        )
    }
}
