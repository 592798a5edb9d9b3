//! Configuration management for the federation service.
//!
//! Configuration is set via environment variables and validated once at
//! startup; any invalid value stops the service before it accepts work.
//! - `CODE_AGENT_TIMEOUT` - Optional. Per-call code backend timeout (ms).
//!   Defaults to `120000`.
//! - `ANALYSIS_AGENT_TIMEOUT` - Optional. Per-call analysis backend timeout (ms).
//!   Defaults to `300000`.
//! - `PARALLEL_TIMEOUT` - Optional. Upper bound for each call in the parallel
//!   strategy (ms). Defaults to `180000`.
//! - `FALLBACK_ENABLED` - Optional. Call the secondary backend when the primary
//!   fails. Defaults to `true`.
//! - `CACHE_TTL` - Optional. Seconds a successful tool result stays cached. Defaults to `300`.
//! - `AGENT_PING_TIMEOUT` - Optional. Startup ping timeout (ms). Defaults to `30000`.
//! - `AGENT_PING_RETRIES` - Optional. Ping attempts per backend at startup. Defaults to `2`.
//! - `SINGLE_FLIGHT` - Optional. Collapse concurrent identical tool calls. Defaults to `false`.
//! - `KILL_ON_TIMEOUT` - Optional. Kill a backend process whose call timed out.
//!   Defaults to `false`.
//! - `CODE_AGENT_CLI` / `ANALYSIS_AGENT_CLI` - Optional. Backend executables.
//!   Default `claude` / `gemini`.
//! - `CODE_AGENT_MODEL` / `ANALYSIS_AGENT_MODEL` - Optional. Default model per backend.
//! - `AGENT_WORKING_DIR` - Optional. Working directory for backend processes.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::backend::CliAgentConfig;
use crate::task::AgentKind;
use crate::util::parse_bool;

/// Smallest accepted timeout, in milliseconds.
pub const MIN_TIMEOUT_MS: u64 = 1000;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),

    #[error("{0} must be at least {1}, got {2}")]
    BelowMinimum(String, u64, u64),
}

/// Timeouts and switches read by the execution strategies.
#[derive(Debug, Clone)]
pub struct StrategySettings {
    pub code_timeout: Duration,
    pub analysis_timeout: Duration,
    pub parallel_timeout: Duration,
    pub fallback_enabled: bool,
}

impl StrategySettings {
    /// Per-call timeout for `kind` outside the parallel strategy.
    pub fn timeout_for(&self, kind: AgentKind) -> Duration {
        match kind {
            AgentKind::Code => self.code_timeout,
            AgentKind::Analysis => self.analysis_timeout,
        }
    }

    /// Per-call timeout for `kind` inside the parallel strategy.
    pub fn parallel_timeout_for(&self, kind: AgentKind) -> Duration {
        self.timeout_for(kind).min(self.parallel_timeout)
    }
}

impl Default for StrategySettings {
    fn default() -> Self {
        Self {
            code_timeout: Duration::from_millis(120_000),
            analysis_timeout: Duration::from_millis(300_000),
            parallel_timeout: Duration::from_millis(180_000),
            fallback_enabled: true,
        }
    }
}

/// Service configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub strategy: StrategySettings,

    /// How long a successful tool result stays cached
    pub cache_ttl: Duration,

    /// Startup ping timeout per backend
    pub ping_timeout: Duration,

    /// Ping attempts per backend at startup
    pub ping_attempts: u32,

    /// Collapse concurrent identical cache misses into one handler run
    pub single_flight: bool,

    pub code_agent: CliAgentConfig,
    pub analysis_agent: CliAgentConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            strategy: StrategySettings::default(),
            cache_ttl: Duration::from_secs(300),
            ping_timeout: Duration::from_millis(30_000),
            ping_attempts: 2,
            single_flight: false,
            code_agent: CliAgentConfig::code_default(),
            analysis_agent: CliAgentConfig::analysis_default(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` for unparsable values or timeouts below one second.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup (useful for testing).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let strategy = StrategySettings {
            code_timeout: timeout_ms(&lookup, "CODE_AGENT_TIMEOUT", 120_000)?,
            analysis_timeout: timeout_ms(&lookup, "ANALYSIS_AGENT_TIMEOUT", 300_000)?,
            parallel_timeout: timeout_ms(&lookup, "PARALLEL_TIMEOUT", 180_000)?,
            fallback_enabled: boolean(&lookup, "FALLBACK_ENABLED", true)?,
        };

        let cache_ttl_secs = number(&lookup, "CACHE_TTL", defaults.cache_ttl.as_secs())?;
        if cache_ttl_secs == 0 {
            return Err(ConfigError::BelowMinimum("CACHE_TTL".to_string(), 1, 0));
        }

        let ping_attempts = number(
            &lookup,
            "AGENT_PING_RETRIES",
            u64::from(defaults.ping_attempts),
        )?;
        if ping_attempts == 0 {
            return Err(ConfigError::BelowMinimum("AGENT_PING_RETRIES".to_string(), 1, 0));
        }
        let ping_attempts = u32::try_from(ping_attempts).map_err(|e| {
            ConfigError::InvalidValue("AGENT_PING_RETRIES".to_string(), e.to_string())
        })?;

        let kill_on_timeout = boolean(&lookup, "KILL_ON_TIMEOUT", false)?;
        let working_dir = non_empty(&lookup, "AGENT_WORKING_DIR").map(PathBuf::from);

        let code_agent = agent_config(
            &lookup,
            AgentKind::Code,
            kill_on_timeout,
            working_dir.clone(),
        );
        let analysis_agent =
            agent_config(&lookup, AgentKind::Analysis, kill_on_timeout, working_dir);

        Ok(Self {
            strategy,
            cache_ttl: Duration::from_secs(cache_ttl_secs),
            ping_timeout: timeout_ms(&lookup, "AGENT_PING_TIMEOUT", 30_000)?,
            ping_attempts,
            single_flight: boolean(&lookup, "SINGLE_FLIGHT", false)?,
            code_agent,
            analysis_agent,
        })
    }
}

fn agent_config<F>(
    lookup: &F,
    kind: AgentKind,
    kill_on_timeout: bool,
    working_dir: Option<PathBuf>,
) -> CliAgentConfig
where
    F: Fn(&str) -> Option<String>,
{
    let prefix = match kind {
        AgentKind::Code => "CODE_AGENT",
        AgentKind::Analysis => "ANALYSIS_AGENT",
    };
    let mut config = CliAgentConfig::default_for(kind);
    if let Some(cli) = non_empty(lookup, &format!("{}_CLI", prefix)) {
        config.cli_path = cli;
    }
    config.default_model = non_empty(lookup, &format!("{}_MODEL", prefix));
    config.working_dir = working_dir;
    config.kill_on_timeout = kill_on_timeout;
    config
}

fn non_empty<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn number<F>(lookup: &F, key: &str, default: u64) -> Result<u64, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match non_empty(lookup, key) {
        Some(raw) => raw
            .parse()
            .map_err(|e| ConfigError::InvalidValue(key.to_string(), format!("{} ({})", raw, e))),
        None => Ok(default),
    }
}

fn timeout_ms<F>(lookup: &F, key: &str, default: u64) -> Result<Duration, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let ms = number(lookup, key, default)?;
    if ms < MIN_TIMEOUT_MS {
        return Err(ConfigError::BelowMinimum(key.to_string(), MIN_TIMEOUT_MS, ms));
    }
    Ok(Duration::from_millis(ms))
}

fn boolean<F>(lookup: &F, key: &str, default: bool) -> Result<bool, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match non_empty(lookup, key) {
        Some(raw) => parse_bool(&raw).ok_or_else(|| {
            ConfigError::InvalidValue(key.to_string(), format!("{} is not a boolean", raw))
        }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[]).unwrap();
        assert_eq!(config.strategy.code_timeout, Duration::from_millis(120_000));
        assert_eq!(config.strategy.analysis_timeout, Duration::from_millis(300_000));
        assert_eq!(config.strategy.parallel_timeout, Duration::from_millis(180_000));
        assert!(config.strategy.fallback_enabled);
        assert_eq!(config.cache_ttl, Duration::from_secs(300));
        assert!(!config.single_flight);
        assert_eq!(config.code_agent.cli_path, "claude");
        assert_eq!(config.analysis_agent.cli_path, "gemini");
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("CODE_AGENT_TIMEOUT", "5000"),
            ("FALLBACK_ENABLED", "false"),
            ("CACHE_TTL", "60"),
            ("KILL_ON_TIMEOUT", "yes"),
            ("ANALYSIS_AGENT_CLI", "/opt/bin/gemini"),
            ("ANALYSIS_AGENT_MODEL", "gemini-2.5-pro"),
        ])
        .unwrap();

        assert_eq!(config.strategy.code_timeout, Duration::from_millis(5000));
        assert!(!config.strategy.fallback_enabled);
        assert_eq!(config.cache_ttl, Duration::from_secs(60));
        assert!(config.code_agent.kill_on_timeout);
        assert_eq!(config.analysis_agent.cli_path, "/opt/bin/gemini");
        assert_eq!(config.analysis_agent.default_model.as_deref(), Some("gemini-2.5-pro"));
    }

    #[test]
    fn test_timeout_below_minimum_fails() {
        let err = load(&[("PARALLEL_TIMEOUT", "999")]).unwrap_err();
        assert_eq!(
            err,
            ConfigError::BelowMinimum("PARALLEL_TIMEOUT".to_string(), 1000, 999)
        );
    }

    #[test]
    fn test_invalid_values_fail() {
        assert!(matches!(
            load(&[("CODE_AGENT_TIMEOUT", "fast")]),
            Err(ConfigError::InvalidValue(..))
        ));
        assert!(matches!(
            load(&[("FALLBACK_ENABLED", "sometimes")]),
            Err(ConfigError::InvalidValue(..))
        ));
        assert!(matches!(
            load(&[("CACHE_TTL", "0")]),
            Err(ConfigError::BelowMinimum(..))
        ));
    }

    #[test]
    fn test_parallel_timeout_caps_per_call_timeout() {
        let settings = StrategySettings::default();
        assert_eq!(settings.parallel_timeout_for(AgentKind::Code), Duration::from_millis(120_000));
        assert_eq!(
            settings.parallel_timeout_for(AgentKind::Analysis),
            Duration::from_millis(180_000)
        );
    }
}
