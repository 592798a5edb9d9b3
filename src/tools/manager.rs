//! Tool registry and the per-call pipeline.
//!
//! `execute_tool` runs, in order: sanitize arguments, build the cache key,
//! return a cached result on hit, resolve the tool, validate against its
//! schema, run the handler, cache the result if it succeeded.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt, Shared};
use jsonschema::JSONSchema;
use serde_json::{json, Map, Value};
use tracing::{debug, info, Instrument};

use super::{AgentStatus, CodeReview, DebugIssue, OptimizePerformance, ParallelTask};
use super::{Tool, ToolContext, ToolDefinition, ToolResult};
use crate::cache::TtlCache;
use crate::config::Config;
use crate::error::FederationError;
use crate::federation::Federation;
use crate::sanitize::sanitize_value;

type HandlerOutcome = Result<ToolResult, FederationError>;
type InFlight = Shared<BoxFuture<'static, HandlerOutcome>>;

struct RegisteredTool {
    tool: Arc<dyn Tool>,
    schema: JSONSchema,
}

/// Owns the static tool registry and the result cache.
pub struct ToolManager {
    tools: HashMap<String, RegisteredTool>,
    cache: Arc<TtlCache<ToolResult>>,
    /// Present only when concurrent identical misses share one handler run
    in_flight: Option<Mutex<HashMap<String, InFlight>>>,
}

impl ToolManager {
    /// Create an empty manager (no tools registered).
    pub fn new(cache_ttl: Duration, single_flight: bool) -> Self {
        Self {
            tools: HashMap::new(),
            cache: Arc::new(TtlCache::new(cache_ttl)),
            in_flight: single_flight.then(|| Mutex::new(HashMap::new())),
        }
    }

    /// Manager with every built-in federation tool registered.
    pub fn with_default_tools(
        federation: Arc<Federation>,
        config: &Config,
    ) -> Result<Self, FederationError> {
        let mut manager = Self::new(config.cache_ttl, config.single_flight);
        manager.register(Arc::new(ParallelTask::new(Arc::clone(&federation))))?;
        manager.register(Arc::new(CodeReview::new(Arc::clone(&federation))))?;
        manager.register(Arc::new(DebugIssue::new(Arc::clone(&federation))))?;
        manager.register(Arc::new(OptimizePerformance::new(Arc::clone(&federation))))?;
        manager.register(Arc::new(AgentStatus::new(federation)))?;
        info!(
            "Registered {} tools (cache ttl {}s, single-flight {})",
            manager.tools.len(),
            config.cache_ttl.as_secs(),
            config.single_flight
        );
        Ok(manager)
    }

    /// Add `tool`, compiling its schema once.
    ///
    /// # Errors
    /// `Configuration` if the schema does not compile.
    pub fn register(&mut self, tool: Arc<dyn Tool>) -> Result<(), FederationError> {
        let schema_value = tool.input_schema();
        let schema = JSONSchema::compile(&schema_value).map_err(|e| {
            let message = format!("Invalid schema for tool '{}': {}", tool.name(), e);
            FederationError::configuration(message).with_context("tool", tool.name())
        })?;
        self.tools
            .insert(tool.name().to_string(), RegisteredTool { tool, schema });
        Ok(())
    }

    pub fn cache(&self) -> &TtlCache<ToolResult> {
        &self.cache
    }

    /// Every registered tool, sorted by name.
    pub fn list_tools(&self) -> Vec<ToolDefinition> {
        let mut defs: Vec<ToolDefinition> = self
            .tools
            .values()
            .map(|registered| ToolDefinition {
                name: registered.tool.name().to_string(),
                description: registered.tool.description().to_string(),
                input_schema: registered.tool.input_schema(),
            })
            .collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    /// Run tool `name` with `raw_args`.
    ///
    /// # Errors
    /// - `ToolNotFound` for an unregistered name
    /// - `InvalidInput` when arguments violate the tool's schema, with one
    ///   context entry per failing field
    /// - whatever the handler itself returns
    pub async fn execute_tool(
        &self,
        name: &str,
        raw_args: Value,
        ctx: &ToolContext,
    ) -> Result<ToolResult, FederationError> {
        let args = sanitize_value(raw_args);
        let cache_key = cache_key(name, &args);

        if let Some(hit) = self.cache.get(&cache_key) {
            debug!(parent: &ctx.span, "Cache hit for {}", name);
            return Ok(hit);
        }
        debug!(parent: &ctx.span, "Cache miss for {}", name);

        let registered = self
            .tools
            .get(name)
            .ok_or_else(|| FederationError::tool_not_found(name))?;

        let violations: Vec<Value> = match registered.schema.validate(&args) {
            Ok(()) => Vec::new(),
            Err(errors) => errors
                .map(|e| {
                    json!({
                        "path": e.instance_path.to_string(),
                        "message": e.to_string(),
                    })
                })
                .collect(),
        };
        if !violations.is_empty() {
            return Err(FederationError::invalid_input(name, violations));
        }

        let outcome = match &self.in_flight {
            Some(in_flight) => {
                self.run_shared(in_flight, &cache_key, Arc::clone(&registered.tool), args, ctx)
                    .await
            }
            None => {
                registered
                    .tool
                    .handle(args, ctx)
                    .instrument(ctx.span.clone())
                    .await
            }
        };

        if let Ok(result) = &outcome {
            if result.success {
                self.cache.set(cache_key, result.clone());
            }
        }
        outcome
    }

    async fn run_shared(
        &self,
        in_flight: &Mutex<HashMap<String, InFlight>>,
        cache_key: &str,
        tool: Arc<dyn Tool>,
        args: Value,
        ctx: &ToolContext,
    ) -> HandlerOutcome {
        let (shared, _guard) = {
            let mut map = in_flight.lock().unwrap_or_else(|e| e.into_inner());
            match map.get(cache_key) {
                Some(existing) => {
                    debug!(parent: &ctx.span, "Joining in-flight call for {}", cache_key);
                    (existing.clone(), None)
                }
                None => {
                    let owned_ctx = ctx.clone();
                    let span = ctx.span.clone();
                    let fut: BoxFuture<'static, HandlerOutcome> =
                        async move { tool.handle(args, &owned_ctx).await }
                            .instrument(span)
                            .boxed();
                    let shared = fut.shared();
                    map.insert(cache_key.to_string(), shared.clone());
                    let guard = InFlightGuard {
                        map: in_flight,
                        key: cache_key,
                    };
                    (shared, Some(guard))
                }
            }
        };
        shared.await
    }
}

/// Removes the leader's in-flight entry once it finishes or is dropped.
struct InFlightGuard<'a> {
    map: &'a Mutex<HashMap<String, InFlight>>,
    key: &'a str,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.map
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(self.key);
    }
}

/// `name:args` with object keys in sorted order at every depth.
fn cache_key(name: &str, args: &Value) -> String {
    format!("{}:{}", name, canonical(args))
}

fn canonical(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut sorted = Map::new();
            for key in keys {
                sorted.insert(key.clone(), canonical(&map[key]));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonical).collect()),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Echo {
        calls: AtomicUsize,
        succeed: bool,
        delay: Duration,
    }

    impl Echo {
        fn new(succeed: bool) -> Arc<Self> {
            Self::slow(succeed, Duration::ZERO)
        }

        fn slow(succeed: bool, delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                succeed,
                delay,
            })
        }
    }

    #[async_trait]
    impl Tool for Echo {
        fn name(&self) -> &str {
            "echo"
        }

        fn description(&self) -> &str {
            "Echo the text argument"
        }

        fn input_schema(&self) -> Value {
            json!({
                "type": "object",
                "properties": { "text": { "type": "string", "minLength": 1 } },
                "required": ["text"]
            })
        }

        async fn handle(
            &self,
            args: Value,
            _ctx: &ToolContext,
        ) -> Result<ToolResult, FederationError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            tokio::time::sleep(self.delay).await;
            Ok(ToolResult::new(self.succeed, json!({ "text": args["text"], "call": n })))
        }
    }

    fn manager_with(tool: Arc<Echo>, single_flight: bool) -> ToolManager {
        let mut manager = ToolManager::new(Duration::from_secs(60), single_flight);
        manager.register(tool).unwrap();
        manager
    }

    #[tokio::test]
    async fn test_second_identical_call_hits_cache() {
        let tool = Echo::new(true);
        let manager = manager_with(tool.clone(), false);
        let ctx = ToolContext::generate();

        let first = manager.execute_tool("echo", json!({"text": "hi"}), &ctx).await.unwrap();
        let second = manager.execute_tool("echo", json!({"text": "hi"}), &ctx).await.unwrap();

        assert_eq!(tool.calls.load(Ordering::SeqCst), 1);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_failed_results_are_not_cached() {
        let tool = Echo::new(false);
        let manager = manager_with(tool.clone(), false);
        let ctx = ToolContext::generate();

        manager.execute_tool("echo", json!({"text": "hi"}), &ctx).await.unwrap();
        manager.execute_tool("echo", json!({"text": "hi"}), &ctx).await.unwrap();

        assert_eq!(tool.calls.load(Ordering::SeqCst), 2);
        assert!(manager.cache().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let manager = manager_with(Echo::new(true), false);
        let err = manager
            .execute_tool("nope", json!({}), &ToolContext::generate())
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::ToolNotFound);
        assert_eq!(err.status(), 404);
    }

    #[tokio::test]
    async fn test_schema_violation_reports_fields() {
        let tool = Echo::new(true);
        let manager = manager_with(tool.clone(), false);
        let err = manager
            .execute_tool("echo", json!({"text": 5}), &ToolContext::generate())
            .await
            .unwrap_err();

        assert_eq!(err.kind, ErrorKind::InvalidInput);
        assert_eq!(err.status(), 400);
        let errors = err.context["errors"].as_array().unwrap();
        assert_eq!(errors[0]["path"], "/text");
        assert_eq!(tool.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_arguments_are_sanitized_before_keying() {
        let tool = Echo::new(true);
        let manager = manager_with(tool.clone(), false);
        let ctx = ToolContext::generate();

        let result = manager
            .execute_tool("echo", json!({"text": "<script>alert(1)</script>hi"}), &ctx)
            .await
            .unwrap();
        assert_eq!(result.get("text"), Some(&json!("hi")));

        manager.execute_tool("echo", json!({"text": "hi"}), &ctx).await.unwrap();
        assert_eq!(tool.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_single_flight_shares_one_handler_run() {
        let tool = Echo::slow(true, Duration::from_millis(50));
        let manager = manager_with(tool.clone(), true);
        let ctx = ToolContext::generate();

        let (a, b) = tokio::join!(
            manager.execute_tool("echo", json!({"text": "hi"}), &ctx),
            manager.execute_tool("echo", json!({"text": "hi"}), &ctx),
        );

        assert_eq!(a.unwrap(), b.unwrap());
        assert_eq!(tool.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_without_single_flight_concurrent_misses_both_run() {
        let tool = Echo::slow(true, Duration::from_millis(50));
        let manager = manager_with(tool.clone(), false);
        let ctx = ToolContext::generate();

        let _ = tokio::join!(
            manager.execute_tool("echo", json!({"text": "hi"}), &ctx),
            manager.execute_tool("echo", json!({"text": "hi"}), &ctx),
        );

        assert_eq!(tool.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_cache_key_ignores_key_order() {
        let a = cache_key("t", &json!({"b": 1, "a": {"y": 2, "x": 3}}));
        let b = cache_key("t", &json!({"a": {"x": 3, "y": 2}, "b": 1}));
        assert_eq!(a, b);
        assert_eq!(a, r#"t:{"a":{"x":3,"y":2},"b":1}"#);
    }
}
