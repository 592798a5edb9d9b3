//! MCP server exposing the federation tools.
//!
//! Communicates over stdio using newline-delimited JSON-RPC 2.0. Logs go to
//! stderr; stdout carries only protocol messages.

use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use agent_federation::tools::{ToolContext, ToolManager, ToolResult};
use agent_federation::{Config, Federation};

// =============================================================================
// JSON-RPC Types
// =============================================================================

#[derive(Debug, Deserialize)]
struct JsonRpcRequest {
    jsonrpc: String,
    /// Absent on notifications
    #[serde(default)]
    id: Option<Value>,
    method: String,
    #[serde(default)]
    params: Value,
}

#[derive(Debug, Serialize)]
struct JsonRpcResponse {
    jsonrpc: &'static str,
    id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<JsonRpcError>,
}

#[derive(Debug, Serialize)]
struct JsonRpcError {
    code: i32,
    message: String,
}

impl JsonRpcResponse {
    fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: Some(result),
            error: None,
        }
    }

    fn error(id: Value, code: i32, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
            }),
        }
    }
}

// =============================================================================
// MCP Types
// =============================================================================

#[derive(Debug, Serialize)]
struct CallToolResult {
    content: Vec<ToolContent>,
    #[serde(rename = "isError")]
    is_error: bool,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type")]
enum ToolContent {
    #[serde(rename = "text")]
    Text { text: String },
}

impl CallToolResult {
    fn from_value(envelope: &Value, is_error: bool) -> Self {
        let text =
            serde_json::to_string_pretty(envelope).unwrap_or_else(|_| envelope.to_string());
        Self {
            content: vec![ToolContent::Text { text }],
            is_error,
        }
    }
}

fn initialize_result() -> Value {
    json!({
        "protocolVersion": "2024-11-05",
        "serverInfo": {
            "name": "federation-mcp",
            "version": env!("CARGO_PKG_VERSION"),
        },
        "capabilities": {
            "tools": {
                "listChanged": false
            }
        }
    })
}

async fn call_tool(tools: &ToolManager, params: &Value) -> CallToolResult {
    let name = params.get("name").and_then(|v| v.as_str()).unwrap_or("");
    let args = params.get("arguments").cloned().unwrap_or_else(|| json!({}));
    let ctx = ToolContext::generate();
    let started = Instant::now();

    info!(parent: &ctx.span, "tools/call {}", name);
    match tools.execute_tool(name, args, &ctx).await {
        Ok(result) => {
            debug!(
                parent: &ctx.span,
                "{} finished in {}ms (success: {})",
                name,
                started.elapsed().as_millis(),
                result.success
            );
            to_call_result(&result)
        }
        Err(e) => {
            warn!(parent: &ctx.span, "{} failed: {}", name, e);
            CallToolResult::from_value(&e.envelope(name, started.elapsed()), true)
        }
    }
}

fn to_call_result(result: &ToolResult) -> CallToolResult {
    CallToolResult::from_value(&result.to_value(), !result.success)
}

/// Parse one line into a request, or the error response to send instead:
/// `-32700` for malformed JSON, `-32600` for JSON that is not a request.
fn parse_request(line: &str) -> Result<JsonRpcRequest, JsonRpcResponse> {
    let value: Value = serde_json::from_str(line)
        .map_err(|e| JsonRpcResponse::error(Value::Null, -32700, format!("Parse error: {}", e)))?;
    let id = value.get("id").cloned().unwrap_or(Value::Null);

    let request: JsonRpcRequest = serde_json::from_value(value).map_err(|e| {
        JsonRpcResponse::error(id.clone(), -32600, format!("Invalid Request: {}", e))
    })?;
    if request.jsonrpc != "2.0" {
        return Err(JsonRpcResponse::error(
            id,
            -32600,
            format!("Invalid Request: unsupported jsonrpc version {:?}", request.jsonrpc),
        ));
    }
    Ok(request)
}

/// Handle one request. `None` means no response (notifications, or a call
/// answered later by its own task).
fn handle_request(
    request: JsonRpcRequest,
    tools: &Arc<ToolManager>,
    out: &mpsc::UnboundedSender<String>,
) -> Option<JsonRpcResponse> {
    let JsonRpcRequest {
        id, method, params, ..
    } = request;

    // Notifications are never answered, including unknown ones.
    let Some(id) = id else {
        debug!("notification {}", method);
        return None;
    };

    match method.as_str() {
        "initialize" => Some(JsonRpcResponse::success(id, initialize_result())),
        "notifications/initialized" | "initialized" => None,
        "ping" => Some(JsonRpcResponse::success(id, json!({}))),
        "tools/list" => Some(JsonRpcResponse::success(
            id,
            json!({ "tools": tools.list_tools() }),
        )),
        "tools/call" => {
            let tools = Arc::clone(tools);
            let out = out.clone();
            tokio::spawn(async move {
                let result = call_tool(&tools, &params).await;
                send(&out, &JsonRpcResponse::success(id, json!(result)));
            });
            None
        }
        _ => Some(JsonRpcResponse::error(
            id,
            -32601,
            format!("Method not found: {}", method),
        )),
    }
}

fn send(out: &mpsc::UnboundedSender<String>, response: &JsonRpcResponse) {
    match serde_json::to_string(response) {
        Ok(line) => {
            if out.send(line).is_err() {
                warn!("stdout writer closed; dropping response");
            }
        }
        Err(e) => error!("Failed to serialize response: {}", e),
    }
}

fn main() -> anyhow::Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(async_main())
}

async fn async_main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "agent_federation=info,federation_mcp=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = Config::from_env()?;
    info!(
        "Loaded configuration: code={} analysis={} fallback={}",
        config.code_agent.cli_path,
        config.analysis_agent.cli_path,
        config.strategy.fallback_enabled
    );
    if config.code_agent.kill_on_timeout {
        warn!("KILL_ON_TIMEOUT is set: timed-out backend processes will be killed");
    }

    let federation = match Federation::connect(&config).await {
        Ok(federation) => Arc::new(federation),
        Err(e) => {
            error!("Startup failed: {}", e);
            std::process::exit(1);
        }
    };
    let tools = Arc::new(ToolManager::with_default_tools(federation, &config)?);

    let (out, mut lines) = mpsc::unbounded_channel::<String>();
    let writer = tokio::spawn(async move {
        let mut stdout = tokio::io::stdout();
        while let Some(line) = lines.recv().await {
            if stdout.write_all(line.as_bytes()).await.is_err()
                || stdout.write_all(b"\n").await.is_err()
                || stdout.flush().await.is_err()
            {
                break;
            }
        }
    });

    info!("federation-mcp ready");
    let mut reader = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = reader.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        let request = match parse_request(&line) {
            Ok(req) => req,
            Err(response) => {
                send(&out, &response);
                continue;
            }
        };

        if let Some(response) = handle_request(request, &tools, &out) {
            send(&out, &response);
        }
    }

    // Outstanding calls hold sender clones; the writer drains until they finish.
    drop(out);
    writer.await?;
    info!("stdin closed, shutting down");
    Ok(())
}
