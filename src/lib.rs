//! # Agent Federation
//!
//! Task orchestration across two external reasoning backends: a code agent
//! and an analysis agent, each driven as a subprocess.
//!
//! This library provides:
//! - Backends behind the `AgentManager` trait with timeout racing
//! - Parallel, fallback and sequential execution strategies with result aggregation
//! - A tool layer (sanitize, cache, validate, dispatch) for a transport to call
//!
//! ## Architecture
//!
//! ```text
//!   transport ──► ToolManager ──► Tool handler ──► Federation
//!                 │ sanitize                        │ ExecutionStrategy
//!                 │ TtlCache                        ▼
//!                 │ JSON Schema          ┌─────────────────────┐
//!                                        │ code    │ analysis  │
//!                                        │ agent   │ agent     │
//!                                        └─────────────────────┘
//! ```
//!
//! ## Call Flow
//! 1. The transport hands a tool name and raw arguments to `ToolManager`
//! 2. Arguments are sanitized and looked up in the result cache
//! 3. On a miss, the tool is resolved and its input validated
//! 4. The handler builds a `TaskDefinition` and runs a strategy
//! 5. Successful envelopes are cached
//!
//! ## Modules
//! - `backend`: `AgentManager`, CLI subprocess backends, startup probing
//! - `strategy`: execution strategies and aggregation
//! - `tools`: `ToolManager` and the built-in federation tools

pub mod backend;
pub mod cache;
pub mod config;
pub mod error;
pub mod federation;
pub mod retry;
pub mod sanitize;
pub mod strategy;
pub mod task;
pub mod tools;
pub mod util;

pub use config::Config;
pub use error::{ErrorKind, FederationError};
pub use federation::Federation;
pub use tools::ToolManager;
