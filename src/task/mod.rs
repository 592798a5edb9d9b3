//! Task module - task definitions and the results agents and strategies produce.
//!
//! Everything here is created fresh per tool invocation and owned by the call
//! stack that built it; nothing is persisted or shared.

mod definition;
mod result;

pub use definition::{AgentKind, AggregationStrategy, StrategyKind, TaskDefinition};
pub use result::{ParallelTaskResult, ResultSource, TaskResult};
