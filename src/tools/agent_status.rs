//! Backend availability and timeout report.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{Tool, ToolContext, ToolResult};
use crate::error::FederationError;
use crate::federation::Federation;

pub struct AgentStatus {
    federation: Arc<Federation>,
}

impl AgentStatus {
    pub fn new(federation: Arc<Federation>) -> Self {
        Self { federation }
    }
}

#[async_trait]
impl Tool for AgentStatus {
    fn name(&self) -> &str {
        "agent_status"
    }

    fn description(&self) -> &str {
        "Report which agents joined this session, whether fallback is enabled \
         and the configured timeouts."
    }

    fn input_schema(&self) -> Value {
        json!({ "type": "object", "properties": {} })
    }

    async fn handle(
        &self,
        _args: Value,
        _ctx: &ToolContext,
    ) -> Result<ToolResult, FederationError> {
        Ok(ToolResult::new(true, self.federation.status()))
    }
}
