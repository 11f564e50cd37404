//! Tool resolution and invocation for agent turns.

use std::sync::Arc;

use parley_types::agent::Agent;
use parley_types::chat::ExecutionResult;
use parley_types::error::ToolError;
use parley_types::llm::{ToolCall, ToolSpec};
use tracing::{debug, warn};

use super::registry::ToolRegistry;

/// Runs tool calls on behalf of agents.
///
/// An agent only sees the tools granted to it by name in its definition.
#[derive(Debug, Clone, Default)]
pub struct ToolExecutor {
    registry: Arc<ToolRegistry>,
}

impl ToolExecutor {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self { registry }
    }

    /// Specs of the tools `agent` may call, in the agent's declared order.
    ///
    /// Granted names with no registered tool are skipped.
    pub fn visible_tools(&self, agent: &Agent) -> Vec<ToolSpec> {
        agent
            .tools
            .iter()
            .filter_map(|name| self.registry.get(name))
            .map(|tool| tool.spec())
            .collect()
    }

    /// Execute one tool call requested by `agent`.
    ///
    /// Calls to tools the agent cannot see fail with `ToolError::Unavailable`.
    /// Argument parse failures and tool failures come back as results with
    /// `is_error = true`.
    pub async fn execute(
        &self,
        agent: &Agent,
        call: &ToolCall,
    ) -> Result<ExecutionResult, ToolError> {
        let tool = agent
            .tools
            .iter()
            .any(|granted| granted == &call.name)
            .then(|| self.registry.get(&call.name))
            .flatten()
            .ok_or_else(|| ToolError::Unavailable {
                agent: agent.name.clone(),
                tool: call.name.clone(),
            })?;

        let raw = call.arguments.trim();
        let args = if raw.is_empty() {
            Ok(serde_json::Value::Object(serde_json::Map::new()))
        } else {
            serde_json::from_str::<serde_json::Value>(raw)
        };
        let args = match args {
            Ok(args) => args,
            Err(e) => {
                let err = ToolError::InvalidArguments {
                    tool: call.name.clone(),
                    message: e.to_string(),
                };
                warn!(agent = %agent.name, tool = %call.name, error = %err, "tool arguments rejected");
                return Ok(ExecutionResult::error(&call.id, &call.name, err.to_string()));
            }
        };

        match tool.run(args).await {
            Ok(content) => {
                debug!(agent = %agent.name, tool = %call.name, "tool call succeeded");
                Ok(ExecutionResult::ok(&call.id, &call.name, content))
            }
            Err(e) => {
                let err = ToolError::Execution {
                    tool: call.name.clone(),
                    message: format!("{e:#}"),
                };
                warn!(agent = %agent.name, tool = %call.name, error = %err, "tool call failed");
                Ok(ExecutionResult::error(&call.id, &call.name, err.to_string()))
            }
        }
    }
}
