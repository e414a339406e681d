//! Tool call execution.
//!
//! Tool servers are external; the executor is the seam between the agent
//! runtime and whatever actually runs a tool. Execution failures are never
//! raised; they become error-marked tool messages and the model decides
//! what to do next.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use steward_core::ToolCall;

/// Executes a single tool call, returning the content for the tool
/// message. `Err` carries an error description that the runtime wraps in
/// an error marker rather than propagating.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    /// Execute the call.
    async fn execute(&self, call: &ToolCall) -> Result<String, String>;
}

/// Handler for one named tool.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// Run the tool against its arguments.
    async fn call(&self, arguments: &Value) -> Result<Value, String>;
}

/// Executor dispatching to locally registered handlers.
///
/// Unknown tools produce an error result, which reaches the model as an
/// error-marked tool message.
#[derive(Default)]
pub struct ToolExecutorRegistry {
    handlers: HashMap<String, Arc<dyn ToolHandler>>,
}

impl ToolExecutorRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler under a tool name.
    pub fn register(&mut self, name: impl Into<String>, handler: Arc<dyn ToolHandler>) {
        self.handlers.insert(name.into(), handler);
    }
}

#[async_trait]
impl ToolExecutor for ToolExecutorRegistry {
    async fn execute(&self, call: &ToolCall) -> Result<String, String> {
        let handler = self
            .handlers
            .get(&call.name)
            .ok_or_else(|| format!("no handler registered for tool '{}'", call.name))?;

        let result = handler.call(&call.arguments).await?;
        serde_json::to_string(&result).map_err(|e| e.to_string())
    }
}

/// Format an execution failure as tool message content.
pub fn error_marker(call: &ToolCall, error: &str) -> String {
    json!({"error": error, "tool": call.name}).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Doubler;

    #[async_trait]
    impl ToolHandler for Doubler {
        async fn call(&self, arguments: &Value) -> Result<Value, String> {
            let n = arguments["n"].as_i64().ok_or("missing n")?;
            Ok(json!({"doubled": n * 2}))
        }
    }

    #[tokio::test]
    async fn test_dispatch_to_handler() {
        let mut registry = ToolExecutorRegistry::new();
        registry.register("double", Arc::new(Doubler));

        let call = ToolCall::new("call_1", "double", json!({"n": 21}));
        let output = registry.execute(&call).await.unwrap();
        assert_eq!(output, r#"{"doubled":42}"#);
    }

    #[tokio::test]
    async fn test_unknown_tool_is_an_error_result() {
        let registry = ToolExecutorRegistry::new();
        let call = ToolCall::new("call_1", "ghost", json!({}));
        let err = registry.execute(&call).await.unwrap_err();
        assert!(err.contains("ghost"));

        let marker = error_marker(&call, &err);
        assert!(marker.contains("\"error\""));
    }
}
