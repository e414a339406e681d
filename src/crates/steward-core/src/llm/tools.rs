//! Tool definitions bound to chat requests.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Definition of a tool the model may call.
///
/// `parameters` is a JSON Schema object describing the tool's arguments;
/// most providers expect `{"type": "object", "properties": ..., "required":
/// ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Unique tool name
    pub name: String,

    /// What the tool does; the model uses this to decide when to call it
    pub description: String,

    /// JSON Schema for the arguments
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Value>,
}

impl ToolDefinition {
    /// Create a tool definition with name and description.
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: None,
        }
    }

    /// Attach the argument schema.
    pub fn with_parameters(mut self, parameters: Value) -> Self {
        self.parameters = Some(parameters);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_builder() {
        let tool = ToolDefinition::new("run_tests", "Run the project test suite")
            .with_parameters(json!({"type": "object"}));
        assert_eq!(tool.name, "run_tests");
        assert!(tool.parameters.is_some());
    }
}
