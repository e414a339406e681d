//! Conversation message types.
//!
//! `Message` is a closed sum type tagged by `role`. Making the variants
//! explicit means a tool message without a `tool_call_id`, or an assistant
//! tool call without arguments, is unrepresentable, so those bug classes
//! are caught at the serialization boundary instead of deep inside a node.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A request from the model to execute a named tool with structured
/// arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Identifier generated by the model; echoed back in the tool message
    pub id: String,

    /// Name of the tool to invoke
    pub name: String,

    /// Arguments matching the tool's input schema
    pub arguments: Value,
}

impl ToolCall {
    /// Create a new tool call.
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }
}

/// A single message in a workflow conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Message {
    /// Instructions and constraints for the model.
    System {
        /// Prompt text
        content: String,
    },

    /// End-user input.
    User {
        /// Message text
        content: String,
    },

    /// Model output, possibly requesting tool executions.
    Assistant {
        /// Response text (may be empty when only tool calls are issued)
        content: String,
        /// Tool calls the model wants executed, in declaration order
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ToolCall>,
    },

    /// Result of executing a single tool call.
    Tool {
        /// Tool output, serialized for the model
        content: String,
        /// Id of the [`ToolCall`] this result answers
        tool_call_id: String,
    },
}

impl Message {
    /// Create a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Message::System {
            content: content.into(),
        }
    }

    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Message::User {
            content: content.into(),
        }
    }

    /// Create an assistant message without tool calls.
    pub fn assistant(content: impl Into<String>) -> Self {
        Message::Assistant {
            content: content.into(),
            tool_calls: Vec::new(),
        }
    }

    /// Create an assistant message carrying tool calls.
    pub fn assistant_with_tools(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Message::Assistant {
            content: content.into(),
            tool_calls,
        }
    }

    /// Create a tool result message answering the given call id.
    pub fn tool(content: impl Into<String>, tool_call_id: impl Into<String>) -> Self {
        Message::Tool {
            content: content.into(),
            tool_call_id: tool_call_id.into(),
        }
    }

    /// The message text.
    pub fn content(&self) -> &str {
        match self {
            Message::System { content }
            | Message::User { content }
            | Message::Assistant { content, .. }
            | Message::Tool { content, .. } => content,
        }
    }

    /// The wire-level role string.
    pub fn role(&self) -> &'static str {
        match self {
            Message::System { .. } => "system",
            Message::User { .. } => "user",
            Message::Assistant { .. } => "assistant",
            Message::Tool { .. } => "tool",
        }
    }

    /// Tool calls carried by an assistant message, empty otherwise.
    pub fn tool_calls(&self) -> &[ToolCall] {
        match self {
            Message::Assistant { tool_calls, .. } => tool_calls,
            _ => &[],
        }
    }

    /// Whether this is a system message.
    pub fn is_system(&self) -> bool {
        matches!(self, Message::System { .. })
    }

    /// Whether this is a user message.
    pub fn is_user(&self) -> bool {
        matches!(self, Message::User { .. })
    }

    /// Whether this is an assistant message.
    pub fn is_assistant(&self) -> bool {
        matches!(self, Message::Assistant { .. })
    }
}

/// Content of the most recent user message, or `None` if there is none.
pub fn last_user_content(messages: &[Message]) -> Option<&str> {
    messages
        .iter()
        .rev()
        .find(|m| m.is_user())
        .map(|m| m.content())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_role_tagging() {
        let msg = Message::user("hello");
        let encoded = serde_json::to_value(&msg).unwrap();
        assert_eq!(encoded["role"], "user");
        assert_eq!(encoded["content"], "hello");
    }

    #[test]
    fn test_tool_message_requires_call_id() {
        // A tool message without tool_call_id must fail to deserialize.
        let raw = json!({"role": "tool", "content": "result"});
        assert!(serde_json::from_value::<Message>(raw).is_err());

        let raw = json!({"role": "tool", "content": "result", "tool_call_id": "call_1"});
        let msg: Message = serde_json::from_value(raw).unwrap();
        assert!(matches!(msg, Message::Tool { .. }));
    }

    #[test]
    fn test_assistant_tool_calls_default_empty() {
        let raw = json!({"role": "assistant", "content": "hi"});
        let msg: Message = serde_json::from_value(raw).unwrap();
        assert!(msg.tool_calls().is_empty());
    }

    #[test]
    fn test_round_trip_preserves_tool_calls() {
        let msg = Message::assistant_with_tools(
            "",
            vec![ToolCall::new("call_1", "git_status", json!({"path": "."}))],
        );
        let encoded = serde_json::to_string(&msg).unwrap();
        let decoded: Message = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn test_last_user_content() {
        let messages = vec![
            Message::system("prompt"),
            Message::user("first"),
            Message::assistant("reply"),
            Message::user("second"),
        ];
        assert_eq!(last_user_content(&messages), Some("second"));
        assert_eq!(last_user_content(&[Message::system("only")]), None);
    }
}
