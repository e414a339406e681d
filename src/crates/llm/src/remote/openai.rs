//! OpenAI-compatible chat-completions client.
//!
//! Speaks the `/chat/completions` wire protocol, which most hosted and
//! self-hosted providers expose. Conversion between the engine's message
//! sum type and the wire format happens here so the rest of the system
//! never sees provider JSON.

use crate::config::RemoteLlmConfig;
use crate::error::{LlmError, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use steward_core::llm::{ChatModel, ChatRequest, ChatResponse, ToolDefinition, UsageMetadata};
use steward_core::{Message, ToolCall};

/// Client for OpenAI-compatible chat-completions APIs.
#[derive(Clone)]
pub struct OpenAiCompatClient {
    config: RemoteLlmConfig,
    http: reqwest::Client,
}

impl OpenAiCompatClient {
    /// Create a client from provider configuration.
    pub fn new(config: RemoteLlmConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(LlmError::Http)?;
        Ok(Self { config, http })
    }

    async fn post_completion(&self, body: WireRequest) -> Result<WireResponse> {
        let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    LlmError::Timeout(format!("{}s", self.config.timeout_secs))
                } else {
                    LlmError::Http(err)
                }
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response.json::<WireResponse>().await.map_err(LlmError::Http)?);
        }

        let detail = response.text().await.unwrap_or_default();
        Err(match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => LlmError::Authentication(detail),
            StatusCode::TOO_MANY_REQUESTS => LlmError::RateLimitExceeded(detail),
            s if s.is_server_error() => LlmError::ServiceUnavailable(format!("{s}: {detail}")),
            s => LlmError::InvalidRequest(format!("{s}: {detail}")),
        })
    }
}

#[async_trait]
impl ChatModel for OpenAiCompatClient {
    async fn chat(&self, request: ChatRequest) -> steward_core::Result<ChatResponse> {
        let model = request
            .model
            .clone()
            .unwrap_or_else(|| self.config.model.clone());

        let body = WireRequest {
            model,
            messages: request.messages.iter().map(to_wire_message).collect(),
            tools: if request.tools.is_empty() {
                None
            } else {
                Some(request.tools.iter().map(to_wire_tool).collect())
            },
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };

        let wire = self.post_completion(body).await?;
        let choice = wire.choices.into_iter().next().ok_or_else(|| {
            LlmError::InvalidResponse("response carried no choices".to_string())
        })?;

        let message = from_wire_message(choice.message)?;
        let usage = wire.usage.map(|u| UsageMetadata {
            input_tokens: u.prompt_tokens,
            output_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        });

        Ok(ChatResponse { message, usage })
    }

    async fn is_available(&self) -> bool {
        !self.config.api_key.is_empty()
    }
}

// Wire format --------------------------------------------------------------

#[derive(Debug, Serialize)]
struct WireRequest {
    model: String,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<WireTool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireMessage {
    role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<WireToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireToolCall {
    id: String,
    #[serde(rename = "type")]
    kind: String,
    function: WireFunction,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireFunction {
    name: String,
    /// JSON-encoded arguments, per the wire protocol
    arguments: String,
}

#[derive(Debug, Serialize)]
struct WireTool {
    #[serde(rename = "type")]
    kind: String,
    function: WireToolFunction,
}

#[derive(Debug, Serialize)]
struct WireToolFunction {
    name: String,
    description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    parameters: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    choices: Vec<WireChoice>,
    #[serde(default)]
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
struct WireChoice {
    message: WireMessage,
}

#[derive(Debug, Deserialize)]
struct WireUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

fn to_wire_message(message: &Message) -> WireMessage {
    match message {
        Message::System { content } => WireMessage {
            role: "system".to_string(),
            content: Some(content.clone()),
            tool_calls: None,
            tool_call_id: None,
        },
        Message::User { content } => WireMessage {
            role: "user".to_string(),
            content: Some(content.clone()),
            tool_calls: None,
            tool_call_id: None,
        },
        Message::Assistant {
            content,
            tool_calls,
        } => WireMessage {
            role: "assistant".to_string(),
            content: Some(content.clone()),
            tool_calls: if tool_calls.is_empty() {
                None
            } else {
                Some(
                    tool_calls
                        .iter()
                        .map(|call| WireToolCall {
                            id: call.id.clone(),
                            kind: "function".to_string(),
                            function: WireFunction {
                                name: call.name.clone(),
                                arguments: call.arguments.to_string(),
                            },
                        })
                        .collect(),
                )
            },
            tool_call_id: None,
        },
        Message::Tool {
            content,
            tool_call_id,
        } => WireMessage {
            role: "tool".to_string(),
            content: Some(content.clone()),
            tool_calls: None,
            tool_call_id: Some(tool_call_id.clone()),
        },
    }
}

fn to_wire_tool(tool: &ToolDefinition) -> WireTool {
    WireTool {
        kind: "function".to_string(),
        function: WireToolFunction {
            name: tool.name.clone(),
            description: tool.description.clone(),
            parameters: tool.parameters.clone(),
        },
    }
}

fn from_wire_message(wire: WireMessage) -> Result<Message> {
    if wire.role != "assistant" {
        return Err(LlmError::InvalidResponse(format!(
            "expected assistant message, got role '{}'",
            wire.role
        )));
    }

    let tool_calls = wire
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .map(|call| {
            // Providers encode arguments as a JSON string; tolerate plain
            // strings that fail to parse.
            let arguments = serde_json::from_str(&call.function.arguments)
                .unwrap_or(Value::String(call.function.arguments));
            ToolCall::new(call.id, call.function.name, arguments)
        })
        .collect::<Vec<_>>();

    Ok(Message::assistant_with_tools(
        wire.content.unwrap_or_default(),
        tool_calls,
    ))
}
