//! The agent runtime: tool selection, binding, and the LLM loop.

use crate::agents::cache::{Binding, BindingCache};
use crate::agents::executor::{error_marker, ToolExecutor};
use crate::agents::spec::AgentRegistry;
use crate::metrics::Metrics;
use crate::tools::{select_tools, ToolCatalog, ToolStrategy};
use llm::{chat_with_retry, RetryConfig};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use steward_core::llm::{ChatModel, ToolDefinition};
use steward_core::messages::last_user_content;
use steward_core::{EngineError, Message, Result, WorkflowState};

/// Task descriptions are truncated before tool selection; they are never
/// rewritten into the conversation.
const TASK_DESCRIPTION_LIMIT: usize = 500;

/// The messages an agent invocation produced.
#[derive(Debug)]
pub struct AgentTurn {
    /// New messages in append order (assistant and tool messages)
    pub messages: Vec<Message>,
    /// Whether the per-invocation hop limit cut the loop short
    pub hop_limit_reached: bool,
}

impl AgentTurn {
    /// Content of the final assistant message, if any.
    pub fn final_text(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.is_assistant())
            .map(|m| m.content())
    }
}

/// Invokes agents: binds tools, calls the LLM, executes tool calls.
pub struct AgentRuntime {
    registry: Arc<AgentRegistry>,
    catalog: Arc<ToolCatalog>,
    model: Arc<dyn ChatModel>,
    executor: Arc<dyn ToolExecutor>,
    bindings: BindingCache,
    retry: RetryConfig,
    metrics: Arc<Metrics>,
    per_agent_models: HashMap<String, String>,
    per_agent_strategy: HashMap<String, ToolStrategy>,
    max_tools: usize,
    hop_limit: u32,
    default_model: String,
}

impl AgentRuntime {
    /// Create a runtime.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        registry: Arc<AgentRegistry>,
        catalog: Arc<ToolCatalog>,
        model: Arc<dyn ChatModel>,
        executor: Arc<dyn ToolExecutor>,
        metrics: Arc<Metrics>,
        per_agent_models: HashMap<String, String>,
        per_agent_strategy: HashMap<String, ToolStrategy>,
        max_tools: usize,
        hop_limit: u32,
        default_model: String,
    ) -> Self {
        Self {
            registry,
            catalog,
            model,
            executor,
            bindings: BindingCache::new(200),
            retry: RetryConfig::default(),
            metrics,
            per_agent_models,
            per_agent_strategy,
            max_tools,
            hop_limit,
            default_model,
        }
    }

    /// The agent registry.
    pub fn registry(&self) -> &AgentRegistry {
        &self.registry
    }

    fn spec(&self, agent_name: &str) -> Result<std::sync::Arc<crate::agents::spec::AgentSpec>> {
        self.registry
            .get(agent_name)
            .ok_or_else(|| EngineError::UnknownNode(agent_name.to_string()))
    }

    /// Run one agent turn against the current state.
    pub async fn invoke(&self, agent_name: &str, state: &WorkflowState) -> Result<AgentTurn> {
        let spec = self.spec(agent_name)?;

        // The task description feeds tool selection only.
        let task_description: String = last_user_content(&state.messages)
            .unwrap_or_default()
            .chars()
            .take(TASK_DESCRIPTION_LIMIT)
            .collect();

        let strategy = self
            .per_agent_strategy
            .get(agent_name)
            .copied()
            .unwrap_or(spec.tool_strategy);
        let snapshot = self.catalog.snapshot().await;
        let selection = select_tools(
            &task_description,
            &spec.profile,
            strategy,
            &snapshot.tools,
            self.max_tools,
        );

        let binding = self.bindings.get_or_insert(agent_name, &selection.hash, || {
            let tools: Vec<ToolDefinition> = selection
                .tools
                .iter()
                .map(|t| {
                    let mut def =
                        ToolDefinition::new(t.tool_name.clone(), t.description.clone());
                    if let Some(schema) = &t.input_schema {
                        def = def.with_parameters(schema.clone());
                    }
                    def
                })
                .collect();
            Binding {
                tools,
                temperature: spec.temperature,
                max_tokens: spec.max_tokens,
                model: self.per_agent_models.get(agent_name).cloned(),
            }
        });

        self.run_loop(agent_name, &binding, state).await
    }

    /// Run one agent turn with no tool loading at all.
    ///
    /// The conversational fast path answers queries directly: no catalog
    /// snapshot, no selection, no binding cache, and an empty tool list on
    /// the request.
    pub async fn invoke_untooled(
        &self,
        agent_name: &str,
        state: &WorkflowState,
    ) -> Result<AgentTurn> {
        let spec = self.spec(agent_name)?;
        let binding = Binding {
            tools: Vec::new(),
            temperature: spec.temperature,
            max_tokens: spec.max_tokens,
            model: self.per_agent_models.get(agent_name).cloned(),
        };
        self.run_loop(agent_name, &binding, state).await
    }

    async fn run_loop(
        &self,
        agent_name: &str,
        binding: &Binding,
        state: &WorkflowState,
    ) -> Result<AgentTurn> {
        let spec = self.spec(agent_name)?;
        let model_label = binding
            .model
            .clone()
            .unwrap_or_else(|| self.default_model.clone());

        let mut context = state.messages.clone();
        if !context.first().map(Message::is_system).unwrap_or(false) {
            context.insert(0, Message::system(spec.system_prompt.clone()));
        }

        let mut appended: Vec<Message> = Vec::new();
        let mut hop_limit_reached = false;

        for hop in 0..=self.hop_limit {
            if hop == self.hop_limit {
                tracing::warn!(agent = agent_name, limit = self.hop_limit, "invocation hop limit reached");
                hop_limit_reached = true;
                break;
            }

            let started = Instant::now();
            let response =
                chat_with_retry(self.model.as_ref(), binding.request(context.clone()), &self.retry)
                    .await?;
            self.metrics
                .llm_calls_total
                .inc(&[agent_name, &model_label]);
            self.metrics
                .llm_latency_seconds
                .observe(&[], started.elapsed().as_secs_f64());

            let assistant = response.message;
            context.push(assistant.clone());
            appended.push(assistant.clone());

            let tool_calls = assistant.tool_calls().to_vec();
            if tool_calls.is_empty() {
                break;
            }

            for call in &tool_calls {
                let content = match self.executor.execute(call).await {
                    Ok(output) => output,
                    Err(err) => {
                        tracing::warn!(tool = %call.name, error = %err, "tool execution failed");
                        error_marker(call, &err)
                    }
                };
                let tool_message = Message::tool(content, call.id.clone());
                context.push(tool_message.clone());
                appended.push(tool_message);
            }
        }

        Ok(AgentTurn {
            messages: appended,
            hop_limit_reached,
        })
    }
}
