//! The chat model trait.
//!
//! The orchestrator is an orchestration framework, not an LLM client
//! library: the core owns this minimal trait and stays provider-agnostic.
//! Implementations convert messages to their wire format, make the API
//! call, and convert the response back.

use crate::error::Result;
use crate::llm::request::{ChatRequest, ChatResponse};
use async_trait::async_trait;

/// A chat-based language model.
///
/// Implementations must be `Send + Sync`; share them across nodes as
/// `Arc<dyn ChatModel>`. Provider errors surface as
/// [`EngineError::Agent`](crate::EngineError::Agent) with the retryable
/// flag set for transient failures (network, timeout, rate limit, 5xx).
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Generate a complete response for the request.
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse>;

    /// Whether the provider is reachable and configured.
    ///
    /// Used by health checks; the default assumes availability.
    async fn is_available(&self) -> bool {
        true
    }
}
