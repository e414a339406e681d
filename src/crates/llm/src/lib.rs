//! LLM provider implementations for steward.
//!
//! Concrete implementations of the `ChatModel` trait from `steward-core`.
//! The only shipped provider speaks the OpenAI-compatible chat-completions
//! protocol, which also covers self-hosted gateways exposing that API.
//! Transient provider failures are classified on [`LlmError`] and retried
//! by [`retry::chat_with_retry`] with exponential backoff and jitter.

pub mod config;
pub mod error;
pub mod remote;
pub mod retry;

pub use config::RemoteLlmConfig;
pub use error::{LlmError, Result};
pub use remote::OpenAiCompatClient;
pub use retry::{chat_with_retry, RetryConfig};
