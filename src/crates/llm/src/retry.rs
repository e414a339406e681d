//! Retry with exponential backoff for LLM calls.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use steward_core::llm::{ChatModel, ChatRequest, ChatResponse};
use steward_core::{EngineError, Result};
use tracing::{debug, warn};

/// Retry strategy configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first
    pub max_attempts: u32,

    /// Initial backoff delay in milliseconds
    pub initial_backoff_ms: u64,

    /// Maximum backoff delay in milliseconds
    pub max_backoff_ms: u64,

    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,

    /// Whether to add random jitter to backoff delays
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 500,
            max_backoff_ms: 10_000,
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// Calculate the backoff delay before the given retry (0-based).
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let delay_ms = (self.initial_backoff_ms as f64
            * self.backoff_multiplier.powi(attempt as i32)) as u64;
        let delay_ms = delay_ms.min(self.max_backoff_ms);

        let delay_ms = if self.jitter {
            // Up to 25% random jitter
            let jitter_amount = (delay_ms as f64 * 0.25 * rand::random::<f64>()) as u64;
            delay_ms + jitter_amount
        } else {
            delay_ms
        };

        Duration::from_millis(delay_ms)
    }
}

/// Call the model, retrying transient failures with backoff.
///
/// Non-retryable errors are returned immediately; retryable ones are
/// retried up to `max_attempts` total attempts, then the last error is
/// surfaced.
pub async fn chat_with_retry(
    model: &dyn ChatModel,
    request: ChatRequest,
    config: &RetryConfig,
) -> Result<ChatResponse> {
    let mut last_err: Option<EngineError> = None;

    for attempt in 0..config.max_attempts {
        if attempt > 0 {
            let delay = config.backoff_delay(attempt - 1);
            debug!(attempt, delay_ms = delay.as_millis() as u64, "retrying LLM call");
            tokio::time::sleep(delay).await;
        }

        match model.chat(request.clone()).await {
            Ok(response) => return Ok(response),
            Err(err) if err.is_retryable() => {
                warn!(attempt, error = %err, "transient LLM failure");
                last_err = Some(err);
            }
            Err(err) => return Err(err),
        }
    }

    Err(last_err.unwrap_or_else(|| EngineError::Agent {
        message: "LLM retry loop exhausted without an error".to_string(),
        retryable: false,
    }))
}
