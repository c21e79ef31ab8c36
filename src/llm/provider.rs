//! Oracle trait: the text-generation service as a question/answer box.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::LlmError;

/// A text-generation service consulted to produce user-facing answers.
#[async_trait]
pub trait Oracle: Send + Sync {
    /// Model identifier, for logs.
    fn model_name(&self) -> &str;

    /// Answer `context` under the instructions in `prompt`.
    async fn ask(&self, prompt: &str, context: &str) -> Result<String, LlmError>;
}

/// Bounds every call of the wrapped oracle by a timeout.
///
/// An expired call surfaces as [`LlmError::Timeout`].
pub struct TimeoutOracle {
    inner: Arc<dyn Oracle>,
    timeout: Duration,
}

impl TimeoutOracle {
    pub fn new(inner: Arc<dyn Oracle>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }
}

#[async_trait]
impl Oracle for TimeoutOracle {
    fn model_name(&self) -> &str {
        self.inner.model_name()
    }

    async fn ask(&self, prompt: &str, context: &str) -> Result<String, LlmError> {
        match tokio::time::timeout(self.timeout, self.inner.ask(prompt, context)).await {
            Ok(result) => result,
            Err(_) => Err(LlmError::Timeout {
                provider: self.inner.model_name().to_string(),
                timeout: self.timeout,
            }),
        }
    }
}
