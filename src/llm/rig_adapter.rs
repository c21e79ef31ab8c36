//! Bridges rig's `CompletionModel` to our [`Oracle`] trait.

use async_trait::async_trait;
use rig::agent::AgentBuilder;
use rig::completion::{CompletionModel, Prompt};

use crate::error::LlmError;

use super::provider::Oracle;

/// Upper bound on generated tokens per answer.
const MAX_ANSWER_TOKENS: u64 = 1024;

/// Oracle backed by a rig completion model.
///
/// Each call builds a one-shot agent whose preamble is the prompt template and
/// whose single user message is the collected context.
pub struct RigAdapter<M: CompletionModel> {
    model: M,
    model_name: String,
    provider: &'static str,
}

impl<M: CompletionModel> RigAdapter<M> {
    pub fn new(model: M, model_name: &str, provider: &'static str) -> Self {
        Self {
            model,
            model_name: model_name.to_string(),
            provider,
        }
    }
}

#[async_trait]
impl<M> Oracle for RigAdapter<M>
where
    M: CompletionModel + 'static,
{
    fn model_name(&self) -> &str {
        &self.model_name
    }

    async fn ask(&self, prompt: &str, context: &str) -> Result<String, LlmError> {
        let agent = AgentBuilder::new(self.model.clone())
            .preamble(prompt)
            .max_tokens(MAX_ANSWER_TOKENS)
            .build();

        let answer = agent
            .prompt(context.to_string())
            .await
            .map_err(|e| LlmError::RequestFailed {
                provider: self.provider.to_string(),
                reason: e.to_string(),
            })?;

        if answer.trim().is_empty() {
            return Err(LlmError::EmptyResponse {
                provider: self.provider.to_string(),
            });
        }
        Ok(answer)
    }
}
