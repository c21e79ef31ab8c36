//! Synthesis: one oracle call with a named prompt template.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::DialogError;
use crate::llm::Oracle;
use crate::templates::TemplateLibrary;

/// Resolves prompt ids and calls the oracle.
///
/// Callers must not touch session state until `synthesize` has returned `Ok`.
pub struct Synthesizer {
    oracle: Arc<dyn Oracle>,
    templates: Arc<TemplateLibrary>,
}

impl Synthesizer {
    pub fn new(oracle: Arc<dyn Oracle>, templates: Arc<TemplateLibrary>) -> Self {
        Self { oracle, templates }
    }

    pub fn templates(&self) -> &TemplateLibrary {
        &self.templates
    }

    /// Check that a prompt template exists without calling the oracle.
    pub fn require_prompt(&self, prompt_id: &str) -> Result<&str, DialogError> {
        self.templates
            .prompt(prompt_id)
            .ok_or_else(|| DialogError::MissingTemplate {
                kind: "prompt",
                id: prompt_id.to_string(),
            })
    }

    /// Ask the oracle to answer `context` under the `prompt_id` template.
    pub async fn synthesize(&self, prompt_id: &str, context: &str) -> Result<String, DialogError> {
        let prompt = self.require_prompt(prompt_id)?;
        debug!(
            prompt_id,
            model = self.oracle.model_name(),
            context_chars = context.chars().count(),
            "Calling oracle"
        );

        self.oracle.ask(prompt, context).await.map_err(|e| {
            warn!(prompt_id, error = %e, "Oracle call failed");
            DialogError::OracleFailure(e)
        })
    }
}
