//! Stub oracle shared by the dialog unit tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::LlmError;
use crate::llm::Oracle;
use crate::templates::TemplateLibrary;

use super::synthesis::Synthesizer;

/// Records every call and answers `"answer"`, or fails while `failing` is set.
#[derive(Default)]
pub struct RecordingOracle {
    pub calls: Mutex<Vec<(String, String)>>,
    pub failing: AtomicBool,
}

impl RecordingOracle {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub async fn call_count(&self) -> usize {
        self.calls.lock().await.len()
    }

    pub async fn last_call(&self) -> Option<(String, String)> {
        self.calls.lock().await.last().cloned()
    }
}

#[async_trait]
impl Oracle for RecordingOracle {
    fn model_name(&self) -> &str {
        "recording"
    }

    async fn ask(&self, prompt: &str, context: &str) -> Result<String, LlmError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(LlmError::RequestFailed {
                provider: "recording".into(),
                reason: "service unavailable".into(),
            });
        }
        self.calls
            .lock()
            .await
            .push((prompt.to_string(), context.to_string()));
        Ok("answer".to_string())
    }
}

/// Templates with a prompt for every id the dialogs use.
pub fn templates() -> TemplateLibrary {
    let mut library = TemplateLibrary::new()
        .with_prompt("gpt", "PROMPT gpt")
        .with_prompt("profile", "PROMPT profile")
        .with_prompt("opener", "PROMPT opener");
    for (id, _) in super::scripts::PERSONAS
        .iter()
        .chain(super::scripts::MESSAGE_ACTIONS)
    {
        library = library.with_prompt(id, &format!("PROMPT {id}"));
    }
    for keyword in ["main", "gpt", "date", "profile", "opener", "message"] {
        library = library.with_message(keyword, &format!("INTRO {keyword}"));
    }
    library
}

pub fn synthesizer(oracle: &Arc<RecordingOracle>) -> Synthesizer {
    Synthesizer::new(oracle.clone(), Arc::new(templates()))
}
