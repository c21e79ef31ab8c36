//! Per-user session record.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::mode::Mode;

/// Mutable conversation state for one user identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Current mode.
    pub mode: Mode,
    /// Index into the active interview script.
    pub turn_index: usize,
    /// Interview answers keyed by question key.
    pub collected_answers: HashMap<String, String>,
    /// Free-text turns collected by the turn counter dialog.
    pub message_log: Vec<String>,
    /// Prompt template chosen through a sub-choice (persona, message action).
    pub active_prompt_id: Option<String>,
    /// Last time an event touched this session.
    pub updated_at: DateTime<Utc>,
}

impl Default for Session {
    fn default() -> Self {
        Self {
            mode: Mode::Idle,
            turn_index: 0,
            collected_answers: HashMap::new(),
            message_log: Vec::new(),
            active_prompt_id: None,
            updated_at: Utc::now(),
        }
    }
}

impl Session {
    /// Clear all transient fields. The mode is preserved.
    pub fn reset(&mut self) {
        self.turn_index = 0;
        self.collected_answers.clear();
        self.message_log.clear();
        self.active_prompt_id = None;
        self.touch();
    }

    /// Switch to `mode`, clearing transient fields.
    pub fn enter(&mut self, mode: Mode) {
        self.reset();
        self.mode = mode;
    }

    pub(crate) fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
