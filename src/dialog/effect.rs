//! Dispatch outcomes and presentation-neutral render instructions.

use serde::{Deserialize, Serialize};

/// What the mode machine decided in response to a free-text message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DialogEffect {
    /// Ask the next interview question.
    Prompt(String),
    /// Final answer from the oracle.
    OracleAnswer(String),
    /// The input was recorded; nothing else to say.
    Acknowledgement(String),
    /// Free text while idle: greet and show the menu.
    Greeting,
}

/// A button offered to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Choice {
    /// Data sent back when the button is pressed.
    pub key: String,
    /// Text shown on the button.
    pub label: String,
}

impl Choice {
    pub fn new(key: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
        }
    }
}

/// One presentation instruction. The core never renders anything itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Render {
    Text(String),
    TextWithChoices { text: String, choices: Vec<Choice> },
    /// Media identified by template id (resolved to a file by the caller).
    Media(String),
}

impl Render {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    pub fn media(template_id: impl Into<String>) -> Self {
        Self::Media(template_id.into())
    }

    pub fn with_choices(text: impl Into<String>, choices: Vec<Choice>) -> Self {
        Self::TextWithChoices {
            text: text.into(),
            choices,
        }
    }
}
