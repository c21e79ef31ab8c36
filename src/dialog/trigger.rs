//! Parses inbound events into triggers the mode machine understands.

use super::mode::ModeCommand;
use super::scripts::{MESSAGE_ACTION_PREFIX, PERSONA_PREFIX};

/// An inbound event, classified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trigger {
    /// A mode-selection command or main-menu button.
    Command(ModeCommand),
    /// Role-play persona button, carrying the persona's prompt id.
    Persona(String),
    /// Message-log action button, carrying the action's prompt id.
    MessageAction(String),
    /// Free text, interpreted by the current mode.
    Text(String),
    /// A command or button with no handler.
    Unknown(String),
}

impl Trigger {
    /// Classify a message. `button` is the data of a pressed button, if any.
    pub fn parse(content: &str, button: Option<&str>) -> Self {
        match button {
            Some(data) => parse_button(data),
            None => parse_text(content),
        }
    }
}

fn parse_button(data: &str) -> Trigger {
    if let Some(command) = ModeCommand::from_keyword(data) {
        Trigger::Command(command)
    } else if data.starts_with(PERSONA_PREFIX) {
        Trigger::Persona(data.to_string())
    } else if data.starts_with(MESSAGE_ACTION_PREFIX) {
        Trigger::MessageAction(data.to_string())
    } else {
        Trigger::Unknown(data.to_string())
    }
}

fn parse_text(content: &str) -> Trigger {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix('/') else {
        return Trigger::Text(content.to_string());
    };

    // `/start@SomeBot extra` → `start`
    let keyword = rest
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .split('@')
        .next()
        .unwrap_or_default()
        .to_lowercase();

    match ModeCommand::from_keyword(&keyword) {
        Some(command) => Trigger::Command(command),
        None => Trigger::Unknown(trimmed.to_string()),
    }
}
