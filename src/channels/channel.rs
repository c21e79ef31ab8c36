//! Channel trait and the message types that flow through it.

use std::path::PathBuf;
use std::pin::Pin;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::Stream;
use uuid::Uuid;

use crate::dialog::Choice;
use crate::error::ChannelError;

/// A message received from a user on some channel.
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    pub id: Uuid,
    /// Name of the channel it arrived on.
    pub channel: String,
    /// Stable user identity within the channel. Sessions are keyed by this.
    pub user_id: String,
    pub user_name: Option<String>,
    /// Message text. Empty for button presses.
    pub content: String,
    /// Data of the pressed button, if this event is a button press.
    pub button: Option<String>,
    /// Channel-specific routing data (chat id, callback id, ...).
    pub metadata: serde_json::Value,
    pub received_at: DateTime<Utc>,
}

impl IncomingMessage {
    pub fn new(
        channel: impl Into<String>,
        user_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            channel: channel.into(),
            user_id: user_id.into(),
            user_name: None,
            content: content.into(),
            button: None,
            metadata: serde_json::Value::Null,
            received_at: Utc::now(),
        }
    }

    /// A button press carrying `data`.
    pub fn button_press(
        channel: impl Into<String>,
        user_id: impl Into<String>,
        data: impl Into<String>,
    ) -> Self {
        let mut msg = Self::new(channel, user_id, "");
        msg.button = Some(data.into());
        msg
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_user_name(mut self, name: impl Into<String>) -> Self {
        self.user_name = Some(name.into());
        self
    }
}

/// One message to send back to the user.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OutgoingResponse {
    pub content: String,
    /// Buttons attached below the text.
    pub choices: Vec<Choice>,
    /// Image file to send instead of text.
    pub media: Option<PathBuf>,
}

impl OutgoingResponse {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Self::default()
        }
    }

    pub fn with_choices(mut self, choices: Vec<Choice>) -> Self {
        self.choices = choices;
        self
    }

    pub fn photo(path: impl Into<PathBuf>) -> Self {
        Self {
            media: Some(path.into()),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty() && self.choices.is_empty() && self.media.is_none()
    }
}

/// Progress indications a channel may surface while a message is handled.
#[derive(Debug, Clone)]
pub enum StatusUpdate {
    /// Waiting on the oracle.
    Thinking(String),
}

pub type MessageStream = Pin<Box<dyn Stream<Item = IncomingMessage> + Send>>;

/// A transport that delivers user messages and renders responses.
#[async_trait]
pub trait Channel: Send + Sync {
    fn name(&self) -> &str;

    /// Start listening and return the stream of inbound messages.
    async fn start(&self) -> Result<MessageStream, ChannelError>;

    /// Send a response to the user who sent `msg`.
    async fn respond(
        &self,
        msg: &IncomingMessage,
        response: OutgoingResponse,
    ) -> Result<(), ChannelError>;

    async fn send_status(
        &self,
        _status: StatusUpdate,
        _metadata: &serde_json::Value,
    ) -> Result<(), ChannelError> {
        Ok(())
    }

    /// Verify the transport is usable. Called once before `start`.
    async fn health_check(&self) -> Result<(), ChannelError>;

    async fn shutdown(&self) -> Result<(), ChannelError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn button_press_has_empty_content() {
        let msg = IncomingMessage::button_press("cli", "u1", "date_hardy");
        assert!(msg.content.is_empty());
        assert_eq!(msg.button.as_deref(), Some("date_hardy"));
        assert_eq!(msg.user_id, "u1");
    }

    #[test]
    fn builders_set_fields() {
        let msg = IncomingMessage::new("telegram", "42", "hi")
            .with_user_name("Alice")
            .with_metadata(serde_json::json!({"chat_id": "7"}));
        assert_eq!(msg.user_name.as_deref(), Some("Alice"));
        assert_eq!(msg.metadata["chat_id"], "7");
        assert!(msg.button.is_none());
    }

    #[test]
    fn outgoing_emptiness() {
        assert!(OutgoingResponse::default().is_empty());
        assert!(!OutgoingResponse::text("x").is_empty());
        assert!(!OutgoingResponse::photo("/tmp/a.jpg").is_empty());
        let menu = OutgoingResponse::text("menu").with_choices(vec![Choice::new("gpt", "GPT")]);
        assert_eq!(menu.choices.len(), 1);
    }
}
