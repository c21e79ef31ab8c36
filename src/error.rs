//! Error types for matchmate.

use std::time::Duration;

use crate::dialog::Mode;

/// Top-level error type for the bot.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Template error: {0}")]
    Template(#[from] TemplateError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Channel-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Channel {name} failed to start: {reason}")]
    StartupFailed { name: String, reason: String },

    #[error("Failed to send response on channel {name}: {reason}")]
    SendFailed { name: String, reason: String },

    #[error("Unknown channel: {0}")]
    UnknownChannel(String),
}

/// Oracle (LLM provider) errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Provider {provider} did not answer within {timeout:?}")]
    Timeout {
        provider: String,
        timeout: Duration,
    },

    #[error("Empty response from {provider}")]
    EmptyResponse { provider: String },
}

/// Template loading and lookup errors.
#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    #[error("Template directory not found: {0}")]
    RootNotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while dispatching an inbound event through the mode machine.
///
/// Every variant leaves the session exactly as it was before the event.
#[derive(Debug, thiserror::Error)]
pub enum DialogError {
    #[error("Oracle call failed: {0}")]
    OracleFailure(#[from] LlmError),

    #[error("Turn index {turn_index} out of range for {mode} ({limit} steps)")]
    InvariantViolation {
        mode: Mode,
        turn_index: usize,
        limit: usize,
    },

    #[error("No handler for trigger: {0}")]
    UnrecognizedTrigger(String),

    #[error("Missing {kind} template: {id}")]
    MissingTemplate { kind: &'static str, id: String },
}
