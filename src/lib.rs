//! Matchmate: a dating-assistant chat bot driven by a per-user mode machine.

pub mod bot;
pub mod channels;
pub mod config;
pub mod dialog;
pub mod error;
pub mod llm;
pub mod templates;
