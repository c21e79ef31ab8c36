//! Dialog core: sessions, modes and the engines that interpret user input.

mod effect;
mod interview;
mod machine;
mod mode;
pub mod scripts;
mod session;
mod store;
mod synthesis;
mod trigger;
mod turns;

#[cfg(test)]
pub(crate) mod test_support;

pub use effect::{Choice, DialogEffect, Render};
pub use interview::{InterviewEngine, InterviewScript, InterviewStep};
pub use machine::ModeMachine;
pub use mode::{Mode, ModeCommand};
pub use session::Session;
pub use store::{SessionHandle, SessionStore};
pub use synthesis::Synthesizer;
pub use trigger::Trigger;
pub use turns::{ThresholdPolicy, TurnCounterDialog};
