//! Turn counter dialog: collects free-text turns into the session's message
//! log and, depending on policy, synthesizes once a target count is reached.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::DialogError;

use super::effect::DialogEffect;
use super::scripts::{MESSAGE_SAVED, PERSONA_REQUIRED, turn_accepted};
use super::session::Session;
use super::synthesis::Synthesizer;

/// What happens when the message log reaches the target count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdPolicy {
    /// Call the oracle with the last `target` turns, then reset the session.
    SynthesizeAndReset,
    /// Accumulate indefinitely; every turn is acknowledged.
    Never,
}

/// Turn counter over `Session::message_log`.
#[derive(Debug, Clone)]
pub struct TurnCounterDialog {
    target: usize,
    policy: ThresholdPolicy,
    fallback_prompt: Option<&'static str>,
}

impl TurnCounterDialog {
    pub fn new(target: usize, policy: ThresholdPolicy) -> Self {
        Self {
            target: target.max(1),
            policy,
            fallback_prompt: None,
        }
    }

    /// Prompt used at the threshold when the session has no active prompt.
    pub fn with_fallback_prompt(mut self, prompt_id: &'static str) -> Self {
        self.fallback_prompt = Some(prompt_id);
        self
    }

    pub fn target(&self) -> usize {
        self.target
    }

    /// Record one turn.
    ///
    /// Under `SynthesizeAndReset` the turn that reaches the target triggers an
    /// oracle call with the prompt selected by `active_prompt_id`; the log is
    /// only reset once the call succeeds, and the triggering turn is not
    /// appended if it fails.
    pub async fn submit_turn(
        &self,
        session: &mut Session,
        text: &str,
        synthesizer: &Synthesizer,
    ) -> Result<DialogEffect, DialogError> {
        match self.policy {
            ThresholdPolicy::Never => {
                self.append(session, text);
                Ok(DialogEffect::Acknowledgement(MESSAGE_SAVED.to_string()))
            }
            ThresholdPolicy::SynthesizeAndReset => {
                let Some(prompt_id) = session
                    .active_prompt_id
                    .clone()
                    .or_else(|| self.fallback_prompt.map(String::from))
                else {
                    return Ok(DialogEffect::Acknowledgement(PERSONA_REQUIRED.to_string()));
                };

                let count = session.message_log.len() + 1;
                if count < self.target {
                    self.append(session, text);
                    return Ok(DialogEffect::Acknowledgement(turn_accepted(
                        count,
                        self.target,
                    )));
                }

                let context = self.window(&session.message_log, text).join("\n");
                let answer = synthesizer.synthesize(&prompt_id, &context).await?;

                session.reset();
                debug!(prompt_id = %prompt_id, target = self.target, "Turn target reached");
                Ok(DialogEffect::OracleAnswer(answer))
            }
        }
    }

    /// Synthesize immediately from the whole log, joined by blank lines.
    ///
    /// Used by message-log actions; the log is left intact and `prompt_id`
    /// becomes the session's active prompt once the call succeeds.
    pub async fn synthesize_log(
        &self,
        session: &mut Session,
        prompt_id: &str,
        synthesizer: &Synthesizer,
    ) -> Result<DialogEffect, DialogError> {
        let context = session.message_log.join("\n\n");
        let answer = synthesizer.synthesize(prompt_id, &context).await?;
        session.active_prompt_id = Some(prompt_id.to_string());
        session.touch();
        Ok(DialogEffect::OracleAnswer(answer))
    }

    fn append(&self, session: &mut Session, text: &str) {
        session.message_log.push(text.to_string());
        session.touch();
        debug!(turns = session.message_log.len(), "Turn recorded");
    }

    /// The most recent `target` turns, counting `latest` as the newest.
    fn window<'a>(&self, log: &'a [String], latest: &'a str) -> Vec<&'a str> {
        let keep_from_log = self.target - 1;
        let start = log.len().saturating_sub(keep_from_log);
        log[start..]
            .iter()
            .map(String::as_str)
            .chain(std::iter::once(latest))
            .collect()
    }
}
