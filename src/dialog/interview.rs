//! Interview engine: asks a fixed ordered list of questions, one per inbound
//! message, then synthesizes a final oracle query from all answers.

use tracing::debug;

use crate::error::DialogError;

use super::effect::DialogEffect;
use super::mode::Mode;
use super::session::Session;
use super::synthesis::Synthesizer;

/// One question of an interview: the answer is stored under `key`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterviewStep {
    pub key: &'static str,
    pub question: &'static str,
}

impl InterviewStep {
    pub const fn new(key: &'static str, question: &'static str) -> Self {
        Self { key, question }
    }
}

/// An ordered question list plus the prompt template used at synthesis.
#[derive(Debug, Clone)]
pub struct InterviewScript {
    prompt_id: &'static str,
    steps: &'static [InterviewStep],
}

impl InterviewScript {
    pub const fn new(prompt_id: &'static str, steps: &'static [InterviewStep]) -> Self {
        Self { prompt_id, steps }
    }

    fn len(&self) -> usize {
        self.steps.len()
    }

    /// The question that opens the interview.
    pub fn opening_question(&self) -> Option<&'static str> {
        self.steps.first().map(|s| s.question)
    }

    /// Question asked after step `index` is answered; `None` after the last.
    pub fn follow_up(&self, index: usize) -> Option<&'static str> {
        self.steps.get(index + 1).map(|s| s.question)
    }

    /// Serialize answers in the script's declared order, one `key: value` per
    /// line. Keys without an answer are skipped.
    pub fn render_answers<'a>(&self, answer_for: impl Fn(&str) -> Option<&'a str>) -> String {
        self.steps
            .iter()
            .filter_map(|step| answer_for(step.key).map(|v| format!("{}: {}", step.key, v)))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Drives one interview script over a session.
pub struct InterviewEngine {
    mode: Mode,
    script: InterviewScript,
}

impl InterviewEngine {
    pub fn new(mode: Mode, script: InterviewScript) -> Self {
        Self { mode, script }
    }

    pub fn script(&self) -> &InterviewScript {
        &self.script
    }

    /// Record `text` as the answer to the current question.
    ///
    /// Returns the next question, or the oracle's answer once the last question
    /// is answered (and the session is reset). On the synthesis branch nothing
    /// is stored until the oracle succeeds, so a failed call can be retried by
    /// sending the last answer again.
    ///
    /// An out-of-range `turn_index` fails with `InvariantViolation` and
    /// leaves the session untouched.
    pub async fn submit_answer(
        &self,
        session: &mut Session,
        text: &str,
        synthesizer: &Synthesizer,
    ) -> Result<DialogEffect, DialogError> {
        let index = session.turn_index;
        let Some(step) = self.script.steps.get(index) else {
            return Err(DialogError::InvariantViolation {
                mode: self.mode,
                turn_index: index,
                limit: self.script.len(),
            });
        };

        if let Some(next_question) = self.script.follow_up(index) {
            session
                .collected_answers
                .insert(step.key.to_string(), text.to_string());
            session.turn_index += 1;
            session.touch();
            debug!(mode = %self.mode, turn_index = session.turn_index, "Interview answer stored");
            return Ok(DialogEffect::Prompt(next_question.to_string()));
        }

        let context = self.script.render_answers(|key| {
            if key == step.key {
                Some(text)
            } else {
                session.collected_answers.get(key).map(String::as_str)
            }
        });
        let answer = synthesizer
            .synthesize(self.script.prompt_id, &context)
            .await?;

        session.reset();
        debug!(mode = %self.mode, "Interview complete");
        Ok(DialogEffect::OracleAnswer(answer))
    }
}
