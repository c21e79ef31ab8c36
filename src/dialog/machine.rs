//! Mode state machine: decides, per inbound event, which engine handles it,
//! what the session looks like afterwards, and what the user sees.

use std::sync::Arc;

use tracing::{debug, info};

use crate::config::DialogConfig;
use crate::error::DialogError;
use crate::llm::Oracle;
use crate::templates::TemplateLibrary;

use super::effect::{DialogEffect, Render};
use super::interview::InterviewEngine;
use super::mode::{Mode, ModeCommand};
use super::scripts::{self, FREEFORM_PROMPT, GREETING, GREETING_MEDIA, MENU_TITLE};
use super::session::Session;
use super::synthesis::Synthesizer;
use super::trigger::Trigger;
use super::turns::{ThresholdPolicy, TurnCounterDialog};

/// Owns the per-mode engines and routes triggers to them.
///
/// Every handler either returns an error with the session untouched, or
/// applies its whole state change.
pub struct ModeMachine {
    synthesizer: Synthesizer,
    profile: InterviewEngine,
    opener: InterviewEngine,
    role_play: TurnCounterDialog,
    message_log: TurnCounterDialog,
}

impl ModeMachine {
    pub fn new(
        oracle: Arc<dyn Oracle>,
        templates: Arc<TemplateLibrary>,
        config: &DialogConfig,
    ) -> Self {
        let (first_action, _) = scripts::MESSAGE_ACTIONS[0];
        Self {
            synthesizer: Synthesizer::new(oracle, templates),
            profile: InterviewEngine::new(Mode::ProfileBuild, scripts::profile_script()),
            opener: InterviewEngine::new(Mode::OpenerBuild, scripts::opener_script()),
            role_play: TurnCounterDialog::new(
                config.role_play_turns,
                ThresholdPolicy::SynthesizeAndReset,
            ),
            message_log: TurnCounterDialog::new(
                config.message_log_turns,
                config.message_log_policy,
            )
            .with_fallback_prompt(first_action),
        }
    }

    /// Handle one classified event and return what to show the user.
    pub async fn handle(
        &self,
        session: &mut Session,
        trigger: Trigger,
    ) -> Result<Vec<Render>, DialogError> {
        match trigger {
            Trigger::Command(command) => self.select_mode(session, command),
            Trigger::Persona(id) => self.choose_persona(session, &id),
            Trigger::MessageAction(id) => {
                let effect = self.run_message_action(session, &id).await?;
                Ok(self.present(effect))
            }
            Trigger::Text(text) => {
                let effect = self.dispatch(session, &text).await?;
                Ok(self.present(effect))
            }
            Trigger::Unknown(raw) => Err(DialogError::UnrecognizedTrigger(raw)),
        }
    }

    /// Interpret free text according to the session's mode.
    pub async fn dispatch(
        &self,
        session: &mut Session,
        text: &str,
    ) -> Result<DialogEffect, DialogError> {
        debug!(mode = %session.mode, turn_index = session.turn_index, "Dispatching text");
        match session.mode {
            Mode::Idle => Ok(DialogEffect::Greeting),
            Mode::FreeformQa => {
                let answer = self.synthesizer.synthesize(FREEFORM_PROMPT, text).await?;
                Ok(DialogEffect::OracleAnswer(answer))
            }
            Mode::RolePlay => {
                self.role_play
                    .submit_turn(session, text, &self.synthesizer)
                    .await
            }
            Mode::ProfileBuild => {
                self.profile
                    .submit_answer(session, text, &self.synthesizer)
                    .await
            }
            Mode::OpenerBuild => {
                self.opener
                    .submit_answer(session, text, &self.synthesizer)
                    .await
            }
            Mode::MessageLog => {
                self.message_log
                    .submit_turn(session, text, &self.synthesizer)
                    .await
            }
        }
    }

    /// Turn a dispatch effect into render instructions.
    pub fn present(&self, effect: DialogEffect) -> Vec<Render> {
        match effect {
            DialogEffect::Prompt(text)
            | DialogEffect::OracleAnswer(text)
            | DialogEffect::Acknowledgement(text) => vec![Render::Text(text)],
            DialogEffect::Greeting => vec![
                Render::text(GREETING),
                Render::media(GREETING_MEDIA),
                main_menu(),
            ],
        }
    }

    fn select_mode(
        &self,
        session: &mut Session,
        command: ModeCommand,
    ) -> Result<Vec<Render>, DialogError> {
        let renders = self.intro(command);
        session.enter(command.target());
        info!(mode = %session.mode, "Mode selected");
        Ok(renders)
    }

    /// Media, intro text and (where the mode has them) buttons or the first
    /// question for a freshly entered mode.
    fn intro(&self, command: ModeCommand) -> Vec<Render> {
        let intro_id = command.intro_id();
        let message = self.synthesizer.templates().message(intro_id);
        let mut renders = vec![Render::media(intro_id)];

        match command {
            ModeCommand::Start => {
                renders.extend(message.map(Render::text));
                renders.push(main_menu());
            }
            ModeCommand::FreeformQa => renders.extend(message.map(Render::text)),
            ModeCommand::RolePlay => renders.push(Render::with_choices(
                message.unwrap_or(MENU_TITLE),
                scripts::persona_choices(),
            )),
            ModeCommand::LogMessages => renders.push(Render::with_choices(
                message.unwrap_or(MENU_TITLE),
                scripts::message_action_choices(),
            )),
            ModeCommand::BuildProfile | ModeCommand::BuildOpener => {
                let engine = if command == ModeCommand::BuildProfile {
                    &self.profile
                } else {
                    &self.opener
                };
                renders.extend(message.map(Render::text));
                renders.extend(engine.script().opening_question().map(Render::text));
            }
        }
        renders
    }

    /// Select a role-play persona. Entering from another mode resets the
    /// session into role-play first.
    fn choose_persona(&self, session: &mut Session, id: &str) -> Result<Vec<Render>, DialogError> {
        if !scripts::is_persona(id) {
            return Err(DialogError::UnrecognizedTrigger(id.to_string()));
        }
        self.synthesizer.require_prompt(id)?;

        if session.mode != Mode::RolePlay {
            session.enter(Mode::RolePlay);
        }
        session.active_prompt_id = Some(id.to_string());
        session.touch();
        info!(persona = id, "Persona selected");

        Ok(vec![
            Render::media(id),
            Render::text(scripts::persona_chosen(self.role_play.target())),
        ])
    }

    /// Run a message-log action against the collected log.
    async fn run_message_action(
        &self,
        session: &mut Session,
        id: &str,
    ) -> Result<DialogEffect, DialogError> {
        if !scripts::is_message_action(id) || session.mode != Mode::MessageLog {
            return Err(DialogError::UnrecognizedTrigger(id.to_string()));
        }
        self.message_log
            .synthesize_log(session, id, &self.synthesizer)
            .await
    }
}

fn main_menu() -> Render {
    Render::with_choices(MENU_TITLE, scripts::main_menu())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialog::scripts::{MESSAGE_SAVED, PERSONA_REQUIRED};
    use crate::dialog::test_support::{RecordingOracle, templates};

    fn machine(oracle: &Arc<RecordingOracle>) -> ModeMachine {
        ModeMachine::new(
            oracle.clone(),
            Arc::new(templates()),
            &DialogConfig::default(),
        )
    }

    async fn send(machine: &ModeMachine, session: &mut Session, text: &str) -> Vec<Render> {
        machine
            .handle(session, Trigger::parse(text, None))
            .await
            .unwrap()
    }

    async fn press(
        machine: &ModeMachine,
        session: &mut Session,
        button: &str,
    ) -> Result<Vec<Render>, DialogError> {
        machine.handle(session, Trigger::parse("", Some(button))).await
    }

    #[tokio::test]
    async fn start_shows_intro_and_menu() {
        let oracle = RecordingOracle::new();
        let machine = machine(&oracle);
        let mut session = Session::default();

        let renders = send(&machine, &mut session, "/start").await;

        assert_eq!(renders[0], Render::media("main"));
        assert_eq!(renders[1], Render::text("INTRO main"));
        assert!(matches!(
            renders.last(),
            Some(Render::TextWithChoices { choices, .. }) if choices.len() == 6
        ));
        assert_eq!(session.mode, Mode::Idle);
    }

    #[tokio::test]
    async fn idle_text_greets_without_mutation() {
        let oracle = RecordingOracle::new();
        let machine = machine(&oracle);
        let mut session = Session::default();

        let renders = send(&machine, &mut session, "hello?").await;

        assert_eq!(renders[0], Render::text(GREETING));
        assert_eq!(renders[1], Render::media(GREETING_MEDIA));
        assert!(matches!(renders[2], Render::TextWithChoices { .. }));
        assert_eq!(session.mode, Mode::Idle);
        assert_eq!(oracle.call_count().await, 0);
    }

    #[tokio::test]
    async fn profile_scenario_end_to_end() {
        let oracle = RecordingOracle::new();
        let machine = machine(&oracle);
        let mut session = Session::default();

        let renders = send(&machine, &mut session, "/profile").await;
        assert_eq!(renders.last(), Some(&Render::text("Сколько вам лет?")));
        assert_eq!(session.mode, Mode::ProfileBuild);

        let renders = send(&machine, &mut session, "25").await;
        assert_eq!(renders, vec![Render::text("Кем вы работаете?")]);
        assert_eq!(session.turn_index, 1);

        let renders = send(&machine, &mut session, "engineer").await;
        assert_eq!(renders, vec![Render::text("У вас есть хобби?")]);
        assert_eq!(session.turn_index, 2);

        send(&machine, &mut session, "chess").await;
        send(&machine, &mut session, "lies").await;
        assert_eq!(oracle.call_count().await, 0);

        let renders = send(&machine, &mut session, "dating").await;
        assert_eq!(renders, vec![Render::text("answer")]);
        assert_eq!(oracle.call_count().await, 1);
        assert_eq!(session.turn_index, 0);
        assert!(session.collected_answers.is_empty());
        assert_eq!(session.mode, Mode::ProfileBuild);
    }

    #[tokio::test]
    async fn stale_interview_index_surfaces_as_invariant_violation() {
        let oracle = RecordingOracle::new();
        let machine = machine(&oracle);
        let mut session = Session {
            mode: Mode::ProfileBuild,
            turn_index: 7,
            ..Session::default()
        };

        let err = machine
            .handle(&mut session, Trigger::parse("late answer", None))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            DialogError::InvariantViolation { mode: Mode::ProfileBuild, turn_index: 7, limit: 5 }
        ));
        assert_eq!(session.mode, Mode::ProfileBuild);
        assert_eq!(session.turn_index, 7);
        assert!(session.collected_answers.is_empty());
        assert_eq!(oracle.call_count().await, 0);
    }

    #[tokio::test]
    async fn opener_asks_first_question_on_entry() {
        let oracle = RecordingOracle::new();
        let machine = machine(&oracle);
        let mut session = Session::default();

        let renders = send(&machine, &mut session, "/opener").await;
        assert_eq!(
            renders,
            vec![
                Render::media("opener"),
                Render::text("INTRO opener"),
                Render::text("Имя девушки?"),
            ]
        );
        assert_eq!(session.mode, Mode::OpenerBuild);
    }

    #[tokio::test]
    async fn role_play_scenario_with_persona() {
        let oracle = RecordingOracle::new();
        let machine = machine(&oracle);
        let mut session = Session::default();

        let renders = send(&machine, &mut session, "/date").await;
        assert!(matches!(
            &renders[1],
            Render::TextWithChoices { choices, .. } if choices.len() == scripts::PERSONAS.len()
        ));

        let renders = press(&machine, &mut session, "date_robbie").await.unwrap();
        assert_eq!(renders[0], Render::media("date_robbie"));
        assert_eq!(session.active_prompt_id.as_deref(), Some("date_robbie"));
        assert_eq!(session.mode, Mode::RolePlay);

        for i in 1..=4 {
            let renders = send(&machine, &mut session, &format!("t{i}")).await;
            assert_eq!(renders, vec![Render::text(format!("Сообщение {i}/5 принято!"))]);
        }
        let renders = send(&machine, &mut session, "t5").await;
        assert_eq!(renders, vec![Render::text("answer")]);

        let (prompt, context) = oracle.last_call().await.unwrap();
        assert_eq!(prompt, "PROMPT date_robbie");
        assert_eq!(context, "t1\nt2\nt3\nt4\nt5");
        assert!(session.message_log.is_empty());
        assert!(session.active_prompt_id.is_none());
    }

    #[tokio::test]
    async fn role_play_text_before_persona_asks_for_one() {
        let oracle = RecordingOracle::new();
        let machine = machine(&oracle);
        let mut session = Session::default();

        send(&machine, &mut session, "/date").await;
        let renders = send(&machine, &mut session, "hi").await;
        assert_eq!(renders, vec![Render::text(PERSONA_REQUIRED)]);
        assert!(session.message_log.is_empty());
    }

    #[tokio::test]
    async fn persona_from_another_mode_enters_role_play() {
        let oracle = RecordingOracle::new();
        let machine = machine(&oracle);
        let mut session = Session::default();
        send(&machine, &mut session, "/profile").await;
        send(&machine, &mut session, "25").await;

        press(&machine, &mut session, "date_gosling").await.unwrap();

        assert_eq!(session.mode, Mode::RolePlay);
        assert_eq!(session.turn_index, 0);
        assert!(session.collected_answers.is_empty());
        assert_eq!(session.active_prompt_id.as_deref(), Some("date_gosling"));
    }

    #[tokio::test]
    async fn unrecognized_triggers_never_mutate() {
        let oracle = RecordingOracle::new();
        let machine = machine(&oracle);
        let mut session = Session::default();
        send(&machine, &mut session, "/profile").await;
        send(&machine, &mut session, "25").await;
        let before = session.clone();

        for button in ["date_nobody", "message_delete", "bogus"] {
            let err = press(&machine, &mut session, button).await.unwrap_err();
            assert!(matches!(err, DialogError::UnrecognizedTrigger(_)), "{button}");
        }
        // A valid action button pressed outside its mode is stale.
        let err = press(&machine, &mut session, "message_next").await.unwrap_err();
        assert!(matches!(err, DialogError::UnrecognizedTrigger(_)));

        let err = machine
            .handle(&mut session, Trigger::parse("/help", None))
            .await
            .unwrap_err();
        assert!(matches!(err, DialogError::UnrecognizedTrigger(_)));

        assert_eq!(session.mode, before.mode);
        assert_eq!(session.turn_index, before.turn_index);
        assert_eq!(session.collected_answers, before.collected_answers);
        assert_eq!(session.message_log, before.message_log);
        assert_eq!(session.active_prompt_id, before.active_prompt_id);
        assert_eq!(oracle.call_count().await, 0);
    }

    #[tokio::test]
    async fn message_log_saves_and_action_synthesizes() {
        let oracle = RecordingOracle::new();
        let machine = machine(&oracle);
        let mut session = Session::default();

        send(&machine, &mut session, "/message").await;
        for text in ["Привет!", "Как дела?"] {
            let renders = send(&machine, &mut session, text).await;
            assert_eq!(renders, vec![Render::text(MESSAGE_SAVED)]);
        }

        let renders = press(&machine, &mut session, "message_date").await.unwrap();
        assert_eq!(renders, vec![Render::text("answer")]);

        let (prompt, context) = oracle.last_call().await.unwrap();
        assert_eq!(prompt, "PROMPT message_date");
        assert_eq!(context, "Привет!\n\nКак дела?");
        assert_eq!(session.message_log.len(), 2);
    }

    #[tokio::test]
    async fn freeform_forwards_text_and_keeps_mode() {
        let oracle = RecordingOracle::new();
        let machine = machine(&oracle);
        let mut session = Session::default();

        send(&machine, &mut session, "/gpt").await;
        let renders = send(&machine, &mut session, "What is love?").await;

        assert_eq!(renders, vec![Render::text("answer")]);
        assert_eq!(
            oracle.last_call().await,
            Some(("PROMPT gpt".to_string(), "What is love?".to_string()))
        );
        assert_eq!(session.mode, Mode::FreeformQa);
    }

    #[tokio::test]
    async fn freeform_failure_surfaces_as_oracle_error() {
        let oracle = RecordingOracle::new();
        let machine = machine(&oracle);
        let mut session = Session::default();
        send(&machine, &mut session, "/gpt").await;

        oracle.set_failing(true);
        let err = machine
            .handle(&mut session, Trigger::parse("question", None))
            .await
            .unwrap_err();
        assert!(matches!(err, DialogError::OracleFailure(_)));
        assert_eq!(session.mode, Mode::FreeformQa);
        assert_eq!(oracle.call_count().await, 0);
    }

    #[tokio::test]
    async fn mode_selection_resets_transient_fields() {
        let oracle = RecordingOracle::new();
        let machine = machine(&oracle);
        let mut session = Session::default();
        send(&machine, &mut session, "/message").await;
        send(&machine, &mut session, "keep me?").await;

        let renders = press(&machine, &mut session, "opener").await.unwrap();

        assert_eq!(renders.last(), Some(&Render::text("Имя девушки?")));
        assert_eq!(session.mode, Mode::OpenerBuild);
        assert!(session.message_log.is_empty());
    }
}
