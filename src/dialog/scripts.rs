//! Static dialog data: interview scripts, personas, menus and canned texts.

use super::effect::Choice;
use super::interview::{InterviewScript, InterviewStep};
use super::mode::ModeCommand;

/// Profile-building interview, synthesized with the `profile` prompt.
pub const PROFILE_STEPS: &[InterviewStep] = &[
    InterviewStep::new("age", "Сколько вам лет?"),
    InterviewStep::new("occupation", "Кем вы работаете?"),
    InterviewStep::new("hobby", "У вас есть хобби?"),
    InterviewStep::new("annoys", "Что вам НЕ нравится в людях?"),
    InterviewStep::new("goals", "Цель знакомства?"),
];

/// Opener-building interview, synthesized with the `opener` prompt.
pub const OPENER_STEPS: &[InterviewStep] = &[
    InterviewStep::new("name", "Имя девушки?"),
    InterviewStep::new("age", "Сколько ей лет?"),
    InterviewStep::new("looks_score", "Оцените ее внешность: 1-10 баллов?"),
    InterviewStep::new("occupation", "Кем она работает?"),
    InterviewStep::new("likes", "Что вам в ней нравится?"),
];

pub fn profile_script() -> InterviewScript {
    InterviewScript::new("profile", PROFILE_STEPS)
}

pub fn opener_script() -> InterviewScript {
    InterviewScript::new("opener", OPENER_STEPS)
}

/// Callback prefix for role-play persona buttons.
pub const PERSONA_PREFIX: &str = "date_";
/// Callback prefix for message-log action buttons.
pub const MESSAGE_ACTION_PREFIX: &str = "message_";

/// Role-play personas: (prompt id, button label).
pub const PERSONAS: &[(&str, &str)] = &[
    ("date_grande", "Ариана Гранде"),
    ("date_robbie", "Марго Робби"),
    ("date_zendaya", "Зендея"),
    ("date_gosling", "Райан Гослинг"),
    ("date_hardy", "Том Харди"),
];

/// Message-log actions: (prompt id, button label).
pub const MESSAGE_ACTIONS: &[(&str, &str)] = &[
    ("message_next", "Написать сообщение"),
    ("message_date", "Пригласить на свидание"),
];

pub const MENU_TITLE: &str = "Выберите действие:";
pub const GREETING: &str = "Привет! Я готов вам помочь 😊";
pub const GREETING_MEDIA: &str = "avatar_main";
pub const PERSONA_REQUIRED: &str = "Сначала выберите, с кем будет переписка.";
pub const MESSAGE_SAVED: &str = "Сообщение сохранено в истории";
pub const APOLOGY: &str = "⚠️ Произошла ошибка. Попробуйте еще раз.";
pub const ORACLE_RETRY: &str =
    "⚠️ Не удалось получить ответ. Отправьте последнее сообщение еще раз.";

/// Prompt template used for free-form questions.
pub const FREEFORM_PROMPT: &str = "gpt";

/// Confirmation after a persona is chosen.
pub fn persona_chosen(target: usize) -> String {
    format!("Отличный выбор! Пригласите девушку (Парня) на {target} сообщений.")
}

/// Acknowledgement for a counted role-play turn.
pub fn turn_accepted(count: usize, target: usize) -> String {
    format!("Сообщение {count}/{target} принято!")
}

fn menu_label(command: ModeCommand) -> &'static str {
    match command {
        ModeCommand::Start => "главное меню бота",
        ModeCommand::BuildProfile => "генерация Tinder-профиля 😎",
        ModeCommand::BuildOpener => "сообщение для знакомства 🥰",
        ModeCommand::LogMessages => "переписка от вашего имени 😈",
        ModeCommand::RolePlay => "переписка со звездами 🔥",
        ModeCommand::FreeformQa => "задать вопрос чату GPT 🧠",
    }
}

/// Main menu buttons, keyed by command keyword.
pub fn main_menu() -> Vec<Choice> {
    [
        ModeCommand::Start,
        ModeCommand::BuildProfile,
        ModeCommand::BuildOpener,
        ModeCommand::LogMessages,
        ModeCommand::RolePlay,
        ModeCommand::FreeformQa,
    ]
    .into_iter()
    .map(|c| Choice::new(c.keyword(), menu_label(c)))
    .collect()
}

pub fn persona_choices() -> Vec<Choice> {
    to_choices(PERSONAS)
}

pub fn message_action_choices() -> Vec<Choice> {
    to_choices(MESSAGE_ACTIONS)
}

pub fn is_persona(id: &str) -> bool {
    PERSONAS.iter().any(|(key, _)| *key == id)
}

pub fn is_message_action(id: &str) -> bool {
    MESSAGE_ACTIONS.iter().any(|(key, _)| *key == id)
}

fn to_choices(pairs: &[(&str, &str)]) -> Vec<Choice> {
    pairs
        .iter()
        .map(|(key, label)| Choice::new(*key, *label))
        .collect()
}
