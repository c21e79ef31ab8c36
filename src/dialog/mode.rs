//! Conversation modes and the commands that select them.

use serde::{Deserialize, Serialize};

/// The conversational context governing how inbound text is interpreted.
///
/// Exactly one mode is active per session. `Idle` is the main-menu state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    #[default]
    Idle,
    FreeformQa,
    RolePlay,
    ProfileBuild,
    OpenerBuild,
    MessageLog,
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::FreeformQa => "freeform_qa",
            Self::RolePlay => "role_play",
            Self::ProfileBuild => "profile_build",
            Self::OpenerBuild => "opener_build",
            Self::MessageLog => "message_log",
        };
        write!(f, "{s}")
    }
}

/// A named mode-selection command (`/start`, `/gpt`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeCommand {
    Start,
    FreeformQa,
    RolePlay,
    BuildProfile,
    BuildOpener,
    LogMessages,
}

impl ModeCommand {
    pub const ALL: [ModeCommand; 6] = [
        Self::Start,
        Self::FreeformQa,
        Self::RolePlay,
        Self::BuildProfile,
        Self::BuildOpener,
        Self::LogMessages,
    ];

    /// The mode a session lands in after this command.
    pub fn target(&self) -> Mode {
        match self {
            Self::Start => Mode::Idle,
            Self::FreeformQa => Mode::FreeformQa,
            Self::RolePlay => Mode::RolePlay,
            Self::BuildProfile => Mode::ProfileBuild,
            Self::BuildOpener => Mode::OpenerBuild,
            Self::LogMessages => Mode::MessageLog,
        }
    }

    /// Command keyword without the leading slash. Also used as the menu
    /// button key.
    pub fn keyword(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::FreeformQa => "gpt",
            Self::RolePlay => "date",
            Self::BuildProfile => "profile",
            Self::BuildOpener => "opener",
            Self::LogMessages => "message",
        }
    }

    /// Template id of the intro image and message shown on entry.
    pub fn intro_id(&self) -> &'static str {
        match self {
            Self::Start => "main",
            other => other.keyword(),
        }
    }

    /// Look up a command by keyword.
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.keyword() == keyword)
    }
}
