//! Configuration types, read from the environment at startup.

use std::path::PathBuf;
use std::time::Duration;

use crate::dialog::ThresholdPolicy;
use crate::error::ConfigError;
use crate::llm::{LlmBackend, LlmConfig};

/// Dialog tuning knobs.
#[derive(Debug, Clone)]
pub struct DialogConfig {
    /// Turns collected in role-play before synthesis.
    pub role_play_turns: usize,
    /// What the message log does when it reaches `message_log_turns`.
    pub message_log_policy: ThresholdPolicy,
    /// Threshold for the message log (only used with `SynthesizeAndReset`).
    pub message_log_turns: usize,
}

impl Default for DialogConfig {
    fn default() -> Self {
        Self {
            role_play_turns: 5,
            message_log_policy: ThresholdPolicy::Never,
            message_log_turns: 5,
        }
    }
}

/// Telegram transport settings.
#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub bot_token: secrecy::SecretString,
    pub allowed_users: Vec<String>,
}

/// Everything `main` needs to assemble the bot.
#[derive(Debug, Clone)]
pub struct BotConfig {
    pub llm: LlmConfig,
    /// Root of `prompts/`, `messages/` and `images/`.
    pub resources_dir: PathBuf,
    pub dialog: DialogConfig,
    /// Present only when a bot token is configured.
    pub telegram: Option<TelegramConfig>,
}

impl BotConfig {
    /// Read the configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read the configuration through `lookup`, which maps a variable name to
    /// its value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let (backend, api_key) = if let Some(key) = var("OPENAI_API_KEY") {
            (LlmBackend::OpenAi, key)
        } else if let Some(key) = var("ANTHROPIC_API_KEY") {
            (LlmBackend::Anthropic, key)
        } else {
            return Err(ConfigError::MissingEnvVar(
                "OPENAI_API_KEY (or ANTHROPIC_API_KEY)".to_string(),
            ));
        };

        let model = var("MATCHMATE_MODEL").unwrap_or_else(|| backend.default_model().to_string());
        let timeout_secs: u64 = parse_or(&var, "MATCHMATE_ORACLE_TIMEOUT_SECS", 60)?;

        let resources_dir = var("MATCHMATE_RESOURCES")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./resources"));

        let defaults = DialogConfig::default();
        let role_play_turns = parse_or(&var, "MATCHMATE_ROLE_PLAY_TURNS", defaults.role_play_turns)?;
        if role_play_turns == 0 {
            return Err(ConfigError::InvalidValue {
                key: "MATCHMATE_ROLE_PLAY_TURNS".to_string(),
                message: "must be at least 1".to_string(),
            });
        }

        let (message_log_policy, message_log_turns) =
            match parse_opt::<usize>(&var, "MATCHMATE_MESSAGE_LOG_TURNS")? {
                Some(0) | None => (ThresholdPolicy::Never, defaults.message_log_turns),
                Some(n) => (ThresholdPolicy::SynthesizeAndReset, n),
            };

        let telegram = var("TELEGRAM_BOT_TOKEN").map(|token| {
            let allowed_users: Vec<String> = var("TELEGRAM_ALLOWED_USERS")
                .unwrap_or_else(|| "*".to_string())
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
            TelegramConfig {
                bot_token: secrecy::SecretString::from(token),
                allowed_users,
            }
        });

        Ok(Self {
            llm: LlmConfig {
                backend,
                api_key: secrecy::SecretString::from(api_key),
                model,
                timeout: Duration::from_secs(timeout_secs),
            },
            resources_dir,
            dialog: DialogConfig {
                role_play_turns,
                message_log_policy,
                message_log_turns,
            },
            telegram,
        })
    }
}

fn parse_opt<T>(var: impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    var(key)
        .map(|raw| {
            raw.trim().parse::<T>().map_err(|e| ConfigError::InvalidValue {
                key: key.to_string(),
                message: e.to_string(),
            })
        })
        .transpose()
}

fn parse_or<T>(var: impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    Ok(parse_opt(var, key)?.unwrap_or(default))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use secrecy::ExposeSecret;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<BotConfig, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        BotConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_with_openai_key() {
        let config = load(&[("OPENAI_API_KEY", "sk-test")]).unwrap();
        assert_eq!(config.llm.backend, LlmBackend::OpenAi);
        assert_eq!(config.llm.api_key.expose_secret(), "sk-test");
        assert_eq!(config.llm.model, LlmBackend::OpenAi.default_model());
        assert_eq!(config.llm.timeout, Duration::from_secs(60));
        assert_eq!(config.resources_dir, PathBuf::from("./resources"));
        assert_eq!(config.dialog.role_play_turns, 5);
        assert_eq!(config.dialog.message_log_policy, ThresholdPolicy::Never);
        assert!(config.telegram.is_none());
    }

    #[test]
    fn anthropic_used_when_openai_missing() {
        let config = load(&[("ANTHROPIC_API_KEY", "sk-ant"), ("MATCHMATE_MODEL", "m1")]).unwrap();
        assert_eq!(config.llm.backend, LlmBackend::Anthropic);
        assert_eq!(config.llm.model, "m1");
    }

    #[test]
    fn missing_key_is_an_error() {
        let err = load(&[("OPENAI_API_KEY", "  ")]).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(_)));
    }

    #[test]
    fn telegram_allowlist_parsed() {
        let config = load(&[
            ("OPENAI_API_KEY", "k"),
            ("TELEGRAM_BOT_TOKEN", "123:ABC"),
            ("TELEGRAM_ALLOWED_USERS", "alice, 42,,"),
        ])
        .unwrap();
        let telegram = config.telegram.unwrap();
        assert_eq!(telegram.bot_token.expose_secret(), "123:ABC");
        assert_eq!(telegram.allowed_users, vec!["alice", "42"]);
    }

    #[test]
    fn telegram_defaults_to_everyone() {
        let config = load(&[("OPENAI_API_KEY", "k"), ("TELEGRAM_BOT_TOKEN", "t")]).unwrap();
        assert_eq!(config.telegram.unwrap().allowed_users, vec!["*"]);
    }

    #[test]
    fn message_log_threshold_enables_synthesis() {
        let config = load(&[("OPENAI_API_KEY", "k"), ("MATCHMATE_MESSAGE_LOG_TURNS", "3")]).unwrap();
        assert_eq!(
            config.dialog.message_log_policy,
            ThresholdPolicy::SynthesizeAndReset
        );
        assert_eq!(config.dialog.message_log_turns, 3);
    }

    #[test]
    fn invalid_numbers_are_rejected() {
        let err = load(&[("OPENAI_API_KEY", "k"), ("MATCHMATE_ORACLE_TIMEOUT_SECS", "soon")])
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "MATCHMATE_ORACLE_TIMEOUT_SECS"));

        let err = load(&[("OPENAI_API_KEY", "k"), ("MATCHMATE_ROLE_PLAY_TURNS", "0")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }
}
