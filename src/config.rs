//! Application-level configuration loading, including session tuning knobs and
//! the optional question bank seed used by the in-memory store.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

use crate::{dao::models::QuizEntity, state::quiz::DEFAULT_QUESTION_SECONDS};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "LIVE_QUIZ_CONFIG_PATH";

const DEFAULT_PIN_MAX_ATTEMPTS: usize = 16;
const DEFAULT_RETIRE_GRACE_SECS: u64 = 300;
const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 64;
const DEFAULT_COMMAND_CHANNEL_CAPACITY: usize = 256;
const DEFAULT_PERSIST_TIMEOUT_MS: u64 = 5000;
const DEFAULT_LOBBY_IDLE_SECS: u64 = 1800;

/// Tuning applied to every live session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSettings {
    /// Bound on PIN generation retries before failing with `PinExhaustion`.
    pub pin_max_attempts: usize,
    /// Time limit of questions that do not declare one.
    pub default_question_seconds: u32,
    /// How long a finished session stays reachable before its PIN is released.
    pub retire_grace: Duration,
    /// Buffered events per subscriber before it starts lagging.
    pub event_channel_capacity: usize,
    /// Queued commands per session actor.
    pub command_channel_capacity: usize,
    /// Upper bound on persisting the results of one session.
    pub persist_timeout: Duration,
    /// How long a lobby may wait for its host to start. Zero keeps lobbies open indefinitely.
    pub lobby_idle: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            pin_max_attempts: DEFAULT_PIN_MAX_ATTEMPTS,
            default_question_seconds: DEFAULT_QUESTION_SECONDS,
            retire_grace: Duration::from_secs(DEFAULT_RETIRE_GRACE_SECS),
            event_channel_capacity: DEFAULT_EVENT_CHANNEL_CAPACITY,
            command_channel_capacity: DEFAULT_COMMAND_CHANNEL_CAPACITY,
            persist_timeout: Duration::from_millis(DEFAULT_PERSIST_TIMEOUT_MS),
            lobby_idle: Duration::from_secs(DEFAULT_LOBBY_IDLE_SECS),
        }
    }
}

#[derive(Debug, Clone, Default)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    sessions: SessionSettings,
    quizzes: Vec<QuizEntity>,
}

impl AppConfig {
    /// Build a configuration from explicit parts.
    pub fn new(sessions: SessionSettings, quizzes: Vec<QuizEntity>) -> Self {
        Self { sessions, quizzes }
    }

    /// Load the application configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match Self::from_json(&contents) {
                Ok(app_config) => {
                    info!(
                        path = %path.display(),
                        quizzes = app_config.quizzes.len(),
                        "loaded configuration"
                    );
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Parse the JSON configuration format.
    pub fn from_json(contents: &str) -> serde_json::Result<Self> {
        serde_json::from_str::<RawConfig>(contents).map(Into::into)
    }

    /// Timing and capacity knobs of live sessions.
    pub fn sessions(&self) -> &SessionSettings {
        &self.sessions
    }

    /// Quizzes used to seed the in-memory question bank.
    pub fn quizzes(&self) -> &[QuizEntity] {
        &self.quizzes
    }
}

#[derive(Debug, Deserialize)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    pin_max_attempts: Option<usize>,
    default_question_seconds: Option<u32>,
    retire_grace_secs: Option<u64>,
    event_channel_capacity: Option<usize>,
    command_channel_capacity: Option<usize>,
    persist_timeout_ms: Option<u64>,
    lobby_idle_secs: Option<u64>,
    #[serde(default)]
    quizzes: Vec<QuizEntity>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let defaults = SessionSettings::default();
        let sessions = SessionSettings {
            pin_max_attempts: value
                .pin_max_attempts
                .filter(|attempts| *attempts > 0)
                .unwrap_or(defaults.pin_max_attempts),
            default_question_seconds: value
                .default_question_seconds
                .filter(|seconds| *seconds > 0)
                .unwrap_or(defaults.default_question_seconds),
            retire_grace: value
                .retire_grace_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.retire_grace),
            event_channel_capacity: value
                .event_channel_capacity
                .filter(|capacity| *capacity > 0)
                .unwrap_or(defaults.event_channel_capacity),
            command_channel_capacity: value
                .command_channel_capacity
                .filter(|capacity| *capacity > 0)
                .unwrap_or(defaults.command_channel_capacity),
            persist_timeout: value
                .persist_timeout_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.persist_timeout),
            lobby_idle: value
                .lobby_idle_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.lobby_idle),
        };

        Self {
            sessions,
            quizzes: value.quizzes,
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_keys_fall_back_to_defaults() {
        let config = AppConfig::from_json("{}").unwrap();
        assert_eq!(config.sessions(), &SessionSettings::default());
        assert!(config.quizzes().is_empty());
    }

    #[test]
    fn explicit_values_override_defaults() {
        let config = AppConfig::from_json(
            r#"{
                "pin_max_attempts": 4,
                "default_question_seconds": 12,
                "retire_grace_secs": 0,
                "event_channel_capacity": 0,
                "persist_timeout_ms": 250,
                "lobby_idle_secs": 90
            }"#,
        )
        .unwrap();

        let sessions = config.sessions();
        assert_eq!(sessions.pin_max_attempts, 4);
        assert_eq!(sessions.default_question_seconds, 12);
        assert_eq!(sessions.retire_grace, Duration::ZERO);
        assert_eq!(sessions.event_channel_capacity, DEFAULT_EVENT_CHANNEL_CAPACITY);
        assert_eq!(sessions.persist_timeout, Duration::from_millis(250));
        assert_eq!(sessions.lobby_idle, Duration::from_secs(90));
    }

    #[test]
    fn quizzes_are_parsed_from_seed_list() {
        let config = AppConfig::from_json(
            r#"{
                "quizzes": [{
                    "id": "6f1c1c1e-8a5b-4d7a-9a51-0f5c1f0e2a01",
                    "course_id": "6f1c1c1e-8a5b-4d7a-9a51-0f5c1f0e2a02",
                    "title": "Capitals",
                    "questions": [{
                        "id": "6f1c1c1e-8a5b-4d7a-9a51-0f5c1f0e2a03",
                        "text": "Capital of France?",
                        "options": [
                            {"id": "6f1c1c1e-8a5b-4d7a-9a51-0f5c1f0e2a04", "text": "Paris"},
                            {"id": "6f1c1c1e-8a5b-4d7a-9a51-0f5c1f0e2a05", "text": "Lyon"}
                        ],
                        "correct_option_id": "6f1c1c1e-8a5b-4d7a-9a51-0f5c1f0e2a04"
                    }]
                }]
            }"#,
        )
        .unwrap();

        assert_eq!(config.quizzes().len(), 1);
        assert_eq!(config.quizzes()[0].questions[0].duration_seconds, None);
    }
}
