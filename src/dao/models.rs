use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use utoipa::ToSchema;
use uuid::Uuid;

/// Quiz definition as owned by the course/quiz storage collaborator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuizEntity {
    /// Stable identifier for the quiz.
    pub id: Uuid,
    /// Course the quiz belongs to.
    pub course_id: Uuid,
    /// Human readable quiz title.
    pub title: String,
    /// Questions in presentation order.
    pub questions: Vec<QuestionEntity>,
}

/// Single question of a quiz definition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuestionEntity {
    /// Stable identifier for the question.
    pub id: Uuid,
    /// Prompt displayed to players.
    pub text: String,
    /// Answer options in display order.
    pub options: Vec<OptionEntity>,
    /// Identifier of the correct option.
    pub correct_option_id: Uuid,
    /// Time allowed for this question; the configured default applies when absent.
    #[serde(default)]
    pub duration_seconds: Option<u32>,
}

/// Answer option of a question.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OptionEntity {
    /// Stable identifier for the option.
    pub id: Uuid,
    /// Label displayed to players.
    pub text: String,
}

/// Who took an attempt: an authenticated user or an anonymous nickname.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum PlayerIdentity {
    /// Authenticated user identifier supplied by the auth subsystem.
    User(String),
    /// Nickname chosen when joining a live session.
    Nickname(String),
}

impl PlayerIdentity {
    /// Flat string form used in storage keys.
    pub fn key(&self) -> String {
        match self {
            PlayerIdentity::User(id) => format!("user:{id}"),
            PlayerIdentity::Nickname(name) => format!("nickname:{}", name.to_lowercase()),
        }
    }
}

/// Durable, final scored record of one player's participation in one quiz.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QuizAttemptEntity {
    /// Primary key of the attempt.
    pub id: Uuid,
    /// Live session the attempt comes from, if any.
    pub session_id: Option<Uuid>,
    /// PIN of the live session the attempt comes from, if any.
    pub session_pin: Option<String>,
    /// Player who took the attempt.
    pub player_identity: PlayerIdentity,
    /// Quiz that was played.
    pub quiz_id: Uuid,
    /// Course the quiz belongs to.
    pub course_id: Uuid,
    /// Number of correct answers.
    pub score: u32,
    /// Number of questions in the quiz.
    pub total_questions: u32,
    /// `score / total_questions * 100`, rounded to one decimal.
    pub percentage: f64,
    /// When the attempt was completed.
    pub taken_at: SystemTime,
}

/// Natural key guaranteeing at most one attempt per player per session.
///
/// PINs are recycled once a session retires, so the session id is part of the key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AttemptKey {
    /// Live session identifier (`None` for standalone attempts).
    pub session_id: Option<Uuid>,
    /// Session PIN (empty for standalone attempts).
    pub session_pin: String,
    /// Flattened player identity.
    pub player_identity: String,
    /// Quiz identifier.
    pub quiz_id: Uuid,
}

impl QuizAttemptEntity {
    /// Compute the idempotency key of this attempt.
    pub fn key(&self) -> AttemptKey {
        AttemptKey {
            session_id: self.session_id,
            session_pin: self.session_pin.clone().unwrap_or_default(),
            player_identity: self.player_identity.key(),
            quiz_id: self.quiz_id,
        }
    }
}

/// Result of an idempotent attempt insertion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistOutcome {
    /// The attempt was stored.
    Inserted,
    /// An attempt with the same key already existed; nothing was written.
    AlreadyRecorded,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_keys_distinguish_users_from_nicknames() {
        let user = PlayerIdentity::User("42".into());
        let nick = PlayerIdentity::Nickname("42".into());
        assert_ne!(user.key(), nick.key());
        assert_eq!(
            PlayerIdentity::Nickname("Ana".into()).key(),
            PlayerIdentity::Nickname("ana".into()).key()
        );
    }

    #[test]
    fn identity_serializes_with_kind_tag() {
        let json = serde_json::to_value(PlayerIdentity::Nickname("Ana".into())).unwrap();
        assert_eq!(json, serde_json::json!({"kind": "nickname", "value": "Ana"}));
    }
}
