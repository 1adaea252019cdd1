use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::{format_system_time, validation::validate_nickname},
    state::{
        roster::LeaderboardEntry,
        session::{AnswerAck, JoinedSession, SessionInfo},
        state_machine::{FinishReason, SessionStatus},
    },
};

/// Payload used by a host to open a live session for a quiz.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct HostSessionRequest {
    /// Quiz to play.
    pub quiz_id: Uuid,
    /// Authenticated host; the only caller allowed to start or end.
    #[validate(length(min = 1, max = 128))]
    pub host_user_id: String,
}

/// Returned once a session is registered.
#[derive(Debug, Serialize, ToSchema)]
pub struct HostSessionResponse {
    /// Code players type to join.
    pub pin: String,
    /// Identifier of the live run.
    pub session_id: Uuid,
}

/// Payload used by a player to enter the lobby.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct JoinSessionRequest {
    /// Display name, unique within the session.
    #[validate(custom(function = "validate_nickname"))]
    pub nickname: String,
    /// Authenticated user behind the nickname, when known.
    #[serde(default)]
    #[validate(length(min = 1, max = 128))]
    pub user_id: Option<String>,
}

/// Session identifiers handed to a player after joining.
#[derive(Debug, Serialize, ToSchema)]
pub struct JoinSessionResponse {
    /// Quiz being played.
    pub quiz_id: Uuid,
    /// Course the quiz belongs to.
    pub course_id: Uuid,
    /// Identifier of the live run.
    pub session_id: Uuid,
    /// Nickname as registered (trimmed).
    pub nickname: String,
    /// Players in the lobby after this join.
    pub player_count: usize,
}

impl From<JoinedSession> for JoinSessionResponse {
    fn from(value: JoinedSession) -> Self {
        Self {
            quiz_id: value.quiz_id,
            course_id: value.course_id,
            session_id: value.session_id,
            nickname: value.nickname,
            player_count: value.player_count,
        }
    }
}

/// A player's answer to the question in progress.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct SubmitAnswerRequest {
    /// Question being answered.
    pub question_id: Uuid,
    /// Nickname used when joining.
    #[validate(custom(function = "validate_nickname"))]
    pub nickname: String,
    /// `null` reports that the player let the question time out.
    #[serde(default)]
    pub option_id: Option<Uuid>,
}

/// Acknowledgement of an accepted answer.
#[derive(Debug, Serialize, ToSchema)]
pub struct SubmitAnswerResponse {
    /// Question the answer was recorded for.
    pub question_id: Uuid,
    /// Players who answered so far.
    pub answered_count: usize,
    /// Players in the session.
    pub player_count: usize,
}

impl From<AnswerAck> for SubmitAnswerResponse {
    fn from(value: AnswerAck) -> Self {
        Self {
            question_id: value.question_id,
            answered_count: value.answered_count,
            player_count: value.player_count,
        }
    }
}

/// Identifies the caller of a host-only control command.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct HostCommandRequest {
    /// Must match the host that opened the session.
    #[validate(length(min = 1, max = 128))]
    pub host_user_id: String,
}

/// Snapshot of a session as seen by hosts and reconnecting clients.
#[skip_serializing_none]
#[derive(Debug, Serialize, ToSchema)]
pub struct SessionStatusResponse {
    /// Session PIN.
    pub pin: String,
    /// Identifier of the live run.
    pub session_id: Uuid,
    /// Quiz being played.
    pub quiz_id: Uuid,
    /// Course the quiz belongs to.
    pub course_id: Uuid,
    /// Title shown in the lobby.
    pub quiz_title: String,
    /// Lifecycle status.
    pub status: SessionStatus,
    /// Zero-based index of the question in progress.
    pub current_question_index: Option<usize>,
    /// Number of questions in the quiz.
    pub total_questions: usize,
    /// Nicknames in join order.
    pub players: Vec<String>,
    /// RFC 3339 deadline of the open question.
    pub question_deadline: Option<String>,
    /// Question currently accepting answers; lets reconnecting clients resume.
    pub current_question_id: Option<Uuid>,
    /// Live answer counts per option of the open question.
    #[schema(value_type = Option<Object>)]
    pub answer_counts: Option<IndexMap<Uuid, u32>>,
    /// Set once finished.
    pub finish_reason: Option<FinishReason>,
    /// Present once the session is finished.
    pub leaderboard: Option<Vec<LeaderboardEntry>>,
}

impl From<SessionInfo> for SessionStatusResponse {
    fn from(value: SessionInfo) -> Self {
        Self {
            pin: value.pin.to_string(),
            session_id: value.session_id,
            quiz_id: value.quiz_id,
            course_id: value.course_id,
            quiz_title: value.quiz_title,
            status: value.status,
            current_question_index: value.current_question_index,
            total_questions: value.total_questions,
            players: value.players,
            question_deadline: value.question_deadline.map(format_system_time),
            current_question_id: value.current_question_id,
            answer_counts: value.answer_counts,
            finish_reason: value.finish_reason,
            leaderboard: value.leaderboard,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_request_validates_nickname() {
        let ok = JoinSessionRequest {
            nickname: "Ana".into(),
            user_id: None,
        };
        assert!(ok.validate().is_ok());

        let blank = JoinSessionRequest {
            nickname: "  ".into(),
            user_id: None,
        };
        assert!(blank.validate().is_err());
    }

    #[test]
    fn submit_request_accepts_null_option() {
        let request: SubmitAnswerRequest = serde_json::from_str(&format!(
            r#"{{"question_id":"{}","nickname":"Ana","option_id":null}}"#,
            Uuid::nil()
        ))
        .unwrap();
        assert!(request.option_id.is_none());
        assert!(request.validate().is_ok());
    }
}
