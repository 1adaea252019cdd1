use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::ValidationErrors;

use crate::{dto::validation::validate_nickname, state::session::JoinedSession};

#[derive(Debug, Deserialize, Serialize, ToSchema)]
/// Messages accepted from player WebSocket clients.
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PlayerInboundMessage {
    /// Must be the first message on the socket.
    Join {
        /// Requested display name.
        nickname: String,
        /// Authenticated user behind the nickname, when known.
        #[serde(default)]
        user_id: Option<String>,
    },
    /// Answer to the open question; `option_id: null` reports a timeout.
    Answer {
        /// Question being answered.
        question_id: Uuid,
        /// Chosen option.
        #[serde(default)]
        option_id: Option<Uuid>,
    },
    /// Any other `type`; ignored.
    #[serde(other)]
    Unknown,
}

/// Reasons an inbound frame is rejected before reaching the session.
#[derive(Debug, thiserror::Error)]
pub enum InboundError {
    /// Not JSON or not a known shape.
    #[error("malformed message: {0}")]
    Malformed(#[from] serde_json::Error),
    /// Well-formed but failing field validation.
    #[error("invalid message: {0}")]
    Invalid(#[from] ValidationErrors),
}

impl PlayerInboundMessage {
    /// Parse a text frame and validate its fields.
    pub fn from_json_str(text: &str) -> Result<Self, InboundError> {
        let message: Self = serde_json::from_str(text)?;
        if let Self::Join { nickname, .. } = &message {
            if let Err(err) = validate_nickname(nickname) {
                let mut errors = ValidationErrors::new();
                errors.add("nickname", err);
                return Err(errors.into());
            }
        }
        Ok(message)
    }
}

#[derive(Debug, Serialize, ToSchema)]
/// Direct replies sent to one player; session-wide events use the broadcast envelope instead.
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PlayerOutboundMessage {
    /// Sent once the join is accepted.
    Joined {
        /// Identifier of the live run.
        session_id: Uuid,
        /// Quiz being played.
        quiz_id: Uuid,
        /// Course the quiz belongs to.
        course_id: Uuid,
        /// Nickname as registered.
        nickname: String,
    },
    /// The answer counted; correctness is revealed on resolve.
    AnswerAccepted {
        /// Question the answer was recorded for.
        question_id: Uuid,
        /// Players who answered so far.
        answered_count: usize,
    },
    /// A request from this player was rejected.
    Error {
        /// Stable error code.
        code: String,
        /// Human-readable explanation.
        message: String,
    },
}

impl From<&JoinedSession> for PlayerOutboundMessage {
    fn from(value: &JoinedSession) -> Self {
        Self::Joined {
            session_id: value.session_id,
            quiz_id: value.quiz_id,
            course_id: value.course_id,
            nickname: value.nickname.clone(),
        }
    }
}
