use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::{
    dao::storage::StorageError,
    state::{pin::PinParseError, roster::RosterError, state_machine::InvalidTransition},
};

/// Errors that can occur in service layer operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// No live session uses this PIN (or the PIN is malformed).
    #[error("session not found")]
    SessionNotFound,
    /// The session no longer accepts players.
    #[error("session is not accepting new players")]
    SessionNotJoinable,
    /// Nickname already registered in the session.
    #[error("nickname `{0}` is already taken")]
    NicknameTaken(String),
    /// The player already answered the current question.
    #[error("answer already recorded for this question")]
    AlreadyAnswered,
    /// Control command issued by someone other than the host.
    #[error("forbidden: {0}")]
    Forbidden(String),
    /// No free PIN found within the configured number of attempts.
    #[error("could not allocate a session pin after {attempts} attempts")]
    PinExhaustion { attempts: usize },
    /// The quiz has nothing to play.
    #[error("quiz has no questions")]
    QuizHasNoQuestions,
    /// Question bank lookup found nothing.
    #[error("quiz {0} not found")]
    QuizNotFound(Uuid),
    /// Answer targets a question that is not the one in progress.
    #[error("question is not open for answers")]
    QuestionClosed,
    /// Submitting nickname never joined the session.
    #[error("player `{0}` is not part of this session")]
    PlayerNotFound(String),
    /// Invalid input provided by the client.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Operation cannot be performed in the current state.
    #[error("invalid state: {0}")]
    InvalidState(String),
    /// Storage backend is unavailable.
    #[error("storage unavailable")]
    Unavailable(#[source] StorageError),
    /// Application is running in degraded mode without storage.
    #[error("storage unavailable (degraded mode)")]
    Degraded,
    /// Operation exceeded its timeout limit.
    #[error("operation timed out")]
    Timeout,
    /// The session actor stopped before answering.
    #[error("session is closed")]
    SessionClosed,
}

impl ServiceError {
    /// Stable machine-readable identifier for the error kind.
    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::SessionNotFound => "session_not_found",
            ServiceError::SessionNotJoinable => "session_not_joinable",
            ServiceError::NicknameTaken(_) => "nickname_taken",
            ServiceError::AlreadyAnswered => "already_answered",
            ServiceError::Forbidden(_) => "forbidden",
            ServiceError::PinExhaustion { .. } => "pin_exhaustion",
            ServiceError::QuizHasNoQuestions => "quiz_has_no_questions",
            ServiceError::QuizNotFound(_) => "quiz_not_found",
            ServiceError::QuestionClosed => "question_closed",
            ServiceError::PlayerNotFound(_) => "player_not_found",
            ServiceError::InvalidInput(_) => "invalid_input",
            ServiceError::InvalidState(_) => "invalid_state",
            ServiceError::Unavailable(_) => "unavailable",
            ServiceError::Degraded => "degraded",
            ServiceError::Timeout => "timeout",
            ServiceError::SessionClosed => "session_closed",
        }
    }
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        ServiceError::Unavailable(err)
    }
}

impl From<InvalidTransition> for ServiceError {
    fn from(err: InvalidTransition) -> Self {
        ServiceError::InvalidState(err.to_string())
    }
}

impl From<RosterError> for ServiceError {
    fn from(err: RosterError) -> Self {
        match err {
            RosterError::NicknameTaken(nickname) => ServiceError::NicknameTaken(nickname),
            RosterError::InvalidNickname => {
                ServiceError::InvalidInput(RosterError::InvalidNickname.to_string())
            }
            RosterError::UnknownPlayer(nickname) => ServiceError::PlayerNotFound(nickname),
        }
    }
}

impl From<PinParseError> for ServiceError {
    fn from(_: PinParseError) -> Self {
        ServiceError::SessionNotFound
    }
}

/// Application-level errors that are converted to HTTP responses.
#[derive(Debug, Error)]
pub enum AppError {
    /// Bad request with invalid input.
    #[error("bad request: {message}")]
    BadRequest { code: &'static str, message: String },
    /// Caller is not allowed to perform the operation.
    #[error("forbidden: {message}")]
    Forbidden { code: &'static str, message: String },
    /// Requested resource not found.
    #[error("not found: {message}")]
    NotFound { code: &'static str, message: String },
    /// Conflict with current state.
    #[error("conflict: {message}")]
    Conflict { code: &'static str, message: String },
    /// Service unavailable or degraded.
    #[error("service unavailable: {message}")]
    ServiceUnavailable { code: &'static str, message: String },
}

impl AppError {
    fn code(&self) -> &'static str {
        match self {
            AppError::BadRequest { code, .. }
            | AppError::Forbidden { code, .. }
            | AppError::NotFound { code, .. }
            | AppError::Conflict { code, .. }
            | AppError::ServiceUnavailable { code, .. } => code,
        }
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        let code = err.code();
        let message = match &err {
            ServiceError::Unavailable(source) => source.to_string(),
            other => other.to_string(),
        };

        match err {
            ServiceError::SessionNotFound
            | ServiceError::QuizNotFound(_)
            | ServiceError::PlayerNotFound(_) => AppError::NotFound { code, message },
            ServiceError::SessionNotJoinable
            | ServiceError::NicknameTaken(_)
            | ServiceError::AlreadyAnswered
            | ServiceError::QuestionClosed
            | ServiceError::InvalidState(_)
            | ServiceError::SessionClosed => AppError::Conflict { code, message },
            ServiceError::Forbidden(_) => AppError::Forbidden { code, message },
            ServiceError::InvalidInput(_) | ServiceError::QuizHasNoQuestions => {
                AppError::BadRequest { code, message }
            }
            ServiceError::PinExhaustion { .. }
            | ServiceError::Unavailable(_)
            | ServiceError::Degraded
            | ServiceError::Timeout => AppError::ServiceUnavailable { code, message },
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
    code: &'static str,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            AppError::Forbidden { .. } => StatusCode::FORBIDDEN,
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::Conflict { .. } => StatusCode::CONFLICT,
            AppError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        };

        let payload = Json(ErrorBody {
            code: self.code(),
            message: self.to_string(),
        });

        (status, payload).into_response()
    }
}
