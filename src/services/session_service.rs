//! Service layer behind the session routes and the player socket.

use tokio::time::timeout;
use tracing::info;

use crate::{
    dto::session::{
        HostSessionRequest, HostSessionResponse, JoinSessionRequest, JoinSessionResponse,
        SessionStatusResponse, SubmitAnswerRequest, SubmitAnswerResponse,
    },
    error::ServiceError,
    state::{SharedState, bus::SessionSubscription, quiz::QuestionSnapshot},
};

/// Load the quiz, freeze its questions and open a waiting session under a fresh PIN.
pub async fn host_session(
    state: &SharedState,
    request: HostSessionRequest,
) -> Result<HostSessionResponse, ServiceError> {
    let store = state.require_quiz_store().await?;
    let settings = state.registry().settings();

    let quiz = timeout(settings.persist_timeout, store.find_quiz(request.quiz_id))
        .await
        .map_err(|_| ServiceError::Timeout)??
        .ok_or(ServiceError::QuizNotFound(request.quiz_id))?;

    let snapshot = QuestionSnapshot::from_quiz(quiz, settings.default_question_seconds);
    let handle = state
        .registry()
        .create_session(snapshot, request.host_user_id)?;

    Ok(HostSessionResponse {
        pin: handle.pin().to_string(),
        session_id: handle.session_id(),
    })
}

/// Register a player in the lobby of `pin`.
pub async fn join_session(
    state: &SharedState,
    pin: &str,
    request: JoinSessionRequest,
) -> Result<JoinSessionResponse, ServiceError> {
    let handle = state.registry().lookup(pin)?;
    let joined = handle.join(request.nickname, request.user_id).await?;
    Ok(joined.into())
}

/// Forward an answer to the session; only the first one per player and question counts.
pub async fn submit_answer(
    state: &SharedState,
    pin: &str,
    request: SubmitAnswerRequest,
) -> Result<SubmitAnswerResponse, ServiceError> {
    let handle = state.registry().lookup(pin)?;
    let ack = handle
        .submit(request.question_id, request.nickname, request.option_id)
        .await?;
    Ok(ack.into())
}

/// Open an event subscription on `pin`.
pub async fn subscribe(state: &SharedState, pin: &str) -> Result<SessionSubscription, ServiceError> {
    state.registry().lookup(pin)?.subscribe().await
}

/// Current state of `pin`, used by reconnecting clients.
pub async fn session_status(
    state: &SharedState,
    pin: &str,
) -> Result<SessionStatusResponse, ServiceError> {
    let info = state.registry().lookup(pin)?.status().await?;
    Ok(info.into())
}

/// Host command: open the first question.
pub async fn start_session(
    state: &SharedState,
    pin: &str,
    host_user_id: String,
) -> Result<SessionStatusResponse, ServiceError> {
    let info = state.registry().lookup(pin)?.start(host_user_id).await?;
    Ok(info.into())
}

/// Host command: finish the session now, keeping it reachable until retirement.
pub async fn end_session(
    state: &SharedState,
    pin: &str,
    host_user_id: String,
) -> Result<SessionStatusResponse, ServiceError> {
    let info = state.registry().lookup(pin)?.end(host_user_id).await?;
    Ok(info.into())
}

/// Host command: end the session if needed and release its PIN immediately.
pub async fn abandon_session(
    state: &SharedState,
    pin: &str,
    host_user_id: String,
) -> Result<(), ServiceError> {
    let handle = state.registry().lookup(pin)?;
    match handle.end(host_user_id.clone()).await {
        Ok(_) => {}
        // Already finished: only the host may still release it.
        Err(ServiceError::InvalidState(_)) => {
            let info = handle.status().await?;
            if info.host_user_id != host_user_id {
                return Err(ServiceError::Forbidden(
                    "only the host can abandon this session".into(),
                ));
            }
        }
        Err(err) => return Err(err),
    }

    state.registry().retire(handle.pin(), handle.session_id());
    info!(pin = %handle.pin(), "session abandoned by host");
    Ok(())
}
