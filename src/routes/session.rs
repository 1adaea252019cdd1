use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};
use axum_valid::Valid;

use crate::{
    dto::session::{
        HostCommandRequest, HostSessionRequest, HostSessionResponse, JoinSessionRequest,
        JoinSessionResponse, SessionStatusResponse, SubmitAnswerRequest, SubmitAnswerResponse,
    },
    error::AppError,
    services::session_service,
    state::SharedState,
};

/// Routes driving live quiz sessions.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/sessions", post(host_session))
        .route("/sessions/{pin}", get(session_status).delete(abandon_session))
        .route("/sessions/{pin}/players", post(join_session))
        .route("/sessions/{pin}/answers", post(submit_answer))
        .route("/sessions/{pin}/start", post(start_session))
        .route("/sessions/{pin}/end", post(end_session))
}

/// Open a live session for a quiz and allocate its PIN.
#[utoipa::path(
    post,
    path = "/sessions",
    tag = "sessions",
    request_body = HostSessionRequest,
    responses(
        (status = 201, description = "Session opened", body = HostSessionResponse),
        (status = 400, description = "Quiz has no questions"),
        (status = 404, description = "Unknown quiz"),
        (status = 503, description = "Storage unavailable or PIN space exhausted")
    )
)]
pub async fn host_session(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<HostSessionRequest>>,
) -> Result<(StatusCode, Json<HostSessionResponse>), AppError> {
    let response = session_service::host_session(&state, payload).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// Join the lobby of a waiting session.
#[utoipa::path(
    post,
    path = "/sessions/{pin}/players",
    tag = "sessions",
    params(("pin" = String, Path, description = "Session PIN (case-insensitive)")),
    request_body = JoinSessionRequest,
    responses(
        (status = 200, description = "Player registered", body = JoinSessionResponse),
        (status = 404, description = "No session with this PIN"),
        (status = 409, description = "Session not joinable or nickname taken")
    )
)]
pub async fn join_session(
    State(state): State<SharedState>,
    Path(pin): Path<String>,
    Valid(Json(payload)): Valid<Json<JoinSessionRequest>>,
) -> Result<Json<JoinSessionResponse>, AppError> {
    Ok(Json(
        session_service::join_session(&state, &pin, payload).await?,
    ))
}

/// Submit an answer to the question in progress.
#[utoipa::path(
    post,
    path = "/sessions/{pin}/answers",
    tag = "sessions",
    params(("pin" = String, Path, description = "Session PIN (case-insensitive)")),
    request_body = SubmitAnswerRequest,
    responses(
        (status = 200, description = "Answer accepted", body = SubmitAnswerResponse),
        (status = 404, description = "No session or player"),
        (status = 409, description = "Already answered or question closed")
    )
)]
pub async fn submit_answer(
    State(state): State<SharedState>,
    Path(pin): Path<String>,
    Valid(Json(payload)): Valid<Json<SubmitAnswerRequest>>,
) -> Result<Json<SubmitAnswerResponse>, AppError> {
    Ok(Json(
        session_service::submit_answer(&state, &pin, payload).await?,
    ))
}

/// Current status of a session.
#[utoipa::path(
    get,
    path = "/sessions/{pin}",
    tag = "sessions",
    params(("pin" = String, Path, description = "Session PIN (case-insensitive)")),
    responses(
        (status = 200, description = "Session status", body = SessionStatusResponse),
        (status = 404, description = "No session with this PIN")
    )
)]
pub async fn session_status(
    State(state): State<SharedState>,
    Path(pin): Path<String>,
) -> Result<Json<SessionStatusResponse>, AppError> {
    Ok(Json(session_service::session_status(&state, &pin).await?))
}

/// Host command: start the quiz.
#[utoipa::path(
    post,
    path = "/sessions/{pin}/start",
    tag = "sessions",
    params(("pin" = String, Path, description = "Session PIN (case-insensitive)")),
    request_body = HostCommandRequest,
    responses(
        (status = 200, description = "Session started", body = SessionStatusResponse),
        (status = 403, description = "Caller is not the host"),
        (status = 409, description = "Session already started")
    )
)]
pub async fn start_session(
    State(state): State<SharedState>,
    Path(pin): Path<String>,
    Valid(Json(payload)): Valid<Json<HostCommandRequest>>,
) -> Result<Json<SessionStatusResponse>, AppError> {
    Ok(Json(
        session_service::start_session(&state, &pin, payload.host_user_id).await?,
    ))
}

/// Host command: end the quiz now.
#[utoipa::path(
    post,
    path = "/sessions/{pin}/end",
    tag = "sessions",
    params(("pin" = String, Path, description = "Session PIN (case-insensitive)")),
    request_body = HostCommandRequest,
    responses(
        (status = 200, description = "Session ended", body = SessionStatusResponse),
        (status = 403, description = "Caller is not the host"),
        (status = 409, description = "Session already finished")
    )
)]
pub async fn end_session(
    State(state): State<SharedState>,
    Path(pin): Path<String>,
    Valid(Json(payload)): Valid<Json<HostCommandRequest>>,
) -> Result<Json<SessionStatusResponse>, AppError> {
    Ok(Json(
        session_service::end_session(&state, &pin, payload.host_user_id).await?,
    ))
}

/// Host command: end the quiz and release its PIN immediately.
#[utoipa::path(
    delete,
    path = "/sessions/{pin}",
    tag = "sessions",
    params(("pin" = String, Path, description = "Session PIN (case-insensitive)")),
    request_body = HostCommandRequest,
    responses(
        (status = 204, description = "Session abandoned"),
        (status = 403, description = "Caller is not the host")
    )
)]
pub async fn abandon_session(
    State(state): State<SharedState>,
    Path(pin): Path<String>,
    Valid(Json(payload)): Valid<Json<HostCommandRequest>>,
) -> Result<StatusCode, AppError> {
    session_service::abandon_session(&state, &pin, payload.host_user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
