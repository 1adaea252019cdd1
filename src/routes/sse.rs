use std::convert::Infallible;

use axum::{
    Router,
    extract::{Path, State},
    response::sse::{Event, Sse},
    routing::get,
};
use futures::Stream;
use tracing::info;

use crate::{
    error::AppError,
    services::{session_service, sse_service},
    state::SharedState,
};

#[utoipa::path(
    get,
    path = "/sessions/{pin}/events",
    tag = "sse",
    params(("pin" = String, Path, description = "Session PIN (case-insensitive)")),
    responses(
        (status = 200, description = "Session event stream", content_type = "text/event-stream", body = String),
        (status = 404, description = "No session with this PIN")
    )
)]
/// Stream the live events of one session (lobby, questions, tallies, final leaderboard).
pub async fn session_stream(
    State(state): State<SharedState>,
    Path(pin): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let subscription = session_service::subscribe(&state, &pin).await?;
    info!(pin = %subscription.pin(), "new session SSE connection");
    Ok(sse_service::to_sse_stream(subscription, state.is_degraded()))
}

/// Configure the SSE endpoints.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/sessions/{pin}/events", get(session_stream))
}
