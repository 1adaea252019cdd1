use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for the live quiz backend.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::session::host_session,
        crate::routes::session::join_session,
        crate::routes::session::submit_answer,
        crate::routes::session::session_status,
        crate::routes::session::start_session,
        crate::routes::session::end_session,
        crate::routes::session::abandon_session,
        crate::routes::sse::session_stream,
        crate::routes::websocket::ws_handler,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::session::HostSessionRequest,
            crate::dto::session::HostSessionResponse,
            crate::dto::session::JoinSessionRequest,
            crate::dto::session::JoinSessionResponse,
            crate::dto::session::SubmitAnswerRequest,
            crate::dto::session::SubmitAnswerResponse,
            crate::dto::session::HostCommandRequest,
            crate::dto::session::SessionStatusResponse,
            crate::dto::sse::Envelope,
            crate::dto::sse::Handshake,
            crate::dto::events::PlayerJoinedEvent,
            crate::dto::events::QuestionStartedEvent,
            crate::dto::events::AnswerSubmittedEvent,
            crate::dto::events::AnswerTallyEvent,
            crate::dto::events::QuestionResolvedEvent,
            crate::dto::events::SessionEndedEvent,
            crate::dto::ws::PlayerInboundMessage,
            crate::dto::ws::PlayerOutboundMessage,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "sessions", description = "Hosting, joining and answering live quiz sessions"),
        (name = "sse", description = "Server-sent events streams"),
        (name = "players", description = "WebSocket operations for player devices"),
    )
)]
/// OpenAPI description of the public API.
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_session_routes() {
        let doc = ApiDoc::openapi();
        let paths: Vec<&String> = doc.paths.paths.keys().collect();
        for expected in [
            "/sessions",
            "/sessions/{pin}",
            "/sessions/{pin}/players",
            "/sessions/{pin}/answers",
            "/sessions/{pin}/events",
            "/sessions/{pin}/ws",
        ] {
            assert!(paths.iter().any(|path| path.as_str() == expected), "missing {expected}");
        }
    }
}
