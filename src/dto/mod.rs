use std::time::SystemTime;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

pub mod events;
/// Health check payloads.
pub mod health;
/// Session route requests and responses.
pub mod session;
/// Server-sent event framing.
pub mod sse;
pub mod validation;
/// Player WebSocket messages.
pub mod ws;

/// RFC 3339 rendering used for every timestamp sent to clients.
pub(crate) fn format_system_time(time: SystemTime) -> String {
    OffsetDateTime::from(time)
        .format(&Rfc3339)
        .unwrap_or_else(|_| "invalid-timestamp".into())
}
