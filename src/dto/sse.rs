use std::time::SystemTime;

use serde::Serialize;
use utoipa::ToSchema;

use crate::{dto::format_system_time, state::bus::BusEvent, state::pin::Pin};

#[derive(Clone, Debug)]
/// Dispatched payload carried across SSE channels.
pub struct ServerEvent {
    /// SSE event name.
    pub event: Option<String>,
    /// Serialized JSON payload.
    pub data: String,
}

impl ServerEvent {
    /// Convenience wrapper that serialises `payload` into the SSE data field.
    pub fn json<E, T>(event: E, payload: &T) -> serde_json::Result<Self>
    where
        E: Into<Option<String>>,
        T: Serialize,
    {
        Ok(Self {
            event: event.into(),
            data: serde_json::to_string(payload)?,
        })
    }

    /// Wrap a session event into the transport envelope, naming the SSE event after its type.
    pub fn envelope(pin: Pin, event: &BusEvent) -> serde_json::Result<Self> {
        let envelope = Envelope::new(pin, event, SystemTime::now())?;
        Self::json(Some(event.kind().to_string()), &envelope)
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
/// Transport-agnostic message shape: `{type, sessionPin, payload, timestamp}`.
pub struct Envelope {
    /// Event type, e.g. `question_started`.
    #[serde(rename = "type")]
    pub kind: String,
    /// PIN of the emitting session.
    pub session_pin: String,
    /// Event-specific body.
    #[schema(value_type = Object)]
    pub payload: serde_json::Value,
    /// RFC 3339 emission time.
    pub timestamp: String,
}

impl Envelope {
    /// Build the envelope for `event` emitted at `at`.
    pub fn new(pin: Pin, event: &BusEvent, at: SystemTime) -> serde_json::Result<Self> {
        Ok(Self {
            kind: event.kind().to_string(),
            session_pin: pin.to_string(),
            payload: event.payload()?,
            timestamp: format_system_time(at),
        })
    }
}

#[derive(Debug, Serialize, ToSchema)]
/// Initial metadata sent to an SSE client when it connects.
pub struct Handshake {
    /// PIN of the subscribed session.
    pub session_pin: String,
    /// Human-readable message confirming the subscription.
    pub message: String,
    /// Whether the backend is running without a storage backend connection.
    pub degraded: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dto::events::PlayerJoinedEvent;

    #[test]
    fn envelope_has_expected_shape() {
        let pin: Pin = "ABC234".parse().unwrap();
        let event = BusEvent::PlayerJoined(PlayerJoinedEvent {
            nickname: "Ana".into(),
            player_count: 1,
        });

        let server_event = ServerEvent::envelope(pin, &event).unwrap();
        assert_eq!(server_event.event.as_deref(), Some("player_joined"));

        let value: serde_json::Value = serde_json::from_str(&server_event.data).unwrap();
        assert_eq!(value["type"], "player_joined");
        assert_eq!(value["sessionPin"], "ABC234");
        assert_eq!(value["payload"]["nickname"], "Ana");
        assert_eq!(value["payload"]["player_count"], 1);
        assert!(value["timestamp"].is_string());
    }
}
