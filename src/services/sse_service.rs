use std::{convert::Infallible, time::Duration};

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{info, warn};

use crate::{
    dto::sse::{Handshake, ServerEvent},
    state::{bus::SessionSubscription, pin::Pin},
};

fn to_event(payload: ServerEvent) -> Event {
    let event = Event::default().data(payload.data);
    match payload.event {
        Some(name) => event.event(name),
        None => event,
    }
}

/// Convert a session subscription into an SSE response, forwarding events and
/// cleaning up once the client disconnects or the session ends.
pub fn to_sse_stream(
    subscription: SessionSubscription,
    degraded: bool,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let pin = subscription.pin();
    // small bounded channel between forwarder and response
    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(8);

    // forwarder task: reads from the session bus and pushes into mpsc
    tokio::spawn(async move {
        if let Some(handshake) = handshake_event(pin, degraded) {
            if tx.send(Ok(to_event(handshake))).await.is_err() {
                return;
            }
        }

        let events = subscription.into_stream();
        tokio::pin!(events);
        loop {
            tokio::select! {
                _ = tx.closed() => break,
                next = events.next() => {
                    let Some(bus_event) = next else {
                        break;
                    };
                    match ServerEvent::envelope(pin, &bus_event) {
                        Ok(payload) => {
                            if tx.send(Ok(to_event(payload))).await.is_err() {
                                break;
                            }
                        }
                        Err(err) => {
                            warn!(%pin, error = %err, kind = bus_event.kind(), "failed to encode session event");
                        }
                    }
                }
            }
        }

        info!(%pin, "session SSE stream disconnected");
    });

    // response stream reads from mpsc; when client disconnects axum drops this stream
    let stream = ReceiverStream::new(rx);
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

fn handshake_event(pin: Pin, degraded: bool) -> Option<ServerEvent> {
    ServerEvent::json(
        Some("handshake".to_string()),
        &Handshake {
            session_pin: pin.to_string(),
            message: "subscribed to session events".into(),
            degraded,
        },
    )
    .ok()
}
