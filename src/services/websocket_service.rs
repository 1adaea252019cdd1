use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, info, warn};

use crate::{
    dto::{
        sse::Envelope,
        ws::{PlayerInboundMessage, PlayerOutboundMessage},
    },
    error::ServiceError,
    state::{bus::SessionSubscription, session::SessionHandle},
};

const JOIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Writer channel closed; the connection should be terminated immediately.
#[derive(Debug, Error)]
#[error("connection closed")]
struct ConnectionClosed;

/// Handle the full lifecycle of a player WebSocket connection on `session`.
///
/// The first frame must be a `join`; afterwards the socket carries answers in
/// and both personal replies and session-wide events out.
pub async fn handle_socket(session: SessionHandle, socket: WebSocket) {
    let pin = session.pin();
    let (mut sender, mut receiver) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();

    // Dedicated writer task keeps outbound messages flowing even while we await inbound frames.
    let writer_task = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            if sender.send(message).await.is_err() {
                break;
            }
        }
    });

    let initial_message = match tokio::time::timeout(JOIN_TIMEOUT, receiver.next()).await {
        Ok(Some(Ok(Message::Text(text)))) => text,
        Ok(Some(Ok(Message::Close(_)))) => {
            finalize(writer_task, outbound_tx).await;
            return;
        }
        Ok(Some(Ok(_))) => {
            let _ = outbound_tx.send(Message::Close(None));
            finalize(writer_task, outbound_tx).await;
            return;
        }
        Ok(Some(Err(err))) => {
            warn!(%pin, error = %err, "websocket receive error");
            finalize(writer_task, outbound_tx).await;
            return;
        }
        Ok(None) | Err(_) => {
            warn!(%pin, "websocket join timed out");
            finalize(writer_task, outbound_tx).await;
            return;
        }
    };

    let Ok(PlayerInboundMessage::Join { nickname, user_id }) =
        PlayerInboundMessage::from_json_str(&initial_message)
    else {
        warn!(%pin, "first message was not a valid join");
        let _ = send_error(&outbound_tx, "invalid_input", "first message must be a join");
        let _ = outbound_tx.send(Message::Close(None));
        finalize(writer_task, outbound_tx).await;
        return;
    };

    // Subscribe before joining so the player's own join event is not missed.
    let subscription = match session.subscribe().await {
        Ok(subscription) => subscription,
        Err(err) => {
            let _ = send_service_error(&outbound_tx, &err);
            let _ = outbound_tx.send(Message::Close(None));
            finalize(writer_task, outbound_tx).await;
            return;
        }
    };

    let joined = match session.join(nickname, user_id).await {
        Ok(joined) => joined,
        Err(err) => {
            info!(%pin, error = %err, "websocket join rejected");
            let _ = send_service_error(&outbound_tx, &err);
            let _ = outbound_tx.send(Message::Close(None));
            finalize(writer_task, outbound_tx).await;
            return;
        }
    };
    let nickname = joined.nickname.clone();
    info!(%pin, %nickname, "player socket joined");

    if send_message_to_websocket(&outbound_tx, &PlayerOutboundMessage::from(&joined)).is_err() {
        finalize(writer_task, outbound_tx).await;
        return;
    }

    let forwarder = spawn_event_forwarder(subscription, outbound_tx.clone());

    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Text(text)) => match PlayerInboundMessage::from_json_str(&text) {
                Ok(PlayerInboundMessage::Answer {
                    question_id,
                    option_id,
                }) => {
                    let reply = match session.submit(question_id, nickname.clone(), option_id).await {
                        Ok(ack) => send_message_to_websocket(
                            &outbound_tx,
                            &PlayerOutboundMessage::AnswerAccepted {
                                question_id: ack.question_id,
                                answered_count: ack.answered_count,
                            },
                        ),
                        Err(err) => {
                            debug!(%pin, %nickname, error = %err, "answer rejected");
                            send_service_error(&outbound_tx, &err)
                        }
                    };
                    if reply.is_err() {
                        break;
                    }
                }
                Ok(PlayerInboundMessage::Join { .. }) => {
                    warn!(%pin, %nickname, "ignoring duplicate join message");
                }
                Ok(PlayerInboundMessage::Unknown) => {
                    debug!(%pin, %nickname, "ignoring unknown message type");
                }
                Err(err) => {
                    warn!(%pin, %nickname, error = %err, "failed to parse or validate player message");
                }
            },
            Ok(Message::Ping(payload)) => {
                let _ = outbound_tx.send(Message::Pong(payload));
            }
            Ok(Message::Close(frame)) => {
                info!(%pin, %nickname, "player closed socket");
                let _ = outbound_tx.send(Message::Close(frame));
                break;
            }
            Ok(Message::Binary(_)) => {}
            Ok(Message::Pong(_)) => {}
            Err(err) => {
                warn!(%pin, %nickname, error = %err, "websocket error");
                break;
            }
        }
    }

    forwarder.abort();
    info!(%pin, %nickname, "player socket disconnected");

    finalize(writer_task, outbound_tx).await;
}

/// Push session events to the socket until the session ends or the socket closes.
fn spawn_event_forwarder(
    subscription: SessionSubscription,
    outbound_tx: mpsc::UnboundedSender<Message>,
) -> JoinHandle<()> {
    let pin = subscription.pin();
    tokio::spawn(async move {
        let events = subscription.into_stream();
        tokio::pin!(events);
        while let Some(event) = events.next().await {
            let envelope = match Envelope::new(pin, &event, std::time::SystemTime::now()) {
                Ok(envelope) => envelope,
                Err(err) => {
                    warn!(%pin, error = %err, "failed to encode session event");
                    continue;
                }
            };
            if send_message_to_websocket(&outbound_tx, &envelope).is_err() {
                return;
            }
            if event.is_terminal() {
                let _ = outbound_tx.send(Message::Close(None));
                return;
            }
        }
    })
}

fn send_service_error(
    tx: &mpsc::UnboundedSender<Message>,
    err: &ServiceError,
) -> Result<(), ConnectionClosed> {
    send_error(tx, err.code(), &err.to_string())
}

fn send_error(
    tx: &mpsc::UnboundedSender<Message>,
    code: &str,
    message: &str,
) -> Result<(), ConnectionClosed> {
    send_message_to_websocket(
        tx,
        &PlayerOutboundMessage::Error {
            code: code.to_string(),
            message: message.to_string(),
        },
    )
}

/// Serialize `value` and queue it on the writer channel.
///
/// Serialization failures are logged and swallowed; a closed writer is reported to the caller.
fn send_message_to_websocket<T>(
    tx: &mpsc::UnboundedSender<Message>,
    value: &T,
) -> Result<(), ConnectionClosed>
where
    T: ?Sized + serde::Serialize + std::fmt::Debug,
{
    let payload = match serde_json::to_string(value) {
        Ok(p) => p,
        Err(err) => {
            warn!(error = %err, "failed to serialize message `{value:?}`");
            return Ok(());
        }
    };

    tx.send(Message::Text(payload.into()))
        .map_err(|_| ConnectionClosed)
}

/// Ensure the writer task winds down before we return from the socket handler.
async fn finalize(writer_task: JoinHandle<()>, outbound_tx: mpsc::UnboundedSender<Message>) {
    drop(outbound_tx);
    let _ = writer_task.await;
}
