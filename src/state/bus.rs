//! Per-session fan-out of live events.
//!
//! Each session owns one [`AnswerBus`]. Only the session actor publishes on it;
//! any number of observers (host dashboard, player sockets, SSE clients) hold a
//! [`SessionSubscription`]. Delivery is best-effort: a slow subscriber that lags
//! behind the channel capacity skips the missed events and keeps listening.

use futures::Stream;
use indexmap::IndexMap;
use serde::Serialize;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::debug;
use uuid::Uuid;

use crate::{
    dto::events::{
        AnswerSubmittedEvent, AnswerTallyEvent, PlayerJoinedEvent, QuestionResolvedEvent,
        QuestionStartedEvent, ResolveReason, SessionEndedEvent,
    },
    state::{pin::Pin, quiz::QuestionRuntime},
};

/// Event published on a session bus.
#[derive(Debug, Clone, PartialEq)]
pub enum BusEvent {
    /// A player entered the lobby.
    PlayerJoined(PlayerJoinedEvent),
    /// A question opened.
    QuestionStarted(QuestionStartedEvent),
    /// An answer was accepted.
    AnswerSubmitted(AnswerSubmittedEvent),
    /// Updated counts for the open question.
    AnswerTally(AnswerTallyEvent),
    /// A question closed.
    QuestionResolved(QuestionResolvedEvent),
    /// Terminal event.
    SessionEnded(SessionEndedEvent),
}

impl BusEvent {
    /// Wire name used as the envelope `type`.
    pub fn kind(&self) -> &'static str {
        match self {
            BusEvent::PlayerJoined(_) => "player_joined",
            BusEvent::QuestionStarted(_) => "question_started",
            BusEvent::AnswerSubmitted(_) => "answer_submitted",
            BusEvent::AnswerTally(_) => "answer_tally",
            BusEvent::QuestionResolved(_) => "question_resolved",
            BusEvent::SessionEnded(_) => "session_ended",
        }
    }

    /// JSON form of the inner payload.
    pub fn payload(&self) -> serde_json::Result<serde_json::Value> {
        fn to_value<T: Serialize>(payload: &T) -> serde_json::Result<serde_json::Value> {
            serde_json::to_value(payload)
        }

        match self {
            BusEvent::PlayerJoined(payload) => to_value(payload),
            BusEvent::QuestionStarted(payload) => to_value(payload),
            BusEvent::AnswerSubmitted(payload) => to_value(payload),
            BusEvent::AnswerTally(payload) => to_value(payload),
            BusEvent::QuestionResolved(payload) => to_value(payload),
            BusEvent::SessionEnded(payload) => to_value(payload),
        }
    }

    /// Whether subscribers should stop after this event.
    pub fn is_terminal(&self) -> bool {
        matches!(self, BusEvent::SessionEnded(_))
    }
}

#[derive(Debug, Default)]
struct Tally {
    question_id: Option<Uuid>,
    counts: IndexMap<Uuid, u32>,
}

/// Broadcast hub of one session, carrying the live answer tally of the current question.
pub struct AnswerBus {
    pin: Pin,
    sender: broadcast::Sender<BusEvent>,
    tally: Tally,
}

impl AnswerBus {
    /// Construct a bus backed by a Tokio broadcast channel with the given capacity.
    pub fn new(pin: Pin, capacity: usize) -> Self {
        let (sender, _receiver) = broadcast::channel(capacity.max(1));
        Self {
            pin,
            sender,
            tally: Tally::default(),
        }
    }

    /// Register a subscriber that receives every event published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<BusEvent> {
        self.sender.subscribe()
    }

    /// Number of live receivers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Send `event` to all current subscribers, ignoring delivery errors.
    fn publish(&self, event: BusEvent) {
        if self.sender.send(event).is_err() {
            debug!(pin = %self.pin, "no subscriber listening on session bus");
        }
    }

    /// Announce a new player.
    pub fn player_joined(&self, nickname: &str, player_count: usize) {
        self.publish(BusEvent::PlayerJoined(PlayerJoinedEvent {
            nickname: nickname.to_string(),
            player_count,
        }));
    }

    /// Announce a new question and reset the tally to zero for each of its options.
    pub fn question_started(&mut self, event: QuestionStartedEvent) {
        self.tally = Tally {
            question_id: Some(event.question_id),
            counts: event.options.iter().map(|option| (option.option_id, 0)).collect(),
        };
        self.publish(BusEvent::QuestionStarted(event));
    }

    /// Count an accepted answer and publish the submission plus the refreshed tally.
    ///
    /// A `None` option (timeout) is announced without touching the counts.
    pub fn publish_answer(
        &mut self,
        question_id: Uuid,
        nickname: &str,
        selected_option_id: Option<Uuid>,
        answered_count: usize,
        player_count: usize,
    ) {
        if self.tally.question_id != Some(question_id) {
            self.tally = Tally {
                question_id: Some(question_id),
                counts: IndexMap::new(),
            };
        }
        if let Some(option_id) = selected_option_id {
            *self.tally.counts.entry(option_id).or_insert(0) += 1;
        }

        self.publish(BusEvent::AnswerSubmitted(AnswerSubmittedEvent {
            question_id,
            nickname: nickname.to_string(),
            answered_count,
            player_count,
        }));
        self.publish(BusEvent::AnswerTally(AnswerTallyEvent {
            question_id,
            counts: self.tally.counts.clone(),
            answered_count,
            player_count,
        }));
    }

    /// Reveal the answer of `question` with its final tally.
    pub fn question_resolved(&mut self, question: &QuestionRuntime, reason: ResolveReason) {
        let counts = if self.tally.question_id == Some(question.question_id) {
            std::mem::take(&mut self.tally.counts)
        } else {
            question
                .options
                .iter()
                .map(|option| (option.option_id, 0))
                .collect()
        };
        self.tally = Tally::default();

        self.publish(BusEvent::QuestionResolved(QuestionResolvedEvent {
            question_id: question.question_id,
            question_index: question.order_index,
            correct_option_id: question.correct_option_id,
            reason,
            counts,
        }));
    }

    /// Publish the terminal event.
    pub fn session_ended(&self, event: SessionEndedEvent) {
        self.publish(BusEvent::SessionEnded(event));
    }

    /// Current counts for the open question, if any.
    pub fn current_tally(&self) -> Option<(Uuid, &IndexMap<Uuid, u32>)> {
        self.tally
            .question_id
            .map(|question_id| (question_id, &self.tally.counts))
    }
}

/// Receiving side handed to observers.
///
/// When the session already finished, `terminal` carries its final event so late
/// subscribers still learn the outcome.
pub struct SessionSubscription {
    pin: Pin,
    receiver: broadcast::Receiver<BusEvent>,
    terminal: Option<BusEvent>,
}

impl SessionSubscription {
    /// Wrap a receiver; `terminal` is replayed first when the session already ended.
    pub fn new(pin: Pin, receiver: broadcast::Receiver<BusEvent>, terminal: Option<BusEvent>) -> Self {
        Self {
            pin,
            receiver,
            terminal,
        }
    }

    /// PIN of the session being followed.
    pub fn pin(&self) -> Pin {
        self.pin
    }

    /// Consume the subscription as a stream that ends after the terminal event.
    pub fn into_stream(self) -> impl Stream<Item = BusEvent> + Send + 'static {
        let Self {
            pin,
            mut receiver,
            terminal,
        } = self;

        async_stream::stream! {
            if let Some(event) = terminal {
                yield event;
                return;
            }

            loop {
                match receiver.recv().await {
                    Ok(event) => {
                        let terminal = event.is_terminal();
                        yield event;
                        if terminal {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        debug!(%pin, skipped, "session subscriber lagged behind");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use futures::StreamExt;

    use super::*;
    use crate::state::{quiz::fixtures, state_machine::FinishReason};

    fn started(question: &QuestionRuntime) -> QuestionStartedEvent {
        QuestionStartedEvent {
            question_id: question.question_id,
            question_index: question.order_index,
            total_questions: 1,
            text: question.text.clone(),
            options: question.option_summaries(),
            duration_seconds: question.duration_seconds,
            deadline: "2026-01-01T00:00:00Z".into(),
        }
    }

    fn ended() -> SessionEndedEvent {
        SessionEndedEvent {
            reason: FinishReason::Completed,
            total_questions: 1,
            leaderboard: Vec::new(),
        }
    }

    #[tokio::test]
    async fn tally_counts_only_the_current_question() {
        let snapshot = fixtures::snapshot(1);
        let question = snapshot.get(0).unwrap();
        let pin: Pin = "ABC234".parse().unwrap();
        let mut bus = AnswerBus::new(pin, 16);
        let mut rx = bus.subscribe();

        bus.question_started(started(question));
        let correct = question.correct_option_id;
        bus.publish_answer(question.question_id, "Ana", Some(correct), 1, 2);
        bus.publish_answer(question.question_id, "Ben", None, 2, 2);

        let (_, counts) = bus.current_tally().unwrap();
        assert_eq!(counts[&correct], 1);
        assert_eq!(counts.values().sum::<u32>(), 1);

        bus.question_resolved(question, ResolveReason::AllAnswered);
        assert!(bus.current_tally().is_none());

        let kinds: Vec<&str> = std::iter::from_fn(|| rx.try_recv().ok())
            .map(|event| event.kind())
            .collect();
        assert_eq!(
            kinds,
            vec![
                "question_started",
                "answer_submitted",
                "answer_tally",
                "answer_submitted",
                "answer_tally",
                "question_resolved",
            ]
        );
    }

    #[tokio::test]
    async fn stream_stops_after_session_ended() {
        let pin: Pin = "ABC234".parse().unwrap();
        let bus = AnswerBus::new(pin, 16);
        let subscription = SessionSubscription::new(pin, bus.subscribe(), None);

        bus.player_joined("Ana", 1);
        bus.session_ended(ended());
        bus.player_joined("Ben", 2);

        let events: Vec<BusEvent> = subscription.into_stream().collect().await;
        assert_eq!(events.len(), 2);
        assert!(events[1].is_terminal());
    }

    #[tokio::test]
    async fn late_subscriber_receives_terminal_event_only() {
        let pin: Pin = "ABC234".parse().unwrap();
        let bus = AnswerBus::new(pin, 16);
        let terminal = BusEvent::SessionEnded(ended());
        let subscription = SessionSubscription::new(pin, bus.subscribe(), Some(terminal.clone()));

        let events: Vec<BusEvent> = subscription.into_stream().collect().await;
        assert_eq!(events, vec![terminal]);
    }

    #[tokio::test]
    async fn lagging_subscriber_skips_and_continues() {
        let pin: Pin = "ABC234".parse().unwrap();
        let bus = AnswerBus::new(pin, 2);
        let subscription = SessionSubscription::new(pin, bus.subscribe(), None);

        for count in 0..5 {
            bus.player_joined(&format!("p{count}"), count + 1);
        }
        bus.session_ended(ended());

        let events: Vec<BusEvent> = subscription.into_stream().collect().await;
        assert!(events.len() <= 2);
        assert!(events.last().unwrap().is_terminal());
    }
}
