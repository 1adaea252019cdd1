//! Pure lifecycle transition table of a live session.

use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

/// Lifecycle status of a live quiz session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Lobby is open; players may join.
    Waiting,
    /// Questions are being played.
    Active,
    /// Terminal state; no more answers or joins are accepted.
    Finished,
}

/// Indicates why a session reached [`SessionStatus::Finished`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// The last question was resolved.
    Completed,
    /// The host stopped the session early.
    EndedByHost,
    /// The lobby stayed idle past its limit without being started.
    LobbyExpired,
}

/// Events that can be applied to the session state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// Host opens the first question.
    Start,
    /// Current question closed; `last` tells whether it was the final one.
    Resolve {
        /// Whether the resolved question was the last of the snapshot.
        last: bool,
    },
    /// Host terminates the session.
    End,
    /// Lobby idle timeout elapsed before the host started.
    Expire,
}

/// Error returned when attempting to apply an invalid transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid transition: {event:?} cannot be applied while in {from:?}")]
pub struct InvalidTransition {
    /// The status the state machine was in when the invalid event was received.
    pub from: SessionStatus,
    /// The event that cannot be applied from this status.
    pub event: SessionEvent,
}

/// Snapshot of the current state machine state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Snapshot {
    /// Current status.
    pub status: SessionStatus,
    /// Number of transitions applied so far.
    pub version: usize,
    /// Set once the session is finished.
    pub finish_reason: Option<FinishReason>,
}

/// Transition table for one session: Waiting → Active → Finished.
#[derive(Debug, Clone)]
pub struct SessionStateMachine {
    status: SessionStatus,
    version: usize,
    finish_reason: Option<FinishReason>,
}

impl Default for SessionStateMachine {
    fn default() -> Self {
        Self {
            status: SessionStatus::Waiting,
            version: 0,
            finish_reason: None,
        }
    }
}

impl SessionStateMachine {
    /// Create a new state machine initialised in the waiting state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inspect the current status.
    pub fn status(&self) -> SessionStatus {
        self.status
    }

    /// Why the session finished, if it did.
    pub fn finish_reason(&self) -> Option<FinishReason> {
        self.finish_reason
    }

    /// Create a snapshot of the current state machine state.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            status: self.status,
            version: self.version,
            finish_reason: self.finish_reason,
        }
    }

    /// Validate and apply `event`, returning the status after the transition.
    pub fn apply(&mut self, event: SessionEvent) -> Result<SessionStatus, InvalidTransition> {
        let (next, reason) = self.compute_transition(event)?;
        self.status = next;
        if reason.is_some() {
            self.finish_reason = reason;
        }
        self.version += 1;
        Ok(next)
    }

    fn compute_transition(
        &self,
        event: SessionEvent,
    ) -> Result<(SessionStatus, Option<FinishReason>), InvalidTransition> {
        let next = match (self.status, event) {
            (SessionStatus::Waiting, SessionEvent::Start) => (SessionStatus::Active, None),
            (SessionStatus::Active, SessionEvent::Resolve { last: false }) => {
                (SessionStatus::Active, None)
            }
            (SessionStatus::Active, SessionEvent::Resolve { last: true }) => {
                (SessionStatus::Finished, Some(FinishReason::Completed))
            }
            (SessionStatus::Waiting | SessionStatus::Active, SessionEvent::End) => {
                (SessionStatus::Finished, Some(FinishReason::EndedByHost))
            }
            (SessionStatus::Waiting, SessionEvent::Expire) => {
                (SessionStatus::Finished, Some(FinishReason::LobbyExpired))
            }
            (from, event) => return Err(InvalidTransition { from, event }),
        };

        Ok(next)
    }
}
