//! PIN index of live sessions.
//!
//! The registry is the only structure shared across sessions. Reserving a PIN
//! goes through the map's entry API so two concurrent hosts can never be handed
//! the same code while it is in use.

use std::sync::Arc;

use dashmap::{DashMap, mapref::entry::Entry};
use tokio::time::sleep;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    config::SessionSettings,
    dao::recorder::AttemptRecorder,
    error::ServiceError,
    state::{
        pin::{Pin, PinSource},
        quiz::{QuestionSnapshot, QuizSession},
        session::{SessionHandle, spawn_session},
    },
};

/// Allocates PINs, spawns session actors and retires them once they are done.
#[derive(Clone)]
pub struct SessionRegistry {
    index: Arc<DashMap<Pin, SessionHandle>>,
    pins: Arc<dyn PinSource>,
    recorder: Arc<dyn AttemptRecorder>,
    settings: SessionSettings,
}

impl SessionRegistry {
    /// Empty registry drawing PINs from `pins` and persisting through `recorder`.
    pub fn new(
        pins: Arc<dyn PinSource>,
        recorder: Arc<dyn AttemptRecorder>,
        settings: SessionSettings,
    ) -> Self {
        Self {
            index: Arc::new(DashMap::new()),
            pins,
            recorder,
            settings,
        }
    }

    /// Settings applied to new sessions.
    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    /// Open a waiting session for `snapshot` under a fresh PIN.
    pub fn create_session(
        &self,
        snapshot: QuestionSnapshot,
        host_user_id: String,
    ) -> Result<SessionHandle, ServiceError> {
        if snapshot.is_empty() {
            return Err(ServiceError::QuizHasNoQuestions);
        }

        let attempts = self.settings.pin_max_attempts;
        for attempt in 1..=attempts {
            let pin = self.pins.next_pin();
            match self.index.entry(pin) {
                Entry::Occupied(_) => {
                    debug!(%pin, attempt, "pin already in use; drawing another");
                }
                Entry::Vacant(slot) => {
                    let session = QuizSession::new(pin, &snapshot, host_user_id);
                    let (handle, finished) = spawn_session(
                        session,
                        snapshot,
                        self.recorder.clone(),
                        &self.settings,
                    );
                    slot.insert(handle.clone());
                    self.schedule_retirement(&handle, finished);

                    info!(%pin, session_id = %handle.session_id(), "session registered");
                    return Ok(handle);
                }
            }
        }

        warn!(attempts, "pin space exhausted");
        Err(ServiceError::PinExhaustion { attempts })
    }

    /// Resolve a user-supplied PIN to its live session.
    pub fn lookup(&self, raw_pin: &str) -> Result<SessionHandle, ServiceError> {
        let pin: Pin = raw_pin.parse()?;
        self.index
            .get(&pin)
            .map(|entry| entry.value().clone())
            .filter(|handle| !handle.is_closed())
            .ok_or(ServiceError::SessionNotFound)
    }

    /// Drop the session from the index, releasing its PIN.
    ///
    /// Only removes the entry when it still belongs to `session_id`, so a late
    /// retirement cannot evict a newer session that reused the PIN.
    pub fn retire(&self, pin: Pin, session_id: Uuid) -> bool {
        let removed = self
            .index
            .remove_if(&pin, |_, handle| handle.session_id() == session_id)
            .is_some();
        if removed {
            info!(%pin, %session_id, "session retired");
        }
        removed
    }

    /// Number of sessions currently holding a PIN.
    pub fn active_count(&self) -> usize {
        self.index.len()
    }

    fn schedule_retirement(
        &self,
        handle: &SessionHandle,
        finished: tokio::sync::oneshot::Receiver<()>,
    ) {
        let registry = self.clone();
        let pin = handle.pin();
        let session_id = handle.session_id();
        let grace = self.settings.retire_grace;

        tokio::spawn(async move {
            // Resolves on finish, or on error if the actor went away first.
            let _ = finished.await;
            sleep(grace).await;
            registry.retire(pin, session_id);
        });
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Mutex, time::Duration};

    use super::*;
    use crate::{
        dao::recorder::StorageSlot,
        state::{quiz::fixtures, state_machine::SessionStatus},
    };

    /// Hands out a fixed sequence of PINs, repeating the last one.
    struct ScriptedPins(Mutex<Vec<Pin>>);

    impl ScriptedPins {
        fn new(codes: &[&str]) -> Self {
            let mut pins: Vec<Pin> = codes.iter().map(|code| code.parse().unwrap()).collect();
            pins.reverse();
            Self(Mutex::new(pins))
        }
    }

    impl PinSource for ScriptedPins {
        fn next_pin(&self) -> Pin {
            let mut pins = self.0.lock().unwrap();
            if pins.len() > 1 {
                pins.pop().unwrap()
            } else {
                pins[0]
            }
        }
    }

    fn registry(codes: &[&str], settings: SessionSettings) -> SessionRegistry {
        SessionRegistry::new(
            Arc::new(ScriptedPins::new(codes)),
            Arc::new(StorageSlot::new()),
            settings,
        )
    }

    #[tokio::test]
    async fn colliding_pins_are_redrawn() {
        let registry = registry(&["AAAAAA", "AAAAAA", "BBBBBB"], SessionSettings::default());

        let first = registry
            .create_session(fixtures::snapshot(1), "host".into())
            .unwrap();
        let second = registry
            .create_session(fixtures::snapshot(1), "host".into())
            .unwrap();

        assert_eq!(first.pin().as_str(), "AAAAAA");
        assert_eq!(second.pin().as_str(), "BBBBBB");
        assert_eq!(registry.active_count(), 2);
    }

    #[tokio::test]
    async fn exhausted_pin_space_fails() {
        let settings = SessionSettings {
            pin_max_attempts: 3,
            ..SessionSettings::default()
        };
        let registry = registry(&["AAAAAA"], settings);
        registry
            .create_session(fixtures::snapshot(1), "host".into())
            .unwrap();

        assert!(matches!(
            registry.create_session(fixtures::snapshot(1), "host".into()),
            Err(ServiceError::PinExhaustion { attempts: 3 })
        ));
    }

    #[tokio::test]
    async fn empty_quiz_is_rejected() {
        let registry = registry(&["AAAAAA"], SessionSettings::default());
        assert!(matches!(
            registry.create_session(fixtures::snapshot(0), "host".into()),
            Err(ServiceError::QuizHasNoQuestions)
        ));
        assert_eq!(registry.active_count(), 0);
    }

    #[tokio::test]
    async fn lookup_is_case_insensitive_and_rejects_unknown_pins() {
        let registry = registry(&["QWE234"], SessionSettings::default());
        let handle = registry
            .create_session(fixtures::snapshot(1), "host".into())
            .unwrap();

        let found = registry.lookup(" qwe234 ").unwrap();
        assert_eq!(found.session_id(), handle.session_id());

        assert!(matches!(
            registry.lookup("ZZZZZZ"),
            Err(ServiceError::SessionNotFound)
        ));
        assert!(matches!(
            registry.lookup("not-a-pin"),
            Err(ServiceError::SessionNotFound)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn finished_sessions_are_retired_after_grace() {
        let settings = SessionSettings {
            retire_grace: Duration::from_secs(60),
            ..SessionSettings::default()
        };
        let registry = registry(&["AAAAAA"], settings);
        let handle = registry
            .create_session(fixtures::snapshot(1), "host".into())
            .unwrap();

        let info = handle.end("host".into()).await.unwrap();
        assert_eq!(info.status, SessionStatus::Finished);
        assert!(registry.lookup("AAAAAA").is_ok());

        sleep(Duration::from_secs(61)).await;
        assert!(matches!(
            registry.lookup("AAAAAA"),
            Err(ServiceError::SessionNotFound)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn abandoned_lobbies_release_their_pin() {
        let settings = SessionSettings {
            lobby_idle: Duration::from_secs(1800),
            retire_grace: Duration::from_secs(300),
            ..SessionSettings::default()
        };
        let registry = registry(&["AAAAAA"], settings);
        drop(
            registry
                .create_session(fixtures::snapshot(1), "host".into())
                .unwrap(),
        );
        assert_eq!(registry.active_count(), 1);

        sleep(Duration::from_secs(7 * 24 * 3600)).await;
        assert_eq!(registry.active_count(), 0);
        assert!(matches!(
            registry.lookup("AAAAAA"),
            Err(ServiceError::SessionNotFound)
        ));
    }

    #[tokio::test]
    async fn retire_ignores_stale_session_ids() {
        let registry = registry(&["AAAAAA"], SessionSettings::default());
        let handle = registry
            .create_session(fixtures::snapshot(1), "host".into())
            .unwrap();

        assert!(!registry.retire(handle.pin(), Uuid::new_v4()));
        assert!(registry.retire(handle.pin(), handle.session_id()));
        assert_eq!(registry.active_count(), 0);
    }
}
