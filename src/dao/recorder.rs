//! Boundary through which finished sessions hand their results to durable storage.

use std::sync::Arc;

use futures::future::BoxFuture;
use tokio::sync::{RwLock, watch};

use crate::dao::{
    models::{PersistOutcome, QuizAttemptEntity},
    quiz_store::QuizStore,
    storage::{StorageError, StorageResult},
};

/// Persists final per-player results.
///
/// Implementations must be idempotent on `(session_id, session_pin, player_identity, quiz_id)`:
/// a duplicate call reports [`PersistOutcome::AlreadyRecorded`] and writes nothing.
pub trait AttemptRecorder: Send + Sync {
    /// Store `attempt` unless an attempt with the same key exists.
    fn persist(&self, attempt: QuizAttemptEntity) -> BoxFuture<'_, StorageResult<PersistOutcome>>;
}

/// Swappable holder for the active [`QuizStore`], plus the degraded flag.
///
/// The storage supervisor installs and clears backends at runtime; sessions keep
/// a reference to the slot rather than to a specific backend.
pub struct StorageSlot {
    store: RwLock<Option<Arc<dyn QuizStore>>>,
    degraded: watch::Sender<bool>,
}

impl StorageSlot {
    /// Create an empty slot; the application starts degraded.
    pub fn new() -> Self {
        let (degraded, _rx) = watch::channel(true);
        Self {
            store: RwLock::new(None),
            degraded,
        }
    }

    /// Create a slot with `store` already installed.
    pub fn with_store(store: Arc<dyn QuizStore>) -> Self {
        let (degraded, _rx) = watch::channel(false);
        Self {
            store: RwLock::new(Some(store)),
            degraded,
        }
    }

    /// Obtain a handle to the current store, if one is installed.
    pub async fn current(&self) -> Option<Arc<dyn QuizStore>> {
        self.store.read().await.as_ref().cloned()
    }

    /// Install `store` and leave degraded mode.
    pub async fn install(&self, store: Arc<dyn QuizStore>) {
        {
            let mut guard = self.store.write().await;
            *guard = Some(store);
        }
        self.set_degraded(false);
    }

    /// Drop the current store and enter degraded mode.
    pub async fn clear(&self) {
        {
            let mut guard = self.store.write().await;
            guard.take();
        }
        self.set_degraded(true);
    }

    /// Current degraded flag.
    pub fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    /// Subscribe to degraded mode updates.
    pub fn watch_degraded(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Update the degraded flag, notifying watchers only on change.
    pub fn set_degraded(&self, value: bool) {
        self.degraded.send_if_modified(|current| {
            if *current == value {
                return false;
            }
            *current = value;
            true
        });
    }
}

impl Default for StorageSlot {
    fn default() -> Self {
        Self::new()
    }
}

impl AttemptRecorder for StorageSlot {
    fn persist(&self, attempt: QuizAttemptEntity) -> BoxFuture<'_, StorageResult<PersistOutcome>> {
        Box::pin(async move {
            let store = self.current().await.ok_or(StorageError::Detached)?;
            store.insert_attempt(attempt).await
        })
    }
}
