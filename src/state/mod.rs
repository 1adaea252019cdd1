//! Shared application state and the live session engine.

pub mod bus;
pub mod pin;
pub mod quiz;
pub mod registry;
pub mod roster;
pub mod scoring;
pub mod session;
pub mod state_machine;

use std::sync::Arc;

use crate::{
    config::AppConfig,
    dao::{quiz_store::QuizStore, recorder::StorageSlot},
    error::ServiceError,
};

pub use self::registry::SessionRegistry;
use self::pin::{PinSource, RandomPins};

/// State handle cloned into every handler.
pub type SharedState = Arc<AppState>;

/// Central application state: configuration, storage slot and the live session registry.
pub struct AppState {
    config: AppConfig,
    storage: Arc<StorageSlot>,
    registry: SessionRegistry,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a storage backend is installed.
    pub fn new(config: AppConfig) -> SharedState {
        Self::with_pin_source(config, Arc::new(RandomPins))
    }

    /// Same as [`AppState::new`] with a custom PIN generator.
    pub fn with_pin_source(config: AppConfig, pins: Arc<dyn PinSource>) -> SharedState {
        let storage = Arc::new(StorageSlot::new());
        let registry = SessionRegistry::new(pins, storage.clone(), config.sessions().clone());
        Arc::new(Self {
            config,
            storage,
            registry,
        })
    }

    /// Loaded application configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Live sessions indexed by PIN.
    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// Slot holding the active storage backend.
    pub fn storage(&self) -> &Arc<StorageSlot> {
        &self.storage
    }

    /// Obtain a handle to the current quiz store, if one is installed.
    pub async fn quiz_store(&self) -> Option<Arc<dyn QuizStore>> {
        self.storage.current().await
    }

    /// Current quiz store, or [`ServiceError::Degraded`] when none is installed.
    pub async fn require_quiz_store(&self) -> Result<Arc<dyn QuizStore>, ServiceError> {
        self.quiz_store().await.ok_or(ServiceError::Degraded)
    }

    /// Install a new quiz store implementation and leave degraded mode.
    pub async fn install_quiz_store(&self, store: Arc<dyn QuizStore>) {
        self.storage.install(store).await;
    }

    /// Remove the current quiz store and enter degraded mode.
    pub async fn clear_quiz_store(&self) {
        self.storage.clear().await;
    }

    /// Current degraded flag.
    pub fn is_degraded(&self) -> bool {
        self.storage.is_degraded()
    }
}
