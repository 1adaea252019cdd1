pub mod memory;
#[cfg(feature = "mongo-store")]
/// MongoDB-backed question bank and attempt storage.
pub mod mongodb;

use crate::dao::models::{PersistOutcome, QuizAttemptEntity, QuizEntity};
use crate::dao::storage::StorageResult;
use futures::future::BoxFuture;
use uuid::Uuid;

/// Abstraction over the question bank and the durable attempt storage.
pub trait QuizStore: Send + Sync {
    /// Load a quiz definition with its ordered questions.
    fn find_quiz(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<QuizEntity>>>;
    /// Insert `attempt` unless one with the same key already exists.
    fn insert_attempt(
        &self,
        attempt: QuizAttemptEntity,
    ) -> BoxFuture<'static, StorageResult<PersistOutcome>>;
    /// Check that the backend is reachable.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    /// Re-establish the backend connection after a failed health check.
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
