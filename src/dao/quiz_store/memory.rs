//! In-process store used when no database is configured and in tests.

use std::sync::Arc;

use dashmap::{DashMap, mapref::entry::Entry};
use futures::future::BoxFuture;
use uuid::Uuid;

use crate::dao::{
    models::{AttemptKey, PersistOutcome, QuizAttemptEntity, QuizEntity},
    quiz_store::QuizStore,
    storage::StorageResult,
};

/// Quiz bank and attempt log held in memory.
#[derive(Clone, Default)]
pub struct MemoryQuizStore {
    quizzes: Arc<DashMap<Uuid, QuizEntity>>,
    attempts: Arc<DashMap<AttemptKey, QuizAttemptEntity>>,
}

impl MemoryQuizStore {
    /// Build a store pre-seeded with `quizzes`.
    pub fn with_quizzes(quizzes: impl IntoIterator<Item = QuizEntity>) -> Self {
        let store = Self::default();
        for quiz in quizzes {
            store.insert_quiz(quiz);
        }
        store
    }

    /// Add or replace a quiz definition.
    pub fn insert_quiz(&self, quiz: QuizEntity) {
        self.quizzes.insert(quiz.id, quiz);
    }

    /// All attempts recorded so far.
    pub fn attempts(&self) -> Vec<QuizAttemptEntity> {
        self.attempts
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// Attempts recorded for one live session.
    pub fn attempts_for_session(&self, session_pin: &str) -> Vec<QuizAttemptEntity> {
        self.attempts
            .iter()
            .filter(|entry| entry.key().session_pin == session_pin)
            .map(|entry| entry.value().clone())
            .collect()
    }
}

impl QuizStore for MemoryQuizStore {
    fn find_quiz(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<QuizEntity>>> {
        let quiz = self.quizzes.get(&id).map(|entry| entry.value().clone());
        Box::pin(async move { Ok(quiz) })
    }

    fn insert_attempt(
        &self,
        attempt: QuizAttemptEntity,
    ) -> BoxFuture<'static, StorageResult<PersistOutcome>> {
        let outcome = match self.attempts.entry(attempt.key()) {
            Entry::Occupied(_) => PersistOutcome::AlreadyRecorded,
            Entry::Vacant(slot) => {
                slot.insert(attempt);
                PersistOutcome::Inserted
            }
        };
        Box::pin(async move { Ok(outcome) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}

#[cfg(test)]
mod tests {
    use std::time::SystemTime;

    use super::*;
    use crate::dao::models::PlayerIdentity;

    fn attempt(score: u32) -> QuizAttemptEntity {
        QuizAttemptEntity {
            id: Uuid::new_v4(),
            session_id: Some(Uuid::from_u128(1)),
            session_pin: Some("ABC234".into()),
            player_identity: PlayerIdentity::Nickname("Ana".into()),
            quiz_id: Uuid::nil(),
            course_id: Uuid::nil(),
            score,
            total_questions: 2,
            percentage: 50.0,
            taken_at: SystemTime::now(),
        }
    }

    #[tokio::test]
    async fn duplicate_attempts_are_stored_once() {
        let store = MemoryQuizStore::default();

        let first = store.insert_attempt(attempt(1)).await.unwrap();
        let second = store.insert_attempt(attempt(2)).await.unwrap();

        assert_eq!(first, PersistOutcome::Inserted);
        assert_eq!(second, PersistOutcome::AlreadyRecorded);

        let stored = store.attempts();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].score, 1, "first write wins");
    }

    #[tokio::test]
    async fn attempts_from_different_sessions_are_distinct() {
        let store = MemoryQuizStore::default();
        let mut other = attempt(1);
        other.session_id = Some(Uuid::from_u128(2));
        other.session_pin = Some("XYZ789".into());

        store.insert_attempt(attempt(1)).await.unwrap();
        store.insert_attempt(other).await.unwrap();

        assert_eq!(store.attempts().len(), 2);
        assert_eq!(store.attempts_for_session("XYZ789").len(), 1);
    }

    #[tokio::test]
    async fn recycled_pin_does_not_hide_a_later_session() {
        let store = MemoryQuizStore::default();
        let mut later = attempt(2);
        later.session_id = Some(Uuid::from_u128(2));

        assert_eq!(
            store.insert_attempt(attempt(1)).await.unwrap(),
            PersistOutcome::Inserted
        );
        assert_eq!(
            store.insert_attempt(later).await.unwrap(),
            PersistOutcome::Inserted
        );
        assert_eq!(store.attempts_for_session("ABC234").len(), 2);
    }

    #[tokio::test]
    async fn find_quiz_returns_seeded_definition() {
        let quiz = QuizEntity {
            id: Uuid::new_v4(),
            course_id: Uuid::new_v4(),
            title: "Capitals".into(),
            questions: Vec::new(),
        };
        let store = MemoryQuizStore::with_quizzes([quiz.clone()]);

        assert_eq!(store.find_quiz(quiz.id).await.unwrap(), Some(quiz));
        assert_eq!(store.find_quiz(Uuid::new_v4()).await.unwrap(), None);
    }
}
