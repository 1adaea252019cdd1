use std::sync::Arc;

use futures::future::BoxFuture;
use mongodb::{
    Client, Collection, Database,
    bson::{Document, doc},
    error::{Error as MongoError, ErrorKind, WriteFailure},
    options::{ClientOptions, IndexOptions},
};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use super::{
    connection::{StartupBackoff, open_database},
    error::{MongoDaoError, MongoResult},
    models::{MongoQuizDocument, attempt_filter, attempt_insert_only, quiz_filter},
};
use crate::dao::{
    models::{PersistOutcome, QuizAttemptEntity, QuizEntity},
    quiz_store::QuizStore,
    storage::StorageResult,
};

const QUIZ_COLLECTION_NAME: &str = "quizzes";
const ATTEMPT_COLLECTION_NAME: &str = "quiz_attempts";
const DUPLICATE_KEY_CODE: i32 = 11000;

/// Connection settings for the MongoDB backend.
#[derive(Clone)]
pub struct MongoConfig {
    /// Parsed driver options.
    pub options: ClientOptions,
    /// Database holding quizzes and attempts.
    pub database_name: String,
}

impl MongoConfig {
    /// Parse `uri`, falling back to the `live_quiz` database when no name is given.
    pub async fn from_uri(uri: &str, db_name: Option<&str>) -> MongoResult<Self> {
        let database_name = db_name.unwrap_or("live_quiz").to_owned();
        let options =
            ClientOptions::parse(uri)
                .await
                .map_err(|source| MongoDaoError::InvalidUri {
                    uri: uri.to_owned(),
                    source,
                })?;

        Ok(Self {
            options,
            database_name,
        })
    }
}

/// Quiz bank and attempt storage backed by MongoDB.
#[derive(Clone)]
pub struct MongoQuizStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    state: RwLock<MongoState>,
    config: MongoConfig,
}

struct MongoState {
    #[allow(dead_code)]
    client: Client,
    database: Database,
}

impl MongoInner {
    async fn ping(&self) -> MongoResult<()> {
        let database = {
            let guard = self.state.read().await;
            guard.database.clone()
        };

        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let (client, database) = open_database(
            &self.config.options,
            &self.config.database_name,
            StartupBackoff::default(),
        )
        .await?;
        let mut guard = self.state.write().await;
        guard.client = client;
        guard.database = database;
        Ok(())
    }
}

impl MongoQuizStore {
    /// Establish a connection to MongoDB and ensure indexes are present.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let (client, database) = open_database(
            &config.options,
            &config.database_name,
            StartupBackoff::default(),
        )
        .await?;

        let inner = Arc::new(MongoInner {
            state: RwLock::new(MongoState { client, database }),
            config,
        });

        let store = Self { inner };
        store.ensure_indexes().await?;
        Ok(store)
    }

    async fn ensure_indexes(&self) -> MongoResult<()> {
        let collection = self.attempt_collection().await;
        let index = mongodb::IndexModel::builder()
            .keys(doc! {"session_id": 1, "session_pin": 1, "player_key": 1, "quiz_id": 1})
            .options(
                IndexOptions::builder()
                    .name(Some("attempt_session_key_idx".to_owned()))
                    .unique(Some(true))
                    .build(),
            )
            .build();

        collection
            .create_index(index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: ATTEMPT_COLLECTION_NAME,
                index: "session_id,session_pin,player_key,quiz_id",
                source,
            })?;

        Ok(())
    }

    async fn quiz_collection(&self) -> Collection<MongoQuizDocument> {
        let guard = self.inner.state.read().await;
        guard
            .database
            .collection::<MongoQuizDocument>(QUIZ_COLLECTION_NAME)
    }

    async fn attempt_collection(&self) -> Collection<Document> {
        let guard = self.inner.state.read().await;
        guard.database.collection::<Document>(ATTEMPT_COLLECTION_NAME)
    }

    async fn find_quiz(&self, id: Uuid) -> MongoResult<Option<QuizEntity>> {
        let collection = self.quiz_collection().await;

        let document = collection
            .find_one(quiz_filter(id))
            .await
            .map_err(|source| MongoDaoError::LoadQuiz { id, source })?;

        document.map(QuizEntity::try_from).transpose()
    }

    async fn insert_attempt(&self, attempt: QuizAttemptEntity) -> MongoResult<PersistOutcome> {
        let collection = self.attempt_collection().await;

        let result = collection
            .update_one(attempt_filter(&attempt), attempt_insert_only(&attempt))
            .upsert(true)
            .await;

        match result {
            Ok(update) if update.upserted_id.is_some() => Ok(PersistOutcome::Inserted),
            Ok(_) => Ok(PersistOutcome::AlreadyRecorded),
            // Two concurrent upserts on the same key: the unique index rejects the loser.
            Err(err) if is_duplicate_key(&err) => {
                debug!(quiz_id = %attempt.quiz_id, "attempt already recorded (duplicate key)");
                Ok(PersistOutcome::AlreadyRecorded)
            }
            Err(source) => Err(MongoDaoError::RecordAttempt {
                quiz_id: attempt.quiz_id,
                source,
            }),
        }
    }
}

fn is_duplicate_key(err: &MongoError) -> bool {
    matches!(
        err.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(write)) if write.code == DUPLICATE_KEY_CODE
    )
}

impl QuizStore for MongoQuizStore {
    fn find_quiz(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<QuizEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_quiz(id).await.map_err(Into::into) })
    }

    fn insert_attempt(
        &self,
        attempt: QuizAttemptEntity,
    ) -> BoxFuture<'static, StorageResult<PersistOutcome>> {
        let store = self.clone();
        Box::pin(async move { store.insert_attempt(attempt).await.map_err(Into::into) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.reconnect().await.map_err(Into::into) })
    }
}
