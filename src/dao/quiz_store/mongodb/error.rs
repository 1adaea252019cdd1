use mongodb::error::Error as MongoError;
use thiserror::Error;
use uuid::Uuid;

/// Result alias for MongoDB operations.
pub type MongoResult<T> = std::result::Result<T, MongoDaoError>;

/// Failures raised by the MongoDB backend.
#[derive(Debug, Error)]
pub enum MongoDaoError {
    /// The connection string could not be parsed.
    #[error("failed to parse MongoDB connection URI `{uri}`")]
    InvalidUri {
        /// URI as configured.
        uri: String,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// Options parsed but the client could not be built.
    #[error("failed to build MongoDB client from options")]
    ClientConstruction {
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// The server never answered during startup.
    #[error("MongoDB ping failed during initial connection after {attempts} attempt(s)")]
    InitialPing {
        /// Pings tried before giving up.
        attempts: u32,
        /// Last driver error.
        #[source]
        source: MongoError,
    },
    /// Backoff settings leave no room for a single ping.
    #[error("MongoDB startup backoff allows no ping attempts")]
    NoPingAttempts,
    /// Periodic health ping failed.
    #[error("MongoDB ping health check failed")]
    HealthPing {
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// Index creation failed at startup.
    #[error("failed to ensure index `{index}` on collection `{collection}`")]
    EnsureIndex {
        /// Target collection.
        collection: &'static str,
        /// Index name.
        index: &'static str,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// Reading a quiz failed.
    #[error("failed to load quiz `{id}`")]
    LoadQuiz {
        /// Requested quiz.
        id: Uuid,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// A stored quiz carries an id that is not a UUID.
    #[error("quiz document `{id}` holds a malformed identifier")]
    MalformedQuiz {
        /// Offending raw value.
        id: String,
        /// Parse error.
        #[source]
        source: uuid::Error,
    },
    /// Writing an attempt failed.
    #[error("failed to record attempt for quiz `{quiz_id}`")]
    RecordAttempt {
        /// Quiz the attempt belongs to.
        quiz_id: Uuid,
        /// Driver error.
        #[source]
        source: MongoError,
    },
}
