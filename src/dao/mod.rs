/// Database model definitions.
pub mod models;
/// Question bank and attempt storage backends.
pub mod quiz_store;
/// Attempt persistence boundary used by finished sessions.
pub mod recorder;
/// Storage abstraction layer for database operations.
pub mod storage;
