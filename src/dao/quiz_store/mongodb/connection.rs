use std::time::Duration;

use mongodb::{Client, Database, bson::doc, options::ClientOptions};
use tokio::time::sleep;
use tracing::debug;

use super::error::{MongoDaoError, MongoResult};

/// Ping schedule used while the server is still coming up.
#[derive(Debug, Clone, Copy)]
pub(super) struct StartupBackoff {
    pub attempts: u32,
    pub first_delay: Duration,
    pub max_delay: Duration,
}

impl Default for StartupBackoff {
    fn default() -> Self {
        Self {
            attempts: 10,
            first_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(5),
        }
    }
}

/// Build a client for `database_name` and wait until the server answers a ping.
pub(super) async fn open_database(
    options: &ClientOptions,
    database_name: &str,
    backoff: StartupBackoff,
) -> MongoResult<(Client, Database)> {
    let client = Client::with_options(options.clone())
        .map_err(|source| MongoDaoError::ClientConstruction { source })?;
    let database = client.database(database_name);

    let mut delay = backoff.first_delay;
    for attempt in 1..=backoff.attempts {
        match database.run_command(doc! { "ping": 1 }).await {
            Ok(_) => return Ok((client, database)),
            Err(source) if attempt == backoff.attempts => {
                return Err(MongoDaoError::InitialPing {
                    attempts: attempt,
                    source,
                });
            }
            Err(err) => {
                debug!(attempt, database = database_name, error = %err, "MongoDB not ready yet");
                sleep(delay).await;
                delay = (delay * 2).min(backoff.max_delay);
            }
        }
    }

    Err(MongoDaoError::NoPingAttempts)
}
