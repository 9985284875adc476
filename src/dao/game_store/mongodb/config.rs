use mongodb::{Client, Database, bson::doc, options::ClientOptions};
use tokio::time::sleep;
use tracing::debug;

use super::error::{MongoDaoError, MongoResult};
use crate::config::{ConnectRetryConfig, StorageConfig};

const DEFAULT_DATABASE: &str = "miniapp";
const APP_NAME: &str = "miniapp-back";

/// Parsed connection settings, kept so the store can rebuild its client on reconnect.
#[derive(Clone)]
pub struct MongoConfig {
    options: ClientOptions,
    database_name: String,
    retry: ConnectRetryConfig,
}

impl MongoConfig {
    /// Parse the storage section's connection string and resolve the database to use.
    pub async fn from_storage(storage: &StorageConfig) -> MongoResult<Self> {
        let mut options = ClientOptions::parse(&storage.mongo_uri)
            .await
            .map_err(|source| MongoDaoError::InvalidUri {
                uri: storage.mongo_uri.clone(),
                source,
            })?;
        options.app_name.get_or_insert_with(|| APP_NAME.to_owned());
        let database_name = resolve_database_name(storage.mongo_db.as_deref(), &options);

        Ok(Self {
            options,
            database_name,
            retry: storage.connect.clone(),
        })
    }

    /// Database holding every collection.
    pub fn database_name(&self) -> &str {
        &self.database_name
    }

    /// Build a client and ping until the server answers or the retry budget runs out.
    pub(super) async fn connect(&self) -> MongoResult<(Client, Database)> {
        let client = Client::with_options(self.options.clone())
            .map_err(|source| MongoDaoError::ClientConstruction { source })?;
        let database = client.database(&self.database_name);

        let mut delays = self.retry.delays();
        let mut attempts = 0;
        loop {
            attempts += 1;
            match database.run_command(doc! { "ping": 1 }).await {
                Ok(_) => return Ok((client, database)),
                Err(source) => match delays.next() {
                    Some(delay) => {
                        debug!(attempts, ?delay, error = %source, "MongoDB not reachable yet; retrying");
                        sleep(delay).await;
                    }
                    None => return Err(MongoDaoError::Unreachable { attempts, source }),
                },
            }
        }
    }
}

/// Explicit name first, then the connection string's database, then the built-in default.
fn resolve_database_name(explicit: Option<&str>, options: &ClientOptions) -> String {
    explicit
        .filter(|name| !name.is_empty())
        .or(options.default_database.as_deref())
        .unwrap_or(DEFAULT_DATABASE)
        .to_owned()
}
