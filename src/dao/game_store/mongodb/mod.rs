mod config;
mod error;
mod models;
/// [`MongoGameStore`] and its collections.
pub mod store;

pub use config::MongoConfig;
pub use error::MongoDaoError;
pub use store::MongoGameStore;

use crate::dao::storage::StorageError;

impl From<MongoDaoError> for StorageError {
    fn from(err: MongoDaoError) -> Self {
        match err {
            MongoDaoError::MissingRecord { collection, id } => {
                StorageError::NotFound(format!("{collection} `{id}`"))
            }
            other => StorageError::unavailable(other.to_string(), other),
        }
    }
}
