use mongodb::error::{Error as MongoError, ErrorKind, WriteFailure};
use thiserror::Error;

use crate::dao::models::PlayerId;

/// Result alias for MongoDB operations.
pub type MongoResult<T> = std::result::Result<T, MongoDaoError>;

const DUPLICATE_KEY_CODE: i32 = 11000;

/// Failures raised by the MongoDB store before they are folded into storage errors.
#[derive(Debug, Error)]
pub enum MongoDaoError {
    /// The configured connection string could not be parsed.
    #[error("failed to parse MongoDB connection URI `{uri}`")]
    InvalidUri {
        /// Rejected connection string.
        uri: String,
        /// Driver parse error.
        #[source]
        source: MongoError,
    },
    /// The driver refused the parsed options.
    #[error("failed to build MongoDB client from options")]
    ClientConstruction {
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// No ping succeeded within the connect retry budget.
    #[error("MongoDB unreachable after {attempts} ping attempt(s)")]
    Unreachable {
        /// Pings sent before giving up.
        attempts: u32,
        /// Error from the last ping.
        #[source]
        source: MongoError,
    },
    /// A live connection stopped answering pings.
    #[error("MongoDB ping health check failed")]
    HealthPing {
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// An index could not be created at startup.
    #[error("failed to ensure index `{index}` on collection `{collection}`")]
    EnsureIndex {
        /// Collection being indexed.
        collection: &'static str,
        /// Index name.
        index: &'static str,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// A query failed.
    #[error("failed to read `{collection}` for player `{id}`")]
    Read {
        /// Collection queried.
        collection: &'static str,
        /// Player the query was scoped to.
        id: PlayerId,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// An insert or update failed.
    #[error("failed to write `{collection}` for player `{id}`")]
    Write {
        /// Collection written.
        collection: &'static str,
        /// Player the write was scoped to.
        id: PlayerId,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// A catalogue query or write not scoped to a player failed.
    #[error("failed to access `{collection}`")]
    Catalog {
        /// Collection accessed.
        collection: &'static str,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// A document the operation depends on does not exist.
    #[error("no `{collection}` document for player `{id}`")]
    MissingRecord {
        /// Collection searched.
        collection: &'static str,
        /// Player whose document is missing.
        id: PlayerId,
    },
}

/// Whether the failure is a unique index violation.
pub fn is_duplicate_key(err: &MongoError) -> bool {
    matches!(
        err.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(write)) if write.code == DUPLICATE_KEY_CODE
    )
}
