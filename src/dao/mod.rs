/// Persistence backends for farm sessions, energy uses and the point ledger.
pub mod game_store;
/// Database model definitions.
pub mod models;
/// Storage abstraction layer for database operations.
pub mod storage;
