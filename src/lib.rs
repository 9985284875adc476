//! Library crate for miniapp-back, exposing modules for binaries and integration tests.

/// Time sources.
pub mod clock;
/// Runtime configuration.
pub mod config;
/// Storage models and backends.
pub mod dao;
/// Wire types for REST and WebSocket.
pub mod dto;
/// Service and HTTP errors.
pub mod error;
/// axum routers.
pub mod routes;
/// Game, account and payment logic.
pub mod services;
/// Shared application state.
pub mod state;
