/// Arcade rally state machine and event processing.
pub mod arcade_service;
/// Telegram init-data verification.
pub mod auth_service;
/// Daily login bonus streak.
pub mod daily_quest_service;
/// OpenAPI documentation generation.
pub mod documentation;
/// Rolling energy accounting.
pub mod energy_service;
/// Harvest cooldown cycle.
pub mod farm_service;
/// Health check service.
pub mod health_service;
/// Referral milestone quests.
pub mod referral_quest_service;
/// Storage connection supervision and degraded mode.
pub mod storage_supervisor;
/// Telegram Stars invoices and purchase granting.
pub mod store_service;
/// Registration and profiles.
pub mod user_service;
/// WebSocket connection and message handling service.
pub mod websocket_service;
