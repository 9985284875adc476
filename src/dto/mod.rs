use std::time::SystemTime;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

/// Harvest payloads.
pub mod farm;
/// Healthcheck payload.
pub mod health;
/// Daily bonus and referral quest payloads.
pub mod quest;
/// Store, admin and Telegram webhook payloads.
pub mod store;
/// Registration and profile payloads.
pub mod user;
/// Arcade WebSocket messages.
pub mod ws;

fn format_system_time(time: SystemTime) -> String {
    OffsetDateTime::from(time)
        .format(&Rfc3339)
        .unwrap_or_else(|_| "invalid-timestamp".into())
}
