//! Harvest REST payloads.

use std::time::SystemTime;

use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    clock::unix_seconds,
    dto::format_system_time,
    services::farm_service::FarmStatus,
};

/// Returned when a harvest cycle starts.
#[derive(Debug, Serialize, ToSchema)]
pub struct HarvestResponse {
    /// Unix time the cycle started.
    pub started_at_unix: i64,
    /// RFC 3339 rendering of `started_at_unix`.
    pub started_at: String,
}

impl From<SystemTime> for HarvestResponse {
    fn from(value: SystemTime) -> Self {
        Self {
            started_at_unix: unix_seconds(value),
            started_at: format_system_time(value),
        }
    }
}

/// Current farm session of the authenticated player.
#[derive(Debug, Serialize, ToSchema)]
pub struct FarmStatusResponse {
    /// A cycle is running.
    pub is_in_progress: bool,
    /// Start of the running cycle, absent when nothing runs.
    pub started_at_unix: Option<i64>,
    /// Points granted per claimed cycle.
    pub point_reward: i64,
    /// `false` while a completed cycle waits to be claimed.
    pub is_previous_claimed: bool,
    /// Seconds left on the running cycle.
    pub seconds_remaining: Option<u64>,
}

impl From<FarmStatus> for FarmStatusResponse {
    fn from(value: FarmStatus) -> Self {
        Self {
            is_in_progress: value.is_in_progress,
            started_at_unix: value.started_at.map(unix_seconds),
            point_reward: value.point_reward,
            is_previous_claimed: value.is_previous_claimed,
            seconds_remaining: value.remaining.map(|remaining| remaining.as_secs()),
        }
    }
}

/// Points credited by a claim.
#[derive(Debug, Serialize, ToSchema)]
pub struct ClaimResponse {
    /// Points added to the ledger.
    pub points_earned: i64,
}
