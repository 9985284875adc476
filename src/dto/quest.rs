//! Daily bonus and referral quest payloads.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    clock::unix_seconds,
    dao::models::ReferralQuestEntity,
    dto::format_system_time,
    services::{daily_quest_service::DailyQuestStatus, referral_quest_service::ReferralQuestStatus},
};

/// Reward of one streak day.
#[derive(Debug, Serialize, ToSchema)]
pub struct DayRewardResponse {
    /// Streak day, starting at 1.
    pub day: u32,
    /// Points paid on that day.
    pub reward: i64,
}

/// Daily bonus progress of the authenticated user.
#[derive(Debug, Serialize, ToSchema)]
pub struct DailyQuestResponse {
    /// RFC 3339 time of the last claim.
    pub last_claimed_at: Option<String>,
    /// RFC 3339 instant after which the next claim is accepted.
    pub next_claim_available: Option<String>,
    /// Unix rendering of `next_claim_available`.
    pub next_claim_available_unix: Option<i64>,
    /// A claim would be accepted now.
    pub is_available: bool,
    /// The user never claimed.
    pub has_never_been_claimed: bool,
    /// Consecutive days claimed.
    pub consecutive_days_claimed: u32,
    /// Reward table, day one first.
    pub daily_rewards: Vec<DayRewardResponse>,
}

impl From<DailyQuestStatus> for DailyQuestResponse {
    fn from(value: DailyQuestStatus) -> Self {
        Self {
            last_claimed_at: value.last_claimed_at.map(format_system_time),
            next_claim_available: value.next_claim_at.map(format_system_time),
            next_claim_available_unix: value.next_claim_at.map(unix_seconds),
            is_available: value.is_available,
            has_never_been_claimed: value.has_never_been_claimed,
            consecutive_days_claimed: value.consecutive_days_claimed,
            daily_rewards: value
                .daily_rewards
                .into_iter()
                .zip(1..)
                .map(|(reward, day)| DayRewardResponse { day, reward })
                .collect(),
        }
    }
}

/// Points credited by a quest claim.
#[derive(Debug, Serialize, ToSchema)]
pub struct QuestClaimResponse {
    /// Points added to the ledger.
    pub points_earned: i64,
}

/// Body of `POST /admin/referral-quests`.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CreateReferralQuestRequest {
    /// Registered referrals needed to claim.
    #[validate(range(min = 1))]
    pub referrals_required: u32,
    /// Points credited on claim.
    #[validate(range(min = 1))]
    pub point_reward: i64,
}

/// A referral quest of the catalogue.
#[derive(Debug, Serialize, ToSchema)]
pub struct ReferralQuestResponse {
    /// Quest identifier.
    pub quest_id: Uuid,
    /// Registered referrals needed to claim.
    pub referrals_required: u32,
    /// Points credited on claim.
    pub point_reward: i64,
    /// RFC 3339 creation time.
    pub created_at: String,
}

impl From<ReferralQuestEntity> for ReferralQuestResponse {
    fn from(value: ReferralQuestEntity) -> Self {
        Self {
            quest_id: value.quest_id,
            referrals_required: value.referrals_required,
            point_reward: value.point_reward,
            created_at: format_system_time(value.created_at),
        }
    }
}

/// Progress of the authenticated user on one referral quest.
#[derive(Debug, Serialize, ToSchema)]
pub struct ReferralQuestStatusResponse {
    /// Quest identifier.
    pub quest_id: Uuid,
    /// Registered referrals needed to claim.
    pub referrals_required: u32,
    /// Points credited on claim.
    pub point_reward: i64,
    /// Referrals the user has so far.
    pub current_referrals: u32,
    /// The reward was collected.
    pub completed: bool,
    /// Claimable now.
    pub ready_to_claim: bool,
    /// RFC 3339 claim time.
    pub finished_at: Option<String>,
}

impl From<ReferralQuestStatus> for ReferralQuestStatusResponse {
    fn from(value: ReferralQuestStatus) -> Self {
        Self {
            quest_id: value.quest_id,
            referrals_required: value.referrals_required,
            point_reward: value.point_reward,
            current_referrals: value.current_referrals,
            completed: value.completed,
            ready_to_claim: value.ready_to_claim,
            finished_at: value.finished_at.map(format_system_time),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, UNIX_EPOCH};

    use super::*;

    #[test]
    fn daily_rewards_are_numbered_from_day_one() {
        let response = DailyQuestResponse::from(DailyQuestStatus {
            last_claimed_at: Some(UNIX_EPOCH),
            next_claim_at: Some(UNIX_EPOCH + Duration::from_secs(86_400)),
            is_available: false,
            has_never_been_claimed: false,
            consecutive_days_claimed: 1,
            daily_rewards: vec![500, 640],
        });
        assert_eq!(response.daily_rewards[0].day, 1);
        assert_eq!(response.daily_rewards[1].day, 2);
        assert_eq!(response.daily_rewards[1].reward, 640);
        assert_eq!(response.next_claim_available_unix, Some(86_400));
        assert_eq!(
            response.last_claimed_at.as_deref(),
            Some("1970-01-01T00:00:00Z")
        );
    }

    #[test]
    fn new_quests_need_a_threshold_and_a_reward() {
        let valid = CreateReferralQuestRequest {
            referrals_required: 3,
            point_reward: 1_000,
        };
        assert!(valid.validate().is_ok());
        assert!(
            CreateReferralQuestRequest {
                referrals_required: 0,
                ..valid
            }
            .validate()
            .is_err()
        );
        assert!(
            CreateReferralQuestRequest {
                referrals_required: 3,
                point_reward: 0,
            }
            .validate()
            .is_err()
        );
    }
}
