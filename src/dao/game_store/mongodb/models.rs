use mongodb::bson::DateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::dao::models::{
    DailyQuestEntity, EnergyUseEntity, FarmSessionEntity, PlayerEntity, PlayerId,
    ReferralCompletionEntity, ReferralQuestEntity, UserEntity,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoFarmSessionDocument {
    #[serde(rename = "_id")]
    pub player_id: PlayerId,
    pub is_in_progress: bool,
    #[serde(default)]
    pub started_at: Option<DateTime>,
    pub is_previous_claimed: bool,
}

impl From<FarmSessionEntity> for MongoFarmSessionDocument {
    fn from(value: FarmSessionEntity) -> Self {
        Self {
            player_id: value.player_id,
            is_in_progress: value.is_in_progress,
            started_at: value.started_at.map(DateTime::from_system_time),
            is_previous_claimed: value.is_previous_claimed,
        }
    }
}

impl From<MongoFarmSessionDocument> for FarmSessionEntity {
    fn from(value: MongoFarmSessionDocument) -> Self {
        Self {
            player_id: value.player_id,
            is_in_progress: value.is_in_progress,
            started_at: value.started_at.map(DateTime::to_system_time),
            is_previous_claimed: value.is_previous_claimed,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoPlayerDocument {
    #[serde(rename = "_id")]
    pub player_id: PlayerId,
    pub total_energy: i64,
    #[serde(default)]
    pub ball_skin_id: Option<i64>,
    #[serde(default)]
    pub ball_hit_reward_id: Option<i64>,
}

impl From<MongoPlayerDocument> for PlayerEntity {
    fn from(value: MongoPlayerDocument) -> Self {
        Self {
            player_id: value.player_id,
            total_energy: u32::try_from(value.total_energy).unwrap_or(0),
            ball_skin_id: value.ball_skin_id.and_then(|id| u32::try_from(id).ok()),
            ball_hit_reward_id: value
                .ball_hit_reward_id
                .and_then(|id| u32::try_from(id).ok()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoEnergyUseDocument {
    pub player_id: PlayerId,
    pub sequence: i64,
    pub used_at: DateTime,
}

impl From<EnergyUseEntity> for MongoEnergyUseDocument {
    fn from(value: EnergyUseEntity) -> Self {
        Self {
            player_id: value.player_id,
            sequence: i64::try_from(value.sequence).unwrap_or(i64::MAX),
            used_at: DateTime::from_system_time(value.used_at),
        }
    }
}

impl From<MongoEnergyUseDocument> for EnergyUseEntity {
    fn from(value: MongoEnergyUseDocument) -> Self {
        Self {
            player_id: value.player_id,
            sequence: u64::try_from(value.sequence).unwrap_or(0),
            used_at: value.used_at.to_system_time(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoUserDocument {
    #[serde(rename = "_id")]
    pub telegram_id: PlayerId,
    pub username: String,
    #[serde(default)]
    pub referrer_id: Option<PlayerId>,
    #[serde(default)]
    pub referrals: i64,
    #[serde(default)]
    pub points: i64,
    pub registered_at: DateTime,
}

impl From<UserEntity> for MongoUserDocument {
    fn from(value: UserEntity) -> Self {
        Self {
            telegram_id: value.telegram_id,
            username: value.username,
            referrer_id: value.referrer_id,
            referrals: i64::from(value.referrals),
            points: value.points,
            registered_at: DateTime::from_system_time(value.registered_at),
        }
    }
}

impl From<MongoUserDocument> for UserEntity {
    fn from(value: MongoUserDocument) -> Self {
        Self {
            telegram_id: value.telegram_id,
            username: value.username,
            referrer_id: value.referrer_id,
            referrals: u32::try_from(value.referrals).unwrap_or(0),
            points: value.points,
            registered_at: value.registered_at.to_system_time(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoDailyQuestDocument {
    #[serde(rename = "_id")]
    pub player_id: PlayerId,
    #[serde(default)]
    pub streak_days: i64,
    #[serde(default)]
    pub last_claimed_at: Option<DateTime>,
}

impl From<MongoDailyQuestDocument> for DailyQuestEntity {
    fn from(value: MongoDailyQuestDocument) -> Self {
        Self {
            player_id: value.player_id,
            streak_days: u32::try_from(value.streak_days).unwrap_or(0),
            last_claimed_at: value.last_claimed_at.map(DateTime::to_system_time),
        }
    }
}

// Quest ids are stored as their hyphenated text form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoReferralQuestDocument {
    #[serde(rename = "_id")]
    pub quest_id: String,
    pub referrals_required: i64,
    pub point_reward: i64,
    pub created_at: DateTime,
}

impl From<ReferralQuestEntity> for MongoReferralQuestDocument {
    fn from(value: ReferralQuestEntity) -> Self {
        Self {
            quest_id: value.quest_id.to_string(),
            referrals_required: i64::from(value.referrals_required),
            point_reward: value.point_reward,
            created_at: DateTime::from_system_time(value.created_at),
        }
    }
}

impl From<MongoReferralQuestDocument> for ReferralQuestEntity {
    fn from(value: MongoReferralQuestDocument) -> Self {
        Self {
            quest_id: Uuid::parse_str(&value.quest_id).unwrap_or_default(),
            referrals_required: u32::try_from(value.referrals_required).unwrap_or(u32::MAX),
            point_reward: value.point_reward,
            created_at: value.created_at.to_system_time(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoReferralCompletionDocument {
    pub player_id: PlayerId,
    pub quest_id: String,
    pub finished_at: DateTime,
}

impl From<ReferralCompletionEntity> for MongoReferralCompletionDocument {
    fn from(value: ReferralCompletionEntity) -> Self {
        Self {
            player_id: value.player_id,
            quest_id: value.quest_id.to_string(),
            finished_at: DateTime::from_system_time(value.finished_at),
        }
    }
}

impl From<MongoReferralCompletionDocument> for ReferralCompletionEntity {
    fn from(value: MongoReferralCompletionDocument) -> Self {
        Self {
            player_id: value.player_id,
            quest_id: Uuid::parse_str(&value.quest_id).unwrap_or_default(),
            finished_at: value.finished_at.to_system_time(),
        }
    }
}
