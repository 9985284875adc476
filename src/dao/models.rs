use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime};
use uuid::Uuid;

use crate::clock::elapsed_between;

/// Telegram user identifier, used as the key of every per-player record.
pub type PlayerId = i64;

/// Durable harvest session, one per player.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FarmSessionEntity {
    /// Owner of the session.
    pub player_id: PlayerId,
    /// A harvest cycle is running (may be stale until the next status poll).
    pub is_in_progress: bool,
    /// Start of the running or completed-but-unpolled cycle.
    pub started_at: Option<SystemTime>,
    /// The most recently completed cycle has been collected.
    pub is_previous_claimed: bool,
}

/// Logical farm phase derived from a session row and the current time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FarmPhase {
    /// Nothing running and nothing to collect; a new cycle may start.
    Idle,
    /// A cycle is running and will complete after `remaining`.
    InProgress {
        /// Time left before the cycle completes.
        remaining: Duration,
    },
    /// The cycle completed and its reward has not been claimed yet.
    ReadyToClaim,
}

impl FarmSessionEntity {
    /// Row written on registration: idle, nothing to claim.
    pub fn provisioned(player_id: PlayerId) -> Self {
        Self {
            player_id,
            is_in_progress: false,
            started_at: None,
            is_previous_claimed: true,
        }
    }

    /// Row written by the first harvest of a player that was never provisioned.
    pub fn started(player_id: PlayerId, now: SystemTime) -> Self {
        Self {
            player_id,
            is_in_progress: true,
            started_at: Some(now),
            is_previous_claimed: false,
        }
    }

    /// Derive the phase from timestamps only.
    ///
    /// An unclaimed row whose `started_at` was cleared by an earlier status poll is complete.
    pub fn phase(&self, now: SystemTime, cooldown: Duration) -> FarmPhase {
        if self.is_previous_claimed {
            return FarmPhase::Idle;
        }
        match self.started_at {
            Some(started_at) => {
                let elapsed = elapsed_between(started_at, now);
                if elapsed >= cooldown {
                    FarmPhase::ReadyToClaim
                } else {
                    FarmPhase::InProgress {
                        remaining: cooldown - elapsed,
                    }
                }
            }
            None => FarmPhase::ReadyToClaim,
        }
    }
}

/// Arcade profile of a player: energy budget and purchased cosmetics.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlayerEntity {
    /// Owner of the profile.
    pub player_id: PlayerId,
    /// Energy units available per cooldown window.
    pub total_energy: u32,
    /// Purchased ball skin, if any.
    pub ball_skin_id: Option<u32>,
    /// Purchased hit reward variant, if any.
    pub ball_hit_reward_id: Option<u32>,
}

impl PlayerEntity {
    /// Fresh profile with the configured energy budget.
    pub fn new(player_id: PlayerId, total_energy: u32) -> Self {
        Self {
            player_id,
            total_energy,
            ball_skin_id: None,
            ball_hit_reward_id: None,
        }
    }
}

/// One consumed energy unit. Units replenish individually once their cooldown elapses.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EnergyUseEntity {
    /// Player who consumed the unit.
    pub player_id: PlayerId,
    /// Per-player sequence number; `(player_id, sequence)` is unique.
    pub sequence: u64,
    /// When the unit was consumed.
    pub used_at: SystemTime,
}

/// Ledger account of a Telegram user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserEntity {
    /// Telegram user id.
    pub telegram_id: PlayerId,
    /// Telegram username at registration.
    pub username: String,
    /// User who invited this one.
    pub referrer_id: Option<PlayerId>,
    /// Number of users registered with this one as referrer.
    pub referrals: u32,
    /// Accumulated points.
    pub points: i64,
    /// Registration time.
    pub registered_at: SystemTime,
}

/// Minimum gap between two daily bonus claims.
pub const DAILY_CLAIM_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);
/// Points every daily claim is worth before the streak bonus.
pub const DAILY_BASE_REWARD: i64 = 500;
/// Extra points by streak day; the streak starts over after the last entry.
pub const DAILY_STREAK_BONUSES: [i64; 7] = [0, 140, 280, 400, 500, 600, 700];

/// Reward of the `day`-th consecutive daily claim (1-based).
pub fn daily_reward(day: u32) -> i64 {
    let bonus = day
        .checked_sub(1)
        .and_then(|index| DAILY_STREAK_BONUSES.get(index as usize))
        .copied()
        .unwrap_or(0);
    DAILY_BASE_REWARD + bonus
}

/// Daily login bonus progress, one per player.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DailyQuestEntity {
    /// Owner of the streak.
    pub player_id: PlayerId,
    /// Consecutive days claimed as of the last claim.
    pub streak_days: u32,
    /// Time of the last claim.
    pub last_claimed_at: Option<SystemTime>,
}

impl DailyQuestEntity {
    /// State of a player who never claimed.
    pub fn unclaimed(player_id: PlayerId) -> Self {
        Self {
            player_id,
            streak_days: 0,
            last_claimed_at: None,
        }
    }

    /// Earliest moment the next claim is accepted (exclusive).
    pub fn next_claim_at(&self) -> Option<SystemTime> {
        self.last_claimed_at
            .map(|claimed_at| claimed_at + DAILY_CLAIM_INTERVAL)
    }

    /// A claim is accepted strictly after [`Self::next_claim_at`].
    pub fn is_available(&self, now: SystemTime) -> bool {
        self.next_claim_at().is_none_or(|next| now > next)
    }

    /// Streak as seen at `now`: a whole missed day resets it.
    pub fn current_streak(&self, now: SystemTime) -> u32 {
        match self.next_claim_at() {
            Some(next) if now > next + DAILY_CLAIM_INTERVAL => 0,
            _ => self.streak_days,
        }
    }

    /// Row after claiming at `now`; wraps back to day one after the last bonus day.
    pub fn claimed(&self, now: SystemTime) -> Self {
        let streak = self.current_streak(now);
        let streak_days = if streak as usize >= DAILY_STREAK_BONUSES.len() {
            1
        } else {
            streak + 1
        };
        Self {
            player_id: self.player_id,
            streak_days,
            last_claimed_at: Some(now),
        }
    }
}

/// Milestone that pays out once a player has invited enough users.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReferralQuestEntity {
    /// Quest identifier.
    pub quest_id: Uuid,
    /// Registered referrals needed to claim.
    pub referrals_required: u32,
    /// Points credited on claim.
    pub point_reward: i64,
    /// Creation time; quests are listed oldest first.
    pub created_at: SystemTime,
}

/// A referral quest a player has claimed. `(player_id, quest_id)` is unique.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReferralCompletionEntity {
    /// Player who claimed.
    pub player_id: PlayerId,
    /// Claimed quest.
    pub quest_id: Uuid,
    /// Claim time.
    pub finished_at: SystemTime,
}

/// Points forwarded to a referrer for a credit of `amount`: `ceil(amount * percent / 100)`.
pub fn referral_bonus(amount: i64, percent: u32) -> i64 {
    if amount <= 0 || percent == 0 {
        return 0;
    }
    (amount * i64::from(percent) + 99) / 100
}
