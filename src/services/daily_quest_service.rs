//! Daily login bonus: one claim per day, growing with the streak of consecutive days.
//!
//! The streak is derived from `last_claimed_at` at read time, so a missed day never needs a
//! write to be observed. Claims replace the stored row with a compare-and-swap, which makes a
//! second concurrent claim for the same day lose.

use std::time::SystemTime;

use tracing::{info, warn};

use crate::{
    dao::models::{DAILY_STREAK_BONUSES, DailyQuestEntity, PlayerId, daily_reward},
    error::ServiceError,
    state::GameContext,
};

/// Daily bonus progress as reported to the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DailyQuestStatus {
    /// Time of the last claim.
    pub last_claimed_at: Option<SystemTime>,
    /// Claims are accepted strictly after this instant.
    pub next_claim_at: Option<SystemTime>,
    /// A claim would be accepted now.
    pub is_available: bool,
    /// The player never claimed.
    pub has_never_been_claimed: bool,
    /// Consecutive days claimed, `0` once a day was missed.
    pub consecutive_days_claimed: u32,
    /// Reward of every streak day, day one first.
    pub daily_rewards: Vec<i64>,
}

/// Current daily bonus progress of a registered user.
pub async fn status(ctx: &GameContext, player: PlayerId) -> Result<DailyQuestStatus, ServiceError> {
    let quest = load(ctx, player).await?;
    Ok(describe(&quest, ctx.now()))
}

/// Claim today's bonus, returning the points credited.
///
/// A failed ledger credit puts the previous row back so the bonus can be claimed again.
pub async fn claim(ctx: &GameContext, player: PlayerId) -> Result<i64, ServiceError> {
    let now = ctx.now();
    let current = load(ctx, player).await?;
    if !current.is_available(now) {
        return Err(ServiceError::InvalidState(
            "the daily bonus was already claimed in the last 24 hours".into(),
        ));
    }

    let next = current.claimed(now);
    let streak_days = next.streak_days;
    let reward = daily_reward(streak_days);
    if !ctx
        .store
        .replace_daily_quest(current.clone(), next.clone())
        .await?
    {
        return Err(ServiceError::InvalidState(
            "the daily bonus was claimed concurrently".into(),
        ));
    }

    if let Err(err) = ctx
        .store
        .credit_points(player, reward, ctx.config.ledger.referral_bonus_percent)
        .await
    {
        warn!(player_id = player, error = %err, "daily bonus credit failed; restoring streak");
        match ctx.store.replace_daily_quest(next, current).await {
            Ok(true) => {}
            Ok(false) => warn!(player_id = player, "daily bonus row changed before restore"),
            Err(restore_err) => {
                warn!(player_id = player, error = %restore_err, "failed to restore daily bonus")
            }
        }
        return Err(err.into());
    }

    info!(player_id = player, reward, streak_days, "daily bonus claimed");
    Ok(reward)
}

async fn load(ctx: &GameContext, player: PlayerId) -> Result<DailyQuestEntity, ServiceError> {
    if ctx.store.find_user(player).await?.is_none() {
        return Err(ServiceError::NotFound(format!("user `{player}`")));
    }
    Ok(ctx
        .store
        .find_daily_quest(player)
        .await?
        .unwrap_or_else(|| DailyQuestEntity::unclaimed(player)))
}

fn describe(quest: &DailyQuestEntity, now: SystemTime) -> DailyQuestStatus {
    DailyQuestStatus {
        last_claimed_at: quest.last_claimed_at,
        next_claim_at: quest.next_claim_at(),
        is_available: quest.is_available(now),
        has_never_been_claimed: quest.last_claimed_at.is_none(),
        consecutive_days_claimed: quest.current_streak(now),
        daily_rewards: (1..=DAILY_STREAK_BONUSES.len() as u32)
            .map(daily_reward)
            .collect(),
    }
}
