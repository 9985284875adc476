//! Harvest minigame: one cooldown cycle per player, started, polled and claimed over HTTP.
//!
//! Completion is always derived from `started_at` and the configured cooldown. Every transition
//! is a single conditional write on the store, so concurrent requests for the same player cannot
//! both succeed.

use std::time::{Duration, SystemTime};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
    clock::window_start,
    dao::{
        models::{FarmPhase, FarmSessionEntity, PlayerId},
        storage::StorageError,
    },
    state::GameContext,
};

/// Attempts before giving up on a start that keeps losing races.
const MAX_START_ATTEMPTS: usize = 3;

/// Reasons a farm operation is refused.
#[derive(Debug, Error)]
pub enum FarmError {
    /// A cycle is already running.
    #[error("a harvest is already in progress")]
    SessionInProgress,
    /// The previous cycle completed but its reward was never collected.
    #[error("the previous harvest reward must be claimed first")]
    RewardNotClaimed,
    /// The player never started a harvest.
    #[error("no harvest session found")]
    NoSessionFound,
    /// The running cycle has not reached the cooldown yet.
    #[error("harvest not complete yet, {} s remaining", remaining.as_secs())]
    NotYetComplete {
        /// Time left before the reward can be claimed.
        remaining: Duration,
    },
    /// The reward of the last cycle was already collected.
    #[error("harvest reward already claimed")]
    AlreadyClaimed,
    /// The player has no ledger account to credit.
    #[error("player `{0}` is not registered")]
    UnknownPlayer(PlayerId),
    /// Storage failure.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Farm session as reported to the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FarmStatus {
    /// A cycle is running.
    pub is_in_progress: bool,
    /// Start of the running cycle.
    pub started_at: Option<SystemTime>,
    /// Points granted per claimed cycle.
    pub point_reward: i64,
    /// Nothing is waiting to be claimed.
    pub is_previous_claimed: bool,
    /// Time left on the running cycle.
    pub remaining: Option<Duration>,
}

/// Start a harvest cycle for `player`, returning its start time.
pub async fn start_harvest(ctx: &GameContext, player: PlayerId) -> Result<SystemTime, FarmError> {
    let cooldown = ctx.config.farm.cooldown;

    for _ in 0..MAX_START_ATTEMPTS {
        let now = ctx.now();
        let started = match ctx.store.find_farm_session(player).await? {
            None => {
                ctx.store
                    .insert_farm_session(FarmSessionEntity::started(player, now))
                    .await?
            }
            Some(_) => ctx.store.start_farm_cycle(player, now).await?,
        };

        if started {
            info!(player_id = player, "harvest started");
            return Ok(now);
        }

        match ctx.store.find_farm_session(player).await? {
            Some(session) => match session.phase(now, cooldown) {
                FarmPhase::InProgress { .. } => return Err(FarmError::SessionInProgress),
                FarmPhase::ReadyToClaim => return Err(FarmError::RewardNotClaimed),
                FarmPhase::Idle => {
                    debug!(player_id = player, "harvest start raced a claim; retrying")
                }
            },
            None => debug!(player_id = player, "harvest row vanished; retrying"),
        }
    }

    warn!(player_id = player, "harvest start kept losing races");
    Err(FarmError::SessionInProgress)
}

/// Report the farm session, lazily marking an expired cycle as no longer in progress.
pub async fn status(ctx: &GameContext, player: PlayerId) -> Result<FarmStatus, FarmError> {
    let point_reward = ctx.config.farm.point_reward;
    let cooldown = ctx.config.farm.cooldown;
    let now = ctx.now();

    let Some(mut session) = ctx.store.find_farm_session(player).await? else {
        return Ok(FarmStatus {
            is_in_progress: false,
            started_at: None,
            point_reward,
            is_previous_claimed: true,
            remaining: None,
        });
    };

    let phase = session.phase(now, cooldown);
    if session.is_in_progress && phase == FarmPhase::ReadyToClaim {
        let expired = ctx
            .store
            .expire_farm_cycle(player, window_start(now, cooldown))
            .await?;
        if expired {
            debug!(player_id = player, "harvest cycle completed");
        }
        // Either this call or a concurrent one cleared the cycle.
        session.is_in_progress = false;
        session.started_at = None;
    }

    let remaining = match phase {
        FarmPhase::InProgress { remaining } => Some(remaining),
        _ => None,
    };

    Ok(FarmStatus {
        is_in_progress: session.is_in_progress,
        started_at: session.started_at,
        point_reward,
        is_previous_claimed: session.is_previous_claimed,
        remaining,
    })
}

/// Collect the reward of a completed cycle and credit it to the player's ledger.
///
/// Only the request whose conditional write matches credits points. When the credit fails the
/// claim is released so the reward can be collected again.
pub async fn claim_points(ctx: &GameContext, player: PlayerId) -> Result<i64, FarmError> {
    let cooldown = ctx.config.farm.cooldown;
    let reward = ctx.config.farm.point_reward;
    let now = ctx.now();

    let claimed = ctx
        .store
        .claim_farm_reward(player, window_start(now, cooldown))
        .await?;

    if !claimed {
        let session = ctx
            .store
            .find_farm_session(player)
            .await?
            .ok_or(FarmError::NoSessionFound)?;
        return Err(match session.phase(now, cooldown) {
            FarmPhase::InProgress { remaining } => FarmError::NotYetComplete { remaining },
            FarmPhase::Idle | FarmPhase::ReadyToClaim => FarmError::AlreadyClaimed,
        });
    }

    if let Err(err) = ctx
        .store
        .credit_points(player, reward, ctx.config.ledger.referral_bonus_percent)
        .await
    {
        warn!(player_id = player, error = %err, "harvest ledger credit failed; releasing claim");
        match ctx.store.release_farm_claim(player).await {
            Ok(true) => {}
            Ok(false) => warn!(player_id = player, "harvest claim already superseded"),
            Err(release_err) => {
                warn!(player_id = player, error = %release_err, "failed to release harvest claim")
            }
        }
        return Err(match err {
            StorageError::NotFound(_) => FarmError::UnknownPlayer(player),
            other => FarmError::Storage(other),
        });
    }

    info!(player_id = player, reward, "harvest reward claimed");
    Ok(reward)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        clock::{Clock, ManualClock},
        config::AppConfig,
        dao::{
            game_store::{GameStore, memory::MemoryGameStore},
            models::UserEntity,
        },
    };

    const HOUR: Duration = Duration::from_secs(60 * 60);
    const PLAYER: PlayerId = 42;

    async fn context() -> (GameContext, Arc<ManualClock>) {
        context_with(Arc::new(MemoryGameStore::new())).await
    }

    async fn context_with(store: Arc<MemoryGameStore>) -> (GameContext, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::default());
        store
            .insert_user(UserEntity {
                telegram_id: PLAYER,
                username: "farmer".into(),
                referrer_id: None,
                referrals: 0,
                points: 0,
                registered_at: clock.now(),
            })
            .await
            .unwrap();
        let ctx = GameContext {
            store,
            config: Arc::new(AppConfig::default()),
            clock: clock.clone(),
        };
        (ctx, clock)
    }

    async fn points(ctx: &GameContext) -> i64 {
        ctx.store.find_user(PLAYER).await.unwrap().unwrap().points
    }

    #[tokio::test]
    async fn second_start_before_cooldown_is_rejected() {
        let (ctx, clock) = context().await;
        start_harvest(&ctx, PLAYER).await.unwrap();
        clock.advance(HOUR);

        let err = start_harvest(&ctx, PLAYER).await.unwrap_err();
        assert!(matches!(err, FarmError::SessionInProgress));
    }

    #[tokio::test]
    async fn eight_hour_cycle_walkthrough() {
        let (ctx, clock) = context().await;
        let t0 = start_harvest(&ctx, PLAYER).await.unwrap();

        clock.advance(HOUR);
        let running = status(&ctx, PLAYER).await.unwrap();
        assert!(running.is_in_progress);
        assert_eq!(running.started_at, Some(t0));
        assert_eq!(running.remaining, Some(7 * HOUR));

        let err = claim_points(&ctx, PLAYER).await.unwrap_err();
        assert!(
            matches!(err, FarmError::NotYetComplete { remaining } if remaining == 7 * HOUR)
        );

        clock.advance(8 * HOUR);
        let ready = status(&ctx, PLAYER).await.unwrap();
        assert!(!ready.is_in_progress);
        assert!(!ready.is_previous_claimed);
        assert_eq!(ready.started_at, None);

        assert_eq!(claim_points(&ctx, PLAYER).await.unwrap(), 800);
        assert_eq!(points(&ctx).await, 800);

        let err = claim_points(&ctx, PLAYER).await.unwrap_err();
        assert!(matches!(err, FarmError::AlreadyClaimed));
        assert_eq!(points(&ctx).await, 800);

        start_harvest(&ctx, PLAYER).await.unwrap();
    }

    #[tokio::test]
    async fn claim_without_prior_status_poll_derives_completion() {
        let (ctx, clock) = context().await;
        start_harvest(&ctx, PLAYER).await.unwrap();
        clock.advance(9 * HOUR);

        assert_eq!(claim_points(&ctx, PLAYER).await.unwrap(), 800);
    }

    #[tokio::test]
    async fn unclaimed_reward_blocks_new_cycle() {
        let (ctx, clock) = context().await;
        start_harvest(&ctx, PLAYER).await.unwrap();
        clock.advance(9 * HOUR);
        status(&ctx, PLAYER).await.unwrap();

        let err = start_harvest(&ctx, PLAYER).await.unwrap_err();
        assert!(matches!(err, FarmError::RewardNotClaimed));
    }

    #[tokio::test]
    async fn status_without_session_reports_nothing_to_claim() {
        let (ctx, _clock) = context().await;
        let view = status(&ctx, PLAYER).await.unwrap();
        assert!(!view.is_in_progress);
        assert!(view.is_previous_claimed);
        assert_eq!(view.started_at, None);
        assert_eq!(view.point_reward, 800);
    }

    #[tokio::test]
    async fn claim_without_session_is_not_found() {
        let (ctx, _clock) = context().await;
        let err = claim_points(&ctx, PLAYER).await.unwrap_err();
        assert!(matches!(err, FarmError::NoSessionFound));
    }

    #[tokio::test]
    async fn claim_for_unregistered_player_is_rejected_until_registration() {
        let (ctx, clock) = context().await;
        start_harvest(&ctx, 7).await.unwrap();
        clock.advance(9 * HOUR);

        let err = claim_points(&ctx, 7).await.unwrap_err();
        assert!(matches!(err, FarmError::UnknownPlayer(7)));

        ctx.store
            .insert_user(UserEntity {
                telegram_id: 7,
                username: "late".into(),
                referrer_id: None,
                referrals: 0,
                points: 0,
                registered_at: clock.now(),
            })
            .await
            .unwrap();
        assert_eq!(claim_points(&ctx, 7).await.unwrap(), 800);
    }

    #[tokio::test]
    async fn unregistered_player_without_session_has_nothing_to_claim() {
        let (ctx, _clock) = context().await;
        let err = claim_points(&ctx, 8).await.unwrap_err();
        assert!(matches!(err, FarmError::NoSessionFound));
    }

    #[tokio::test]
    async fn failed_ledger_credit_keeps_reward_claimable() {
        let store = Arc::new(MemoryGameStore::new());
        let (ctx, clock) = context_with(store.clone()).await;
        start_harvest(&ctx, PLAYER).await.unwrap();
        clock.advance(9 * HOUR);

        store.fail_next_credits(1);
        let err = claim_points(&ctx, PLAYER).await.unwrap_err();
        assert!(matches!(err, FarmError::Storage(StorageError::Conflict(_))));
        assert_eq!(points(&ctx).await, 0);

        let view = status(&ctx, PLAYER).await.unwrap();
        assert!(!view.is_previous_claimed);

        assert_eq!(claim_points(&ctx, PLAYER).await.unwrap(), 800);
        assert_eq!(points(&ctx).await, 800);
        assert!(matches!(
            claim_points(&ctx, PLAYER).await.unwrap_err(),
            FarmError::AlreadyClaimed
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_claims_credit_exactly_once() {
        let (ctx, clock) = context().await;
        start_harvest(&ctx, PLAYER).await.unwrap();
        clock.advance(9 * HOUR);

        let attempts: Vec<_> = (0..16)
            .map(|_| {
                let ctx = ctx.clone();
                tokio::spawn(async move { claim_points(&ctx, PLAYER).await })
            })
            .collect();

        let mut wins = 0;
        for attempt in attempts {
            match attempt.await.unwrap() {
                Ok(reward) => {
                    assert_eq!(reward, 800);
                    wins += 1;
                }
                Err(err) => assert!(matches!(err, FarmError::AlreadyClaimed)),
            }
        }
        assert_eq!(wins, 1);
        assert_eq!(points(&ctx).await, 800);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_starts_begin_one_cycle() {
        let (ctx, _clock) = context().await;

        let attempts: Vec<_> = (0..8)
            .map(|_| {
                let ctx = ctx.clone();
                tokio::spawn(async move { start_harvest(&ctx, PLAYER).await })
            })
            .collect();

        let mut started = 0;
        for attempt in attempts {
            match attempt.await.unwrap() {
                Ok(_) => started += 1,
                Err(err) => assert!(matches!(err, FarmError::SessionInProgress)),
            }
        }
        assert_eq!(started, 1);
    }
}
