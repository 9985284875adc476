//! Referral milestones: operator-defined quests paying out once a user has invited enough
//! registered users.

use std::{collections::HashMap, time::SystemTime};

use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    dao::models::{PlayerId, ReferralCompletionEntity, ReferralQuestEntity, UserEntity},
    error::ServiceError,
    state::GameContext,
};

/// Progress of one referral quest for one user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferralQuestStatus {
    /// Quest identifier.
    pub quest_id: Uuid,
    /// Referrals needed to claim.
    pub referrals_required: u32,
    /// Points credited on claim.
    pub point_reward: i64,
    /// Referrals the user has so far.
    pub current_referrals: u32,
    /// The reward was collected.
    pub completed: bool,
    /// Enough referrals and not collected yet.
    pub ready_to_claim: bool,
    /// When the reward was collected.
    pub finished_at: Option<SystemTime>,
}

impl ReferralQuestStatus {
    fn new(quest: ReferralQuestEntity, referrals: u32, finished_at: Option<SystemTime>) -> Self {
        let completed = finished_at.is_some();
        Self {
            quest_id: quest.quest_id,
            referrals_required: quest.referrals_required,
            point_reward: quest.point_reward,
            current_referrals: referrals,
            completed,
            ready_to_claim: !completed && referrals >= quest.referrals_required,
            finished_at,
        }
    }
}

/// Add a quest to the catalogue.
pub async fn create(
    ctx: &GameContext,
    referrals_required: u32,
    point_reward: i64,
) -> Result<ReferralQuestEntity, ServiceError> {
    if referrals_required == 0 || point_reward <= 0 {
        return Err(ServiceError::InvalidInput(
            "referral quests need at least one referral and a positive reward".into(),
        ));
    }
    let quest = ReferralQuestEntity {
        quest_id: Uuid::new_v4(),
        referrals_required,
        point_reward,
        created_at: ctx.now(),
    };
    ctx.store.insert_referral_quest(quest.clone()).await?;
    info!(quest_id = %quest.quest_id, referrals_required, point_reward, "referral quest created");
    Ok(quest)
}

/// Every quest with the user's progress, oldest quest first.
pub async fn statuses(
    ctx: &GameContext,
    player: PlayerId,
) -> Result<Vec<ReferralQuestStatus>, ServiceError> {
    let user = registered(ctx, player).await?;
    let finished: HashMap<Uuid, SystemTime> = ctx
        .store
        .referral_completions(player)
        .await?
        .into_iter()
        .map(|completion| (completion.quest_id, completion.finished_at))
        .collect();

    Ok(ctx
        .store
        .list_referral_quests()
        .await?
        .into_iter()
        .map(|quest| {
            let finished_at = finished.get(&quest.quest_id).copied();
            ReferralQuestStatus::new(quest, user.referrals, finished_at)
        })
        .collect())
}

/// Progress of one quest.
pub async fn quest_status(
    ctx: &GameContext,
    player: PlayerId,
    quest_id: Uuid,
) -> Result<ReferralQuestStatus, ServiceError> {
    let quest = find(ctx, quest_id).await?;
    let user = registered(ctx, player).await?;
    let finished_at = finished_at(ctx, player, quest_id).await?;
    Ok(ReferralQuestStatus::new(quest, user.referrals, finished_at))
}

/// Collect a quest reward, returning the points credited.
///
/// The completion record is the claim guard; it is removed again when the credit fails.
pub async fn claim(ctx: &GameContext, player: PlayerId, quest_id: Uuid) -> Result<i64, ServiceError> {
    let quest = find(ctx, quest_id).await?;
    let user = registered(ctx, player).await?;
    if user.referrals < quest.referrals_required {
        return Err(ServiceError::InvalidState(format!(
            "not enough referrals: {} of {}",
            user.referrals, quest.referrals_required
        )));
    }

    let recorded = ctx
        .store
        .complete_referral_quest(ReferralCompletionEntity {
            player_id: player,
            quest_id,
            finished_at: ctx.now(),
        })
        .await?;
    if !recorded {
        return Err(ServiceError::InvalidState(
            "referral quest already claimed".into(),
        ));
    }

    if let Err(err) = ctx
        .store
        .credit_points(player, quest.point_reward, ctx.config.ledger.referral_bonus_percent)
        .await
    {
        warn!(player_id = player, %quest_id, error = %err, "referral quest credit failed; revoking claim");
        if let Err(revoke_err) = ctx.store.revoke_referral_completion(player, quest_id).await {
            warn!(player_id = player, %quest_id, error = %revoke_err, "failed to revoke referral claim");
        }
        return Err(err.into());
    }

    info!(player_id = player, %quest_id, reward = quest.point_reward, "referral quest claimed");
    Ok(quest.point_reward)
}

async fn find(ctx: &GameContext, quest_id: Uuid) -> Result<ReferralQuestEntity, ServiceError> {
    ctx.store
        .find_referral_quest(quest_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("referral quest `{quest_id}`")))
}

async fn registered(ctx: &GameContext, player: PlayerId) -> Result<UserEntity, ServiceError> {
    ctx.store
        .find_user(player)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("user `{player}`")))
}

async fn finished_at(
    ctx: &GameContext,
    player: PlayerId,
    quest_id: Uuid,
) -> Result<Option<SystemTime>, ServiceError> {
    Ok(ctx
        .store
        .referral_completions(player)
        .await?
        .into_iter()
        .find(|completion| completion.quest_id == quest_id)
        .map(|completion| completion.finished_at))
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use super::*;
    use crate::{
        clock::{Clock, ManualClock},
        config::AppConfig,
        dao::game_store::{GameStore, memory::MemoryGameStore},
    };

    const INVITER: PlayerId = 10;

    struct Fixture {
        ctx: GameContext,
        store: Arc<MemoryGameStore>,
        clock: Arc<ManualClock>,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(MemoryGameStore::new());
        let clock = Arc::new(ManualClock::default());
        let ctx = GameContext {
            store: store.clone(),
            config: Arc::new(AppConfig::default()),
            clock: clock.clone(),
        };
        let fx = Fixture { ctx, store, clock };
        fx.register(INVITER, None).await;
        fx
    }

    impl Fixture {
        async fn register(&self, id: PlayerId, referrer_id: Option<PlayerId>) {
            self.store
                .insert_user(UserEntity {
                    telegram_id: id,
                    username: format!("user{id}"),
                    referrer_id,
                    referrals: 0,
                    points: 0,
                    registered_at: self.clock.now(),
                })
                .await
                .unwrap();
        }

        async fn invite(&self, count: i64) {
            for offset in 1..=count {
                self.register(INVITER * 100 + offset, Some(INVITER)).await;
            }
        }

        async fn points(&self) -> i64 {
            self.store.find_user(INVITER).await.unwrap().unwrap().points
        }
    }

    #[tokio::test]
    async fn progress_tracks_registered_referrals() {
        let fx = fixture().await;
        let small = create(&fx.ctx, 2, 1_000).await.unwrap();
        fx.clock.advance(Duration::from_secs(1));
        let large = create(&fx.ctx, 5, 5_000).await.unwrap();
        fx.invite(3).await;

        let statuses = statuses(&fx.ctx, INVITER).await.unwrap();
        assert_eq!(statuses.len(), 2);
        assert_eq!(statuses[0].quest_id, small.quest_id);
        assert!(statuses[0].ready_to_claim);
        assert_eq!(statuses[1].quest_id, large.quest_id);
        assert_eq!(statuses[1].current_referrals, 3);
        assert!(!statuses[1].ready_to_claim);
        assert!(!statuses[1].completed);
    }

    #[tokio::test]
    async fn claim_credits_once() {
        let fx = fixture().await;
        let quest = create(&fx.ctx, 2, 1_000).await.unwrap();
        fx.invite(2).await;

        assert_eq!(claim(&fx.ctx, INVITER, quest.quest_id).await.unwrap(), 1_000);
        assert_eq!(fx.points().await, 1_000);

        let status = quest_status(&fx.ctx, INVITER, quest.quest_id).await.unwrap();
        assert!(status.completed);
        assert!(!status.ready_to_claim);
        assert_eq!(status.finished_at, Some(fx.clock.now()));

        let err = claim(&fx.ctx, INVITER, quest.quest_id).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));
        assert_eq!(fx.points().await, 1_000);
    }

    #[tokio::test]
    async fn claim_needs_enough_referrals() {
        let fx = fixture().await;
        let quest = create(&fx.ctx, 3, 1_000).await.unwrap();
        fx.invite(2).await;

        let err = claim(&fx.ctx, INVITER, quest.quest_id).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));
        assert!(fx.store.referral_completions(INVITER).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_quest_or_user_is_not_found() {
        let fx = fixture().await;
        let quest = create(&fx.ctx, 1, 100).await.unwrap();

        let err = claim(&fx.ctx, INVITER, Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
        let err = quest_status(&fx.ctx, 999, quest.quest_id).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
        assert!(matches!(
            statuses(&fx.ctx, 999).await.unwrap_err(),
            ServiceError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn failed_credit_keeps_quest_claimable() {
        let fx = fixture().await;
        let quest = create(&fx.ctx, 1, 300).await.unwrap();
        fx.invite(1).await;

        fx.store.fail_next_credits(1);
        let err = claim(&fx.ctx, INVITER, quest.quest_id).await.unwrap_err();
        assert!(matches!(err, ServiceError::Unavailable(_)));
        let status = quest_status(&fx.ctx, INVITER, quest.quest_id).await.unwrap();
        assert!(status.ready_to_claim);
        assert_eq!(fx.points().await, 0);

        assert_eq!(claim(&fx.ctx, INVITER, quest.quest_id).await.unwrap(), 300);
    }

    #[tokio::test]
    async fn quests_need_a_threshold_and_a_reward() {
        let fx = fixture().await;
        assert!(matches!(
            create(&fx.ctx, 0, 100).await.unwrap_err(),
            ServiceError::InvalidInput(_)
        ));
        assert!(matches!(
            create(&fx.ctx, 1, 0).await.unwrap_err(),
            ServiceError::InvalidInput(_)
        ));
    }
}
