/// In-process backend.
pub mod memory;
/// MongoDB backend.
#[cfg(feature = "mongo-store")]
pub mod mongodb;

use std::time::SystemTime;

use crate::dao::models::{
    DailyQuestEntity, EnergyUseEntity, FarmSessionEntity, PlayerEntity, PlayerId,
    ReferralCompletionEntity, ReferralQuestEntity, UserEntity,
};
use crate::dao::storage::StorageResult;
use futures::future::BoxFuture;
use uuid::Uuid;

/// Abstraction over the persistence layer for farm sessions, energy accounting, quests and points.
///
/// Every conditional write is a single atomic operation on the backend and reports whether
/// its precondition matched; callers never read-then-write to decide a transition.
pub trait GameStore: Send + Sync {
    /// Load the farm session of `player`.
    fn find_farm_session(
        &self,
        player: PlayerId,
    ) -> BoxFuture<'static, StorageResult<Option<FarmSessionEntity>>>;
    /// Insert a farm session; `false` when the player already has one.
    fn insert_farm_session(
        &self,
        session: FarmSessionEntity,
    ) -> BoxFuture<'static, StorageResult<bool>>;
    /// Start a cycle at `now` if the session is idle (not running, previous reward claimed).
    fn start_farm_cycle(
        &self,
        player: PlayerId,
        now: SystemTime,
    ) -> BoxFuture<'static, StorageResult<bool>>;
    /// Mark a running cycle started at or before `cutoff` as no longer in progress.
    fn expire_farm_cycle(
        &self,
        player: PlayerId,
        cutoff: SystemTime,
    ) -> BoxFuture<'static, StorageResult<bool>>;
    /// Claim guard: mark the reward collected if unclaimed and started at or before `cutoff`
    /// (or already expired by a status poll).
    fn claim_farm_reward(
        &self,
        player: PlayerId,
        cutoff: SystemTime,
    ) -> BoxFuture<'static, StorageResult<bool>>;

    /// Undo a claim whose reward could not be credited: a claimed, idle row becomes
    /// ready to claim again. `false` when a new cycle already started.
    fn release_farm_claim(&self, player: PlayerId) -> BoxFuture<'static, StorageResult<bool>>;

    /// Load the arcade profile of `player`.
    fn find_player(&self, player: PlayerId)
    -> BoxFuture<'static, StorageResult<Option<PlayerEntity>>>;
    /// Load the arcade profile, creating it with `default_total_energy` when missing.
    fn ensure_player(
        &self,
        player: PlayerId,
        default_total_energy: u32,
    ) -> BoxFuture<'static, StorageResult<PlayerEntity>>;
    /// Store the purchased ball skin.
    fn set_ball_skin(
        &self,
        player: PlayerId,
        skin_id: u32,
    ) -> BoxFuture<'static, StorageResult<()>>;
    /// Store the purchased hit reward variant.
    fn set_ball_hit_reward(
        &self,
        player: PlayerId,
        reward_id: u32,
    ) -> BoxFuture<'static, StorageResult<()>>;
    /// Energy uses of `player` strictly newer than `cutoff`, oldest first.
    fn energy_uses_since(
        &self,
        player: PlayerId,
        cutoff: SystemTime,
    ) -> BoxFuture<'static, StorageResult<Vec<EnergyUseEntity>>>;
    /// Highest energy-use sequence recorded for `player`.
    fn last_energy_sequence(
        &self,
        player: PlayerId,
    ) -> BoxFuture<'static, StorageResult<Option<u64>>>;
    /// Append an energy use; `false` when `(player_id, sequence)` is already taken.
    fn record_energy_use(&self, usage: EnergyUseEntity)
    -> BoxFuture<'static, StorageResult<bool>>;
    /// Delete every energy use of `player`, returning how many were removed.
    fn reset_energy(&self, player: PlayerId) -> BoxFuture<'static, StorageResult<u64>>;

    /// Load a ledger account.
    fn find_user(&self, id: PlayerId) -> BoxFuture<'static, StorageResult<Option<UserEntity>>>;
    /// Insert a ledger account, bumping the referrer's counter; `false` when it already exists.
    fn insert_user(&self, user: UserEntity) -> BoxFuture<'static, StorageResult<bool>>;
    /// Add `amount` points to `user` and the referral bonus to its referrer.
    ///
    /// Fails with [`StorageError::NotFound`](crate::dao::storage::StorageError::NotFound) when
    /// the user does not exist.
    fn credit_points(
        &self,
        user: PlayerId,
        amount: i64,
        referral_bonus_percent: u32,
    ) -> BoxFuture<'static, StorageResult<()>>;

    /// Load the daily bonus row of `player`.
    fn find_daily_quest(
        &self,
        player: PlayerId,
    ) -> BoxFuture<'static, StorageResult<Option<DailyQuestEntity>>>;
    /// Replace the daily bonus row if it still equals `expected`; a missing row counts as
    /// [`DailyQuestEntity::unclaimed`].
    fn replace_daily_quest(
        &self,
        expected: DailyQuestEntity,
        next: DailyQuestEntity,
    ) -> BoxFuture<'static, StorageResult<bool>>;

    /// Add a referral quest to the catalogue.
    fn insert_referral_quest(
        &self,
        quest: ReferralQuestEntity,
    ) -> BoxFuture<'static, StorageResult<()>>;
    /// Every referral quest, oldest first.
    fn list_referral_quests(&self) -> BoxFuture<'static, StorageResult<Vec<ReferralQuestEntity>>>;
    /// Load one referral quest.
    fn find_referral_quest(
        &self,
        quest_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<ReferralQuestEntity>>>;
    /// Referral quests `player` has claimed.
    fn referral_completions(
        &self,
        player: PlayerId,
    ) -> BoxFuture<'static, StorageResult<Vec<ReferralCompletionEntity>>>;
    /// Record a claim; `false` when the player already claimed that quest.
    fn complete_referral_quest(
        &self,
        completion: ReferralCompletionEntity,
    ) -> BoxFuture<'static, StorageResult<bool>>;
    /// Drop a recorded claim whose reward could not be credited.
    fn revoke_referral_completion(
        &self,
        player: PlayerId,
        quest_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<bool>>;

    /// Ping the backend.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    /// Rebuild the backend connection.
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
