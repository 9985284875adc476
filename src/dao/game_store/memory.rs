//! Process-local [`GameStore`] backed by [`DashMap`]s.
//!
//! Each conditional write runs while holding the entry lock of the affected key, which gives
//! the same single-write atomicity the database backend gets from filtered updates.

use std::{sync::Arc, time::SystemTime};

use dashmap::{DashMap, mapref::entry::Entry};
use futures::future::BoxFuture;

use uuid::Uuid;

use crate::dao::{
    game_store::GameStore,
    models::{
        DailyQuestEntity, EnergyUseEntity, FarmSessionEntity, PlayerEntity, PlayerId,
        ReferralCompletionEntity, ReferralQuestEntity, UserEntity, referral_bonus,
    },
    storage::{StorageError, StorageResult},
};

/// In-memory storage backend. Cloning shares the underlying maps.
#[derive(Clone, Default)]
pub struct MemoryGameStore {
    inner: Arc<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    farm_sessions: DashMap<PlayerId, FarmSessionEntity>,
    players: DashMap<PlayerId, PlayerEntity>,
    energy_uses: DashMap<PlayerId, Vec<EnergyUseEntity>>,
    users: DashMap<PlayerId, UserEntity>,
    daily_quests: DashMap<PlayerId, DailyQuestEntity>,
    referral_quests: DashMap<Uuid, ReferralQuestEntity>,
    referral_completions: DashMap<(PlayerId, Uuid), ReferralCompletionEntity>,
    #[cfg(test)]
    failing_credits: std::sync::atomic::AtomicUsize,
}

impl MemoryGameStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` ledger credits fail before touching any account.
    #[cfg(test)]
    pub(crate) fn fail_next_credits(&self, count: usize) {
        self.inner
            .failing_credits
            .store(count, std::sync::atomic::Ordering::SeqCst);
    }
}

impl MemoryInner {
    fn insert_farm_session(&self, session: FarmSessionEntity) -> bool {
        match self.farm_sessions.entry(session.player_id) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(session);
                true
            }
        }
    }

    fn start_farm_cycle(&self, player: PlayerId, now: SystemTime) -> bool {
        let Some(mut session) = self.farm_sessions.get_mut(&player) else {
            return false;
        };
        if session.is_in_progress || !session.is_previous_claimed {
            return false;
        }
        session.is_in_progress = true;
        session.started_at = Some(now);
        session.is_previous_claimed = false;
        true
    }

    fn expire_farm_cycle(&self, player: PlayerId, cutoff: SystemTime) -> bool {
        let Some(mut session) = self.farm_sessions.get_mut(&player) else {
            return false;
        };
        match session.started_at {
            Some(started_at) if session.is_in_progress && started_at <= cutoff => {
                session.is_in_progress = false;
                session.started_at = None;
                true
            }
            _ => false,
        }
    }

    fn claim_farm_reward(&self, player: PlayerId, cutoff: SystemTime) -> bool {
        let Some(mut session) = self.farm_sessions.get_mut(&player) else {
            return false;
        };
        if session.is_previous_claimed {
            return false;
        }
        let complete = session
            .started_at
            .is_none_or(|started_at| started_at <= cutoff);
        if !complete {
            return false;
        }
        session.is_in_progress = false;
        session.started_at = None;
        session.is_previous_claimed = true;
        true
    }

    fn release_farm_claim(&self, player: PlayerId) -> bool {
        let Some(mut session) = self.farm_sessions.get_mut(&player) else {
            return false;
        };
        if !session.is_previous_claimed || session.is_in_progress || session.started_at.is_some() {
            return false;
        }
        session.is_previous_claimed = false;
        true
    }

    fn ensure_player(&self, player: PlayerId, default_total_energy: u32) -> PlayerEntity {
        self.players
            .entry(player)
            .or_insert_with(|| PlayerEntity::new(player, default_total_energy))
            .clone()
    }

    fn update_player(
        &self,
        player: PlayerId,
        apply: impl FnOnce(&mut PlayerEntity),
    ) -> StorageResult<()> {
        let mut entity = self
            .players
            .get_mut(&player)
            .ok_or_else(|| StorageError::NotFound(format!("player `{player}`")))?;
        apply(&mut entity);
        Ok(())
    }

    fn energy_uses_since(&self, player: PlayerId, cutoff: SystemTime) -> Vec<EnergyUseEntity> {
        let mut uses: Vec<EnergyUseEntity> = self
            .energy_uses
            .get(&player)
            .map(|uses| {
                uses.iter()
                    .filter(|usage| usage.used_at > cutoff)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        uses.sort_by_key(|usage| usage.used_at);
        uses
    }

    fn last_energy_sequence(&self, player: PlayerId) -> Option<u64> {
        self.energy_uses
            .get(&player)
            .and_then(|uses| uses.iter().map(|usage| usage.sequence).max())
    }

    fn record_energy_use(&self, usage: EnergyUseEntity) -> bool {
        let mut uses = self.energy_uses.entry(usage.player_id).or_default();
        if uses.iter().any(|existing| existing.sequence == usage.sequence) {
            return false;
        }
        uses.push(usage);
        true
    }

    fn reset_energy(&self, player: PlayerId) -> u64 {
        self.energy_uses
            .remove(&player)
            .map(|(_, uses)| uses.len() as u64)
            .unwrap_or(0)
    }

    fn insert_user(&self, user: UserEntity) -> bool {
        let referrer = user.referrer_id;
        let inserted = match self.users.entry(user.telegram_id) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(user);
                true
            }
        };
        if inserted && let Some(referrer) = referrer {
            if let Some(mut referrer) = self.users.get_mut(&referrer) {
                referrer.referrals += 1;
            }
        }
        inserted
    }

    fn replace_daily_quest(&self, expected: DailyQuestEntity, next: DailyQuestEntity) -> bool {
        match self.daily_quests.entry(next.player_id) {
            Entry::Occupied(mut slot) => {
                if *slot.get() != expected {
                    return false;
                }
                slot.insert(next);
                true
            }
            Entry::Vacant(slot) => {
                if expected != DailyQuestEntity::unclaimed(expected.player_id) {
                    return false;
                }
                slot.insert(next);
                true
            }
        }
    }

    fn list_referral_quests(&self) -> Vec<ReferralQuestEntity> {
        let mut quests: Vec<ReferralQuestEntity> = self
            .referral_quests
            .iter()
            .map(|quest| quest.clone())
            .collect();
        quests.sort_by_key(|quest| quest.created_at);
        quests
    }

    fn referral_completions(&self, player: PlayerId) -> Vec<ReferralCompletionEntity> {
        self.referral_completions
            .iter()
            .filter(|completion| completion.player_id == player)
            .map(|completion| completion.clone())
            .collect()
    }

    fn complete_referral_quest(&self, completion: ReferralCompletionEntity) -> bool {
        match self
            .referral_completions
            .entry((completion.player_id, completion.quest_id))
        {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(completion);
                true
            }
        }
    }

    fn credit_points(&self, user: PlayerId, amount: i64, percent: u32) -> StorageResult<()> {
        #[cfg(test)]
        {
            use std::sync::atomic::Ordering;
            let injected = self
                .failing_credits
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
                .is_ok();
            if injected {
                return Err(StorageError::Conflict("injected ledger failure".into()));
            }
        }
        // Release the user's entry before touching the referrer: both may share a shard.
        let referrer = {
            let mut account = self
                .users
                .get_mut(&user)
                .ok_or_else(|| StorageError::NotFound(format!("user `{user}`")))?;
            account.points += amount;
            account.referrer_id
        };
        if let Some(referrer) = referrer {
            let bonus = referral_bonus(amount, percent);
            if bonus > 0 {
                if let Some(mut account) = self.users.get_mut(&referrer) {
                    account.points += bonus;
                }
            }
        }
        Ok(())
    }
}

impl GameStore for MemoryGameStore {
    fn find_farm_session(
        &self,
        player: PlayerId,
    ) -> BoxFuture<'static, StorageResult<Option<FarmSessionEntity>>> {
        let found = self
            .inner
            .farm_sessions
            .get(&player)
            .map(|session| session.clone());
        Box::pin(async move { Ok(found) })
    }

    fn insert_farm_session(
        &self,
        session: FarmSessionEntity,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let inserted = self.inner.insert_farm_session(session);
        Box::pin(async move { Ok(inserted) })
    }

    fn start_farm_cycle(
        &self,
        player: PlayerId,
        now: SystemTime,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let matched = self.inner.start_farm_cycle(player, now);
        Box::pin(async move { Ok(matched) })
    }

    fn expire_farm_cycle(
        &self,
        player: PlayerId,
        cutoff: SystemTime,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let matched = self.inner.expire_farm_cycle(player, cutoff);
        Box::pin(async move { Ok(matched) })
    }

    fn claim_farm_reward(
        &self,
        player: PlayerId,
        cutoff: SystemTime,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let matched = self.inner.claim_farm_reward(player, cutoff);
        Box::pin(async move { Ok(matched) })
    }

    fn release_farm_claim(&self, player: PlayerId) -> BoxFuture<'static, StorageResult<bool>> {
        let matched = self.inner.release_farm_claim(player);
        Box::pin(async move { Ok(matched) })
    }

    fn find_player(
        &self,
        player: PlayerId,
    ) -> BoxFuture<'static, StorageResult<Option<PlayerEntity>>> {
        let found = self.inner.players.get(&player).map(|entity| entity.clone());
        Box::pin(async move { Ok(found) })
    }

    fn ensure_player(
        &self,
        player: PlayerId,
        default_total_energy: u32,
    ) -> BoxFuture<'static, StorageResult<PlayerEntity>> {
        let entity = self.inner.ensure_player(player, default_total_energy);
        Box::pin(async move { Ok(entity) })
    }

    fn set_ball_skin(
        &self,
        player: PlayerId,
        skin_id: u32,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let result = self.inner.update_player(player, |entity| entity.ball_skin_id = Some(skin_id));
        Box::pin(async move { result })
    }

    fn set_ball_hit_reward(
        &self,
        player: PlayerId,
        reward_id: u32,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let result = self.inner.update_player(player, |entity| {
            entity.ball_hit_reward_id = Some(reward_id)
        });
        Box::pin(async move { result })
    }

    fn energy_uses_since(
        &self,
        player: PlayerId,
        cutoff: SystemTime,
    ) -> BoxFuture<'static, StorageResult<Vec<EnergyUseEntity>>> {
        let uses = self.inner.energy_uses_since(player, cutoff);
        Box::pin(async move { Ok(uses) })
    }

    fn last_energy_sequence(
        &self,
        player: PlayerId,
    ) -> BoxFuture<'static, StorageResult<Option<u64>>> {
        let last = self.inner.last_energy_sequence(player);
        Box::pin(async move { Ok(last) })
    }

    fn record_energy_use(
        &self,
        usage: EnergyUseEntity,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let inserted = self.inner.record_energy_use(usage);
        Box::pin(async move { Ok(inserted) })
    }

    fn reset_energy(&self, player: PlayerId) -> BoxFuture<'static, StorageResult<u64>> {
        let removed = self.inner.reset_energy(player);
        Box::pin(async move { Ok(removed) })
    }

    fn find_user(&self, id: PlayerId) -> BoxFuture<'static, StorageResult<Option<UserEntity>>> {
        let found = self.inner.users.get(&id).map(|user| user.clone());
        Box::pin(async move { Ok(found) })
    }

    fn insert_user(&self, user: UserEntity) -> BoxFuture<'static, StorageResult<bool>> {
        let inserted = self.inner.insert_user(user);
        Box::pin(async move { Ok(inserted) })
    }

    fn credit_points(
        &self,
        user: PlayerId,
        amount: i64,
        referral_bonus_percent: u32,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let result = self.inner.credit_points(user, amount, referral_bonus_percent);
        Box::pin(async move { result })
    }

    fn find_daily_quest(
        &self,
        player: PlayerId,
    ) -> BoxFuture<'static, StorageResult<Option<DailyQuestEntity>>> {
        let found = self.inner.daily_quests.get(&player).map(|quest| quest.clone());
        Box::pin(async move { Ok(found) })
    }

    fn replace_daily_quest(
        &self,
        expected: DailyQuestEntity,
        next: DailyQuestEntity,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let matched = self.inner.replace_daily_quest(expected, next);
        Box::pin(async move { Ok(matched) })
    }

    fn insert_referral_quest(
        &self,
        quest: ReferralQuestEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        self.inner.referral_quests.insert(quest.quest_id, quest);
        Box::pin(async { Ok(()) })
    }

    fn list_referral_quests(&self) -> BoxFuture<'static, StorageResult<Vec<ReferralQuestEntity>>> {
        let quests = self.inner.list_referral_quests();
        Box::pin(async move { Ok(quests) })
    }

    fn find_referral_quest(
        &self,
        quest_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<ReferralQuestEntity>>> {
        let found = self
            .inner
            .referral_quests
            .get(&quest_id)
            .map(|quest| quest.clone());
        Box::pin(async move { Ok(found) })
    }

    fn referral_completions(
        &self,
        player: PlayerId,
    ) -> BoxFuture<'static, StorageResult<Vec<ReferralCompletionEntity>>> {
        let completions = self.inner.referral_completions(player);
        Box::pin(async move { Ok(completions) })
    }

    fn complete_referral_quest(
        &self,
        completion: ReferralCompletionEntity,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let inserted = self.inner.complete_referral_quest(completion);
        Box::pin(async move { Ok(inserted) })
    }

    fn revoke_referral_completion(
        &self,
        player: PlayerId,
        quest_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let removed = self
            .inner
            .referral_completions
            .remove(&(player, quest_id))
            .is_some();
        Box::pin(async move { Ok(removed) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}
