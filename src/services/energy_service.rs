//! Rolling energy accounting for the arcade.
//!
//! Each consumed unit is its own timestamped record and replenishes on its own once the
//! cooldown has elapsed since it was used.

use std::time::{Duration, SystemTime};

use tracing::{debug, info};

use crate::{
    clock::window_start,
    dao::{
        models::{EnergyUseEntity, PlayerId},
        storage::{StorageError, StorageResult},
    },
    state::GameContext,
};

/// Attempts at claiming a fresh sequence number before reporting contention.
const MAX_SEQUENCE_ATTEMPTS: usize = 5;

/// Energy budget of a player at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnergySnapshot {
    /// Units granted per cooldown window.
    pub total: u32,
    /// Units available right now.
    pub remaining: u32,
    /// When the oldest consumed unit replenishes; `None` when nothing is consumed.
    pub next_available_at: Option<SystemTime>,
}

impl EnergySnapshot {
    /// Derive the snapshot from the uses still inside the cooldown window.
    pub fn from_active_uses(total: u32, active: &[EnergyUseEntity], cooldown: Duration) -> Self {
        let used = u32::try_from(active.len()).unwrap_or(u32::MAX);
        Self {
            total,
            remaining: total.saturating_sub(used),
            next_available_at: active
                .iter()
                .map(|usage| usage.used_at)
                .min()
                .map(|oldest| oldest + cooldown),
        }
    }
}

/// Current energy of `player`, provisioning the profile on first access.
pub async fn snapshot(ctx: &GameContext, player: PlayerId) -> StorageResult<EnergySnapshot> {
    let arcade = &ctx.config.arcade;
    let profile = ctx
        .store
        .ensure_player(player, arcade.default_total_energy)
        .await?;
    let active = ctx
        .store
        .energy_uses_since(player, window_start(ctx.now(), arcade.energy_cooldown))
        .await?;
    Ok(EnergySnapshot::from_active_uses(
        profile.total_energy,
        &active,
        arcade.energy_cooldown,
    ))
}

/// Record one consumed unit for `player`.
///
/// The sequence number is unique per player; when another device takes it first the next
/// free one is tried.
pub async fn consume(ctx: &GameContext, player: PlayerId) -> StorageResult<EnergyUseEntity> {
    for attempt in 0..MAX_SEQUENCE_ATTEMPTS {
        let sequence = ctx
            .store
            .last_energy_sequence(player)
            .await?
            .map_or(1, |last| last + 1);
        let usage = EnergyUseEntity {
            player_id: player,
            sequence,
            used_at: ctx.now(),
        };

        if ctx.store.record_energy_use(usage.clone()).await? {
            debug!(player_id = player, sequence, "energy unit consumed");
            return Ok(usage);
        }
        debug!(player_id = player, sequence, attempt, "energy sequence taken; retrying");
    }

    Err(StorageError::Conflict(format!(
        "energy sequence for player `{player}`"
    )))
}

/// Forget every consumed unit so the full budget is available again.
pub async fn reset(ctx: &GameContext, player: PlayerId) -> StorageResult<EnergySnapshot> {
    let removed = ctx.store.reset_energy(player).await?;
    info!(player_id = player, removed, "energy reset");
    snapshot(ctx, player).await
}
