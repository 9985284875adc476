//! Ledger accounts: registration with referral and the profile view.

use tracing::{debug, info};

use crate::{
    dao::models::{FarmSessionEntity, PlayerEntity, PlayerId, UserEntity},
    error::ServiceError,
    services::auth_service::TelegramUserData,
    state::GameContext,
};

/// Ledger account joined with the arcade profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserProfile {
    /// Ledger account.
    pub user: UserEntity,
    /// Arcade profile.
    pub player: PlayerEntity,
}

/// Outcome of [`register`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    /// `false` when the account already existed.
    pub created: bool,
    /// Current profile.
    pub profile: UserProfile,
}

/// Create the ledger account of `identity`, crediting `referrer_id` with a referral.
///
/// Registering twice is harmless: the existing account is returned and the referrer is not
/// bumped again. The farm session and energy profile are provisioned alongside.
pub async fn register(
    ctx: &GameContext,
    identity: &TelegramUserData,
    referrer_id: Option<PlayerId>,
) -> Result<Registration, ServiceError> {
    let player = identity.id;

    if let Some(referrer) = referrer_id {
        if referrer == player {
            return Err(ServiceError::InvalidInput(
                "a user cannot refer themselves".into(),
            ));
        }
        if ctx.store.find_user(referrer).await?.is_none() {
            return Err(ServiceError::NotFound(format!("referrer `{referrer}`")));
        }
    }

    let created = ctx
        .store
        .insert_user(UserEntity {
            telegram_id: player,
            username: identity.username.clone(),
            referrer_id,
            referrals: 0,
            points: 0,
            registered_at: ctx.now(),
        })
        .await?;

    if created {
        info!(player_id = player, ?referrer_id, "user registered");
    } else {
        debug!(player_id = player, "user already registered");
    }

    // Ignored when the player already harvested before registering.
    ctx.store
        .insert_farm_session(FarmSessionEntity::provisioned(player))
        .await?;

    let profile = profile(ctx, player).await?;
    Ok(Registration { created, profile })
}

/// Profile of a registered user.
pub async fn profile(ctx: &GameContext, player: PlayerId) -> Result<UserProfile, ServiceError> {
    let user = ctx
        .store
        .find_user(player)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("user `{player}`")))?;
    let player = ctx
        .store
        .ensure_player(player, ctx.config.arcade.default_total_energy)
        .await?;
    Ok(UserProfile { user, player })
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::SystemTime};

    use super::*;
    use crate::{clock::ManualClock, config::AppConfig, dao::game_store::memory::MemoryGameStore};

    fn context() -> GameContext {
        GameContext {
            store: Arc::new(MemoryGameStore::new()),
            config: Arc::new(AppConfig::default()),
            clock: Arc::new(ManualClock::default()),
        }
    }

    fn identity(id: PlayerId, username: &str) -> TelegramUserData {
        TelegramUserData {
            id,
            username: username.into(),
            auth_date: SystemTime::UNIX_EPOCH,
        }
    }

    #[tokio::test]
    async fn registration_provisions_profile_and_farm() {
        let ctx = context();
        let registration = register(&ctx, &identity(1, "ann"), None).await.unwrap();
        assert!(registration.created);
        assert_eq!(registration.profile.user.username, "ann");
        assert_eq!(registration.profile.player.total_energy, 3);

        let session = ctx.store.find_farm_session(1).await.unwrap().unwrap();
        assert_eq!(session, FarmSessionEntity::provisioned(1));
    }

    #[tokio::test]
    async fn registering_twice_bumps_referrer_once() {
        let ctx = context();
        register(&ctx, &identity(1, "ann"), None).await.unwrap();
        register(&ctx, &identity(2, "bob"), Some(1)).await.unwrap();
        let again = register(&ctx, &identity(2, "bob"), Some(1)).await.unwrap();
        assert!(!again.created);

        let referrer = profile(&ctx, 1).await.unwrap();
        assert_eq!(referrer.user.referrals, 1);
    }

    #[tokio::test]
    async fn invalid_referrers_are_rejected() {
        let ctx = context();
        let err = register(&ctx, &identity(1, "ann"), Some(1)).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));

        let err = register(&ctx, &identity(1, "ann"), Some(99)).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
        assert!(ctx.store.find_user(1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn profile_of_unknown_user_is_not_found() {
        let ctx = context();
        assert!(matches!(
            profile(&ctx, 5).await.unwrap_err(),
            ServiceError::NotFound(_)
        ));
    }
}
