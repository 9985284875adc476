//! User directory payloads.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::{dao::models::PlayerId, dto::format_system_time, services::user_service::UserProfile};

/// Body of `POST /users/register`.
#[derive(Debug, Default, Deserialize, ToSchema, Validate)]
pub struct RegisterRequest {
    /// Telegram id of the user who shared the invite link.
    #[serde(default)]
    #[validate(range(min = 1))]
    pub referrer_id: Option<PlayerId>,
}

/// Public view of a user profile.
#[derive(Debug, Serialize, ToSchema)]
pub struct UserResponse {
    /// Telegram user id.
    pub telegram_id: PlayerId,
    /// Telegram username at registration.
    pub username: String,
    /// Ledger balance.
    pub points: i64,
    /// Users invited by this one.
    pub referrals: u32,
    /// User who invited this one.
    pub referrer_id: Option<PlayerId>,
    /// Purchased ball skin.
    pub ball_skin_id: Option<u32>,
    /// Purchased hit reward variant.
    pub ball_hit_reward_id: Option<u32>,
    /// RFC 3339 registration time.
    pub registered_at: String,
}

impl From<UserProfile> for UserResponse {
    fn from(value: UserProfile) -> Self {
        let UserProfile { user, player } = value;
        Self {
            telegram_id: user.telegram_id,
            username: user.username,
            points: user.points,
            referrals: user.referrals,
            referrer_id: user.referrer_id,
            ball_skin_id: player.ball_skin_id,
            ball_hit_reward_id: player.ball_hit_reward_id,
            registered_at: format_system_time(user.registered_at),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn referrer_must_be_a_positive_id() {
        assert!(RegisterRequest::default().validate().is_ok());
        assert!(
            RegisterRequest {
                referrer_id: Some(7)
            }
            .validate()
            .is_ok()
        );
        assert!(
            RegisterRequest {
                referrer_id: Some(0)
            }
            .validate()
            .is_err()
        );
    }
}
