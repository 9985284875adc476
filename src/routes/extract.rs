use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use tracing::info;

use crate::{
    error::AppError,
    services::auth_service::{self, TelegramUserData},
    state::SharedState,
};

/// Caller authenticated through the `Authorization: Telegram <init-data>` header.
#[derive(Debug, Clone)]
pub struct TelegramUser(pub TelegramUserData);

impl FromRequestParts<SharedState> for TelegramUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &SharedState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok());

        auth_service::authenticate(header, &state.config().auth, state.now())
            .map(TelegramUser)
            .map_err(|err| {
                info!(error = %err, path = %parts.uri.path(), "rejected telegram authentication");
                err.into()
            })
    }
}
