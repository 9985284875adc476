use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use axum_valid::Valid;

use crate::{
    dto::user::{RegisterRequest, UserResponse},
    error::AppError,
    routes::extract::TelegramUser,
    services::user_service,
    state::SharedState,
};

/// User directory endpoints.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/users/register", post(register))
        .route("/users/me", get(me))
}

/// Register the authenticated Telegram user, optionally crediting a referrer.
#[utoipa::path(
    post,
    path = "/users/register",
    tag = "users",
    params(("Authorization" = String, Header, description = "`Telegram <init-data>`")),
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User created", body = UserResponse),
        (status = 200, description = "User already registered", body = UserResponse),
        (status = 400, description = "Self referral or invalid referrer id"),
        (status = 404, description = "Referrer not registered"),
    )
)]
pub async fn register(
    State(state): State<SharedState>,
    TelegramUser(user): TelegramUser,
    Valid(Json(payload)): Valid<Json<RegisterRequest>>,
) -> Result<(StatusCode, Json<UserResponse>), AppError> {
    let ctx = state.game_context().await?;
    let registration = user_service::register(&ctx, &user, payload.referrer_id).await?;
    let status = if registration.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(registration.profile.into())))
}

/// Profile of the authenticated user.
#[utoipa::path(
    get,
    path = "/users/me",
    tag = "users",
    params(("Authorization" = String, Header, description = "`Telegram <init-data>`")),
    responses(
        (status = 200, description = "Profile", body = UserResponse),
        (status = 404, description = "User not registered"),
    )
)]
pub async fn me(
    State(state): State<SharedState>,
    TelegramUser(user): TelegramUser,
) -> Result<Json<UserResponse>, AppError> {
    let ctx = state.game_context().await?;
    Ok(Json(user_service::profile(&ctx, user.id).await?.into()))
}
