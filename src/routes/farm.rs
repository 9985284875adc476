use axum::{
    Json, Router,
    extract::State,
    routing::{get, patch, post},
};

use crate::{
    dto::farm::{ClaimResponse, FarmStatusResponse, HarvestResponse},
    error::AppError,
    routes::extract::TelegramUser,
    services::farm_service,
    state::SharedState,
};

/// Harvest minigame endpoints.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/farm/harvest", post(start_harvest))
        .route("/farm/status", get(farm_status))
        .route("/farm/claim", patch(claim_points))
}

/// Start a harvest cycle.
#[utoipa::path(
    post,
    path = "/farm/harvest",
    tag = "farm",
    params(("Authorization" = String, Header, description = "`Telegram <init-data>`")),
    responses(
        (status = 200, description = "Harvest started", body = HarvestResponse),
        (status = 400, description = "A harvest is running or its reward is unclaimed"),
        (status = 401, description = "Missing or invalid init data"),
    )
)]
pub async fn start_harvest(
    State(state): State<SharedState>,
    TelegramUser(user): TelegramUser,
) -> Result<Json<HarvestResponse>, AppError> {
    let ctx = state.game_context().await?;
    let started_at = farm_service::start_harvest(&ctx, user.id).await?;
    Ok(Json(started_at.into()))
}

/// Current harvest cycle, if any.
#[utoipa::path(
    get,
    path = "/farm/status",
    tag = "farm",
    params(("Authorization" = String, Header, description = "`Telegram <init-data>`")),
    responses((status = 200, description = "Farm session", body = FarmStatusResponse))
)]
pub async fn farm_status(
    State(state): State<SharedState>,
    TelegramUser(user): TelegramUser,
) -> Result<Json<FarmStatusResponse>, AppError> {
    let ctx = state.game_context().await?;
    Ok(Json(farm_service::status(&ctx, user.id).await?.into()))
}

/// Collect the reward of a completed cycle.
#[utoipa::path(
    patch,
    path = "/farm/claim",
    tag = "farm",
    params(("Authorization" = String, Header, description = "`Telegram <init-data>`")),
    responses(
        (status = 200, description = "Points credited", body = ClaimResponse),
        (status = 400, description = "Not complete yet or already claimed"),
        (status = 404, description = "No session or unregistered user"),
    )
)]
pub async fn claim_points(
    State(state): State<SharedState>,
    TelegramUser(user): TelegramUser,
) -> Result<Json<ClaimResponse>, AppError> {
    let ctx = state.game_context().await?;
    let points_earned = farm_service::claim_points(&ctx, user.id).await?;
    Ok(Json(ClaimResponse { points_earned }))
}
