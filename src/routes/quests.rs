use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use uuid::Uuid;

use crate::{
    dto::quest::{DailyQuestResponse, QuestClaimResponse, ReferralQuestStatusResponse},
    error::AppError,
    routes::extract::TelegramUser,
    services::{daily_quest_service, referral_quest_service},
    state::SharedState,
};

/// Daily bonus and referral quest endpoints.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/quests/daily", get(daily_status))
        .route("/quests/daily/claim", post(claim_daily))
        .route("/quests/referral", get(referral_statuses))
        .route("/quests/referral/{quest_id}", get(referral_status))
        .route("/quests/referral/{quest_id}/claim", post(claim_referral))
}

/// Daily bonus progress of the authenticated user.
#[utoipa::path(
    get,
    path = "/quests/daily",
    tag = "quests",
    params(("Authorization" = String, Header, description = "`Telegram <init-data>`")),
    responses(
        (status = 200, description = "Daily bonus progress", body = DailyQuestResponse),
        (status = 404, description = "User not registered"),
    )
)]
pub async fn daily_status(
    State(state): State<SharedState>,
    TelegramUser(user): TelegramUser,
) -> Result<Json<DailyQuestResponse>, AppError> {
    let ctx = state.game_context().await?;
    Ok(Json(daily_quest_service::status(&ctx, user.id).await?.into()))
}

/// Claim today's bonus.
#[utoipa::path(
    post,
    path = "/quests/daily/claim",
    tag = "quests",
    params(("Authorization" = String, Header, description = "`Telegram <init-data>`")),
    responses(
        (status = 200, description = "Bonus credited", body = QuestClaimResponse),
        (status = 400, description = "Already claimed in the last 24 hours"),
        (status = 404, description = "User not registered"),
    )
)]
pub async fn claim_daily(
    State(state): State<SharedState>,
    TelegramUser(user): TelegramUser,
) -> Result<Json<QuestClaimResponse>, AppError> {
    let ctx = state.game_context().await?;
    let points_earned = daily_quest_service::claim(&ctx, user.id).await?;
    Ok(Json(QuestClaimResponse { points_earned }))
}

/// Progress on every referral quest.
#[utoipa::path(
    get,
    path = "/quests/referral",
    tag = "quests",
    params(("Authorization" = String, Header, description = "`Telegram <init-data>`")),
    responses(
        (status = 200, description = "Referral quests, oldest first", body = [ReferralQuestStatusResponse]),
        (status = 404, description = "User not registered"),
    )
)]
pub async fn referral_statuses(
    State(state): State<SharedState>,
    TelegramUser(user): TelegramUser,
) -> Result<Json<Vec<ReferralQuestStatusResponse>>, AppError> {
    let ctx = state.game_context().await?;
    let statuses = referral_quest_service::statuses(&ctx, user.id).await?;
    Ok(Json(statuses.into_iter().map(Into::into).collect()))
}

/// Progress on one referral quest.
#[utoipa::path(
    get,
    path = "/quests/referral/{quest_id}",
    tag = "quests",
    params(
        ("Authorization" = String, Header, description = "`Telegram <init-data>`"),
        ("quest_id" = Uuid, Path, description = "Referral quest"),
    ),
    responses(
        (status = 200, description = "Quest progress", body = ReferralQuestStatusResponse),
        (status = 404, description = "Unknown quest or user not registered"),
    )
)]
pub async fn referral_status(
    State(state): State<SharedState>,
    TelegramUser(user): TelegramUser,
    Path(quest_id): Path<Uuid>,
) -> Result<Json<ReferralQuestStatusResponse>, AppError> {
    let ctx = state.game_context().await?;
    let status = referral_quest_service::quest_status(&ctx, user.id, quest_id).await?;
    Ok(Json(status.into()))
}

/// Collect a referral quest reward.
#[utoipa::path(
    post,
    path = "/quests/referral/{quest_id}/claim",
    tag = "quests",
    params(
        ("Authorization" = String, Header, description = "`Telegram <init-data>`"),
        ("quest_id" = Uuid, Path, description = "Referral quest"),
    ),
    responses(
        (status = 200, description = "Reward credited", body = QuestClaimResponse),
        (status = 400, description = "Not enough referrals or already claimed"),
        (status = 404, description = "Unknown quest or user not registered"),
    )
)]
pub async fn claim_referral(
    State(state): State<SharedState>,
    TelegramUser(user): TelegramUser,
    Path(quest_id): Path<Uuid>,
) -> Result<Json<QuestClaimResponse>, AppError> {
    let ctx = state.game_context().await?;
    let points_earned = referral_quest_service::claim(&ctx, user.id, quest_id).await?;
    Ok(Json(QuestClaimResponse { points_earned }))
}
