use axum::{
    Json, Router,
    body::Body,
    extract::{Path, State},
    http::{Request, StatusCode},
    middleware::{self, Next},
    response::Response,
    routing::{delete, post},
};
use axum_valid::Valid;

use crate::{
    dao::models::PlayerId,
    dto::{
        quest::{CreateReferralQuestRequest, ReferralQuestResponse},
        store::ResetEnergyResponse,
        ws::ArcadeOutboundMessage,
    },
    error::AppError,
    services::{energy_service, referral_quest_service, websocket_service},
    state::SharedState,
};

const ADMIN_TOKEN_HEADER: &str = "x-admin-token";

/// Operator endpoints guarded by the `X-Admin-Token` header.
pub fn router(state: SharedState) -> Router<SharedState> {
    Router::new()
        .route("/admin/{telegram_id}/reset-energy", delete(reset_energy))
        .route("/admin/referral-quests", post(create_referral_quest))
        .route_layer(middleware::from_fn_with_state(state, require_admin_token))
}

/// Restore the full energy budget of a player.
#[utoipa::path(
    delete,
    path = "/admin/{telegram_id}/reset-energy",
    tag = "admin",
    params(
        ("X-Admin-Token" = String, Header, description = "Configured admin token"),
        ("telegram_id" = i64, Path, description = "Player whose energy is reset"),
    ),
    responses(
        (status = 200, description = "Energy reset", body = ResetEnergyResponse),
        (status = 404, description = "Unknown player"),
    )
)]
pub async fn reset_energy(
    State(state): State<SharedState>,
    Path(telegram_id): Path<PlayerId>,
) -> Result<Json<ResetEnergyResponse>, AppError> {
    let ctx = state.game_context().await?;
    let known = ctx.store.find_user(telegram_id).await?.is_some()
        || ctx.store.find_player(telegram_id).await?.is_some();
    if !known {
        return Err(AppError::NotFound(format!("player `{telegram_id}`")));
    }

    let energy = energy_service::reset(&ctx, telegram_id).await?;
    websocket_service::notify_player(
        &state,
        telegram_id,
        &ArcadeOutboundMessage::recharged(&energy),
    );
    Ok(Json(ResetEnergyResponse::new(telegram_id, &energy)))
}

/// Add a referral milestone quest.
#[utoipa::path(
    post,
    path = "/admin/referral-quests",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Configured admin token")),
    request_body = CreateReferralQuestRequest,
    responses(
        (status = 201, description = "Quest created", body = ReferralQuestResponse),
        (status = 400, description = "Threshold or reward below one"),
    )
)]
pub async fn create_referral_quest(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<CreateReferralQuestRequest>>,
) -> Result<(StatusCode, Json<ReferralQuestResponse>), AppError> {
    let ctx = state.game_context().await?;
    let quest =
        referral_quest_service::create(&ctx, payload.referrals_required, payload.point_reward)
            .await?;
    Ok((StatusCode::CREATED, Json(quest.into())))
}

async fn require_admin_token(
    State(state): State<SharedState>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let provided = req
        .headers()
        .get(ADMIN_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| {
            AppError::Unauthorized("missing admin token header `X-Admin-Token`".into())
        })?;

    match state.config().auth.admin_token.as_deref() {
        Some(token) if token == provided => Ok(next.run(req).await),
        Some(_) => Err(AppError::Unauthorized("invalid admin token".into())),
        None => Err(AppError::Unauthorized("admin access is not configured".into())),
    }
}
