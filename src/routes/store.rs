use axum::{
    Json, Router,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    routing::post,
};
use tracing::warn;

use crate::{
    dto::store::{InvoiceLinkResponse, TelegramUpdate},
    error::AppError,
    routes::extract::TelegramUser,
    services::store_service::{self, StoreItem},
    state::SharedState,
};

const WEBHOOK_SECRET_HEADER: &str = "x-telegram-bot-api-secret-token";

/// Telegram Stars store endpoints and the bot webhook.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/store/energy-recharge", post(energy_recharge))
        .route("/store/custom-ball-skin/{id}", post(custom_ball_skin))
        .route("/store/custom-ball-hit-reward/{id}", post(custom_ball_hit_reward))
        .route("/store/webhook", post(webhook))
}

async fn invoice(
    state: &SharedState,
    item: StoreItem,
    item_kind_id: u32,
) -> Result<Json<InvoiceLinkResponse>, AppError> {
    let link =
        store_service::create_invoice_link(state.http(), state.config(), item, item_kind_id)
            .await?;
    Ok(Json(InvoiceLinkResponse { link }))
}

/// Invoice link for an energy recharge.
#[utoipa::path(
    post,
    path = "/store/energy-recharge",
    tag = "store",
    params(("Authorization" = String, Header, description = "`Telegram <init-data>`")),
    responses((status = 200, description = "Invoice link", body = InvoiceLinkResponse))
)]
pub async fn energy_recharge(
    State(state): State<SharedState>,
    TelegramUser(_user): TelegramUser,
) -> Result<Json<InvoiceLinkResponse>, AppError> {
    invoice(&state, StoreItem::EnergyRecharge, 0).await
}

/// Invoice link for a ball skin.
#[utoipa::path(
    post,
    path = "/store/custom-ball-skin/{id}",
    tag = "store",
    params(
        ("Authorization" = String, Header, description = "`Telegram <init-data>`"),
        ("id" = u32, Path, description = "Skin variant"),
    ),
    responses((status = 200, description = "Invoice link", body = InvoiceLinkResponse))
)]
pub async fn custom_ball_skin(
    State(state): State<SharedState>,
    TelegramUser(_user): TelegramUser,
    Path(id): Path<u32>,
) -> Result<Json<InvoiceLinkResponse>, AppError> {
    invoice(&state, StoreItem::CustomBallSkin, id).await
}

/// Invoice link for a hit reward variant.
#[utoipa::path(
    post,
    path = "/store/custom-ball-hit-reward/{id}",
    tag = "store",
    params(
        ("Authorization" = String, Header, description = "`Telegram <init-data>`"),
        ("id" = u32, Path, description = "Hit reward variant"),
    ),
    responses((status = 200, description = "Invoice link", body = InvoiceLinkResponse))
)]
pub async fn custom_ball_hit_reward(
    State(state): State<SharedState>,
    TelegramUser(_user): TelegramUser,
    Path(id): Path<u32>,
) -> Result<Json<InvoiceLinkResponse>, AppError> {
    invoice(&state, StoreItem::CustomBallHitReward, id).await
}

/// Telegram bot webhook: answers pre-checkout queries and grants paid items.
///
/// Failures are reported with a non-2xx status so Telegram redelivers the update.
#[utoipa::path(
    post,
    path = "/store/webhook",
    tag = "store",
    params(("X-Telegram-Bot-Api-Secret-Token" = Option<String>, Header, description = "Secret registered with `setWebhook`")),
    request_body = TelegramUpdate,
    responses(
        (status = 200, description = "Update processed"),
        (status = 401, description = "Secret token mismatch"),
        (status = 503, description = "Storage unavailable; Telegram retries later"),
    )
)]
pub async fn webhook(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(update): Json<TelegramUpdate>,
) -> Result<StatusCode, AppError> {
    if let Some(expected) = state.config().payments.webhook_secret.as_deref() {
        let provided = headers
            .get(WEBHOOK_SECRET_HEADER)
            .and_then(|value| value.to_str().ok());
        if provided != Some(expected) {
            return Err(AppError::Unauthorized("invalid webhook secret".into()));
        }
    }

    let update_id = update.update_id;
    store_service::handle_webhook(&state, update)
        .await
        .inspect_err(|err| warn!(update_id, error = %err, "webhook update failed"))?;
    Ok(StatusCode::OK)
}
