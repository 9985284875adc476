//! Telegram Stars store: invoice links, webhook handling and purchase granting.

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
    config::AppConfig,
    dao::{models::PlayerId, storage::StorageError},
    dto::{
        store::{SuccessfulPayment, TelegramUpdate},
        ws::ArcadeOutboundMessage,
    },
    error::ServiceError,
    services::{energy_service, energy_service::EnergySnapshot, websocket_service},
    state::{GameContext, SharedState},
};

/// Telegram Stars currency code.
const STARS_CURRENCY: &str = "XTR";

/// Items sold through invoices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StoreItem {
    /// Restore the full energy budget.
    EnergyRecharge,
    /// Cosmetic ball skin, chosen by `item_kind_id`.
    CustomBallSkin,
    /// Hit reward variant, chosen by `item_kind_id`.
    CustomBallHitReward,
}

impl StoreItem {
    fn title(self) -> &'static str {
        match self {
            StoreItem::EnergyRecharge => "Energy Recharge",
            StoreItem::CustomBallSkin => "Custom Ball Skin",
            StoreItem::CustomBallHitReward => "Custom Ball Hit Reward",
        }
    }

    fn price(self, config: &AppConfig) -> u32 {
        match self {
            StoreItem::EnergyRecharge => config.payments.energy_recharge_price,
            StoreItem::CustomBallSkin => config.payments.ball_skin_price,
            StoreItem::CustomBallHitReward => config.payments.ball_hit_reward_price,
        }
    }
}

/// JSON attached to every invoice and echoed back by Telegram on payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoicePayload {
    /// What was bought.
    pub store_item: StoreItem,
    /// Variant of the item; `0` for energy recharges.
    #[serde(default)]
    pub item_kind_id: u32,
}

/// A confirmed payment ready to be granted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PurchaseSucceeded {
    /// Buyer.
    pub user_id: PlayerId,
    /// What was bought.
    pub item: StoreItem,
    /// Variant of the item.
    pub item_kind_id: u32,
}

/// Failures of the payment flow.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// The Bot API answered `ok: false`.
    #[error("telegram API error: {0}")]
    Telegram(String),
    /// The Bot API could not be reached.
    #[error("telegram API unreachable: {0}")]
    Transport(#[from] reqwest::Error),
    /// The invoice payload is not one we issued.
    #[error("malformed invoice payload: {0}")]
    MalformedPayload(#[source] serde_json::Error),
    /// Storage failure while granting.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[derive(Serialize)]
struct LabeledPrice {
    label: &'static str,
    amount: u32,
}

#[derive(Serialize)]
struct CreateInvoiceLinkRequest {
    title: &'static str,
    description: &'static str,
    payload: String,
    provider_token: &'static str,
    currency: &'static str,
    prices: Vec<LabeledPrice>,
}

#[derive(Serialize)]
struct AnswerPreCheckoutQueryRequest<'a> {
    pre_checkout_query_id: &'a str,
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_message: Option<&'a str>,
}

#[derive(Deserialize)]
struct BotApiResponse<T> {
    ok: bool,
    result: Option<T>,
    #[serde(default)]
    description: Option<String>,
}

async fn call_bot_api<B, T>(
    http: &reqwest::Client,
    config: &AppConfig,
    method: &str,
    body: &B,
) -> Result<T, PaymentError>
where
    B: Serialize + ?Sized,
    T: DeserializeOwned,
{
    let url = format!(
        "{}/bot{}/{method}",
        config.payments.api_base_url.trim_end_matches('/'),
        config.auth.bot_token
    );
    let response: BotApiResponse<T> = http.post(url).json(body).send().await?.json().await?;

    match response {
        BotApiResponse {
            ok: true,
            result: Some(result),
            ..
        } => Ok(result),
        BotApiResponse { description, .. } => Err(PaymentError::Telegram(
            description.unwrap_or_else(|| format!("`{method}` returned no result")),
        )),
    }
}

/// Ask Telegram for an invoice link selling `item`.
pub async fn create_invoice_link(
    http: &reqwest::Client,
    config: &AppConfig,
    item: StoreItem,
    item_kind_id: u32,
) -> Result<String, PaymentError> {
    let payload = serde_json::to_string(&InvoicePayload {
        store_item: item,
        item_kind_id,
    })
    .map_err(PaymentError::MalformedPayload)?;

    let request = CreateInvoiceLinkRequest {
        title: item.title(),
        description: item.title(),
        payload,
        provider_token: "",
        currency: STARS_CURRENCY,
        prices: vec![LabeledPrice {
            label: "Product",
            amount: item.price(config),
        }],
    };

    let link: String = call_bot_api(http, config, "createInvoiceLink", &request).await?;
    info!(?item, item_kind_id, "invoice link created");
    Ok(link)
}

/// Approve or reject a pre-checkout query.
pub async fn answer_pre_checkout_query(
    http: &reqwest::Client,
    config: &AppConfig,
    query_id: &str,
    error_message: Option<&str>,
) -> Result<(), PaymentError> {
    let request = AnswerPreCheckoutQueryRequest {
        pre_checkout_query_id: query_id,
        ok: error_message.is_none(),
        error_message,
    };
    let _: bool = call_bot_api(http, config, "answerPreCheckoutQuery", &request).await?;
    Ok(())
}

/// Decode the invoice payload echoed by Telegram.
pub fn decode_payload(raw: &str) -> Result<InvoicePayload, PaymentError> {
    serde_json::from_str(raw).map_err(PaymentError::MalformedPayload)
}

/// Turn a `successful_payment` message into a purchase.
pub fn decode_purchase(
    user_id: PlayerId,
    payment: &SuccessfulPayment,
) -> Result<PurchaseSucceeded, PaymentError> {
    let payload = decode_payload(&payment.invoice_payload)?;
    Ok(PurchaseSucceeded {
        user_id,
        item: payload.store_item,
        item_kind_id: payload.item_kind_id,
    })
}

/// Apply a purchase to the buyer's profile.
///
/// Returns the fresh energy snapshot for energy recharges.
pub async fn grant_purchase(
    ctx: &GameContext,
    purchase: &PurchaseSucceeded,
) -> Result<Option<EnergySnapshot>, PaymentError> {
    let player = purchase.user_id;
    ctx.store
        .ensure_player(player, ctx.config.arcade.default_total_energy)
        .await?;

    let energy = match purchase.item {
        StoreItem::EnergyRecharge => Some(energy_service::reset(ctx, player).await?),
        StoreItem::CustomBallSkin => {
            ctx.store
                .set_ball_skin(player, purchase.item_kind_id)
                .await?;
            None
        }
        StoreItem::CustomBallHitReward => {
            ctx.store
                .set_ball_hit_reward(player, purchase.item_kind_id)
                .await?;
            None
        }
    };

    info!(
        player_id = player,
        item = ?purchase.item,
        item_kind_id = purchase.item_kind_id,
        "purchase granted"
    );
    Ok(energy)
}

/// Process a webhook update from Telegram.
pub async fn handle_webhook(state: &SharedState, update: TelegramUpdate) -> Result<(), ServiceError> {
    if let Some(query) = update.pre_checkout_query {
        let rejection = decode_payload(&query.invoice_payload)
            .err()
            .map(|err| {
                warn!(player_id = query.from.id, error = %err, "rejecting pre-checkout query");
                "unknown store item"
            });
        answer_pre_checkout_query(state.http(), state.config(), &query.id, rejection).await?;
        debug!(player_id = query.from.id, query_id = %query.id, "pre-checkout query answered");
        return Ok(());
    }

    let Some(message) = update.message else {
        debug!(update_id = update.update_id, "ignoring update without message");
        return Ok(());
    };
    let (Some(from), Some(payment)) = (message.from, message.successful_payment) else {
        debug!(update_id = update.update_id, "ignoring message without payment");
        return Ok(());
    };

    let purchase = decode_purchase(from.id, &payment)?;
    let ctx = state.game_context().await?;
    if let Some(energy) = grant_purchase(&ctx, &purchase).await? {
        websocket_service::notify_player(
            state,
            purchase.user_id,
            &ArcadeOutboundMessage::recharged(&energy),
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{clock::ManualClock, dao::game_store::memory::MemoryGameStore};

    fn context() -> GameContext {
        GameContext {
            store: Arc::new(MemoryGameStore::new()),
            config: Arc::new(AppConfig::default()),
            clock: Arc::new(ManualClock::default()),
        }
    }

    fn payment(payload: &str) -> SuccessfulPayment {
        SuccessfulPayment {
            currency: "XTR".into(),
            total_amount: 1,
            invoice_payload: payload.into(),
            telegram_payment_charge_id: "charge".into(),
        }
    }

    #[test]
    fn payload_uses_screaming_item_names() {
        let payload = InvoicePayload {
            store_item: StoreItem::CustomBallSkin,
            item_kind_id: 4,
        };
        assert_eq!(
            serde_json::to_string(&payload).unwrap(),
            r#"{"store_item":"CUSTOM_BALL_SKIN","item_kind_id":4}"#
        );
    }

    #[test]
    fn decode_purchase_reads_invoice_payload() {
        let purchase =
            decode_purchase(8, &payment(r#"{"store_item":"ENERGY_RECHARGE"}"#)).unwrap();
        assert_eq!(
            purchase,
            PurchaseSucceeded {
                user_id: 8,
                item: StoreItem::EnergyRecharge,
                item_kind_id: 0,
            }
        );
        assert!(matches!(
            decode_purchase(8, &payment("{}")),
            Err(PaymentError::MalformedPayload(_))
        ));
    }

    #[tokio::test]
    async fn energy_recharge_restores_budget() {
        let ctx = context();
        energy_service::consume(&ctx, 8).await.unwrap();
        energy_service::consume(&ctx, 8).await.unwrap();

        let energy = grant_purchase(
            &ctx,
            &PurchaseSucceeded {
                user_id: 8,
                item: StoreItem::EnergyRecharge,
                item_kind_id: 0,
            },
        )
        .await
        .unwrap();
        assert_eq!(energy.map(|energy| energy.remaining), Some(3));
    }

    #[tokio::test]
    async fn cosmetics_are_stored_on_the_profile() {
        let ctx = context();
        for (item, kind) in [
            (StoreItem::CustomBallSkin, 3),
            (StoreItem::CustomBallHitReward, 5),
        ] {
            let energy = grant_purchase(
                &ctx,
                &PurchaseSucceeded {
                    user_id: 8,
                    item,
                    item_kind_id: kind,
                },
            )
            .await
            .unwrap();
            assert!(energy.is_none());
        }

        let player = ctx.store.find_player(8).await.unwrap().unwrap();
        assert_eq!(player.ball_skin_id, Some(3));
        assert_eq!(player.ball_hit_reward_id, Some(5));
    }
}
