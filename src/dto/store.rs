//! Store payloads and the subset of Telegram Bot API types the webhook consumes.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{dao::models::PlayerId, services::energy_service::EnergySnapshot};

/// Telegram Stars invoice link to open from the mini-app.
#[derive(Debug, Serialize, ToSchema)]
pub struct InvoiceLinkResponse {
    /// `t.me` invoice URL.
    pub link: String,
}

/// Energy after an administrative reset.
#[derive(Debug, Serialize, ToSchema)]
pub struct ResetEnergyResponse {
    /// Player whose energy was reset.
    pub telegram_id: PlayerId,
    /// Units granted per cooldown window.
    pub total_energy: u32,
    /// Units available after the reset.
    pub remaining_energy: u32,
}

impl ResetEnergyResponse {
    /// Build the response from the snapshot taken after the reset.
    pub fn new(telegram_id: PlayerId, energy: &EnergySnapshot) -> Self {
        Self {
            telegram_id,
            total_energy: energy.total,
            remaining_energy: energy.remaining,
        }
    }
}

/// Incoming update delivered to the bot webhook.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct TelegramUpdate {
    /// Telegram update id.
    #[serde(default)]
    pub update_id: i64,
    /// Present when a buyer is about to pay.
    pub pre_checkout_query: Option<PreCheckoutQuery>,
    /// Present for message updates.
    pub message: Option<TelegramMessage>,
}

/// Sent by Telegram before charging; must be answered within ten seconds.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct PreCheckoutQuery {
    /// Query id to answer.
    pub id: String,
    /// Buyer.
    pub from: TelegramFrom,
    /// Currency code, `XTR` for Stars.
    pub currency: String,
    /// Price in the smallest currency unit.
    pub total_amount: i64,
    /// Payload attached to the invoice.
    pub invoice_payload: String,
}

/// Message part of an update; only payment confirmations are of interest.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct TelegramMessage {
    /// Sender.
    pub from: Option<TelegramFrom>,
    /// Present when the message confirms a payment.
    pub successful_payment: Option<SuccessfulPayment>,
}

/// Confirmation of a completed Stars payment.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct SuccessfulPayment {
    /// Currency code.
    pub currency: String,
    /// Amount paid.
    pub total_amount: i64,
    /// Payload attached to the invoice.
    pub invoice_payload: String,
    /// Telegram's charge identifier.
    #[serde(default)]
    pub telegram_payment_charge_id: String,
}

/// Sender of an update.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct TelegramFrom {
    /// Telegram user id.
    pub id: PlayerId,
    /// Telegram username.
    #[serde(default)]
    pub username: Option<String>,
}
