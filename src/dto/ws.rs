use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    clock::unix_seconds,
    services::{
        arcade_service::{ArcadeError, ArcadeEvent, ArcadeOutcome},
        energy_service::EnergySnapshot,
    },
};

#[derive(Debug, Deserialize, Serialize, ToSchema, PartialEq, Eq)]
/// Messages accepted from arcade WebSocket clients. Extra fields such as `payload` are ignored.
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ArcadeInboundMessage {
    /// Ask for the energy counters.
    PlayerState,
    /// Start a rally.
    GameStart,
    /// The ball was hit.
    BallHit,
    /// The ball was missed.
    BallDropped,
    /// Acknowledge a recharge.
    EnergyRecharge,
}

impl ArcadeInboundMessage {
    /// Parse a text frame.
    pub fn from_json_str(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}

impl From<ArcadeInboundMessage> for ArcadeEvent {
    fn from(value: ArcadeInboundMessage) -> Self {
        match value {
            ArcadeInboundMessage::PlayerState => ArcadeEvent::PlayerState,
            ArcadeInboundMessage::GameStart => ArcadeEvent::GameStart,
            ArcadeInboundMessage::BallHit => ArcadeEvent::BallHit,
            ArcadeInboundMessage::BallDropped => ArcadeEvent::BallDropped,
            ArcadeInboundMessage::EnergyRecharge => ArcadeEvent::EnergyRecharge,
        }
    }
}

#[derive(Debug, Serialize, ToSchema, PartialEq, Eq)]
/// Messages pushed to arcade clients as `{ "type": ..., "payload": {...} }`.
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ArcadeOutboundMessage {
    /// Energy counters.
    PlayerState(PlayerStatePayload),
    /// Progress of the running rally.
    GameState(GameStatePayload),
    /// Final figures of a rally.
    GameOver(GameOverPayload),
    /// A refused event.
    Error(ErrorPayload),
    /// Energy was recharged or a recharge was acknowledged.
    EnergyRecharge(EnergyRechargePayload),
}

#[derive(Debug, Serialize, ToSchema, PartialEq, Eq)]
/// Payload of `player_state`.
pub struct PlayerStatePayload {
    /// Units granted per cooldown window.
    pub total_energy: u32,
    /// Units available.
    pub remaining_energy: u32,
}

#[derive(Debug, Serialize, ToSchema, PartialEq, Eq)]
/// Payload of `game_state`.
pub struct GameStatePayload {
    /// Points collected in the rally.
    pub total_score: i64,
    /// Points granted by the last hit.
    pub current_hit_score: i64,
    /// Hits in the rally.
    pub hit_counter: u32,
    /// Units granted per cooldown window.
    pub total_energy: u32,
    /// Units left.
    pub remaining_energy: u32,
    /// A rally is running.
    pub is_playing: bool,
}

#[derive(Debug, Serialize, ToSchema, PartialEq, Eq)]
/// Payload of `game_over`.
pub struct GameOverPayload {
    /// Points credited for the rally.
    pub final_score: i64,
    /// Hits in the rally.
    pub final_hit_counter: u32,
    /// Units left.
    pub remaining_energy: u32,
    /// Always `false`.
    pub is_playing: bool,
}

#[derive(Debug, Serialize, ToSchema, PartialEq, Eq)]
/// Payload of `error`.
pub struct ErrorPayload {
    /// Human readable reason.
    pub message: String,
    /// Unix time at which the next energy unit replenishes (out-of-energy only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_available_energy_unix: Option<i64>,
}

impl ErrorPayload {
    /// Error without an energy hint.
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            next_available_energy_unix: None,
        }
    }
}

#[derive(Debug, Serialize, ToSchema, PartialEq, Eq)]
/// Payload of `energy_recharge`.
pub struct EnergyRechargePayload {
    /// Always `"success"`.
    pub energy_recharge_status: String,
    /// Units granted per cooldown window, when the recharge came from a purchase.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_energy: Option<u32>,
    /// Units available after the recharge.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_energy: Option<u32>,
}

impl ArcadeOutboundMessage {
    /// Push notification sent after an energy purchase.
    pub fn recharged(energy: &EnergySnapshot) -> Self {
        Self::EnergyRecharge(EnergyRechargePayload {
            energy_recharge_status: "success".into(),
            total_energy: Some(energy.total),
            remaining_energy: Some(energy.remaining),
        })
    }
}

impl From<ArcadeOutcome> for ArcadeOutboundMessage {
    fn from(value: ArcadeOutcome) -> Self {
        match value {
            ArcadeOutcome::PlayerState(energy) => Self::PlayerState(PlayerStatePayload {
                total_energy: energy.total_energy,
                remaining_energy: energy.remaining_energy,
            }),
            ArcadeOutcome::GameState(rally) => Self::GameState(GameStatePayload {
                total_score: rally.total_score,
                current_hit_score: rally.current_hit_score,
                hit_counter: rally.hit_counter,
                total_energy: rally.energy.total_energy,
                remaining_energy: rally.energy.remaining_energy,
                is_playing: rally.is_playing,
            }),
            ArcadeOutcome::GameOver(result) => Self::GameOver(GameOverPayload {
                final_score: result.final_score,
                final_hit_counter: result.final_hit_counter,
                remaining_energy: result.remaining_energy,
                is_playing: false,
            }),
            ArcadeOutcome::EnergyRecharge => Self::EnergyRecharge(EnergyRechargePayload {
                energy_recharge_status: "success".into(),
                total_energy: None,
                remaining_energy: None,
            }),
        }
    }
}

impl From<&ArcadeError> for ArcadeOutboundMessage {
    fn from(value: &ArcadeError) -> Self {
        let payload = match value {
            ArcadeError::OutOfEnergy { next_available_at } => ErrorPayload {
                message: value.to_string(),
                next_available_energy_unix: next_available_at.map(unix_seconds),
            },
            other => ErrorPayload::message(other.to_string()),
        };
        Self::Error(payload)
    }
}
