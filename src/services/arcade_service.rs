//! Ball-tap arcade rallies.
//!
//! [`ArcadeSession`] is a synchronous state machine owned by a single connection task.
//! [`process_event`] wraps it with the storage work an event implies: the energy read that
//! precedes every event and the ledger/energy writes that end a rally.

use std::time::SystemTime;

use thiserror::Error;
use tracing::{info, warn};

use crate::{
    dao::{models::PlayerId, storage::StorageError},
    dto::ws::ArcadeOutboundMessage,
    services::energy_service::{self, EnergySnapshot},
    state::GameContext,
};

/// Client events understood by the arcade loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArcadeEvent {
    /// Ask for the current energy budget.
    PlayerState,
    /// Begin a rally, spending one energy unit.
    GameStart,
    /// The ball was hit.
    BallHit,
    /// The ball was missed; the rally ends.
    BallDropped,
    /// Acknowledge a recharge notification.
    EnergyRecharge,
}

/// Reasons an event is refused. None of them closes the connection.
#[derive(Debug, Error)]
pub enum ArcadeError {
    /// No energy left to start a rally.
    #[error("out of energy")]
    OutOfEnergy {
        /// When the next unit replenishes.
        next_available_at: Option<SystemTime>,
    },
    /// `game_start` while a rally is running.
    #[error("a rally is already in progress")]
    RallyInProgress,
    /// `ball_hit` or `ball_dropped` outside a rally.
    #[error("no rally in progress")]
    NoRallyInProgress,
    /// Storage failure while reading or writing game data.
    #[error("storage unavailable")]
    Storage(#[from] StorageError),
}

/// Energy counters as seen by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnergyView {
    /// Units granted per cooldown window.
    pub total_energy: u32,
    /// Units left, including the one spent by a running rally.
    pub remaining_energy: u32,
}

/// Progress of the running rally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RallyView {
    /// Points collected so far.
    pub total_score: i64,
    /// Points granted by the last hit.
    pub current_hit_score: i64,
    /// Hits so far.
    pub hit_counter: u32,
    /// Energy counters.
    pub energy: EnergyView,
    /// A rally is running.
    pub is_playing: bool,
}

/// Final figures of a finished rally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RallyResult {
    /// Points to credit.
    pub final_score: i64,
    /// Hits in the rally.
    pub final_hit_counter: u32,
    /// Energy left after the rally.
    pub remaining_energy: u32,
}

/// What the session wants sent back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArcadeOutcome {
    /// Energy counters.
    PlayerState(EnergyView),
    /// Rally progress.
    GameState(RallyView),
    /// The rally ended; the caller persists it before replying.
    GameOver(RallyResult),
    /// Recharge acknowledgement.
    EnergyRecharge,
}

/// Per-connection arcade state.
#[derive(Debug)]
pub struct ArcadeSession {
    player_id: PlayerId,
    base_hit_reward: i64,
    total_energy: u32,
    remaining_energy: u32,
    is_playing: bool,
    hit_counter: u32,
    total_score: i64,
    current_hit_score: i64,
    bonus: i64,
}

impl ArcadeSession {
    /// Idle session for `player_id`.
    pub fn new(player_id: PlayerId, base_hit_reward: i64) -> Self {
        Self {
            player_id,
            base_hit_reward,
            total_energy: 0,
            remaining_energy: 0,
            is_playing: false,
            hit_counter: 0,
            total_score: 0,
            current_hit_score: 0,
            bonus: 0,
        }
    }

    /// Owner of the session.
    pub fn player_id(&self) -> PlayerId {
        self.player_id
    }

    /// A rally is running.
    pub fn is_playing(&self) -> bool {
        self.is_playing
    }

    /// Apply `event` given the energy read just before it.
    ///
    /// While a rally runs the in-memory counters are authoritative: the unit it spends is
    /// only recorded when the rally ends.
    pub fn handle(
        &mut self,
        event: ArcadeEvent,
        energy: &EnergySnapshot,
    ) -> Result<ArcadeOutcome, ArcadeError> {
        if !self.is_playing {
            self.total_energy = energy.total;
            self.remaining_energy = energy.remaining;
        }

        match event {
            ArcadeEvent::PlayerState => Ok(ArcadeOutcome::PlayerState(self.energy())),
            ArcadeEvent::GameStart => {
                if self.is_playing {
                    return Err(ArcadeError::RallyInProgress);
                }
                if self.remaining_energy == 0 {
                    return Err(ArcadeError::OutOfEnergy {
                        next_available_at: energy.next_available_at,
                    });
                }
                self.is_playing = true;
                self.hit_counter = 0;
                self.total_score = 0;
                self.current_hit_score = 0;
                self.bonus = 0;
                self.remaining_energy -= 1;
                Ok(ArcadeOutcome::GameState(self.rally()))
            }
            ArcadeEvent::BallHit => {
                if !self.is_playing {
                    return Err(ArcadeError::NoRallyInProgress);
                }
                self.current_hit_score = self.base_hit_reward + self.bonus;
                self.bonus += 1;
                self.total_score += self.current_hit_score;
                self.hit_counter += 1;
                Ok(ArcadeOutcome::GameState(self.rally()))
            }
            ArcadeEvent::BallDropped => {
                if !self.is_playing {
                    return Err(ArcadeError::NoRallyInProgress);
                }
                self.is_playing = false;
                Ok(ArcadeOutcome::GameOver(RallyResult {
                    final_score: self.total_score,
                    final_hit_counter: self.hit_counter,
                    remaining_energy: self.remaining_energy,
                }))
            }
            ArcadeEvent::EnergyRecharge => Ok(ArcadeOutcome::EnergyRecharge),
        }
    }

    /// Drop a running rally without persisting it, returning the score that is lost.
    pub fn abandon(&mut self) -> Option<i64> {
        if !self.is_playing {
            return None;
        }
        self.is_playing = false;
        Some(self.total_score)
    }

    fn energy(&self) -> EnergyView {
        EnergyView {
            total_energy: self.total_energy,
            remaining_energy: self.remaining_energy,
        }
    }

    fn rally(&self) -> RallyView {
        RallyView {
            total_score: self.total_score,
            current_hit_score: self.current_hit_score,
            hit_counter: self.hit_counter,
            energy: self.energy(),
            is_playing: self.is_playing,
        }
    }
}

/// Run one client event against `session` and build the reply.
///
/// Refused events become `error` replies; the session stays usable.
pub async fn process_event(
    ctx: &GameContext,
    session: &mut ArcadeSession,
    event: ArcadeEvent,
) -> ArcadeOutboundMessage {
    match apply_event(ctx, session, event).await {
        Ok(outcome) => outcome.into(),
        Err(err) => {
            if let ArcadeError::Storage(source) = &err {
                warn!(player_id = session.player_id(), error = %source, "arcade storage failure");
            }
            ArcadeOutboundMessage::from(&err)
        }
    }
}

async fn apply_event(
    ctx: &GameContext,
    session: &mut ArcadeSession,
    event: ArcadeEvent,
) -> Result<ArcadeOutcome, ArcadeError> {
    let energy = energy_service::snapshot(ctx, session.player_id()).await?;
    let outcome = session.handle(event, &energy)?;
    if let ArcadeOutcome::GameOver(result) = &outcome {
        finish_rally(ctx, session.player_id(), result).await;
    }
    Ok(outcome)
}

/// Persist a finished rally: credit the score, then record the spent energy unit.
///
/// Failures are logged; the player still gets the game-over reply.
async fn finish_rally(ctx: &GameContext, player: PlayerId, result: &RallyResult) {
    if result.final_score > 0 {
        if let Err(err) = ctx
            .store
            .credit_points(
                player,
                result.final_score,
                ctx.config.ledger.referral_bonus_percent,
            )
            .await
        {
            warn!(
                player_id = player,
                score = result.final_score,
                error = %err,
                "failed to credit rally score"
            );
        }
    }

    if let Err(err) = energy_service::consume(ctx, player).await {
        warn!(player_id = player, error = %err, "failed to record energy use");
    }

    info!(
        player_id = player,
        score = result.final_score,
        hits = result.final_hit_counter,
        "rally finished"
    );
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use super::*;
    use crate::{
        clock::{Clock, ManualClock},
        config::AppConfig,
        dao::{
            game_store::{GameStore, memory::MemoryGameStore},
            models::UserEntity,
        },
        dto::ws::{ErrorPayload, GameOverPayload},
    };

    const HOUR: Duration = Duration::from_secs(60 * 60);
    const PLAYER: PlayerId = 11;

    fn full_energy() -> EnergySnapshot {
        EnergySnapshot {
            total: 3,
            remaining: 3,
            next_available_at: None,
        }
    }

    async fn context() -> (GameContext, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::default());
        let store = Arc::new(MemoryGameStore::new());
        store
            .insert_user(UserEntity {
                telegram_id: PLAYER,
                username: "striker".into(),
                referrer_id: None,
                referrals: 0,
                points: 0,
                registered_at: clock.now(),
            })
            .await
            .unwrap();
        let ctx = GameContext {
            store,
            config: Arc::new(AppConfig::default()),
            clock: clock.clone(),
        };
        (ctx, clock)
    }

    async fn points(ctx: &GameContext) -> i64 {
        ctx.store.find_user(PLAYER).await.unwrap().unwrap().points
    }

    #[test]
    fn score_grows_with_per_hit_bonus() {
        let mut session = ArcadeSession::new(PLAYER, 10);
        session.handle(ArcadeEvent::GameStart, &full_energy()).unwrap();

        let mut last = None;
        for _ in 0..4 {
            last = Some(session.handle(ArcadeEvent::BallHit, &full_energy()).unwrap());
        }
        let Some(ArcadeOutcome::GameState(rally)) = last else {
            panic!("expected game state, got {last:?}");
        };
        // 10 + 11 + 12 + 13
        assert_eq!(rally.total_score, 46);
        assert_eq!(rally.current_hit_score, 13);
        assert_eq!(rally.hit_counter, 4);
        assert_eq!(rally.energy.remaining_energy, 2);

        let over = session.handle(ArcadeEvent::BallDropped, &full_energy()).unwrap();
        assert_eq!(
            over,
            ArcadeOutcome::GameOver(RallyResult {
                final_score: 46,
                final_hit_counter: 4,
                remaining_energy: 2,
            })
        );
    }

    #[test]
    fn bonus_resets_at_each_rally_start() {
        let mut session = ArcadeSession::new(PLAYER, 10);
        session.handle(ArcadeEvent::GameStart, &full_energy()).unwrap();
        session.handle(ArcadeEvent::BallHit, &full_energy()).unwrap();
        session.handle(ArcadeEvent::BallHit, &full_energy()).unwrap();
        session.handle(ArcadeEvent::BallDropped, &full_energy()).unwrap();

        session.handle(ArcadeEvent::GameStart, &full_energy()).unwrap();
        let hit = session.handle(ArcadeEvent::BallHit, &full_energy()).unwrap();
        assert!(matches!(
            hit,
            ArcadeOutcome::GameState(RallyView {
                current_hit_score: 10,
                total_score: 10,
                ..
            })
        ));
    }

    #[test]
    fn sessions_do_not_share_bonus() {
        let mut first = ArcadeSession::new(1, 10);
        let mut second = ArcadeSession::new(2, 10);
        first.handle(ArcadeEvent::GameStart, &full_energy()).unwrap();
        second.handle(ArcadeEvent::GameStart, &full_energy()).unwrap();
        first.handle(ArcadeEvent::BallHit, &full_energy()).unwrap();
        first.handle(ArcadeEvent::BallHit, &full_energy()).unwrap();

        let hit = second.handle(ArcadeEvent::BallHit, &full_energy()).unwrap();
        assert!(matches!(
            hit,
            ArcadeOutcome::GameState(RallyView {
                current_hit_score: 10,
                ..
            })
        ));
    }

    #[test]
    fn out_of_rally_events_are_refused() {
        let mut session = ArcadeSession::new(PLAYER, 10);
        assert!(matches!(
            session.handle(ArcadeEvent::BallHit, &full_energy()),
            Err(ArcadeError::NoRallyInProgress)
        ));
        assert!(matches!(
            session.handle(ArcadeEvent::BallDropped, &full_energy()),
            Err(ArcadeError::NoRallyInProgress)
        ));

        session.handle(ArcadeEvent::GameStart, &full_energy()).unwrap();
        assert!(matches!(
            session.handle(ArcadeEvent::GameStart, &full_energy()),
            Err(ArcadeError::RallyInProgress)
        ));
        assert!(session.is_playing());
    }

    #[test]
    fn abandon_reports_unsaved_score() {
        let mut session = ArcadeSession::new(PLAYER, 10);
        assert_eq!(session.abandon(), None);
        session.handle(ArcadeEvent::GameStart, &full_energy()).unwrap();
        session.handle(ArcadeEvent::BallHit, &full_energy()).unwrap();
        assert_eq!(session.abandon(), Some(10));
        assert!(!session.is_playing());
    }

    #[tokio::test]
    async fn three_rallies_drain_energy_then_report_next_unit() {
        let (ctx, clock) = context().await;
        let first_rally_end = clock.now();
        let mut session = ArcadeSession::new(PLAYER, 10);

        for remaining in [2, 1, 0] {
            process_event(&ctx, &mut session, ArcadeEvent::GameStart).await;
            let reply = process_event(&ctx, &mut session, ArcadeEvent::BallDropped).await;
            assert_eq!(
                reply,
                ArcadeOutboundMessage::GameOver(GameOverPayload {
                    final_score: 0,
                    final_hit_counter: 0,
                    remaining_energy: remaining,
                    is_playing: false,
                })
            );
            clock.advance(Duration::from_secs(60));
        }

        let reply = process_event(&ctx, &mut session, ArcadeEvent::GameStart).await;
        assert_eq!(
            reply,
            ArcadeOutboundMessage::Error(ErrorPayload {
                message: "out of energy".into(),
                next_available_energy_unix: Some(
                    crate::clock::unix_seconds(first_rally_end + 8 * HOUR)
                ),
            })
        );

        // The session keeps working after a refusal.
        let reply = process_event(&ctx, &mut session, ArcadeEvent::PlayerState).await;
        assert!(matches!(reply, ArcadeOutboundMessage::PlayerState(_)));
    }

    #[tokio::test]
    async fn score_is_credited_only_when_the_ball_drops() {
        let (ctx, _clock) = context().await;
        let mut session = ArcadeSession::new(PLAYER, 10);

        process_event(&ctx, &mut session, ArcadeEvent::GameStart).await;
        process_event(&ctx, &mut session, ArcadeEvent::BallHit).await;
        process_event(&ctx, &mut session, ArcadeEvent::BallHit).await;
        assert_eq!(points(&ctx).await, 0);

        process_event(&ctx, &mut session, ArcadeEvent::BallDropped).await;
        assert_eq!(points(&ctx).await, 21);
    }

    #[tokio::test]
    async fn abandoned_rally_credits_nothing_and_keeps_energy() {
        let (ctx, _clock) = context().await;
        let mut session = ArcadeSession::new(PLAYER, 10);

        process_event(&ctx, &mut session, ArcadeEvent::GameStart).await;
        process_event(&ctx, &mut session, ArcadeEvent::BallHit).await;
        assert_eq!(session.abandon(), Some(10));

        assert_eq!(points(&ctx).await, 0);
        let energy = energy_service::snapshot(&ctx, PLAYER).await.unwrap();
        assert_eq!(energy.remaining, 3);
    }

    #[tokio::test]
    async fn units_return_after_cooldown() {
        let (ctx, clock) = context().await;
        let mut session = ArcadeSession::new(PLAYER, 10);
        for _ in 0..3 {
            process_event(&ctx, &mut session, ArcadeEvent::GameStart).await;
            process_event(&ctx, &mut session, ArcadeEvent::BallDropped).await;
        }

        clock.advance(8 * HOUR);
        let reply = process_event(&ctx, &mut session, ArcadeEvent::GameStart).await;
        assert!(matches!(reply, ArcadeOutboundMessage::GameState(_)));
    }
}
