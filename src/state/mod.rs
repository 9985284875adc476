use std::{sync::Arc, time::SystemTime};

use axum::extract::ws::Message;
use dashmap::DashMap;
use tokio::sync::{RwLock, mpsc, watch};
use uuid::Uuid;

use crate::{
    clock::{Clock, SystemClock},
    config::AppConfig,
    dao::{game_store::GameStore, models::PlayerId},
    error::ServiceError,
};

/// Reference-counted handle to [`AppState`] shared by routes and tasks.
pub type SharedState = Arc<AppState>;

#[derive(Clone)]
/// Handle used to push messages to a connected arcade client.
pub struct ArcadeConnection {
    /// Distinguishes several sockets of the same player (multiple devices).
    pub connection_id: Uuid,
    /// Outbound queue drained by the socket writer task.
    pub tx: mpsc::UnboundedSender<Message>,
}

/// Everything a game operation needs: the installed store, configuration and time source.
#[derive(Clone)]
pub struct GameContext {
    /// Storage backend.
    pub store: Arc<dyn GameStore>,
    /// Runtime configuration.
    pub config: Arc<AppConfig>,
    /// Time source for cooldown computations.
    pub clock: Arc<dyn Clock>,
}

impl GameContext {
    /// Current time according to the configured clock.
    pub fn now(&self) -> SystemTime {
        self.clock.now()
    }
}

/// Central application state storing live arcade connections and the storage handle.
pub struct AppState {
    game_store: RwLock<Option<Arc<dyn GameStore>>>,
    arcade_connections: DashMap<PlayerId, ArcadeConnection>,
    config: Arc<AppConfig>,
    clock: Arc<dyn Clock>,
    http: reqwest::Client,
    degraded: watch::Sender<bool>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a storage backend is installed.
    pub fn new(config: AppConfig) -> SharedState {
        Self::build(config, Arc::new(SystemClock), None)
    }

    /// State with a storage backend already installed and a custom clock.
    pub fn with_store(
        config: AppConfig,
        clock: Arc<dyn Clock>,
        store: Arc<dyn GameStore>,
    ) -> SharedState {
        Self::build(config, clock, Some(store))
    }

    fn build(
        config: AppConfig,
        clock: Arc<dyn Clock>,
        store: Option<Arc<dyn GameStore>>,
    ) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(store.is_none());
        Arc::new(Self {
            game_store: RwLock::new(store),
            arcade_connections: DashMap::new(),
            config: Arc::new(config),
            clock,
            http: reqwest::Client::new(),
            degraded: degraded_tx,
        })
    }

    /// Runtime configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Current time according to the configured clock.
    pub fn now(&self) -> SystemTime {
        self.clock.now()
    }

    /// Shared HTTP client for Bot API calls.
    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// Obtain a handle to the current game store, if one is installed.
    pub async fn game_store(&self) -> Option<Arc<dyn GameStore>> {
        let guard = self.game_store.read().await;
        guard.as_ref().cloned()
    }

    /// Install a new game store implementation and leave degraded mode.
    pub async fn set_game_store(&self, store: Arc<dyn GameStore>) {
        {
            let mut guard = self.game_store.write().await;
            *guard = Some(store);
        }
        self.update_degraded(false);
    }

    /// Current store, or [`ServiceError::Degraded`] while storage is unavailable.
    pub async fn require_game_store(&self) -> Result<Arc<dyn GameStore>, ServiceError> {
        if self.is_degraded() {
            return Err(ServiceError::Degraded);
        }
        self.game_store().await.ok_or(ServiceError::Degraded)
    }

    /// Bundle the store, configuration and clock for a game operation.
    pub async fn game_context(&self) -> Result<GameContext, ServiceError> {
        Ok(GameContext {
            store: self.require_game_store().await?,
            config: self.config.clone(),
            clock: self.clock.clone(),
        })
    }

    /// Current degraded flag.
    pub fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Update and broadcast the degraded flag when the value changes.
    pub fn update_degraded(&self, value: bool) {
        self.degraded.send_if_modified(|current| {
            if *current == value {
                return false;
            }
            *current = value;
            true
        });
    }

    /// Registry of open arcade sockets keyed by player.
    pub fn arcade_connections(&self) -> &DashMap<PlayerId, ArcadeConnection> {
        &self.arcade_connections
    }

    /// Outbound queue of the player's open arcade socket, if any.
    pub fn arcade_sender(&self, player: PlayerId) -> Option<mpsc::UnboundedSender<Message>> {
        self.arcade_connections
            .get(&player)
            .map(|connection| connection.tx.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{clock::ManualClock, dao::game_store::memory::MemoryGameStore};

    #[tokio::test]
    async fn new_state_starts_degraded() {
        let state = AppState::new(AppConfig::default());
        assert!(state.is_degraded());
        assert!(matches!(
            state.require_game_store().await,
            Err(ServiceError::Degraded)
        ));

        state
            .set_game_store(Arc::new(MemoryGameStore::new()))
            .await;
        assert!(!state.is_degraded());
        assert!(state.game_context().await.is_ok());
    }

    #[tokio::test]
    async fn degraded_flag_blocks_installed_store() {
        let state = AppState::with_store(
            AppConfig::default(),
            Arc::new(ManualClock::default()),
            Arc::new(MemoryGameStore::new()),
        );
        let mut watcher = state.degraded_watcher();

        state.update_degraded(true);
        assert!(watcher.has_changed().unwrap());
        assert!(*watcher.borrow_and_update());
        assert!(state.require_game_store().await.is_err());

        state.update_degraded(true);
        assert!(!watcher.has_changed().unwrap());
    }
}
