use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Report `ok` only when a store is installed, the supervisor has not flagged degraded mode and
/// the backend answers a ping.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    let store = match state.require_game_store().await {
        Ok(store) => store,
        Err(_) => {
            warn!("storage unavailable (degraded mode)");
            return HealthResponse::degraded();
        }
    };

    match store.health_check().await {
        Ok(()) => HealthResponse::ok(),
        Err(err) => {
            warn!(error = %err, "storage health check failed");
            HealthResponse::degraded()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        clock::ManualClock, config::AppConfig, dao::game_store::memory::MemoryGameStore,
        state::AppState,
    };

    #[tokio::test]
    async fn reports_degraded_without_store() {
        let state = AppState::new(AppConfig::default());
        assert_eq!(health_status(&state).await.status, "degraded");
    }

    #[tokio::test]
    async fn reports_ok_with_healthy_store() {
        let state = AppState::with_store(
            AppConfig::default(),
            Arc::new(ManualClock::default()),
            Arc::new(MemoryGameStore::new()),
        );
        assert_eq!(health_status(&state).await.status, "ok");

        state.update_degraded(true);
        assert_eq!(health_status(&state).await.status, "degraded");
    }
}
