use axum::Router;

use crate::state::SharedState;

/// Operator endpoints guarded by the admin token.
pub mod admin;
/// Swagger UI.
pub mod docs;
/// Request extractors.
pub mod extract;
/// Harvest endpoints.
pub mod farm;
/// Healthcheck.
pub mod health;
/// Daily bonus and referral quests.
pub mod quests;
/// Invoice links and the payment webhook.
pub mod store;
/// Registration and profile.
pub mod users;
/// Arcade WebSocket upgrade.
pub mod websocket;

/// Compose all route trees, wiring in shared state and documentation routes.
pub fn router(state: SharedState) -> Router<()> {
    let api_router = health::router()
        .merge(farm::router())
        .merge(users::router())
        .merge(quests::router())
        .merge(store::router())
        .merge(websocket::router())
        .merge(admin::router(state.clone()));

    let docs_router = docs::router(state.clone());

    api_router.merge(docs_router).with_state(state)
}
