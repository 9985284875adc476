use axum::{
    Router,
    extract::{Path, State, WebSocketUpgrade},
    response::IntoResponse,
    routing::get,
};

use crate::{dao::models::PlayerId, services::websocket_service, state::SharedState};

#[utoipa::path(
    get,
    path = "/ws/{telegram_id}",
    tag = "arcade",
    params(("telegram_id" = i64, Path, description = "Player owning the arcade session")),
    responses((status = 101, description = "Switching protocols to WebSocket"))
)]
/// Upgrade the HTTP connection into an arcade WebSocket session.
pub async fn ws_handler(
    State(state): State<SharedState>,
    Path(telegram_id): Path<PlayerId>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| websocket_service::handle_socket(state, telegram_id, socket))
}

/// Configure the WebSocket endpoint.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/ws/{telegram_id}", get(ws_handler))
}
