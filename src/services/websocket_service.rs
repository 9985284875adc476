use axum::extract::ws::{Message, WebSocket};
use futures::{Sink, SinkExt, Stream, StreamExt};
use thiserror::Error;
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dao::models::PlayerId,
    dto::ws::{ArcadeInboundMessage, ArcadeOutboundMessage, ErrorPayload},
    services::arcade_service::{self, ArcadeSession},
    state::{ArcadeConnection, SharedState},
};

/// The writer task is gone; nothing more can be delivered on this socket.
#[derive(Debug, Error)]
#[error("connection closed")]
pub struct ConnectionClosed;

/// Handle the full lifecycle of an arcade WebSocket connection for `player_id`.
pub async fn handle_socket(state: SharedState, player_id: PlayerId, socket: WebSocket) {
    let (sender, receiver) = socket.split();
    run_connection(state, player_id, sender, receiver).await;
}

/// Drive one arcade connection over any frame sink/stream pair.
///
/// Returns once the client closes, the stream ends or a transport error occurs. The
/// registry entry is released only if it still belongs to this connection.
pub async fn run_connection<Tx, Rx, E>(
    state: SharedState,
    player_id: PlayerId,
    mut sender: Tx,
    mut receiver: Rx,
) where
    Tx: Sink<Message> + Unpin + Send + 'static,
    Rx: Stream<Item = Result<Message, E>> + Unpin,
    E: std::fmt::Display,
{
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();

    // Dedicated writer task keeps outbound messages flowing even while we await inbound frames.
    let writer_task = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            if sender.send(message).await.is_err() {
                break;
            }
        }
    });

    let connection_id = Uuid::new_v4();
    state.arcade_connections().insert(
        player_id,
        ArcadeConnection {
            connection_id,
            tx: outbound_tx.clone(),
        },
    );
    info!(player_id, %connection_id, "arcade connection opened");

    let mut session = ArcadeSession::new(player_id, state.config().arcade.base_hit_reward);

    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Text(text)) => {
                debug!(player_id, payload = %text.as_str(), "received arcade message");
                let reply = handle_text(&state, &mut session, text.as_str()).await;
                if send_message_to_websocket(&outbound_tx, &reply).is_err() {
                    info!(player_id, "writer closed while replying, terminating");
                    break;
                }
            }
            Ok(Message::Ping(payload)) => {
                let _ = outbound_tx.send(Message::Pong(payload));
            }
            Ok(Message::Close(frame)) => {
                let _ = outbound_tx.send(Message::Close(frame));
                break;
            }
            Ok(Message::Binary(_)) | Ok(Message::Pong(_)) => {}
            Err(err) => {
                warn!(player_id, error = %err, "websocket error");
                break;
            }
        }
    }

    if let Some(unsaved_score) = session.abandon() {
        info!(player_id, unsaved_score, "connection lost mid-rally; rally discarded");
    }

    // A newer connection of the same player keeps its registry entry.
    state
        .arcade_connections()
        .remove_if(&player_id, |_, connection| {
            connection.connection_id == connection_id
        });
    info!(player_id, %connection_id, "arcade connection closed");

    finalize(writer_task, outbound_tx).await;
}

async fn handle_text(
    state: &SharedState,
    session: &mut ArcadeSession,
    text: &str,
) -> ArcadeOutboundMessage {
    let event = match ArcadeInboundMessage::from_json_str(text) {
        Ok(message) => message.into(),
        Err(err) => {
            warn!(player_id = session.player_id(), error = %err, "failed to parse arcade message");
            return ArcadeOutboundMessage::Error(ErrorPayload::message("invalid message"));
        }
    };

    match state.game_context().await {
        Ok(ctx) => arcade_service::process_event(&ctx, session, event).await,
        Err(err) => ArcadeOutboundMessage::Error(ErrorPayload::message(err.to_string())),
    }
}

/// Serialize a payload and push it onto the provided WebSocket sender.
///
/// Serialization failures are logged and swallowed; only a closed writer is reported.
pub fn send_message_to_websocket<T>(
    tx: &mpsc::UnboundedSender<Message>,
    value: &T,
) -> Result<(), ConnectionClosed>
where
    T: ?Sized + serde::Serialize + std::fmt::Debug,
{
    let payload = match serde_json::to_string(value) {
        Ok(payload) => payload,
        Err(err) => {
            warn!(error = %err, "failed to serialize message `{value:?}`");
            return Ok(());
        }
    };

    tx.send(Message::Text(payload.into()))
        .map_err(|_| ConnectionClosed)
}

/// Push `message` to the player's open arcade socket, if there is one.
///
/// Returns whether the message was queued.
pub fn notify_player(state: &SharedState, player: PlayerId, message: &ArcadeOutboundMessage) -> bool {
    let Some(tx) = state.arcade_sender(player) else {
        return false;
    };
    match send_message_to_websocket(&tx, message) {
        Ok(()) => true,
        Err(ConnectionClosed) => {
            warn!(player_id = player, "arcade writer closed; dropping notification");
            false
        }
    }
}

/// Ensure the writer task winds down before we return from the socket handler.
async fn finalize(writer_task: JoinHandle<()>, outbound_tx: mpsc::UnboundedSender<Message>) {
    drop(outbound_tx);
    let _ = writer_task.await;
}
