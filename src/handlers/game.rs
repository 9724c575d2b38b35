//! Game lifecycle handlers
//!
//! The turn/scoring engine lives elsewhere; these are the mutation points it
//! drives on the room state machine (staging -> active -> ended).

use crate::handlers::connection::broadcast_to_room;
use crate::protocol::ServerMessage;
use crate::state::AppState;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;

/// Transition the room's game from staging to play and tell the room.
pub async fn handle_start_game(
    state: Arc<AppState>,
    room: &str,
    sender: &UnboundedSender<ServerMessage>,
) {
    match state.lobby.mark_started(room).await {
        Ok(()) => {
            broadcast_to_room(
                &state,
                room,
                ServerMessage::GameStarted {
                    room: room.to_string(),
                },
            )
            .await;
            tracing::debug!(room = %room, "relayed game start");
        }
        Err(err) => {
            let _ = sender.send(ServerMessage::Error {
                code: "room_not_found".to_string(),
                message: err.to_string(),
            });
        }
    }
}

/// Conclude the room's game, persist its snapshot, and tell the room.
pub async fn handle_finish_game(
    state: Arc<AppState>,
    room: &str,
    sender: &UnboundedSender<ServerMessage>,
) {
    // Broadcast before mark_finished may retire the live state.
    broadcast_to_room(
        &state,
        room,
        ServerMessage::GameFinished {
            room: room.to_string(),
        },
    )
    .await;

    if let Err(err) = state.lobby.mark_finished(room).await {
        let _ = sender.send(ServerMessage::Error {
            code: "room_not_found".to_string(),
            message: err.to_string(),
        });
    } else {
        tracing::debug!(room = %room, "relayed game finish");
    }
}
