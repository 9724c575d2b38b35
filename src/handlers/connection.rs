//! Connection handlers

use crate::protocol::ServerMessage;
use crate::state::{AppState, SocketSession};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc::UnboundedSender;
use uuid::Uuid;

/// Handle a new socket for `(name, room)`: register the session and record
/// the socket with the coordination core.
pub async fn handle_connection(
    state: Arc<AppState>,
    name: &str,
    room: &str,
    sender: UnboundedSender<ServerMessage>,
) -> String {
    let socket_id = Uuid::new_v4().to_string();

    let session = SocketSession {
        id: socket_id.clone(),
        name: name.to_string(),
        room: room.to_string(),
        sender: sender.clone(),
        connected_at: Instant::now(),
    };
    state.sessions.insert(socket_id.clone(), session);
    state.lobby.attach_socket(name, room, &socket_id).await;

    let _ = sender.send(ServerMessage::Connected {
        socket_id: socket_id.clone(),
    });
    broadcast_roster(&state, room).await;

    tracing::info!(socket_id = %socket_id, name = %name, room = %room, "new connection established");
    socket_id
}

/// Handle a socket closing: detach it from the core and update the room.
pub async fn handle_disconnect(state: Arc<AppState>, socket_id: &str) {
    if let Some((_, session)) = state.sessions.remove(socket_id) {
        state
            .lobby
            .detach_socket(&session.name, &session.room, socket_id)
            .await;
        broadcast_roster(&state, &session.room).await;
        tracing::info!(socket_id = %socket_id, name = %session.name, "connection closed");
    }
}

/// Heartbeat handling
pub fn handle_heartbeat(sender: &UnboundedSender<ServerMessage>) {
    let _ = sender.send(ServerMessage::HeartbeatAck);
}

/// Send a message to every socket attached to the room.
pub async fn broadcast_to_room(state: &AppState, room: &str, message: ServerMessage) {
    let Some(overview) = state.lobby.room_overview(room).await else {
        return;
    };
    for socket_id in &overview.sockets {
        if let Some(session) = state.sessions.get(socket_id) {
            let _ = session.sender.send(message.clone());
        }
    }
}

/// Push the current membership and connection count to the whole room.
pub async fn broadcast_roster(state: &AppState, room: &str) {
    let Some(overview) = state.lobby.room_overview(room).await else {
        return;
    };
    let message = ServerMessage::RoomRoster {
        room: room.to_string(),
        players: overview.players.clone(),
        spectators: overview.spectators.clone(),
        connection_count: overview.connection_count,
    };
    for socket_id in &overview.sockets {
        if let Some(session) = state.sessions.get(socket_id) {
            let _ = session.sender.send(message.clone());
        }
    }
}
