//! Client-server message protocol definitions

use serde::{Deserialize, Serialize};

/// Client -> server messages
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum ClientMessage {
    // Connection
    Heartbeat,

    // Game lifecycle signals from the (out-of-scope) game engine, driving
    // the room state machine.
    StartGame { room: String },
    FinishGame { room: String },
}

/// Server -> client messages
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum ServerMessage {
    // Connection
    Connected { socket_id: String },
    HeartbeatAck,
    Error { code: String, message: String },

    // Room events
    RoomRoster {
        room: String,
        players: Vec<String>,
        spectators: Vec<String>,
        connection_count: u32,
    },
    GameStarted {
        room: String,
    },
    GameFinished {
        room: String,
    },
}
