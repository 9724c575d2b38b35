//! Application state

use crate::archive::{GameArchive, MemoryArchive};
use crate::config::Config;
use crate::lobby::Lobby;
use crate::protocol::ServerMessage;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc::UnboundedSender;

/// Global application state
pub struct AppState {
    /// Coordination core: room and user registries behind one lock
    pub lobby: Lobby,
    /// Live socket sessions (socket_id -> SocketSession)
    pub sessions: DashMap<String, SocketSession>,
    /// Configuration
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        Self::with_archive(config, Arc::new(MemoryArchive::new()))
    }

    /// Build with an injected archive, for tests and alternate stores.
    pub fn with_archive(config: Config, archive: Arc<dyn GameArchive>) -> Self {
        Self {
            lobby: Lobby::new(archive, config.lobby.nonce_attempts),
            sessions: DashMap::new(),
            config: Arc::new(config),
        }
    }
}

/// One live WebSocket session, bound to a user and a room.
pub struct SocketSession {
    #[allow(dead_code)]
    pub id: String,
    pub name: String,
    pub room: String,
    pub sender: UnboundedSender<ServerMessage>,
    #[allow(dead_code)]
    pub connected_at: Instant,
}
