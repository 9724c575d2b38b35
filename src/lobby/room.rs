//! Live room state

use serde::{Deserialize, Serialize};

/// Maximum number of players a room seats.
pub const PLAYER_CAPACITY: usize = 3;

/// Role a user holds in a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomRole {
    Player,
    Spectator,
    /// A returning player of an unfinished game. Pass-through label for the
    /// lobby view; carries no game-rule semantics.
    Rejoined,
}

/// What a join request asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinIntent {
    Player,
    Spectator,
}

/// Coarse lifecycle phase of a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomPhase {
    Staging,
    Active,
    Ended,
}

/// In-memory state of one active room, keyed by its code in the registry.
#[derive(Debug, Clone)]
pub struct RoomState {
    pub code: String,
    /// Total live connections across all users in the room. Must equal the
    /// sum of the members' per-room connection counts at all times.
    pub connection_count: u32,
    pub started: bool,
    pub finished: bool,
    /// Join order, capacity 3, no duplicates.
    pub players: Vec<String>,
    /// De-duplicated; repeated reconnects show up in connection counts, not here.
    pub spectators: Vec<String>,
    /// Opaque transport-session ids, owned by the networking layer.
    pub sockets: Vec<String>,
}

impl RoomState {
    /// Fresh room with zero/empty defaults.
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            connection_count: 0,
            started: false,
            finished: false,
            players: Vec::new(),
            spectators: Vec::new(),
            sockets: Vec::new(),
        }
    }

    /// One-time reconstruction of an ended room from its archive snapshot.
    /// Read-only apart from connection bookkeeping.
    pub fn from_snapshot(code: impl Into<String>, snapshot: RoomSnapshot) -> Self {
        Self {
            code: code.into(),
            connection_count: 0,
            started: true,
            finished: true,
            players: snapshot.players,
            spectators: snapshot.spectators,
            sockets: Vec::new(),
        }
    }

    pub fn snapshot(&self) -> RoomSnapshot {
        RoomSnapshot {
            players: self.players.clone(),
            spectators: self.spectators.clone(),
        }
    }

    pub fn is_player(&self, name: &str) -> bool {
        self.players.iter().any(|p| p == name)
    }

    pub fn phase(&self) -> RoomPhase {
        if self.finished {
            RoomPhase::Ended
        } else if self.started {
            RoomPhase::Active
        } else {
            RoomPhase::Staging
        }
    }

    /// Seat a new player. The caller has already applied the admission rules;
    /// a duplicate or over-capacity seat here is registry corruption.
    pub fn seat_player(&mut self, name: &str) {
        assert!(!self.is_player(name), "duplicate player {name} in room {}", self.code);
        assert!(
            self.players.len() < PLAYER_CAPACITY,
            "room {} already seats {} players",
            self.code,
            PLAYER_CAPACITY
        );
        self.players.push(name.to_string());
    }

    /// Add a spectator, at most once per username.
    pub fn add_spectator(&mut self, name: &str) {
        if !self.spectators.iter().any(|s| s == name) {
            self.spectators.push(name.to_string());
        }
    }
}

/// Serialized membership of an ended game, as stored in the archive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomSnapshot {
    pub players: Vec<String>,
    pub spectators: Vec<String>,
}
