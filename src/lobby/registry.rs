//! Room and user registries
//!
//! Both maps live behind the controller's single coordination lock; every
//! method here is only reachable through a held `MutexGuard`, which is what
//! makes the multi-step read-modify-write sequences appear atomic.

use std::collections::HashMap;

use crate::lobby::room::{RoomRole, RoomState};
use crate::lobby::user::UserState;

/// The two process-wide registries, guarded as one unit.
#[derive(Debug, Default)]
pub struct LobbyMaps {
    rooms: HashMap<String, RoomState>,
    users: HashMap<String, UserState>,
}

impl LobbyMaps {
    // ---- room registry ----

    pub fn room(&self, code: &str) -> Option<&RoomState> {
        self.rooms.get(code)
    }

    pub fn room_mut(&mut self, code: &str) -> Option<&mut RoomState> {
        self.rooms.get_mut(code)
    }

    pub fn room_exists(&self, code: &str) -> bool {
        self.rooms.contains_key(code)
    }

    /// Register a fresh room with zero/empty defaults. Double-creation of a
    /// code is registry corruption, not a user error.
    pub fn create_room(&mut self, code: &str) -> &mut RoomState {
        assert!(
            !self.rooms.contains_key(code),
            "room {code} created twice"
        );
        self.rooms
            .entry(code.to_string())
            .or_insert_with(|| RoomState::new(code))
    }

    /// Install an already-built room state (archive reconstruction).
    pub fn insert_room(&mut self, room: RoomState) {
        assert!(
            !self.rooms.contains_key(&room.code),
            "room {} inserted twice",
            room.code
        );
        self.rooms.insert(room.code.clone(), room);
    }

    /// Drop a room's live state. The archive is the source of truth from
    /// here on.
    pub fn retire_room(&mut self, code: &str) -> Option<RoomState> {
        self.rooms.remove(code)
    }

    // ---- user session registry ----

    pub fn user(&self, name: &str) -> Option<&UserState> {
        self.users.get(name)
    }

    /// Idempotent: create the user with defaults if absent, and make sure
    /// their per-room socket list and connection count entries exist.
    pub fn ensure_user_in_room(&mut self, name: &str, room: &str) -> &mut UserState {
        let user = self.users.entry(name.to_string()).or_default();
        user.ensure_room_entries(room);
        user
    }

    pub fn record_room_role(&mut self, name: &str, room: &str, role: RoomRole) {
        let user = self.ensure_user_in_room(name, room);
        user.room_modes.insert(room.to_string(), role);
    }

    pub fn add_gameroom(&mut self, name: &str, room: &str) {
        let user = self.ensure_user_in_room(name, room);
        user.gamerooms.insert(room.to_string());
    }

    /// Bump the room total and the user's per-room count together so the sum
    /// invariant holds after the operation.
    pub fn increment_connection(&mut self, name: &str, room: &str) {
        let user = self.ensure_user_in_room(name, room);
        *user
            .room_connection_count
            .get_mut(room)
            .expect("entry ensured above") += 1;
        let state = self
            .rooms
            .get_mut(room)
            .expect("connection increment for unknown room");
        state.connection_count += 1;
    }

    /// Inverse of `increment_connection`. Underflow means the counters were
    /// already inconsistent and is fatal.
    pub fn decrement_connection(&mut self, name: &str, room: &str) {
        let user = self.ensure_user_in_room(name, room);
        let count = user
            .room_connection_count
            .get_mut(room)
            .expect("entry ensured above");
        assert!(*count > 0, "connection underflow for {name} in {room}");
        *count -= 1;

        let state = self
            .rooms
            .get_mut(room)
            .expect("connection decrement for unknown room");
        assert!(
            state.connection_count > 0,
            "connection underflow for room {room}"
        );
        state.connection_count -= 1;
    }

    /// Sum of the per-user connection counts for `room`, for checking the
    /// invariant against `RoomState::connection_count`.
    pub fn user_connection_sum(&self, room: &str) -> u32 {
        self.users
            .values()
            .map(|user| user.connections_to(room))
            .sum()
    }
}
