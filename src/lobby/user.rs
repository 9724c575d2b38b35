//! Per-user session state

use std::collections::{HashMap, HashSet};

use crate::lobby::room::RoomRole;

/// Process-lifetime record of one username's room memberships.
///
/// Created on first interaction and never deleted; individual room entries
/// outlive the room's live state so a returning user can be recognized.
#[derive(Debug, Clone, Default)]
pub struct UserState {
    /// Room codes the user currently belongs to, in any role.
    pub gamerooms: HashSet<String>,
    /// Room code -> role held in that room.
    pub room_modes: HashMap<String, RoomRole>,
    /// Room code -> number of live connections this user holds to it.
    pub room_connection_count: HashMap<String, u32>,
    /// Room code -> socket ids in append order, most recent last.
    pub latest_socketids: HashMap<String, Vec<String>>,
}

impl UserState {
    /// Make sure the per-room bookkeeping entries exist. Idempotent.
    pub fn ensure_room_entries(&mut self, room: &str) {
        self.latest_socketids.entry(room.to_string()).or_default();
        self.room_connection_count.entry(room.to_string()).or_insert(0);
    }

    pub fn role_in(&self, room: &str) -> Option<RoomRole> {
        self.room_modes.get(room).copied()
    }

    pub fn connections_to(&self, room: &str) -> u32 {
        self.room_connection_count.get(room).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ensure_room_entries_is_idempotent() {
        let mut user = UserState::default();
        user.ensure_room_entries("AB12");
        user.room_connection_count.insert("AB12".to_string(), 2);
        user.latest_socketids
            .get_mut("AB12")
            .unwrap()
            .push("sock-1".to_string());

        user.ensure_room_entries("AB12");
        assert_eq!(user.connections_to("AB12"), 2);
        assert_eq!(user.latest_socketids["AB12"], vec!["sock-1"]);
    }

    #[test]
    fn fresh_user_has_no_role_or_connections() {
        let user = UserState::default();
        assert_eq!(user.role_in("AB12"), None);
        assert_eq!(user.connections_to("AB12"), 0);
        assert!(user.gamerooms.is_empty());
    }
}
