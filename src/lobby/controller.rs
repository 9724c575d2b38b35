//! Room lifecycle controller
//!
//! All read-modify-write sequences over the two registries run under one
//! coordination lock. The only blocking collaborator is the archive, and it
//! is never consulted while the lock is held: absence is re-checked under the
//! lock before committing an archive-restored room, so two requests resolving
//! the same ended room cannot double-insert.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{Mutex, MutexGuard};

use crate::archive::GameArchive;
use crate::lobby::error::LobbyError;
use crate::lobby::nonce;
use crate::lobby::registry::LobbyMaps;
use crate::lobby::room::{JoinIntent, RoomPhase, RoomRole, RoomState, PLAYER_CAPACITY};

/// Default bound on the room-code retry loop.
pub const DEFAULT_NONCE_ATTEMPTS: usize = 32;

/// The coordination core: both registries behind a single lock, plus the
/// archive fallback. Owned by `AppState`, injectable in tests.
pub struct Lobby {
    maps: Mutex<LobbyMaps>,
    archive: Arc<dyn GameArchive>,
    nonce_attempts: usize,
}

/// Resolved context for rendering a room view.
#[derive(Debug, Clone, Serialize)]
pub struct ViewContext {
    pub room: String,
    pub name: String,
    pub role: RoomRole,
    pub started: bool,
    pub finished: bool,
    pub players: Vec<String>,
    pub spectators: Vec<String>,
}

impl Lobby {
    pub fn new(archive: Arc<dyn GameArchive>, nonce_attempts: usize) -> Self {
        Self {
            maps: Mutex::new(LobbyMaps::default()),
            archive,
            nonce_attempts,
        }
    }

    /// Create a room with `owner` as its sole player and return the code.
    ///
    /// Codes are sampled from a 36^4 space and retried on collision against
    /// the live registry and the archive; `archive.create` is the durable
    /// arbiter when two requests race on the same code. The loop is bounded,
    /// exhaustion is fatal.
    pub async fn create_room(&self, owner: &str) -> Result<String, LobbyError> {
        for _ in 0..self.nonce_attempts {
            let code = nonce::propose();

            if self.maps.lock().await.room_exists(&code) {
                continue;
            }
            if self.archive.create(&code).await.is_err() {
                tracing::debug!(code = %code, "room code collision, retrying");
                continue;
            }

            let mut maps = self.maps.lock().await;
            // A concurrent join may have bootstrapped the room from the
            // archive record created a moment ago.
            if !maps.room_exists(&code) {
                maps.create_room(&code);
            }
            maps.room_mut(&code)
                .expect("room created above")
                .seat_player(owner);
            maps.add_gameroom(owner, &code);
            maps.record_room_role(owner, &code, RoomRole::Player);

            tracing::info!(room = %code, owner = %owner, "room created");
            return Ok(code);
        }

        tracing::error!(
            attempts = self.nonce_attempts,
            "room code space exhausted"
        );
        Err(LobbyError::NonceSpaceExhausted)
    }

    /// Admit `name` to `room` under the role constraints for `intent`.
    pub async fn join_room(
        &self,
        name: &str,
        room: &str,
        intent: JoinIntent,
    ) -> Result<RoomRole, LobbyError> {
        let mut maps = self.maps.lock().await;
        if !maps.room_exists(room) {
            drop(maps);
            maps = self.restore_from_archive(room).await?;
        }
        let state = maps.room_mut(room).expect("room resolved above");

        let role = match intent {
            JoinIntent::Player => {
                if state.is_player(name) && !state.finished {
                    RoomRole::Rejoined
                } else if state.started || state.players.len() >= PLAYER_CAPACITY {
                    tracing::info!(room = %room, name = %name, "player join rejected: room closed");
                    return Err(LobbyError::RoomFull {
                        room: room.to_string(),
                    });
                } else {
                    state.seat_player(name);
                    RoomRole::Player
                }
            }
            JoinIntent::Spectator => {
                if state.is_player(name) && !state.finished {
                    tracing::info!(room = %room, name = %name, "spectator join rejected: active player");
                    return Err(LobbyError::PlayerMustRejoin {
                        room: room.to_string(),
                    });
                }
                state.add_spectator(name);
                RoomRole::Spectator
            }
        };

        maps.add_gameroom(name, room);
        maps.record_room_role(name, room, role);
        tracing::info!(room = %room, name = %name, role = ?role, "join admitted");
        Ok(role)
    }

    /// Resolve the caller's role in `room` (admitting them if they have none
    /// yet) and count one more live connection.
    ///
    /// Idempotent with respect to role resolution: repeat calls for a user
    /// with a recorded role only bump the connection counters.
    pub async fn view_room(&self, name: &str, room: &str) -> Result<ViewContext, LobbyError> {
        let mut maps = self.maps.lock().await;
        maps.ensure_user_in_room(name, room);

        let has_role = maps
            .user(name)
            .map(|u| u.role_in(room).is_some())
            .unwrap_or(false);

        if !(has_role && maps.room_exists(room)) {
            if !maps.room_exists(room) {
                drop(maps);
                maps = self.restore_from_archive(room).await?;
            }
            let state = maps.room_mut(room).expect("room resolved above");
            if !state.started {
                return Err(LobbyError::GameNotStarted {
                    room: room.to_string(),
                });
            }

            let role = if state.is_player(name) && !state.finished {
                RoomRole::Rejoined
            } else {
                state.add_spectator(name);
                RoomRole::Spectator
            };
            maps.add_gameroom(name, room);
            maps.record_room_role(name, room, role);
            tracing::info!(room = %room, name = %name, role = ?role, "view resolved role");
        }

        maps.increment_connection(name, room);

        let state = maps.room(room).expect("room resolved above");
        let role = maps
            .user(name)
            .and_then(|u| u.role_in(room))
            .expect("role recorded above");
        tracing::debug!(
            room = %room,
            name = %name,
            connections = state.connection_count,
            "connection count changed"
        );

        Ok(ViewContext {
            room: room.to_string(),
            name: name.to_string(),
            role,
            started: state.started,
            finished: state.finished,
            players: state.players.clone(),
            spectators: state.spectators.clone(),
        })
    }

    /// STAGING -> ACTIVE, triggered by the game engine. Idempotent.
    pub async fn mark_started(&self, room: &str) -> Result<(), LobbyError> {
        let mut maps = self.maps.lock().await;
        let state = maps.room_mut(room).ok_or_else(|| LobbyError::RoomNotFound {
            room: room.to_string(),
        })?;
        if !state.started {
            state.started = true;
            tracing::info!(room = %room, "game started");
        }
        Ok(())
    }

    /// ACTIVE -> ENDED: mark finished, persist the snapshot, and retire the
    /// live state immediately if nobody is connected. Idempotent.
    pub async fn mark_finished(&self, room: &str) -> Result<(), LobbyError> {
        let snapshot;
        {
            let mut maps = self.maps.lock().await;
            let state = maps.room_mut(room).ok_or_else(|| LobbyError::RoomNotFound {
                room: room.to_string(),
            })?;
            if !state.finished {
                state.finished = true;
                tracing::info!(room = %room, "game finished");
            }
            snapshot = state.snapshot();
            if state.connection_count == 0 {
                maps.retire_room(room);
                tracing::info!(room = %room, "retired room with no connections");
            }
        }
        // Persisting happens outside the coordination lock.
        self.archive.finalize(room, snapshot).await;
        Ok(())
    }

    /// Record a live transport session for `(name, room)`.
    pub async fn attach_socket(&self, name: &str, room: &str, socket_id: &str) {
        let mut maps = self.maps.lock().await;
        let user = maps.ensure_user_in_room(name, room);
        user.latest_socketids
            .get_mut(room)
            .expect("entry ensured above")
            .push(socket_id.to_string());
        if let Some(state) = maps.room_mut(room) {
            state.sockets.push(socket_id.to_string());
        }
        tracing::debug!(room = %room, name = %name, socket_id = %socket_id, "socket attached");
    }

    /// Drop a transport session and its connection, retiring a finished
    /// room's live state once its last connection is gone.
    pub async fn detach_socket(&self, name: &str, room: &str, socket_id: &str) {
        let mut maps = self.maps.lock().await;
        let user = maps.ensure_user_in_room(name, room);
        if let Some(ids) = user.latest_socketids.get_mut(room) {
            ids.retain(|id| id != socket_id);
        }
        let had_connection = user.connections_to(room) > 0;

        let Some(state) = maps.room_mut(room) else {
            return;
        };
        state.sockets.retain(|id| id != socket_id);

        if had_connection {
            maps.decrement_connection(name, room);
        } else {
            // Untrusted transport layer: a socket may close without ever
            // having gone through view_room.
            tracing::warn!(room = %room, name = %name, "disconnect without recorded connection");
        }

        let state = maps.room(room).expect("room checked above");
        tracing::debug!(
            room = %room,
            name = %name,
            connections = state.connection_count,
            "connection count changed"
        );
        if state.finished && state.connection_count == 0 {
            maps.retire_room(room);
            tracing::info!(room = %room, "retired finished room after last disconnect");
        }
    }

    /// Rooms the user belongs to whose game is in progress, for the lobby
    /// index page.
    pub async fn active_rooms_for(&self, name: &str) -> Vec<String> {
        let maps = self.maps.lock().await;
        let Some(user) = maps.user(name) else {
            return Vec::new();
        };
        let mut rooms: Vec<String> = user
            .gamerooms
            .iter()
            .filter(|code| {
                maps.room(code)
                    .map(|r| r.phase() == RoomPhase::Active)
                    .unwrap_or(false)
            })
            .cloned()
            .collect();
        rooms.sort();
        rooms
    }

    /// Copy of a room's live state, if any. Used by the socket layer for
    /// broadcasts and by tests.
    pub async fn room_overview(&self, room: &str) -> Option<RoomState> {
        self.maps.lock().await.room(room).cloned()
    }

    /// Sum of all users' connection counts for `room`, for checking the sum
    /// invariant against `RoomState::connection_count`.
    pub async fn user_connection_sum(&self, room: &str) -> u32 {
        self.maps.lock().await.user_connection_sum(room)
    }

    /// Archive fallback for a code with no live state. The archive read runs
    /// with the lock released; absence is re-checked under the re-acquired
    /// lock before the restored state is committed.
    async fn restore_from_archive(
        &self,
        room: &str,
    ) -> Result<MutexGuard<'_, LobbyMaps>, LobbyError> {
        let record = self
            .archive
            .lookup(room)
            .await
            .ok_or_else(|| LobbyError::RoomNotFound {
                room: room.to_string(),
            })?;

        let mut maps = self.maps.lock().await;
        if !maps.room_exists(room) {
            let state = if record.ended {
                RoomState::from_snapshot(room, record.snapshot.unwrap_or_default())
            } else {
                // The archive knows the code but the game never concluded:
                // the live state was lost, bootstrap an empty room.
                RoomState::new(room)
            };
            tracing::info!(room = %room, ended = record.ended, "restored room from archive");
            maps.insert_room(state);
        }
        Ok(maps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::{AlreadyExists, ArchiveRecord, GameArchive, MemoryArchive};
    use crate::lobby::room::RoomSnapshot;
    use async_trait::async_trait;

    fn test_lobby() -> Lobby {
        Lobby::new(Arc::new(MemoryArchive::new()), DEFAULT_NONCE_ATTEMPTS)
    }

    /// Archive whose code space is "full": every create collides.
    struct SaturatedArchive;

    #[async_trait]
    impl GameArchive for SaturatedArchive {
        async fn lookup(&self, _code: &str) -> Option<ArchiveRecord> {
            Some(ArchiveRecord::default())
        }
        async fn create(&self, _code: &str) -> Result<(), AlreadyExists> {
            Err(AlreadyExists)
        }
        async fn finalize(&self, _code: &str, _snapshot: RoomSnapshot) {}
    }

    #[tokio::test]
    async fn create_room_seats_owner_as_player() {
        let lobby = test_lobby();
        let code = lobby.create_room("alice").await.unwrap();

        let room = lobby.room_overview(&code).await.unwrap();
        assert_eq!(room.players, vec!["alice"]);
        assert!(!room.started);
        assert!(!room.finished);
        assert_eq!(room.connection_count, 0);
    }

    #[tokio::test]
    async fn fourth_player_is_rejected() {
        let lobby = test_lobby();
        let code = lobby.create_room("alice").await.unwrap();

        assert_eq!(
            lobby.join_room("bob", &code, JoinIntent::Player).await,
            Ok(RoomRole::Player)
        );
        assert_eq!(
            lobby.join_room("carol", &code, JoinIntent::Player).await,
            Ok(RoomRole::Player)
        );
        assert_eq!(
            lobby.join_room("dave", &code, JoinIntent::Player).await,
            Err(LobbyError::RoomFull { room: code.clone() })
        );

        let room = lobby.room_overview(&code).await.unwrap();
        assert_eq!(room.players, vec!["alice", "bob", "carol"]);
    }

    #[tokio::test]
    async fn started_room_rejects_new_players() {
        let lobby = test_lobby();
        let code = lobby.create_room("alice").await.unwrap();
        lobby.mark_started(&code).await.unwrap();

        assert_eq!(
            lobby.join_room("bob", &code, JoinIntent::Player).await,
            Err(LobbyError::RoomFull { room: code.clone() })
        );
    }

    #[tokio::test]
    async fn active_player_cannot_spectate_own_game() {
        let lobby = test_lobby();
        let code = lobby.create_room("alice").await.unwrap();
        lobby.mark_started(&code).await.unwrap();

        assert_eq!(
            lobby.join_room("alice", &code, JoinIntent::Spectator).await,
            Err(LobbyError::PlayerMustRejoin { room: code.clone() })
        );
    }

    #[tokio::test]
    async fn returning_player_is_rejoined_not_reseated() {
        let lobby = test_lobby();
        let code = lobby.create_room("alice").await.unwrap();
        lobby.mark_started(&code).await.unwrap();

        assert_eq!(
            lobby.join_room("alice", &code, JoinIntent::Player).await,
            Ok(RoomRole::Rejoined)
        );
        let room = lobby.room_overview(&code).await.unwrap();
        assert_eq!(room.players, vec!["alice"]);
    }

    #[tokio::test]
    async fn finished_room_waives_player_exclusivity() {
        let lobby = test_lobby();
        let code = lobby.create_room("alice").await.unwrap();
        lobby.mark_started(&code).await.unwrap();
        // Keep a connection open so the room is not retired at finish.
        lobby.view_room("alice", &code).await.unwrap();
        lobby.mark_finished(&code).await.unwrap();

        assert_eq!(
            lobby.join_room("alice", &code, JoinIntent::Spectator).await,
            Ok(RoomRole::Spectator)
        );
        assert_eq!(
            lobby.join_room("eve", &code, JoinIntent::Spectator).await,
            Ok(RoomRole::Spectator)
        );
    }

    #[tokio::test]
    async fn join_of_unknown_room_fails() {
        let lobby = test_lobby();
        assert_eq!(
            lobby.join_room("bob", "ZZZZ", JoinIntent::Player).await,
            Err(LobbyError::RoomNotFound {
                room: "ZZZZ".to_string()
            })
        );
    }

    #[tokio::test]
    async fn view_before_start_redirects_with_game_not_started() {
        let lobby = test_lobby();
        let code = lobby.create_room("alice").await.unwrap();

        assert!(matches!(
            lobby.view_room("bob", &code).await,
            Err(LobbyError::GameNotStarted { .. })
        ));
    }

    #[tokio::test]
    async fn view_is_idempotent_for_role_but_counts_connections() {
        let lobby = test_lobby();
        let code = lobby.create_room("alice").await.unwrap();
        lobby.join_room("bob", &code, JoinIntent::Player).await.unwrap();
        lobby.mark_started(&code).await.unwrap();

        let first = lobby.view_room("bob", &code).await.unwrap();
        let second = lobby.view_room("bob", &code).await.unwrap();
        assert_eq!(first.role, second.role);

        let room = lobby.room_overview(&code).await.unwrap();
        assert_eq!(room.connection_count, 2);
        assert_eq!(lobby.user_connection_sum(&code).await, 2);
    }

    #[tokio::test]
    async fn view_admits_latecomer_as_spectator() {
        let lobby = test_lobby();
        let code = lobby.create_room("alice").await.unwrap();
        lobby.mark_started(&code).await.unwrap();

        let ctx = lobby.view_room("frank", &code).await.unwrap();
        assert_eq!(ctx.role, RoomRole::Spectator);
        let room = lobby.room_overview(&code).await.unwrap();
        assert_eq!(room.spectators, vec!["frank"]);
    }

    #[tokio::test]
    async fn view_reconstructs_ended_room_from_archive() {
        let archive = Arc::new(MemoryArchive::new());
        archive
            .finalize(
                "D000",
                RoomSnapshot {
                    players: vec!["alice".to_string()],
                    spectators: vec![],
                },
            )
            .await;
        let lobby = Lobby::new(archive, DEFAULT_NONCE_ATTEMPTS);

        let ctx = lobby.view_room("frank", "D000").await.unwrap();
        assert_eq!(ctx.role, RoomRole::Spectator);
        assert!(ctx.finished);
        assert_eq!(ctx.players, vec!["alice"]);
    }

    #[tokio::test]
    async fn join_bootstraps_unfinished_archive_entry_as_empty_room() {
        let archive = Arc::new(MemoryArchive::new());
        archive.create("E000").await.unwrap();
        let lobby = Lobby::new(archive, DEFAULT_NONCE_ATTEMPTS);

        assert_eq!(
            lobby.join_room("bob", "E000", JoinIntent::Player).await,
            Ok(RoomRole::Player)
        );
        let room = lobby.room_overview("E000").await.unwrap();
        assert!(!room.started);
        assert_eq!(room.players, vec!["bob"]);
    }

    #[tokio::test]
    async fn connection_sum_invariant_holds_across_operations() {
        let lobby = test_lobby();
        let code = lobby.create_room("alice").await.unwrap();
        lobby.join_room("bob", &code, JoinIntent::Player).await.unwrap();
        lobby.mark_started(&code).await.unwrap();

        lobby.view_room("alice", &code).await.unwrap();
        lobby.view_room("alice", &code).await.unwrap();
        lobby.view_room("bob", &code).await.unwrap();
        lobby.attach_socket("alice", &code, "sock-1").await;
        lobby.attach_socket("alice", &code, "sock-2").await;
        lobby.attach_socket("bob", &code, "sock-3").await;
        lobby.detach_socket("alice", &code, "sock-2").await;

        let room = lobby.room_overview(&code).await.unwrap();
        assert_eq!(room.connection_count, 2);
        assert_eq!(lobby.user_connection_sum(&code).await, 2);
        assert_eq!(room.sockets, vec!["sock-1", "sock-3"]);
    }

    #[tokio::test]
    async fn finished_room_is_retired_after_last_disconnect() {
        let lobby = test_lobby();
        let code = lobby.create_room("alice").await.unwrap();
        lobby.mark_started(&code).await.unwrap();
        lobby.view_room("alice", &code).await.unwrap();
        lobby.attach_socket("alice", &code, "sock-1").await;
        lobby.mark_finished(&code).await.unwrap();

        assert!(lobby.room_overview(&code).await.is_some());
        lobby.detach_socket("alice", &code, "sock-1").await;
        assert!(lobby.room_overview(&code).await.is_none());

        // The archive is now the source of truth; a view reconstructs.
        let ctx = lobby.view_room("eve", &code).await.unwrap();
        assert!(ctx.finished);
        assert_eq!(ctx.players, vec!["alice"]);
    }

    #[tokio::test]
    async fn mark_finished_with_no_connections_retires_immediately() {
        let lobby = test_lobby();
        let code = lobby.create_room("alice").await.unwrap();
        lobby.mark_started(&code).await.unwrap();
        lobby.mark_finished(&code).await.unwrap();

        assert!(lobby.room_overview(&code).await.is_none());
    }

    #[tokio::test]
    async fn active_rooms_lists_only_games_in_progress() {
        let lobby = test_lobby();
        let staging = lobby.create_room("alice").await.unwrap();
        let active = lobby.create_room("alice").await.unwrap();
        lobby.mark_started(&active).await.unwrap();

        assert_eq!(lobby.active_rooms_for("alice").await, vec![active.clone()]);
        assert!(!lobby.active_rooms_for("alice").await.contains(&staging));
        assert!(lobby.active_rooms_for("nobody").await.is_empty());
    }

    #[tokio::test]
    async fn restart_rebuilds_membership_from_scratch() {
        let archive = Arc::new(MemoryArchive::new());
        let lobby = Lobby::new(archive.clone(), DEFAULT_NONCE_ATTEMPTS);
        let code = lobby.create_room("alice").await.unwrap();
        lobby.mark_started(&code).await.unwrap();

        // Process restart: fresh registries, same archive. The unfinished
        // record makes the room exist but empty; the returning user is a
        // first-time player again.
        let lobby = Lobby::new(archive, DEFAULT_NONCE_ATTEMPTS);
        assert_eq!(
            lobby.join_room("alice", &code, JoinIntent::Player).await,
            Ok(RoomRole::Player)
        );
        let room = lobby.room_overview(&code).await.unwrap();
        assert!(!room.started);
        assert_eq!(room.players, vec!["alice"]);
    }

    #[tokio::test]
    async fn exhausted_code_space_is_a_fatal_error() {
        let lobby = Lobby::new(Arc::new(SaturatedArchive), 8);
        assert_eq!(
            lobby.create_room("alice").await,
            Err(LobbyError::NonceSpaceExhausted)
        );
    }
}
