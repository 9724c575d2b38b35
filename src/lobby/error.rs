//! Lobby error taxonomy

use thiserror::Error;

/// Errors surfaced by the room lifecycle controller.
///
/// All variants except `NonceSpaceExhausted` are user-visible and are
/// converted to a redirect-with-message at the handler boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LobbyError {
    #[error("The Room ID you entered ({room}) does not exist!")]
    RoomNotFound { room: String },

    #[error(
        "You cannot join as a player in that room ({room}) because either \
         the game has started, the game has ended, or there are already 3 \
         players in it."
    )]
    RoomFull { room: String },

    #[error(
        "You cannot join as a spectator in that room ({room}) because that \
         game has not finished and you are a player in that room. Please \
         join the room as a player."
    )]
    PlayerMustRejoin { room: String },

    #[error(
        "The Room you tried to visit (ID of {room}) has not started its \
         game yet. Please join it as a player or a spectator first."
    )]
    GameNotStarted { room: String },

    #[error("could not allocate a free room code")]
    NonceSpaceExhausted,
}

impl LobbyError {
    /// Whether the error is recoverable by the user (redirect with message)
    /// rather than a hard server failure.
    pub fn is_user_visible(&self) -> bool {
        !matches!(self, LobbyError::NonceSpaceExhausted)
    }
}
