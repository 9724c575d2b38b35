//! In-memory room/session coordination core

pub mod controller;
pub mod error;
pub mod nonce;
pub mod registry;
pub mod room;
pub mod user;

pub use controller::{Lobby, ViewContext, DEFAULT_NONCE_ATTEMPTS};
pub use error::LobbyError;
pub use room::{JoinIntent, RoomRole};
