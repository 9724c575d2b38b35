//! Handler modules

pub mod connection;
pub mod game;
pub mod pages;

pub use connection::*;
pub use game::*;
pub use pages::*;
