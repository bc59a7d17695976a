//! Lobby model for the matchmaking engine
//!
//! This module holds the lobby entity (fixed member slots with ready flags)
//! and the roster that owns every lobby and allocates ids.

pub mod instance;
pub mod roster;

// Re-export commonly used types
pub use instance::{Lobby, LobbyInstance, Member, LOBBY_CAPACITY};
pub use roster::LobbyRoster;
