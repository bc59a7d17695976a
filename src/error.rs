//! Error types for the matchmaking engine
//!
//! This module defines all error types using anyhow for consistent error handling
//! throughout the application.

use crate::types::LobbyId;

/// Result type alias for convenience
pub type Result<T> = anyhow::Result<T>;

/// Custom error types for specific matchmaking scenarios
#[derive(Debug, thiserror::Error)]
pub enum MatchmakingError {
    #[error("Lobby not found: {lobby_id}")]
    LobbyNotFound { lobby_id: LobbyId },

    #[error("Lobby is full: {lobby_id}")]
    LobbyFull { lobby_id: LobbyId },

    #[error("Invalid member slot {slot} for lobby {lobby_id}")]
    InvalidSlot { lobby_id: LobbyId, slot: usize },

    #[error("No member in slot {slot} of lobby {lobby_id}")]
    MemberNotFound { lobby_id: LobbyId, slot: usize },

    #[error("Member '{name}' is already in lobby {lobby_id}")]
    DuplicateMember { lobby_id: LobbyId, name: String },

    #[error("Lobby {lobby_id} cannot be queued until every member is ready")]
    LobbyNotReady { lobby_id: LobbyId },

    #[error("Configuration error: {message}")]
    ConfigurationError { message: String },

    #[error("Invalid scenario: {reason}")]
    InvalidScenario { reason: String },

    #[error("Internal engine error: {message}")]
    InternalError { message: String },
}
