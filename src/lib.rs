//! Triad Queue - tick-driven 3v3 matchmaking
//!
//! This crate consolidates small lobbies (one to three players) into matches of
//! two teams of three, escalating to AI-eligible and synthetic-fill matches as
//! lobbies wait longer.

pub mod clock;
pub mod config;
pub mod error;
pub mod events;
pub mod lobby;
pub mod matchmaking;
pub mod metrics;
pub mod scenario;
pub mod service;
pub mod types;
pub mod utils;

// Re-export commonly used types and traits
pub use error::{MatchmakingError, Result};
pub use types::*;

// Re-export key components
pub use clock::{Clock, ManualClock, SystemClock};
pub use events::EventPublisher;
pub use lobby::{Lobby, LobbyInstance};
pub use matchmaking::{Matchmaker, MatchSearch, TickReport};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
