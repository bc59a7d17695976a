//! Configuration management for the triad-queue service
//!
//! This module handles configuration loading from environment variables and
//! TOML files, validation, and default values for the matchmaking engine.

pub mod app;
pub mod matchmaking;

// Re-export commonly used types
pub use app::{validate_config, AppConfig, ServiceSettings};
pub use matchmaking::MatchmakingConfig;
