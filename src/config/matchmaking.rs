//! Runtime-tunable matchmaking configuration
//!
//! These values are owned by the engine and may be replaced between ticks.
//! Nothing here is process-global.

use crate::error::{MatchmakingError, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Matchmaking behaviour knobs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchmakingConfig {
    /// Allow lobbies of different classes on the same team
    pub allow_class_mix: bool,
    /// Continuous queue time after which a lobby becomes AI-eligible
    pub ai_eligible_time_ms: u64,
    /// Queue time after which an AI-eligible lobby may force synthetic fill
    pub ai_ready_threshold_ms: u64,
    /// Upper bound on matches formed in a single tick
    pub max_matches_per_tick: usize,
}

impl Default for MatchmakingConfig {
    fn default() -> Self {
        Self {
            allow_class_mix: true,
            ai_eligible_time_ms: 30_000,   // 30 seconds
            ai_ready_threshold_ms: 60_000, // 1 minute
            max_matches_per_tick: 1,
        }
    }
}

impl MatchmakingConfig {
    /// Validate the configuration
    ///
    /// A threshold below the eligibility time is allowed but makes the staged
    /// policy collapse into a single step, so it is only reported.
    pub fn validate(&self) -> Result<()> {
        if self.max_matches_per_tick == 0 {
            return Err(MatchmakingError::ConfigurationError {
                message: "max_matches_per_tick must be at least 1".to_string(),
            }
            .into());
        }

        if self.ai_eligible_time_ms > i64::MAX as u64 || self.ai_ready_threshold_ms > i64::MAX as u64
        {
            return Err(MatchmakingError::ConfigurationError {
                message: "AI wait times are out of range".to_string(),
            }
            .into());
        }

        if self.ai_ready_threshold_ms < self.ai_eligible_time_ms {
            warn!(
                "ai_ready_threshold_ms ({}) is below ai_eligible_time_ms ({}); synthetic fill will trigger as soon as lobbies become eligible",
                self.ai_ready_threshold_ms, self.ai_eligible_time_ms
            );
        }

        Ok(())
    }
}
