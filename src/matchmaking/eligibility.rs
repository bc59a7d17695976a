//! Per-tick promotion of queued lobbies to AI-eligible
//!
//! Promotion is monotonic: a flag that is already set is never cleared here.
//! Only leaving the queue resets it.

use crate::config::MatchmakingConfig;
use crate::lobby::instance::{Lobby, LobbyInstance};
use crate::types::LobbyId;
use crate::utils::waited_at_least;
use chrono::{DateTime, Utc};
use tracing::debug;

/// Stamps eligibility flags based on elapsed queue time
#[derive(Debug, Clone, Copy, Default)]
pub struct EligibilityClock;

impl EligibilityClock {
    pub fn new() -> Self {
        Self
    }

    /// Promote every queued lobby that has waited at least `ai_eligible_time_ms`.
    ///
    /// Returns the ids promoted by this call.
    pub fn update<'a, I>(&self, lobbies: I, config: &MatchmakingConfig, now: DateTime<Utc>) -> Vec<LobbyId>
    where
        I: IntoIterator<Item = &'a mut LobbyInstance>,
    {
        let mut promoted = Vec::new();

        for lobby in lobbies {
            if lobby.ai_eligible() {
                continue;
            }
            let Some(joined) = lobby.time_joined() else {
                continue;
            };

            if waited_at_least(joined, now, config.ai_eligible_time_ms) {
                lobby.mark_ai_eligible();
                debug!(
                    "Lobby {} is now AI-eligible after {}ms in queue",
                    lobby.lobby_id(),
                    lobby.waited_ms(now).unwrap_or(0)
                );
                promoted.push(lobby.lobby_id());
            }
        }

        promoted
    }

    /// An AI-eligible lobby that has also waited past the synthetic-fill threshold
    pub fn is_ai_ready(&self, lobby: &dyn Lobby, config: &MatchmakingConfig, now: DateTime<Utc>) -> bool {
        lobby.ai_eligible()
            && lobby
                .time_joined()
                .is_some_and(|joined| waited_at_least(joined, now, config.ai_ready_threshold_ms))
    }
}
