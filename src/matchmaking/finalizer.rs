//! Turns a search result into a committed match
//!
//! Every check runs before anything is mutated, so a rejected result leaves
//! queue and roster exactly as they were.

use crate::error::{MatchmakingError, Result};
use crate::lobby::instance::Lobby;
use crate::lobby::roster::LobbyRoster;
use crate::matchmaking::queue::MatchQueue;
use crate::matchmaking::search::MatchResult;
use crate::types::{LobbyConsumed, LobbyId, LobbySnapshot, MatchCreated, TEAM_SIZE};
use crate::utils::generate_match_id;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use tracing::info;

/// A committed match and the lobbies it consumed
#[derive(Debug, Clone)]
pub struct FinalizedMatch {
    pub event: MatchCreated,
    pub consumed: Vec<LobbyConsumed>,
}

/// Removes matched lobbies from the pool and builds the match report
#[derive(Debug, Clone, Copy, Default)]
pub struct MatchFinalizer;

impl MatchFinalizer {
    pub fn new() -> Self {
        Self
    }

    fn snapshot_team(
        roster: &LobbyRoster,
        team: &[LobbyId],
        fill: usize,
        now: DateTime<Utc>,
    ) -> Result<Vec<LobbySnapshot>> {
        let snapshots = team
            .iter()
            .map(|lobby_id| roster.require(*lobby_id).map(|lobby| lobby.snapshot(now)))
            .collect::<Result<Vec<_>>>()?;

        let humans = MatchCreated::team_humans(&snapshots);
        if humans + fill != TEAM_SIZE {
            return Err(MatchmakingError::InternalError {
                message: format!(
                    "team {:?} has {} players and {} synthetic fill, expected {}",
                    team, humans, fill, TEAM_SIZE
                ),
            }
            .into());
        }

        Ok(snapshots)
    }

    /// Validate `result` against the current queue, then consume its lobbies
    pub fn finalize(
        &self,
        result: &MatchResult,
        queue: &mut MatchQueue,
        roster: &mut LobbyRoster,
        now: DateTime<Utc>,
    ) -> Result<FinalizedMatch> {
        let mut seen = HashSet::new();
        for lobby_id in result.lobby_ids() {
            if !seen.insert(lobby_id) {
                return Err(MatchmakingError::InternalError {
                    message: format!("lobby {} appears twice in one match", lobby_id),
                }
                .into());
            }
            if !queue.contains(lobby_id) {
                return Err(MatchmakingError::InternalError {
                    message: format!("matched lobby {} is not queued", lobby_id),
                }
                .into());
            }
            if !roster.require(lobby_id)?.all_ready() {
                return Err(MatchmakingError::LobbyNotReady { lobby_id }.into());
            }
        }

        let team1 = Self::snapshot_team(roster, &result.team1, result.team1_fill, now)?;
        let team2 = Self::snapshot_team(roster, &result.team2, result.team2_fill, now)?;

        let match_id = generate_match_id();
        let mut consumed = Vec::with_capacity(seen.len());

        for lobby_id in result.lobby_ids() {
            queue.remove(lobby_id);
            if let Some(mut lobby) = roster.remove(lobby_id) {
                lobby.mark_dequeued();
            }
            consumed.push(LobbyConsumed {
                lobby_id,
                match_id,
                timestamp: now,
            });
        }

        let event = MatchCreated {
            match_id,
            tier: result.tier,
            team1,
            team2,
            team1_fill: result.team1_fill,
            team2_fill: result.team2_fill,
            synthetic_fill_count: result.synthetic_fill_count(),
            timestamp: now,
        };

        info!(
            "Match {} created ({}) - team1: {:?} (+{} AI), team2: {:?} (+{} AI)",
            match_id, event.tier, result.team1, event.team1_fill, result.team2, event.team2_fill
        );

        Ok(FinalizedMatch { event, consumed })
    }
}
