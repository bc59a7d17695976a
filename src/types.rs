//! Common types used throughout the matchmaking engine

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for lobbies, never reused while the engine lives
pub type LobbyId = u64;

/// Opaque lobby category; only equality matters to the engine
pub type ClassId = u32;

/// Unique identifier for created matches
pub type MatchId = Uuid;

/// Players per team
pub const TEAM_SIZE: usize = 3;

/// Players per match (two full teams)
pub const MATCH_SIZE: usize = TEAM_SIZE * 2;

/// Which search tier produced a match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchTier {
    /// Six human players drawn from the whole queue
    HumanOnly,
    /// Six human players drawn only from AI-eligible lobbies.
    ///
    /// `TieredMatchSearch` never reports this tier, since the human-only tier
    /// already searched those lobbies. Custom `MatchSearch` implementations may.
    AiEligible,
    /// Fewer than six humans, completed with synthetic fill
    AiAssisted,
}

impl MatchTier {
    /// Label used for metrics and logs
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchTier::HumanOnly => "human_only",
            MatchTier::AiEligible => "ai_eligible",
            MatchTier::AiAssisted => "ai_assisted",
        }
    }
}

impl std::fmt::Display for MatchTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Frozen view of a lobby at the moment it was matched
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LobbySnapshot {
    pub lobby_id: LobbyId,
    pub class_id: ClassId,
    pub members: Vec<String>,
    /// How long the lobby sat in the queue before being matched
    pub waited_ms: i64,
}

impl LobbySnapshot {
    pub fn player_count(&self) -> usize {
        self.members.len()
    }
}

/// Event emitted when two teams have been formed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchCreated {
    pub match_id: MatchId,
    pub tier: MatchTier,
    pub team1: Vec<LobbySnapshot>,
    pub team2: Vec<LobbySnapshot>,
    /// Synthetic players completing team 1
    pub team1_fill: usize,
    /// Synthetic players completing team 2
    pub team2_fill: usize,
    pub synthetic_fill_count: usize,
    pub timestamp: DateTime<Utc>,
}

impl MatchCreated {
    /// Human players on a team
    pub fn team_humans(team: &[LobbySnapshot]) -> usize {
        team.iter().map(LobbySnapshot::player_count).sum()
    }

    /// Human players across both teams
    pub fn human_count(&self) -> usize {
        Self::team_humans(&self.team1) + Self::team_humans(&self.team2)
    }

    /// Ids of every lobby consumed by this match
    pub fn lobby_ids(&self) -> Vec<LobbyId> {
        self.team1
            .iter()
            .chain(self.team2.iter())
            .map(|lobby| lobby.lobby_id)
            .collect()
    }
}

/// Notification that a matched lobby left the pool and should be deleted by its owner
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LobbyConsumed {
    pub lobby_id: LobbyId,
    pub match_id: MatchId,
    pub timestamp: DateTime<Utc>,
}

/// Union type for everything the engine emits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EngineEvent {
    MatchCreated(MatchCreated),
    LobbyConsumed(LobbyConsumed),
}

impl EngineEvent {
    /// Event name used for logging and filtering
    pub fn kind(&self) -> &'static str {
        match self {
            EngineEvent::MatchCreated(_) => "MatchCreated",
            EngineEvent::LobbyConsumed(_) => "LobbyConsumed",
        }
    }
}
