//! Match search over the queued lobbies
//!
//! The search tries three tiers in order and stops at the first success:
//!
//! 1. **Human only** - any subset of the whole queue holding exactly six
//!    players that splits into two teams of exactly three.
//! 2. **AI eligible** - the same search restricted to AI-eligible lobbies.
//! 3. **AI assisted** - only once an AI-eligible lobby has waited past the
//!    synthetic-fill threshold. Subsets of the AI-eligible lobbies are tried
//!    by human total, six down to one, and each team's shortfall below three
//!    is filled with synthetic players.
//!
//! Subsets are enumerated by include/exclude backtracking in queue order and
//! the first valid combination wins. There is no global optimisation. Branches
//! whose running total exceeds the target are pruned. Worst case is still
//! exponential in queue length.

use crate::config::MatchmakingConfig;
use crate::lobby::instance::{Lobby, LOBBY_CAPACITY};
use crate::matchmaking::eligibility::EligibilityClock;
use crate::types::{LobbyId, MatchTier, MATCH_SIZE, TEAM_SIZE};
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

/// Rule deciding whether a set of lobbies may share a team
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassPolicy {
    /// Any classes may be combined
    MixAllowed,
    /// Every lobby on a team must share one class
    SameClassOnly,
}

impl ClassPolicy {
    pub fn from_config(config: &MatchmakingConfig) -> Self {
        if config.allow_class_mix {
            ClassPolicy::MixAllowed
        } else {
            ClassPolicy::SameClassOnly
        }
    }

    /// Check a team; empty and single-lobby teams are always compatible
    pub fn is_compatible(&self, team: &[&dyn Lobby]) -> bool {
        match self {
            ClassPolicy::MixAllowed => true,
            ClassPolicy::SameClassOnly => match team.split_first() {
                Some((first, rest)) => rest
                    .iter()
                    .all(|lobby| lobby.class_id() == first.class_id()),
                None => true,
            },
        }
    }
}

/// Two teams found by the search
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchResult {
    pub tier: MatchTier,
    pub team1: Vec<LobbyId>,
    pub team2: Vec<LobbyId>,
    /// Synthetic players needed to complete team 1
    pub team1_fill: usize,
    /// Synthetic players needed to complete team 2
    pub team2_fill: usize,
}

impl MatchResult {
    pub fn synthetic_fill_count(&self) -> usize {
        self.team1_fill + self.team2_fill
    }

    /// Every lobby in either team
    pub fn lobby_ids(&self) -> impl Iterator<Item = LobbyId> + '_ {
        self.team1.iter().chain(self.team2.iter()).copied()
    }
}

/// Trait for match search algorithms
pub trait MatchSearch: Send + Sync {
    /// Look for two teams among the queued lobbies (oldest first).
    ///
    /// `None` is the ordinary "not yet" outcome and leaves the queue untouched.
    fn find_match(
        &self,
        queue: &[&dyn Lobby],
        config: &MatchmakingConfig,
        now: DateTime<Utc>,
    ) -> Option<MatchResult>;
}

/// Team split expressed as indices into the searched pool
#[derive(Debug)]
struct Teams {
    team1: Vec<usize>,
    team2: Vec<usize>,
    team1_humans: usize,
    team2_humans: usize,
}

impl Teams {
    fn into_result(self, pool: &[&dyn Lobby], tier: MatchTier) -> MatchResult {
        let ids = |team: &[usize]| -> Vec<LobbyId> {
            team.iter().map(|&index| pool[index].lobby_id()).collect()
        };
        MatchResult {
            tier,
            team1: ids(&self.team1),
            team2: ids(&self.team2),
            team1_fill: TEAM_SIZE - self.team1_humans,
            team2_fill: TEAM_SIZE - self.team2_humans,
        }
    }
}

fn humans(pool: &[&dyn Lobby], members: &[usize]) -> usize {
    members.iter().map(|&index| pool[index].player_count()).sum()
}

fn team_lobbies<'a>(pool: &[&'a dyn Lobby], team: &[usize]) -> Vec<&'a dyn Lobby> {
    team.iter().map(|&index| pool[index]).collect()
}

/// Split `members` into two teams of at most three humans each
fn split_teams(pool: &[&dyn Lobby], members: &[usize], policy: ClassPolicy) -> Option<Teams> {
    let needed_fill = MATCH_SIZE.checked_sub(humans(pool, members))?;
    let mut team1 = Vec::with_capacity(members.len());
    split_from(pool, members, 0, &mut team1, 0, needed_fill, policy)
}

fn split_from(
    pool: &[&dyn Lobby],
    members: &[usize],
    next: usize,
    team1: &mut Vec<usize>,
    team1_humans: usize,
    needed_fill: usize,
    policy: ClassPolicy,
) -> Option<Teams> {
    if next == members.len() {
        let team2: Vec<usize> = members
            .iter()
            .copied()
            .filter(|index| !team1.contains(index))
            .collect();
        let team2_humans = humans(pool, &team2);
        if team2_humans > TEAM_SIZE {
            return None;
        }
        if (TEAM_SIZE - team1_humans) + (TEAM_SIZE - team2_humans) != needed_fill {
            return None;
        }

        if !policy.is_compatible(&team_lobbies(pool, team1))
            || !policy.is_compatible(&team_lobbies(pool, &team2))
        {
            return None;
        }

        return Some(Teams {
            team1: team1.clone(),
            team2,
            team1_humans,
            team2_humans,
        });
    }

    let index = members[next];
    let count = pool[index].player_count();

    if team1_humans + count <= TEAM_SIZE {
        team1.push(index);
        let found = split_from(pool, members, next + 1, team1, team1_humans + count, needed_fill, policy);
        team1.pop();
        if found.is_some() {
            return found;
        }
    }

    split_from(pool, members, next + 1, team1, team1_humans, needed_fill, policy)
}

/// Find a subset of exactly six players that splits into two full teams
fn find_full_match(pool: &[&dyn Lobby], policy: ClassPolicy) -> Option<Teams> {
    let mut chosen = Vec::with_capacity(MATCH_SIZE);
    search_total(pool, 0, MATCH_SIZE, 0, &mut chosen, policy)
}

/// Find the subset with the most humans that splits into two teams of at most three
fn find_assisted_match(pool: &[&dyn Lobby], policy: ClassPolicy) -> Option<Teams> {
    (1..=MATCH_SIZE).rev().find_map(|target| {
        let mut chosen = Vec::with_capacity(target);
        search_total(pool, 0, target, 0, &mut chosen, policy)
    })
}

/// Include-first walk over subsets whose human total is exactly `target`
fn search_total(
    pool: &[&dyn Lobby],
    start: usize,
    target: usize,
    total: usize,
    chosen: &mut Vec<usize>,
    policy: ClassPolicy,
) -> Option<Teams> {
    if total == target {
        return split_teams(pool, chosen, policy);
    }
    if start == pool.len() {
        return None;
    }

    let count = pool[start].player_count();
    if total + count <= target {
        chosen.push(start);
        let found = search_total(pool, start + 1, target, total + count, chosen, policy);
        chosen.pop();
        if found.is_some() {
            return found;
        }
    }

    search_total(pool, start + 1, target, total, chosen, policy)
}

/// Default three-tier search
#[derive(Debug, Clone, Copy, Default)]
pub struct TieredMatchSearch {
    eligibility: EligibilityClock,
}

impl TieredMatchSearch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop lobbies that cannot legally be queued
    fn sanitize<'a>(queue: &[&'a dyn Lobby]) -> Vec<&'a dyn Lobby> {
        queue
            .iter()
            .copied()
            .filter(|lobby| {
                let count = lobby.player_count();
                let valid = count > 0 && count <= LOBBY_CAPACITY && lobby.all_ready();
                if !valid {
                    warn!(
                        "Excluding lobby {} from search: {} players, all_ready={}",
                        lobby.lobby_id(),
                        count,
                        lobby.all_ready()
                    );
                }
                valid
            })
            .collect()
    }
}

impl MatchSearch for TieredMatchSearch {
    fn find_match(
        &self,
        queue: &[&dyn Lobby],
        config: &MatchmakingConfig,
        now: DateTime<Utc>,
    ) -> Option<MatchResult> {
        let policy = ClassPolicy::from_config(config);
        let pool = Self::sanitize(queue);

        if let Some(teams) = find_full_match(&pool, policy) {
            debug!("Human-only match found among {} queued lobbies", pool.len());
            return Some(teams.into_result(&pool, MatchTier::HumanOnly));
        }

        let eligible: Vec<&dyn Lobby> = pool
            .iter()
            .copied()
            .filter(|lobby| lobby.ai_eligible())
            .collect();
        if eligible.is_empty() {
            return None;
        }

        // Subset of the tier 1 pool, so this never finds a new match
        if let Some(teams) = find_full_match(&eligible, policy) {
            debug!("AI-eligible match found among {} eligible lobbies", eligible.len());
            return Some(teams.into_result(&eligible, MatchTier::AiEligible));
        }

        let ai_ready = eligible
            .iter()
            .any(|lobby| self.eligibility.is_ai_ready(*lobby, config, now));
        if !ai_ready {
            return None;
        }

        let found = find_assisted_match(&eligible, policy)
            .map(|teams| teams.into_result(&eligible, MatchTier::AiAssisted));
        if let Some(result) = &found {
            debug!(
                "AI-assisted match found with {} synthetic players",
                result.synthetic_fill_count()
            );
        }
        found
    }
}
