//! Scripted queue scenarios
//!
//! A scenario describes lobbies and when their members ready up (and
//! optionally un-ready). [`Scenario::run`] replays that timeline against a
//! [`Matchmaker`] driven by a [`ManualClock`], so the result is fully
//! deterministic.
//!
//! ```toml
//! name = "two full lobbies"
//! tick_interval_ms = 1000
//! ticks = 3
//!
//! [matchmaking]
//! allow_class_mix = false
//!
//! [[lobbies]]
//! class_id = 0
//! members = ["ana", "bo", "cy"]
//!
//! [[lobbies]]
//! class_id = 0
//! members = ["dee", "eli", "fay"]
//! ready_at_ms = 500
//! ```

use crate::clock::ManualClock;
use crate::config::MatchmakingConfig;
use crate::error::{MatchmakingError, Result};
use crate::lobby::{Lobby, LOBBY_CAPACITY};
use crate::matchmaking::{Matchmaker, MatchmakerStats};
use crate::types::{ClassId, LobbyId, LobbySnapshot, MatchCreated, MatchTier};
use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

fn default_tick_interval_ms() -> u64 {
    1000
}

fn default_ticks() -> u64 {
    10
}

/// One lobby in a scenario
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioLobby {
    #[serde(default)]
    pub class_id: ClassId,
    pub members: Vec<String>,
    /// When every member readies up
    #[serde(default)]
    pub ready_at_ms: u64,
    /// When the first member un-readies, if ever
    #[serde(default)]
    pub unready_at_ms: Option<u64>,
}

/// A scripted run of the engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    #[serde(default = "default_ticks")]
    pub ticks: u64,
    #[serde(default)]
    pub matchmaking: MatchmakingConfig,
    #[serde(default)]
    pub lobbies: Vec<ScenarioLobby>,
}

/// A match produced during a scenario run
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioMatch {
    pub tick: u64,
    pub at_ms: u64,
    pub tier: MatchTier,
    /// Scenario lobby indices on each team
    pub team1: Vec<usize>,
    pub team2: Vec<usize>,
    pub synthetic_fill_count: usize,
    pub event: MatchCreated,
}

/// Result of running a scenario
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioOutcome {
    pub name: String,
    pub ticks_run: u64,
    pub matches: Vec<ScenarioMatch>,
    /// Scenario lobby indices still queued when the run ended, oldest first
    pub remaining: Vec<usize>,
    pub stats: MatchmakerStats,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum TimelineAction {
    Ready,
    Unready,
}

impl Scenario {
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let scenario: Scenario = toml::from_str(raw).map_err(|e| MatchmakingError::InvalidScenario {
            reason: e.to_string(),
        })?;
        scenario.validate()?;
        Ok(scenario)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read scenario file {}", path.display()))?;
        Self::from_toml_str(&raw)
    }

    fn invalid(reason: String) -> anyhow::Error {
        MatchmakingError::InvalidScenario { reason }.into()
    }

    pub fn validate(&self) -> Result<()> {
        if self.tick_interval_ms == 0 {
            return Err(Self::invalid("tick_interval_ms must be greater than 0".to_string()));
        }
        if self.ticks == 0 {
            return Err(Self::invalid("ticks must be greater than 0".to_string()));
        }
        self.matchmaking.validate()?;

        for (index, lobby) in self.lobbies.iter().enumerate() {
            if lobby.members.is_empty() || lobby.members.len() > LOBBY_CAPACITY {
                return Err(Self::invalid(format!(
                    "lobby {} has {} members, expected 1 to {}",
                    index,
                    lobby.members.len(),
                    LOBBY_CAPACITY
                )));
            }
            let unique: HashSet<&String> = lobby.members.iter().collect();
            if unique.len() != lobby.members.len() {
                return Err(Self::invalid(format!("lobby {} has duplicate member names", index)));
            }
            if let Some(unready_at) = lobby.unready_at_ms {
                if unready_at <= lobby.ready_at_ms {
                    return Err(Self::invalid(format!(
                        "lobby {} un-readies at {}ms, before it readies at {}ms",
                        index, unready_at, lobby.ready_at_ms
                    )));
                }
            }
        }
        Ok(())
    }

    /// Runs start at the Unix epoch so they are reproducible
    fn start_time() -> DateTime<Utc> {
        DateTime::<Utc>::default()
    }

    fn timeline(&self) -> Vec<(u64, TimelineAction, usize)> {
        let mut timeline: Vec<(u64, TimelineAction, usize)> = self
            .lobbies
            .iter()
            .enumerate()
            .flat_map(|(index, lobby)| {
                let ready = Some((lobby.ready_at_ms, TimelineAction::Ready, index));
                let unready = lobby
                    .unready_at_ms
                    .map(|at| (at, TimelineAction::Unready, index));
                ready.into_iter().chain(unready)
            })
            .collect();
        timeline.sort();
        timeline
    }

    /// Replay the scenario; ticks happen every `tick_interval_ms`, starting one
    /// interval after time zero
    pub fn run(&self) -> Result<ScenarioOutcome> {
        self.validate()?;
        info!(
            "Running scenario '{}' - {} lobbies, {} ticks of {}ms",
            self.name,
            self.lobbies.len(),
            self.ticks,
            self.tick_interval_ms
        );

        let start = Self::start_time();
        let clock = ManualClock::new(start);
        let mut engine = Matchmaker::new(self.matchmaking.clone(), Arc::new(clock.clone()))?;

        let mut ids = Vec::with_capacity(self.lobbies.len());
        for lobby in &self.lobbies {
            let lobby_id = engine.create_lobby(lobby.class_id);
            for member in &lobby.members {
                engine.add_member(lobby_id, member.clone())?;
            }
            ids.push(lobby_id);
        }
        let index_of: HashMap<LobbyId, usize> = ids
            .iter()
            .enumerate()
            .map(|(index, lobby_id)| (*lobby_id, index))
            .collect();
        let to_indices = |team: &[LobbySnapshot]| -> Vec<usize> {
            team.iter()
                .filter_map(|lobby| index_of.get(&lobby.lobby_id).copied())
                .collect()
        };

        let timeline = self.timeline();
        let mut next_action = 0;
        let mut matches = Vec::new();

        for tick in 1..=self.ticks {
            let tick_at = tick * self.tick_interval_ms;

            while let Some(&(at, action, index)) = timeline.get(next_action) {
                if at > tick_at {
                    break;
                }
                next_action += 1;
                clock.set(start + chrono::Duration::milliseconds(at as i64));
                self.apply(&mut engine, ids[index], action)?;
            }

            clock.set(start + chrono::Duration::milliseconds(tick_at as i64));
            let report = engine.tick();

            for event in report.matches {
                debug!("Scenario '{}' tick {} produced match {}", self.name, tick, event.match_id);
                matches.push(ScenarioMatch {
                    tick,
                    at_ms: tick_at,
                    tier: event.tier,
                    team1: to_indices(&event.team1),
                    team2: to_indices(&event.team2),
                    synthetic_fill_count: event.synthetic_fill_count,
                    event,
                });
            }
        }

        let remaining = engine
            .queued_lobbies()
            .iter()
            .filter_map(|lobby| index_of.get(&lobby.lobby_id()).copied())
            .collect();

        Ok(ScenarioOutcome {
            name: self.name.clone(),
            ticks_run: self.ticks,
            matches,
            remaining,
            stats: engine.stats(),
        })
    }

    fn apply(&self, engine: &mut Matchmaker, lobby_id: LobbyId, action: TimelineAction) -> Result<()> {
        // A lobby consumed by an earlier match no longer exists
        let Some(lobby) = engine.lobby(lobby_id) else {
            return Ok(());
        };
        let slots: Vec<usize> = lobby
            .slots()
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.is_some())
            .map(|(slot, _)| slot)
            .collect();

        match action {
            TimelineAction::Ready => {
                for slot in slots {
                    engine.set_member_ready(lobby_id, slot, true)?;
                }
            }
            TimelineAction::Unready => {
                if let Some(&slot) = slots.first() {
                    engine.set_member_ready(lobby_id, slot, false)?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_FULL_LOBBIES: &str = r#"
name = "two full lobbies"
ticks = 2

[[lobbies]]
members = ["a", "b", "c"]

[[lobbies]]
members = ["d", "e", "f"]
ready_at_ms = 1500
"#;

    #[test]
    fn test_parse_with_defaults() {
        let scenario = Scenario::from_toml_str(TWO_FULL_LOBBIES).unwrap();
        assert_eq!(scenario.tick_interval_ms, 1000);
        assert_eq!(scenario.lobbies.len(), 2);
        assert_eq!(scenario.lobbies[0].class_id, 0);
        assert_eq!(scenario.matchmaking, MatchmakingConfig::default());
    }

    #[test]
    fn test_match_happens_on_first_tick_after_ready() {
        let outcome = Scenario::from_toml_str(TWO_FULL_LOBBIES).unwrap().run().unwrap();
        assert_eq!(outcome.matches.len(), 1);
        assert_eq!(outcome.matches[0].tick, 2);
        assert_eq!(outcome.matches[0].at_ms, 2000);
        assert_eq!(outcome.matches[0].tier, MatchTier::HumanOnly);
        assert!(outcome.remaining.is_empty());
        assert_eq!(outcome.stats.ticks, 2);
    }

    #[test]
    fn test_unready_lobby_is_not_matched() {
        let raw = r#"
name = "late unready"
ticks = 3

[[lobbies]]
members = ["a", "b", "c"]
unready_at_ms = 500

[[lobbies]]
members = ["d", "e", "f"]
"#;
        let outcome = Scenario::from_toml_str(raw).unwrap().run().unwrap();
        assert!(outcome.matches.is_empty());
        assert_eq!(outcome.remaining, vec![1]);
    }

    #[test]
    fn test_waiting_lobby_gets_synthetic_fill() {
        let raw = r#"
name = "lonely pair"
tick_interval_ms = 1000
ticks = 5

[matchmaking]
ai_eligible_time_ms = 2000
ai_ready_threshold_ms = 4000

[[lobbies]]
members = ["a", "b"]
"#;
        let outcome = Scenario::from_toml_str(raw).unwrap().run().unwrap();
        assert_eq!(outcome.matches.len(), 1);
        assert_eq!(outcome.matches[0].tick, 4);
        assert_eq!(outcome.matches[0].tier, MatchTier::AiAssisted);
        assert_eq!(outcome.matches[0].synthetic_fill_count, 4);
    }

    #[test]
    fn test_invalid_scenarios_rejected() {
        let too_many = r#"
name = "crowded"
[[lobbies]]
members = ["a", "b", "c", "d"]
"#;
        let duplicate = r#"
name = "twins"
[[lobbies]]
members = ["a", "a"]
"#;
        let backwards = r#"
name = "backwards"
[[lobbies]]
members = ["a"]
ready_at_ms = 1000
unready_at_ms = 1000
"#;
        let no_ticks = r#"
name = "frozen"
ticks = 0
"#;
        for raw in [too_many, duplicate, backwards, no_ticks] {
            let err = Scenario::from_toml_str(raw).unwrap_err();
            assert!(matches!(
                err.downcast_ref::<MatchmakingError>(),
                Some(MatchmakingError::InvalidScenario { .. })
            ));
        }
    }
}
