//! Shared helpers for integration tests

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;
use triad_queue::config::MatchmakingConfig;
use triad_queue::lobby::Lobby;
use triad_queue::scenario::Scenario;
use triad_queue::types::{ClassId, LobbyId, MatchCreated};
use triad_queue::{ManualClock, Matchmaker};

/// Fixed starting instant so every test sees the same timestamps
pub fn start_time() -> chrono::DateTime<chrono::Utc> {
    chrono::DateTime::parse_from_rfc3339("2024-05-01T12:00:00Z")
        .unwrap()
        .with_timezone(&chrono::Utc)
}

/// Engine driven by a manual clock with the given config
pub fn engine_with(config: MatchmakingConfig) -> (Matchmaker, ManualClock) {
    let clock = ManualClock::new(start_time());
    let engine = Matchmaker::new(config, Arc::new(clock.clone())).unwrap();
    (engine, clock)
}

/// Engine with default config: class mix allowed, 30s eligibility, 60s fill threshold
pub fn test_engine() -> (Matchmaker, ManualClock) {
    engine_with(MatchmakingConfig::default())
}

pub fn restricted_config() -> MatchmakingConfig {
    MatchmakingConfig {
        allow_class_mix: false,
        ..MatchmakingConfig::default()
    }
}

/// Create a lobby with the named members, all ready, so it joins the queue at the clock's time
pub fn ready_lobby(engine: &mut Matchmaker, class_id: ClassId, members: &[&str]) -> LobbyId {
    let lobby_id = unready_lobby(engine, class_id, members);
    for slot in 0..members.len() {
        engine.set_member_ready(lobby_id, slot, true).unwrap();
    }
    assert!(engine.is_queued(lobby_id));
    lobby_id
}

/// Create a lobby with the named members, none ready
pub fn unready_lobby(engine: &mut Matchmaker, class_id: ClassId, members: &[&str]) -> LobbyId {
    let lobby_id = engine.create_lobby(class_id);
    for member in members {
        engine.add_member(lobby_id, *member).unwrap();
    }
    lobby_id
}

/// Player counts of the queued lobbies, oldest first
pub fn queued_sizes(engine: &Matchmaker) -> Vec<usize> {
    engine
        .queued_lobbies()
        .iter()
        .map(|lobby| lobby.player_count())
        .collect()
}

/// Sorted lobby ids on each team of a match
pub fn team_ids(event: &MatchCreated) -> (Vec<LobbyId>, Vec<LobbyId>) {
    let mut team1: Vec<LobbyId> = event.team1.iter().map(|lobby| lobby.lobby_id).collect();
    let mut team2: Vec<LobbyId> = event.team2.iter().map(|lobby| lobby.lobby_id).collect();
    team1.sort_unstable();
    team2.sort_unstable();
    (team1, team2)
}

/// Load a scenario shipped under `demos/`
pub fn demo_scenario(file: &str) -> Scenario {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("demos")
        .join(file);
    Scenario::from_file(&path).unwrap()
}
