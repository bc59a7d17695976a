//! Integration tests for the triad-queue matchmaking engine
//!
//! These tests drive the public API end to end:
//! - Lobby lifecycle and queue membership
//! - Tiered search with a manual clock
//! - Event publishing through the tick scheduler
//! - The in-process event feed of the service

mod fixtures;

use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use triad_queue::config::{AppConfig, MatchmakingConfig};
use triad_queue::events::{MockEventPublisher, MATCH_CREATED_ROUTING_KEY};
use triad_queue::lobby::Lobby;
use triad_queue::service::{AppState, SharedMatchmaker, TickScheduler};
use triad_queue::types::{EngineEvent, MatchTier};

use fixtures::{
    engine_with, queued_sizes, ready_lobby, restricted_config, team_ids, test_engine,
    unready_lobby,
};

#[test]
fn test_two_full_lobbies_match_on_next_tick() {
    let (mut engine, clock) = test_engine();

    let first = ready_lobby(&mut engine, 0, &["ana", "bo", "cy"]);
    clock.advance_ms(250);
    let second = ready_lobby(&mut engine, 0, &["dee", "eli", "fay"]);

    let report = engine.tick();
    assert_eq!(report.matches.len(), 1);

    let event = &report.matches[0];
    assert_eq!(event.tier, MatchTier::HumanOnly);
    assert_eq!(event.synthetic_fill_count, 0);
    assert_eq!(event.human_count(), 6);
    assert_eq!(team_ids(event), (vec![first], vec![second]));
    assert_eq!(event.team1[0].waited_ms, 250);
    assert_eq!(event.team2[0].waited_ms, 0);

    assert!(engine.queued_lobbies().is_empty());
    assert!(engine.lobby(first).is_none());
    assert!(engine.lobby(second).is_none());
}

#[test]
fn test_consumed_lobbies_follow_their_match_in_event_order() {
    let (mut engine, _clock) = test_engine();

    let a = ready_lobby(&mut engine, 0, &["a1", "a2"]);
    let b = ready_lobby(&mut engine, 0, &["b1"]);
    let c = ready_lobby(&mut engine, 0, &["c1", "c2"]);
    let d = ready_lobby(&mut engine, 0, &["d1"]);

    let report = engine.tick();
    let events = report.events();
    assert_eq!(events.len(), 5);

    let EngineEvent::MatchCreated(created) = &events[0] else {
        panic!("first event should be MatchCreated, got {}", events[0].kind());
    };
    let mut consumed: Vec<u64> = events[1..]
        .iter()
        .map(|event| match event {
            EngineEvent::LobbyConsumed(consumed) => {
                assert_eq!(consumed.match_id, created.match_id);
                consumed.lobby_id
            }
            other => panic!("unexpected {}", other.kind()),
        })
        .collect();
    consumed.sort_unstable();
    assert_eq!(consumed, vec![a, b, c, d]);

    let stats = engine.stats();
    assert_eq!(stats.lobbies_consumed, 4);
    assert_eq!(stats.players_matched, 6);
    assert_eq!(stats.active_lobbies, 0);
}

#[test]
fn test_lobby_only_queued_while_everyone_is_ready() {
    let (mut engine, _clock) = test_engine();

    let lobby_id = unready_lobby(&mut engine, 0, &["ana", "bo"]);
    assert!(!engine.is_queued(lobby_id));

    engine.set_member_ready(lobby_id, 0, true).unwrap();
    assert!(!engine.is_queued(lobby_id));

    engine.set_member_ready(lobby_id, 1, true).unwrap();
    assert!(engine.is_queued(lobby_id));

    assert!(!engine.toggle_member_ready(lobby_id, 1).unwrap());
    assert!(!engine.is_queued(lobby_id));
    assert!(engine.lobby(lobby_id).unwrap().time_joined().is_none());

    // A newcomer is unready, so a ready lobby drops out when someone joins
    engine.set_member_ready(lobby_id, 1, true).unwrap();
    engine.add_member(lobby_id, "cy").unwrap();
    assert!(!engine.is_queued(lobby_id));
}

#[test]
fn test_member_removal_requeues_with_fresh_wait() {
    let (mut engine, clock) = test_engine();

    let lobby_id = ready_lobby(&mut engine, 0, &["ana", "bo"]);
    clock.advance_ms(45_000);
    engine.tick();
    assert!(engine.lobby(lobby_id).unwrap().ai_eligible());

    let removed = engine.remove_member(lobby_id, 1).unwrap();
    assert_eq!(removed.name, "bo");

    let lobby = engine.lobby(lobby_id).unwrap();
    assert!(engine.is_queued(lobby_id));
    assert!(!lobby.ai_eligible());
    assert_eq!(lobby.time_joined(), Some(engine.now()));
    assert_eq!(lobby.waited_ms(engine.now()), Some(0));
}

#[test]
fn test_oldest_lobbies_matched_first() {
    let (mut engine, clock) = test_engine();

    let oldest = ready_lobby(&mut engine, 0, &["a1", "a2", "a3"]);
    clock.advance_ms(10);
    let middle = ready_lobby(&mut engine, 0, &["b1", "b2", "b3"]);
    clock.advance_ms(10);
    let newest = ready_lobby(&mut engine, 0, &["c1", "c2", "c3"]);

    let report = engine.tick();
    assert_eq!(report.matches.len(), 1);
    assert_eq!(team_ids(&report.matches[0]), (vec![oldest], vec![middle]));
    assert_eq!(
        engine
            .queued_lobbies()
            .iter()
            .map(|lobby| lobby.lobby_id())
            .collect::<Vec<_>>(),
        vec![newest]
    );
}

#[test]
fn test_max_matches_per_tick_bounds_each_tick() {
    let (mut engine, _clock) = engine_with(MatchmakingConfig {
        max_matches_per_tick: 2,
        ..MatchmakingConfig::default()
    });

    for team in 0..5 {
        let names: Vec<String> = (0..3).map(|slot| format!("p{}-{}", team, slot)).collect();
        let names: Vec<&str> = names.iter().map(String::as_str).collect();
        ready_lobby(&mut engine, 0, &names);
    }

    let report = engine.tick();
    assert_eq!(report.matches.len(), 2);
    assert_eq!(queued_sizes(&engine), vec![3]);

    let report = engine.tick();
    assert!(report.matches.is_empty());
    assert_eq!(report.queue_len, 1);
}

#[test]
fn test_class_restriction_per_team() {
    // Class 0 single, class 1 pair, class 0 trio
    let build = |config: MatchmakingConfig| {
        let (mut engine, _clock) = engine_with(config);
        ready_lobby(&mut engine, 0, &["a1"]);
        ready_lobby(&mut engine, 1, &["b1", "b2"]);
        ready_lobby(&mut engine, 0, &["c1", "c2", "c3"]);
        engine
    };

    let mut restricted = build(restricted_config());
    assert!(restricted.tick().matches.is_empty());
    assert_eq!(queued_sizes(&restricted), vec![1, 2, 3]);

    let mut mixed = build(MatchmakingConfig::default());
    let report = mixed.tick();
    assert_eq!(report.matches.len(), 1);
    assert_eq!(report.matches[0].tier, MatchTier::HumanOnly);
}

#[test]
fn test_same_class_teams_may_face_each_other() {
    let (mut engine, _clock) = engine_with(restricted_config());
    ready_lobby(&mut engine, 4, &["a1", "a2", "a3"]);
    ready_lobby(&mut engine, 9, &["b1", "b2", "b3"]);

    let report = engine.tick();
    assert_eq!(report.matches.len(), 1);
    let event = &report.matches[0];
    assert!(event.team1.iter().all(|lobby| lobby.class_id == event.team1[0].class_id));
    assert!(event.team2.iter().all(|lobby| lobby.class_id == event.team2[0].class_id));
}

#[test]
fn test_class_mix_toggle_applies_on_next_tick() {
    let (mut engine, _clock) = engine_with(restricted_config());
    ready_lobby(&mut engine, 0, &["a1"]);
    ready_lobby(&mut engine, 1, &["b1", "b2"]);
    ready_lobby(&mut engine, 0, &["c1", "c2", "c3"]);

    assert!(engine.tick().matches.is_empty());

    engine.set_allow_class_mix(true).unwrap();
    assert_eq!(engine.tick().matches.len(), 1);
}

#[test]
fn test_lone_pair_gets_synthetic_fill_after_threshold() {
    let (mut engine, clock) = test_engine();
    let pair = ready_lobby(&mut engine, 0, &["ana", "bo"]);

    clock.advance_ms(29_999);
    let report = engine.tick();
    assert!(report.is_idle());

    clock.advance_ms(1);
    let report = engine.tick();
    assert_eq!(report.promoted, vec![pair]);
    assert!(report.matches.is_empty());

    clock.advance_ms(29_999);
    assert!(engine.tick().matches.is_empty());

    clock.advance_ms(1);
    let report = engine.tick();
    assert_eq!(report.matches.len(), 1);

    let event = &report.matches[0];
    assert_eq!(event.tier, MatchTier::AiAssisted);
    assert_eq!(event.synthetic_fill_count, 4);
    assert_eq!(event.team1_fill + event.team2_fill, 4);
    assert_eq!(event.lobby_ids(), vec![pair]);
    assert_eq!(event.team1[0].waited_ms, 60_000);
}

#[test]
fn test_lone_full_lobby_faces_synthetic_team() {
    let (mut engine, clock) = test_engine();
    ready_lobby(&mut engine, 0, &["ana", "bo", "cy"]);

    clock.advance_ms(59_000);
    engine.tick();
    assert!(engine.tick().matches.is_empty());

    clock.advance_ms(1_000);
    let report = engine.tick();
    let event = &report.matches[0];
    assert_eq!(event.tier, MatchTier::AiAssisted);
    assert_eq!(event.synthetic_fill_count, 3);
    assert!(event.team1.is_empty() || event.team2.is_empty());
}

#[test]
fn test_human_match_preferred_over_synthetic_fill() {
    let (mut engine, clock) = test_engine();
    let waiting = ready_lobby(&mut engine, 0, &["ana", "bo"]);

    clock.advance_ms(30_000);
    engine.tick();
    clock.advance_ms(40_000);

    ready_lobby(&mut engine, 0, &["cy", "dee", "eli"]);
    ready_lobby(&mut engine, 0, &["fay"]);

    let report = engine.tick();
    assert_eq!(report.matches.len(), 1);
    assert_eq!(report.matches[0].tier, MatchTier::HumanOnly);
    assert!(report.matches[0].lobby_ids().contains(&waiting));
}

#[test]
fn test_leftover_lobby_waits_for_fill_threshold() {
    let (mut engine, clock) = engine_with(MatchmakingConfig {
        ai_eligible_time_ms: 10_000,
        ai_ready_threshold_ms: 120_000,
        ..restricted_config()
    });

    // The class 1 pair cannot join the class 0 teams
    ready_lobby(&mut engine, 0, &["a1", "a2"]);
    ready_lobby(&mut engine, 0, &["b1"]);
    ready_lobby(&mut engine, 0, &["c1", "c2", "c3"]);
    ready_lobby(&mut engine, 1, &["d1", "d2"]);

    let report = engine.tick();
    assert_eq!(report.matches.len(), 1);
    assert_eq!(report.matches[0].tier, MatchTier::HumanOnly);
    assert_eq!(queued_sizes(&engine), vec![2]);

    clock.advance_ms(10_000);
    let report = engine.tick();
    assert_eq!(report.promoted.len(), 1);
    assert!(report.matches.is_empty());
}

#[test]
fn test_idle_tick_changes_nothing() {
    let (mut engine, clock) = test_engine();
    ready_lobby(&mut engine, 0, &["a1"]);
    ready_lobby(&mut engine, 1, &["b1", "b2"]);
    clock.advance_ms(1_000);

    let before = engine.queue_view();
    let report = engine.tick();
    assert!(report.is_idle());
    assert_eq!(report.queue_len, 2);
    assert_eq!(engine.queue_view(), before);
}

#[test]
fn test_deleted_lobby_leaves_queue() {
    let (mut engine, _clock) = test_engine();
    let lobby_id = ready_lobby(&mut engine, 0, &["a1", "a2", "a3"]);
    ready_lobby(&mut engine, 0, &["b1", "b2", "b3"]);

    engine.delete_lobby(lobby_id).unwrap();
    assert!(!engine.is_queued(lobby_id));
    assert!(engine.tick().matches.is_empty());
    assert_eq!(engine.stats().lobbies_deleted, 1);
}

fn shared(engine: triad_queue::Matchmaker) -> SharedMatchmaker {
    Arc::new(Mutex::new(engine))
}

#[tokio::test]
async fn test_tick_once_publishes_match_then_consumed() {
    let (mut engine, _clock) = test_engine();
    ready_lobby(&mut engine, 0, &["a1", "a2", "a3"]);
    ready_lobby(&mut engine, 0, &["b1", "b2", "b3"]);
    let engine = shared(engine);
    let publisher = MockEventPublisher::new();

    let report = tokio_test::assert_ok!(TickScheduler::tick_once(&engine, &publisher).await);
    assert_eq!(report.matches.len(), 1);
    assert_eq!(
        publisher.get_published_kinds(),
        vec!["MatchCreated", "LobbyConsumed", "LobbyConsumed"]
    );

    publisher.clear_events();
    TickScheduler::tick_once(&engine, &publisher).await.unwrap();
    assert!(publisher.get_published_events().is_empty());
}

#[tokio::test]
async fn test_publish_failure_does_not_undo_match() {
    let (mut engine, _clock) = test_engine();
    ready_lobby(&mut engine, 0, &["a1", "a2", "a3"]);
    ready_lobby(&mut engine, 0, &["b1", "b2", "b3"]);
    let engine = shared(engine);
    let publisher = MockEventPublisher::new();
    publisher.set_failing(true);

    tokio_test::assert_err!(TickScheduler::tick_once(&engine, &publisher).await);

    let engine = engine.lock().await;
    assert_eq!(engine.stats().matches_created, 1);
    assert!(engine.queued_lobbies().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_scheduler_loop_publishes_matches() {
    let (mut engine, _clock) = test_engine();
    ready_lobby(&mut engine, 0, &["a1", "a2", "a3"]);
    ready_lobby(&mut engine, 0, &["b1", "b2", "b3"]);
    let engine = shared(engine);
    let publisher = Arc::new(MockEventPublisher::new());

    let scheduler = TickScheduler::new(engine.clone(), publisher.clone(), Duration::from_millis(100));
    scheduler.start().unwrap();
    assert!(scheduler.start().is_err());

    tokio::time::sleep(Duration::from_millis(350)).await;
    scheduler.stop().await.unwrap();

    assert!(!scheduler.is_running());
    assert!(scheduler.ticks_run() >= 3);
    assert_eq!(publisher.get_published_kinds().len(), 3);
    assert_eq!(engine.lock().await.stats().ticks, scheduler.ticks_run());
}

#[tokio::test]
async fn test_service_event_feed_carries_envelopes() {
    let app_state = AppState::new(AppConfig::default()).unwrap();
    let mut feed = app_state.events().stream();

    {
        let engine = app_state.engine();
        let mut engine = engine.lock().await;
        ready_lobby(&mut engine, 0, &["a1", "a2", "a3"]);
        ready_lobby(&mut engine, 0, &["b1", "b2", "b3"]);
    }

    TickScheduler::tick_once(&app_state.engine(), app_state.events())
        .await
        .unwrap();

    let first = feed.next().await.unwrap().unwrap();
    assert_eq!(first.routing_key, MATCH_CREATED_ROUTING_KEY);
    let EngineEvent::MatchCreated(created) = &first.payload else {
        panic!("expected MatchCreated, got {}", first.payload.kind());
    };
    assert_eq!(created.human_count(), 6);

    for _ in 0..2 {
        let envelope = feed.next().await.unwrap().unwrap();
        assert_eq!(envelope.payload.kind(), "LobbyConsumed");
    }
}

#[tokio::test]
async fn test_lobbies_joined_over_http_reach_the_event_feed() {
    use axum::body::Body;
    use axum::http::{Method, Request, StatusCode};
    use tower::ServiceExt;
    use triad_queue::metrics::{HealthServer, HealthServerConfig};

    let app_state = Arc::new(AppState::new(AppConfig::default()).unwrap());
    let mut feed = app_state.events().stream();
    let app = HealthServer::new(HealthServerConfig::default(), app_state.metrics())
        .with_app_state(app_state.clone())
        .router();

    let post = |uri: String, body: serde_json::Value| {
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    };

    for names in [["ana", "bo", "cy"], ["dee", "eli", "fay"]] {
        let response = app
            .clone()
            .oneshot(post("/lobbies".to_string(), serde_json::json!({ "class_id": 2 })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let lobby: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        let lobby_id = lobby["lobby_id"].as_u64().unwrap();

        for name in names {
            let response = app
                .clone()
                .oneshot(post(
                    format!("/lobbies/{}/members", lobby_id),
                    serde_json::json!({ "name": name, "ready": true }),
                ))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::CREATED);
        }
    }
    assert_eq!(app_state.engine().lock().await.queued_lobbies().len(), 2);

    TickScheduler::tick_once(&app_state.engine(), app_state.events())
        .await
        .unwrap();

    let first = feed.next().await.unwrap().unwrap();
    let EngineEvent::MatchCreated(created) = &first.payload else {
        panic!("expected MatchCreated, got {}", first.payload.kind());
    };
    assert_eq!(created.human_count(), 6);
    assert!(app_state.engine().lock().await.queued_lobbies().is_empty());
}
