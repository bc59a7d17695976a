//! The matchmaker: lobby lifecycle, queue membership and the tick loop
//!
//! `Matchmaker` owns every lobby and the queue. All mutation goes through it, so
//! the invariant "a lobby is queued iff it is non-empty and all ready" is
//! maintained in one place.

use crate::clock::Clock;
use crate::config::MatchmakingConfig;
use crate::error::{MatchmakingError, Result};
use crate::lobby::{Lobby, LobbyInstance, LobbyRoster, Member};
use crate::matchmaking::eligibility::EligibilityClock;
use crate::matchmaking::finalizer::MatchFinalizer;
use crate::matchmaking::queue::MatchQueue;
use crate::matchmaking::search::{MatchSearch, TieredMatchSearch};
use crate::metrics::MetricsCollector;
use crate::types::{ClassId, EngineEvent, LobbyConsumed, LobbyId, MatchCreated, MatchTier};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Outcome of a single tick
#[derive(Debug, Clone, Default)]
pub struct TickReport {
    /// Sequence number of this tick, starting at 1
    pub tick: u64,
    /// Lobbies newly flagged AI-eligible during this tick
    pub promoted: Vec<LobbyId>,
    pub matches: Vec<MatchCreated>,
    pub consumed: Vec<LobbyConsumed>,
    /// Queue length after the tick
    pub queue_len: usize,
}

impl TickReport {
    /// True when the tick changed nothing observable
    pub fn is_idle(&self) -> bool {
        self.promoted.is_empty() && self.matches.is_empty()
    }

    /// Events in emission order: each match followed by its consumed lobbies
    pub fn events(&self) -> Vec<EngineEvent> {
        let mut events = Vec::with_capacity(self.matches.len() + self.consumed.len());
        for created in &self.matches {
            events.push(EngineEvent::MatchCreated(created.clone()));
            events.extend(
                self.consumed
                    .iter()
                    .filter(|consumed| consumed.match_id == created.match_id)
                    .cloned()
                    .map(EngineEvent::LobbyConsumed),
            );
        }
        events
    }
}

/// Counters and current queue state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MatchmakerStats {
    pub ticks: u64,
    pub lobbies_created: u64,
    pub lobbies_deleted: u64,
    pub lobbies_consumed: u64,
    pub matches_created: u64,
    pub human_only_matches: u64,
    pub ai_eligible_matches: u64,
    pub ai_assisted_matches: u64,
    pub players_matched: u64,
    pub synthetic_players: u64,
    pub active_lobbies: usize,
    pub queued_lobbies: usize,
    pub players_waiting: usize,
    pub ai_eligible_lobbies: usize,
}

/// One queued lobby as shown to external queue displays
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueuedLobbyView {
    pub lobby_id: LobbyId,
    pub class_id: ClassId,
    pub members: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub waited_ms: i64,
    pub ai_eligible: bool,
}

/// Tick-driven matchmaking engine
pub struct Matchmaker {
    config: MatchmakingConfig,
    roster: LobbyRoster,
    queue: MatchQueue,
    eligibility: EligibilityClock,
    search: Arc<dyn MatchSearch>,
    finalizer: MatchFinalizer,
    clock: Arc<dyn Clock>,
    stats: MatchmakerStats,
    metrics: Option<Arc<MetricsCollector>>,
}

impl Matchmaker {
    /// Create an engine using the default three-tier search
    pub fn new(config: MatchmakingConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        config.validate()?;

        info!(
            "Matchmaker created - class mix: {}, AI-eligible after {}ms, synthetic fill after {}ms",
            config.allow_class_mix, config.ai_eligible_time_ms, config.ai_ready_threshold_ms
        );

        Ok(Self {
            config,
            roster: LobbyRoster::new(),
            queue: MatchQueue::new(),
            eligibility: EligibilityClock::new(),
            search: Arc::new(TieredMatchSearch::new()),
            finalizer: MatchFinalizer::new(),
            clock,
            stats: MatchmakerStats::default(),
            metrics: None,
        })
    }

    /// Replace the search strategy
    pub fn with_search(mut self, search: Arc<dyn MatchSearch>) -> Self {
        self.search = search;
        self
    }

    /// Report tick and match metrics to `metrics`
    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn config(&self) -> &MatchmakingConfig {
        &self.config
    }

    /// Replace the runtime configuration; takes effect on the next tick
    pub fn update_config(&mut self, config: MatchmakingConfig) -> Result<()> {
        config.validate()?;
        info!(
            "Matchmaking config updated - class mix: {}, AI-eligible after {}ms, synthetic fill after {}ms, {} matches/tick",
            config.allow_class_mix,
            config.ai_eligible_time_ms,
            config.ai_ready_threshold_ms,
            config.max_matches_per_tick
        );
        self.config = config;
        Ok(())
    }

    pub fn set_allow_class_mix(&mut self, allow: bool) -> Result<()> {
        let config = MatchmakingConfig {
            allow_class_mix: allow,
            ..self.config.clone()
        };
        self.update_config(config)
    }

    pub fn set_ai_eligible_time_ms(&mut self, ms: u64) -> Result<()> {
        let config = MatchmakingConfig {
            ai_eligible_time_ms: ms,
            ..self.config.clone()
        };
        self.update_config(config)
    }

    pub fn set_ai_ready_threshold_ms(&mut self, ms: u64) -> Result<()> {
        let config = MatchmakingConfig {
            ai_ready_threshold_ms: ms,
            ..self.config.clone()
        };
        self.update_config(config)
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    // ---- lobby lifecycle ----

    /// Create an empty lobby of the given class
    pub fn create_lobby(&mut self, class_id: ClassId) -> LobbyId {
        self.stats.lobbies_created += 1;
        self.roster.create(class_id)
    }

    /// Delete a lobby, dequeuing it first
    pub fn delete_lobby(&mut self, lobby_id: LobbyId) -> Result<LobbyInstance> {
        self.roster.require(lobby_id)?;
        self.dequeue(lobby_id);
        let lobby = self
            .roster
            .remove(lobby_id)
            .ok_or(MatchmakingError::LobbyNotFound { lobby_id })?;
        self.stats.lobbies_deleted += 1;
        Ok(lobby)
    }

    pub fn lobby(&self, lobby_id: LobbyId) -> Option<&LobbyInstance> {
        self.roster.get(lobby_id)
    }

    /// Every live lobby in creation order
    pub fn lobbies(&self) -> impl Iterator<Item = &LobbyInstance> {
        self.roster.iter()
    }

    /// Add an unready member; returns the slot it was placed in
    pub fn add_member(&mut self, lobby_id: LobbyId, name: impl Into<String>) -> Result<usize> {
        let slot = self.roster.require_mut(lobby_id)?.add_member(name)?;
        // A new unready member makes the lobby not-all-ready
        self.on_ready_changed(lobby_id)?;
        Ok(slot)
    }

    /// Remove the member in `slot`.
    ///
    /// A queued lobby always leaves the queue; if the remaining members are
    /// still all ready it rejoins with a fresh join time.
    pub fn remove_member(&mut self, lobby_id: LobbyId, slot: usize) -> Result<Member> {
        let member = self.roster.require_mut(lobby_id)?.remove_member(slot)?;
        if self.dequeue(lobby_id) {
            debug!(
                "Lobby {} state - left queue after {} was removed",
                lobby_id, member.name
            );
        }
        self.on_ready_changed(lobby_id)?;
        Ok(member)
    }

    pub fn set_member_ready(&mut self, lobby_id: LobbyId, slot: usize, ready: bool) -> Result<()> {
        self.roster.require_mut(lobby_id)?.set_ready(slot, ready)?;
        self.on_ready_changed(lobby_id)
    }

    /// Flip a member's ready flag; returns the new value
    pub fn toggle_member_ready(&mut self, lobby_id: LobbyId, slot: usize) -> Result<bool> {
        let ready = self.roster.require_mut(lobby_id)?.toggle_ready(slot)?;
        self.on_ready_changed(lobby_id)?;
        Ok(ready)
    }

    /// Change a lobby's class; a queued lobby keeps its place
    pub fn set_lobby_class(&mut self, lobby_id: LobbyId, class_id: ClassId) -> Result<()> {
        self.roster.require_mut(lobby_id)?.set_class_id(class_id);
        Ok(())
    }

    // ---- queue membership ----

    /// Queue a lobby whose members are all ready.
    ///
    /// Returns false if it was already queued.
    pub fn add_lobby(&mut self, lobby_id: LobbyId) -> Result<bool> {
        if !self.roster.require(lobby_id)?.all_ready() {
            return Err(MatchmakingError::LobbyNotReady { lobby_id }.into());
        }
        Ok(self.enqueue(lobby_id))
    }

    /// Take a lobby out of the queue; returns false if it was not queued
    pub fn remove_lobby(&mut self, lobby_id: LobbyId) -> Result<bool> {
        self.roster.require(lobby_id)?;
        Ok(self.dequeue(lobby_id))
    }

    pub fn is_queued(&self, lobby_id: LobbyId) -> bool {
        self.queue.contains(lobby_id)
    }

    /// Bring queue membership in line with the lobby's ready state
    pub fn on_ready_changed(&mut self, lobby_id: LobbyId) -> Result<()> {
        let all_ready = self.roster.require(lobby_id)?.all_ready();
        match (all_ready, self.queue.contains(lobby_id)) {
            (true, false) => {
                self.enqueue(lobby_id);
            }
            (false, true) => {
                self.dequeue(lobby_id);
            }
            _ => {}
        }
        Ok(())
    }

    fn enqueue(&mut self, lobby_id: LobbyId) -> bool {
        let now = self.clock.now();
        let Some(lobby) = self.roster.get_mut(lobby_id) else {
            return false;
        };
        if !self.queue.insert(lobby_id, now) {
            return false;
        }
        lobby.mark_queued(now);
        info!(
            "Lobby {} state - queued with {} players (class {})",
            lobby_id,
            lobby.player_count(),
            lobby.class_id()
        );
        true
    }

    fn dequeue(&mut self, lobby_id: LobbyId) -> bool {
        if !self.queue.remove(lobby_id) {
            return false;
        }
        if let Some(lobby) = self.roster.get_mut(lobby_id) {
            lobby.mark_dequeued();
        }
        info!("Lobby {} state - left queue", lobby_id);
        true
    }

    /// Queued lobbies, oldest first
    pub fn queued_lobbies(&self) -> Vec<&LobbyInstance> {
        self.queue
            .lobby_ids()
            .into_iter()
            .filter_map(|lobby_id| self.roster.get(lobby_id))
            .collect()
    }

    /// Serializable view of the queue, oldest first
    pub fn queue_view(&self) -> Vec<QueuedLobbyView> {
        let now = self.clock.now();
        self.queued_lobbies()
            .into_iter()
            .map(|lobby| QueuedLobbyView {
                lobby_id: lobby.lobby_id(),
                class_id: lobby.class_id(),
                members: lobby.member_names(),
                created_at: lobby.created_at(),
                waited_ms: lobby.waited_ms(now).unwrap_or(0),
                ai_eligible: lobby.ai_eligible(),
            })
            .collect()
    }

    pub fn stats(&self) -> MatchmakerStats {
        let queued = self.queued_lobbies();
        MatchmakerStats {
            active_lobbies: self.roster.len(),
            queued_lobbies: queued.len(),
            players_waiting: queued.iter().map(|lobby| lobby.player_count()).sum(),
            ai_eligible_lobbies: queued.iter().filter(|lobby| lobby.ai_eligible()).count(),
            ..self.stats.clone()
        }
    }

    // ---- tick ----

    /// Drop queue entries whose lobby no longer exists
    fn prune_stale_entries(&mut self) {
        for lobby_id in self.queue.lobby_ids() {
            if !self.roster.contains(lobby_id) {
                warn!("Queue referenced missing lobby {}, dropping entry", lobby_id);
                self.queue.remove(lobby_id);
            }
        }
    }

    fn candidates(&self) -> Vec<&dyn Lobby> {
        self.queue
            .lobby_ids()
            .into_iter()
            .filter_map(|lobby_id| self.roster.get(lobby_id))
            .map(|lobby| lobby as &dyn Lobby)
            .collect()
    }

    fn record_match(&mut self, event: &MatchCreated, consumed: usize) {
        self.stats.matches_created += 1;
        match event.tier {
            MatchTier::HumanOnly => self.stats.human_only_matches += 1,
            MatchTier::AiEligible => self.stats.ai_eligible_matches += 1,
            MatchTier::AiAssisted => self.stats.ai_assisted_matches += 1,
        }
        self.stats.lobbies_consumed += consumed as u64;
        self.stats.players_matched += event.human_count() as u64;
        self.stats.synthetic_players += event.synthetic_fill_count as u64;

        if let Some(metrics) = &self.metrics {
            metrics.record_match(event);
        }
    }

    /// Run one matchmaking pass: promote eligibility, then search and commit
    /// up to `max_matches_per_tick` matches.
    pub fn tick(&mut self) -> TickReport {
        let started = Instant::now();
        let now = self.clock.now();
        self.stats.ticks += 1;

        let mut report = TickReport {
            tick: self.stats.ticks,
            ..TickReport::default()
        };

        self.prune_stale_entries();

        let queue = &self.queue;
        report.promoted = self.eligibility.update(
            self.roster
                .iter_mut()
                .filter(|lobby| queue.contains(lobby.lobby_id())),
            &self.config,
            now,
        );
        report.promoted.sort_unstable();

        for _ in 0..self.config.max_matches_per_tick {
            let search_started = Instant::now();
            let result = {
                let candidates = self.candidates();
                self.search.find_match(&candidates, &self.config, now)
            };
            if let Some(metrics) = &self.metrics {
                metrics.record_search(result.is_some(), search_started.elapsed());
            }

            let Some(result) = result else {
                break;
            };

            match self
                .finalizer
                .finalize(&result, &mut self.queue, &mut self.roster, now)
            {
                Ok(finalized) => {
                    self.record_match(&finalized.event, finalized.consumed.len());
                    report.matches.push(finalized.event);
                    report.consumed.extend(finalized.consumed);
                }
                Err(e) => {
                    error!("Failed to finalize {} match: {}", result.tier, e);
                    break;
                }
            }
        }

        report.queue_len = self.queue.len();

        if let Some(metrics) = &self.metrics {
            metrics.update_from_stats(&self.stats());
            metrics.record_tick(started.elapsed());
        }

        debug!(
            "Tick {} - promoted {}, matched {}, {} lobbies still queued",
            report.tick,
            report.promoted.len(),
            report.matches.len(),
            report.queue_len
        );

        report
    }
}
