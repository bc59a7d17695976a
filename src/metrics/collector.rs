//! Metrics collection using Prometheus
//!
//! Metric groups mirror the engine's concerns: service health, the queue,
//! produced matches, and tick performance.

use crate::matchmaking::engine::MatchmakerStats;
use crate::types::{MatchCreated, MatchTier};
use anyhow::Result;
use prometheus::{
    Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, IntGaugeVec, Opts,
    Registry,
};
use std::sync::Arc;
use std::time::Duration;

/// Main metrics collector for the matchmaking service
#[derive(Clone)]
pub struct MetricsCollector {
    registry: Arc<Registry>,
    service_metrics: ServiceMetrics,
    queue_metrics: QueueMetrics,
    match_metrics: MatchMetrics,
    performance_metrics: PerformanceMetrics,
}

/// Service-level metrics
#[derive(Clone)]
pub struct ServiceMetrics {
    /// Service uptime in seconds
    pub uptime_seconds: IntGauge,

    /// Health check status (0=unhealthy, 1=degraded, 2=healthy)
    pub health_status: IntGauge,

    /// Component health status
    pub component_health: IntGaugeVec,
}

/// Queue state, refreshed after every tick
#[derive(Clone)]
pub struct QueueMetrics {
    pub queued_lobbies: IntGauge,
    pub players_waiting: IntGauge,
    pub ai_eligible_lobbies: IntGauge,

    /// Time a lobby spent queued before being matched
    pub lobby_wait_time_seconds: HistogramVec,
}

/// Match production
#[derive(Clone)]
pub struct MatchMetrics {
    pub matches_created_total: IntCounterVec,
    pub players_matched_total: IntCounterVec,
    pub synthetic_players_total: IntCounter,
    pub lobbies_consumed_total: IntCounter,
}

/// Tick and search timings
#[derive(Clone)]
pub struct PerformanceMetrics {
    pub ticks_total: IntCounter,
    pub tick_duration: Histogram,

    /// Search time labelled by outcome (found / none)
    pub search_duration: HistogramVec,
}

impl MetricsCollector {
    /// Create a new metrics collector with its own registry
    pub fn new() -> Result<Self> {
        let registry = Arc::new(Registry::new());
        Self::with_registry(registry)
    }

    /// Create a new metrics collector with custom registry
    pub fn with_registry(registry: Arc<Registry>) -> Result<Self> {
        let service_metrics = ServiceMetrics::new(&registry)?;
        let queue_metrics = QueueMetrics::new(&registry)?;
        let match_metrics = MatchMetrics::new(&registry)?;
        let performance_metrics = PerformanceMetrics::new(&registry)?;

        Ok(Self {
            registry,
            service_metrics,
            queue_metrics,
            match_metrics,
            performance_metrics,
        })
    }

    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    pub fn service(&self) -> &ServiceMetrics {
        &self.service_metrics
    }

    pub fn queue(&self) -> &QueueMetrics {
        &self.queue_metrics
    }

    pub fn matches(&self) -> &MatchMetrics {
        &self.match_metrics
    }

    pub fn performance(&self) -> &PerformanceMetrics {
        &self.performance_metrics
    }

    /// Refresh queue gauges from engine stats
    pub fn update_from_stats(&self, stats: &MatchmakerStats) {
        self.queue_metrics
            .queued_lobbies
            .set(stats.queued_lobbies as i64);
        self.queue_metrics
            .players_waiting
            .set(stats.players_waiting as i64);
        self.queue_metrics
            .ai_eligible_lobbies
            .set(stats.ai_eligible_lobbies as i64);
    }

    /// Record a completed tick
    pub fn record_tick(&self, duration: Duration) {
        self.performance_metrics.ticks_total.inc();
        self.performance_metrics
            .tick_duration
            .observe(duration.as_secs_f64());
    }

    /// Record one search pass
    pub fn record_search(&self, found: bool, duration: Duration) {
        let outcome = if found { "found" } else { "none" };
        self.performance_metrics
            .search_duration
            .with_label_values(&[outcome])
            .observe(duration.as_secs_f64());
    }

    /// Record a created match and the wait time of each consumed lobby
    pub fn record_match(&self, event: &MatchCreated) {
        let tier = event.tier.as_str();

        self.match_metrics
            .matches_created_total
            .with_label_values(&[tier])
            .inc();
        self.match_metrics
            .players_matched_total
            .with_label_values(&[tier])
            .inc_by(event.human_count() as u64);
        self.match_metrics
            .synthetic_players_total
            .inc_by(event.synthetic_fill_count as u64);

        for lobby in event.team1.iter().chain(event.team2.iter()) {
            self.match_metrics.lobbies_consumed_total.inc();
            self.queue_metrics
                .lobby_wait_time_seconds
                .with_label_values(&[tier])
                .observe(lobby.waited_ms.max(0) as f64 / 1000.0);
        }
    }

    /// Matches created for one tier so far
    pub fn matches_for_tier(&self, tier: MatchTier) -> u64 {
        self.match_metrics
            .matches_created_total
            .with_label_values(&[tier.as_str()])
            .get()
    }

    pub fn update_health_status(&self, status: u8) {
        self.service_metrics.health_status.set(status as i64);
    }

    pub fn update_component_health(&self, component: &str, healthy: bool) {
        let status = if healthy { 1 } else { 0 };
        self.service_metrics
            .component_health
            .with_label_values(&[component])
            .set(status);
    }

    pub fn update_uptime(&self, uptime: Duration) {
        self.service_metrics
            .uptime_seconds
            .set(uptime.as_secs() as i64);
    }
}

impl ServiceMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let uptime_seconds =
            IntGauge::new("triad_queue_uptime_seconds", "Service uptime in seconds")?;
        registry.register(Box::new(uptime_seconds.clone()))?;

        let health_status = IntGauge::new(
            "triad_queue_health_status",
            "Health status (0=unhealthy, 1=degraded, 2=healthy)",
        )?;
        registry.register(Box::new(health_status.clone()))?;

        let component_health = IntGaugeVec::new(
            Opts::new("triad_queue_component_health", "Component health status"),
            &["component"],
        )?;
        registry.register(Box::new(component_health.clone()))?;

        Ok(Self {
            uptime_seconds,
            health_status,
            component_health,
        })
    }
}

impl QueueMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let queued_lobbies =
            IntGauge::new("triad_queue_queued_lobbies", "Lobbies currently queued")?;
        registry.register(Box::new(queued_lobbies.clone()))?;

        let players_waiting = IntGauge::new(
            "triad_queue_players_waiting",
            "Players in queued lobbies",
        )?;
        registry.register(Box::new(players_waiting.clone()))?;

        let ai_eligible_lobbies = IntGauge::new(
            "triad_queue_ai_eligible_lobbies",
            "Queued lobbies flagged AI-eligible",
        )?;
        registry.register(Box::new(ai_eligible_lobbies.clone()))?;

        let lobby_wait_time_seconds = HistogramVec::new(
            HistogramOpts::new(
                "triad_queue_lobby_wait_time_seconds",
                "Time a lobby spent queued before being matched",
            )
            .buckets(vec![1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0]),
            &["tier"],
        )?;
        registry.register(Box::new(lobby_wait_time_seconds.clone()))?;

        Ok(Self {
            queued_lobbies,
            players_waiting,
            ai_eligible_lobbies,
            lobby_wait_time_seconds,
        })
    }
}

impl MatchMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let matches_created_total = IntCounterVec::new(
            Opts::new("triad_queue_matches_created_total", "Total matches created"),
            &["tier"],
        )?;
        registry.register(Box::new(matches_created_total.clone()))?;

        let players_matched_total = IntCounterVec::new(
            Opts::new(
                "triad_queue_players_matched_total",
                "Human players placed into matches",
            ),
            &["tier"],
        )?;
        registry.register(Box::new(players_matched_total.clone()))?;

        let synthetic_players_total = IntCounter::new(
            "triad_queue_synthetic_players_total",
            "Synthetic players used to complete teams",
        )?;
        registry.register(Box::new(synthetic_players_total.clone()))?;

        let lobbies_consumed_total = IntCounter::new(
            "triad_queue_lobbies_consumed_total",
            "Lobbies removed from the pool by a match",
        )?;
        registry.register(Box::new(lobbies_consumed_total.clone()))?;

        Ok(Self {
            matches_created_total,
            players_matched_total,
            synthetic_players_total,
            lobbies_consumed_total,
        })
    }
}

impl PerformanceMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let ticks_total = IntCounter::new("triad_queue_ticks_total", "Matchmaking ticks run")?;
        registry.register(Box::new(ticks_total.clone()))?;

        let tick_duration = Histogram::with_opts(
            HistogramOpts::new(
                "triad_queue_tick_duration_seconds",
                "Time spent in one matchmaking tick",
            )
            .buckets(vec![0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5]),
        )?;
        registry.register(Box::new(tick_duration.clone()))?;

        let search_duration = HistogramVec::new(
            HistogramOpts::new(
                "triad_queue_search_duration_seconds",
                "Time spent searching for one match",
            )
            .buckets(vec![0.00001, 0.0001, 0.001, 0.01, 0.1, 1.0]),
            &["outcome"],
        )?;
        registry.register(Box::new(search_duration.clone()))?;

        Ok(Self {
            ticks_total,
            tick_duration,
            search_duration,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::LobbySnapshot;
    use crate::utils::{current_timestamp, generate_match_id};

    fn sample_match(tier: MatchTier) -> MatchCreated {
        let lobby = |lobby_id, members: &[&str]| LobbySnapshot {
            lobby_id,
            class_id: 0,
            members: members.iter().map(|name| name.to_string()).collect(),
            waited_ms: 42_000,
        };
        MatchCreated {
            match_id: generate_match_id(),
            tier,
            team1: vec![lobby(1, &["a", "b"])],
            team2: vec![lobby(2, &["c"])],
            team1_fill: 1,
            team2_fill: 2,
            synthetic_fill_count: 3,
            timestamp: current_timestamp(),
        }
    }

    #[test]
    fn test_metrics_collector_creation() {
        let collector = MetricsCollector::new().expect("Failed to create metrics collector");
        let _service = collector.service();
        let _queue = collector.queue();
        let _matches = collector.matches();
        let _performance = collector.performance();
    }

    #[test]
    fn test_record_match() {
        let collector = MetricsCollector::new().expect("Failed to create metrics collector");
        collector.record_match(&sample_match(MatchTier::AiAssisted));

        assert_eq!(collector.matches_for_tier(MatchTier::AiAssisted), 1);
        assert_eq!(collector.matches_for_tier(MatchTier::HumanOnly), 0);
        assert_eq!(collector.matches().synthetic_players_total.get(), 3);
        assert_eq!(collector.matches().lobbies_consumed_total.get(), 2);
        assert_eq!(
            collector
                .matches()
                .players_matched_total
                .with_label_values(&["ai_assisted"])
                .get(),
            3
        );
    }

    #[test]
    fn test_queue_gauges() {
        let collector = MetricsCollector::new().expect("Failed to create metrics collector");
        let stats = MatchmakerStats {
            queued_lobbies: 4,
            players_waiting: 7,
            ai_eligible_lobbies: 1,
            ..MatchmakerStats::default()
        };
        collector.update_from_stats(&stats);

        assert_eq!(collector.queue().queued_lobbies.get(), 4);
        assert_eq!(collector.queue().players_waiting.get(), 7);
        assert_eq!(collector.queue().ai_eligible_lobbies.get(), 1);
    }

    #[test]
    fn test_tick_and_search_recording() {
        let collector = MetricsCollector::new().expect("Failed to create metrics collector");
        collector.record_tick(Duration::from_micros(250));
        collector.record_tick(Duration::from_micros(300));
        collector.record_search(true, Duration::from_micros(10));
        collector.record_search(false, Duration::from_micros(20));

        assert_eq!(collector.performance().ticks_total.get(), 2);
        assert_eq!(collector.performance().tick_duration.get_sample_count(), 2);
    }

    #[test]
    fn test_health_status_updates() {
        let collector = MetricsCollector::new().expect("Failed to create metrics collector");
        collector.update_health_status(2);
        collector.update_component_health("scheduler", true);
        collector.update_component_health("engine", false);
        assert_eq!(collector.service().health_status.get(), 2);
    }

    #[test]
    fn test_registry_exports_metrics() {
        let collector = MetricsCollector::new().expect("Failed to create metrics collector");
        collector.record_tick(Duration::from_millis(1));
        let names: Vec<String> = collector
            .registry()
            .gather()
            .iter()
            .map(|family| family.get_name().to_string())
            .collect();
        assert!(names.contains(&"triad_queue_ticks_total".to_string()));
    }
}
