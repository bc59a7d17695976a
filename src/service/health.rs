//! Health check endpoints and monitoring
//!
//! Readiness and liveness probes plus a detailed component report for the
//! matchmaking service.

use crate::matchmaking::MatchmakerStats;
use crate::service::app::AppState;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// How long a health probe waits for the engine lock
const ENGINE_LOCK_TIMEOUT: Duration = Duration::from_secs(1);

/// Health check status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl HealthStatus {
    /// Numeric form used by the health gauge
    pub fn as_gauge(&self) -> u8 {
        match self {
            HealthStatus::Healthy => 2,
            HealthStatus::Degraded => 1,
            HealthStatus::Unhealthy => 0,
        }
    }

    /// Combine with another status, keeping the worse of the two
    fn worst(self, other: HealthStatus) -> HealthStatus {
        if other.as_gauge() < self.as_gauge() {
            other
        } else {
            self
        }
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "healthy"),
            HealthStatus::Degraded => write!(f, "degraded"),
            HealthStatus::Unhealthy => write!(f, "unhealthy"),
        }
    }
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheck {
    pub status: HealthStatus,
    pub service: String,
    pub version: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub checks: Vec<ComponentCheck>,
    pub stats: ServiceStats,
}

/// Individual component health check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentCheck {
    pub name: String,
    pub status: HealthStatus,
    /// Optional error message if not healthy
    pub message: Option<String>,
    pub duration_ms: u64,
}

/// Service statistics for health reporting
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceStats {
    pub ticks: u64,
    pub active_lobbies: usize,
    pub queued_lobbies: usize,
    pub players_waiting: usize,
    pub matches_created: u64,
    pub players_matched: u64,
    pub synthetic_players: u64,
    pub uptime_seconds: u64,
}

impl ServiceStats {
    fn from_engine(stats: &MatchmakerStats, uptime: Duration) -> Self {
        Self {
            ticks: stats.ticks,
            active_lobbies: stats.active_lobbies,
            queued_lobbies: stats.queued_lobbies,
            players_waiting: stats.players_waiting,
            matches_created: stats.matches_created,
            players_matched: stats.players_matched,
            synthetic_players: stats.synthetic_players,
            uptime_seconds: uptime.as_secs(),
        }
    }
}

impl HealthCheck {
    /// Perform a full health check of the service
    pub async fn check(app_state: Arc<AppState>) -> Result<Self> {
        let mut checks = Vec::new();

        let service_check = Self::check_service_running(&app_state).await;
        let mut overall_status = if service_check.status == HealthStatus::Healthy {
            HealthStatus::Healthy
        } else {
            HealthStatus::Unhealthy
        };
        checks.push(service_check);

        let (engine_check, engine_stats) = Self::check_engine(&app_state).await;
        overall_status = overall_status.worst(engine_check.status);
        checks.push(engine_check);

        let scheduler_check = Self::check_scheduler(&app_state);
        overall_status = overall_status.worst(scheduler_check.status);
        checks.push(scheduler_check);

        let stats = engine_stats
            .map(|stats| ServiceStats::from_engine(&stats, app_state.uptime()))
            .unwrap_or_else(|| ServiceStats {
                uptime_seconds: app_state.uptime().as_secs(),
                ..ServiceStats::default()
            });

        Ok(HealthCheck {
            status: overall_status,
            service: app_state.config().service.name.clone(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp: chrono::Utc::now(),
            checks,
            stats,
        })
    }

    /// Liveness: the service has been started and not shut down
    pub async fn liveness_check(app_state: Arc<AppState>) -> Result<HealthStatus> {
        if app_state.is_running().await {
            Ok(HealthStatus::Healthy)
        } else {
            Ok(HealthStatus::Unhealthy)
        }
    }

    /// Readiness: running, engine reachable and scheduler ticking
    pub async fn readiness_check(app_state: Arc<AppState>) -> Result<HealthStatus> {
        if !app_state.is_running().await {
            return Ok(HealthStatus::Unhealthy);
        }

        let (engine_check, _) = Self::check_engine(&app_state).await;
        Ok(engine_check
            .status
            .worst(Self::check_scheduler(&app_state).status))
    }

    async fn check_service_running(app_state: &AppState) -> ComponentCheck {
        let start = std::time::Instant::now();

        let (status, message) = if app_state.is_running().await {
            (HealthStatus::Healthy, None)
        } else {
            (
                HealthStatus::Unhealthy,
                Some("Service is not running".to_string()),
            )
        };

        ComponentCheck {
            name: "service_running".to_string(),
            status,
            message,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }

    /// The engine lock is only held for one tick, so a timeout means it is stuck
    async fn check_engine(app_state: &AppState) -> (ComponentCheck, Option<MatchmakerStats>) {
        let start = std::time::Instant::now();
        let engine = app_state.engine();

        let (status, message, stats) =
            match tokio::time::timeout(ENGINE_LOCK_TIMEOUT, engine.lock()).await {
                Ok(engine) => (HealthStatus::Healthy, None, Some(engine.stats())),
                Err(_) => {
                    debug!("Engine lock not acquired within {:?}", ENGINE_LOCK_TIMEOUT);
                    (
                        HealthStatus::Unhealthy,
                        Some("Matchmaking engine is unresponsive".to_string()),
                        None,
                    )
                }
            };

        (
            ComponentCheck {
                name: "matchmaker".to_string(),
                status,
                message,
                duration_ms: start.elapsed().as_millis() as u64,
            },
            stats,
        )
    }

    fn check_scheduler(app_state: &AppState) -> ComponentCheck {
        let start = std::time::Instant::now();

        let (status, message) = if app_state.scheduler().is_running() {
            (HealthStatus::Healthy, None)
        } else {
            (
                HealthStatus::Degraded,
                Some("Tick scheduler is not running".to_string()),
            )
        };

        ComponentCheck {
            name: "tick_scheduler".to_string(),
            status,
            message,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| anyhow::anyhow!("Failed to serialize health check: {}", e))
    }
}
