//! Main application state and service coordination
//!
//! `AppState` wires the engine, scheduler, publishers, metrics and the health
//! server together and owns their lifecycle.

use crate::clock::SystemClock;
use crate::config::AppConfig;
use crate::events::{
    BroadcastEventPublisher, EventPublisher, FanoutEventPublisher, LoggingEventPublisher,
};
use crate::matchmaking::Matchmaker;
use crate::metrics::health::HealthServerConfig;
use crate::metrics::{HealthServer, MetricsCollector};
use crate::service::health::HealthCheck;
use crate::service::scheduler::{SharedMatchmaker, TickScheduler};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tracing::{debug, error, info, warn};

/// Interval of the service health metrics task
const HEALTH_METRICS_INTERVAL: Duration = Duration::from_secs(15);

/// Service-level errors
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Service initialization error: {message}")]
    Initialization { message: String },

    #[error("Background task error: {message}")]
    BackgroundTask { message: String },
}

/// Main application state containing all service components
pub struct AppState {
    config: AppConfig,
    engine: SharedMatchmaker,
    metrics: Arc<MetricsCollector>,
    events: BroadcastEventPublisher,
    scheduler: TickScheduler,
    health_server: Mutex<Option<Arc<HealthServer>>>,
    background_tasks: Mutex<Vec<JoinHandle<()>>>,
    is_running: Arc<RwLock<bool>>,
    started_at: Instant,
}

impl AppState {
    /// Build every component; nothing runs until [`start`](Self::start)
    pub fn new(config: AppConfig) -> Result<Self, ServiceError> {
        info!("Initializing {} matchmaking service", config.service.name);

        crate::config::validate_config(&config).map_err(|e| ServiceError::Configuration {
            message: e.to_string(),
        })?;

        let metrics = Arc::new(MetricsCollector::new().map_err(|e| {
            ServiceError::Initialization {
                message: format!("Failed to create metrics collector: {}", e),
            }
        })?);

        let engine = Matchmaker::new(config.matchmaking.clone(), Arc::new(SystemClock))
            .map_err(|e| ServiceError::Initialization {
                message: format!("Failed to create matchmaker: {}", e),
            })?
            .with_metrics(metrics.clone());
        let engine: SharedMatchmaker = Arc::new(Mutex::new(engine));

        let events = BroadcastEventPublisher::default();
        let publisher: Arc<dyn EventPublisher> = Arc::new(
            FanoutEventPublisher::new()
                .with(Arc::new(LoggingEventPublisher::new()))
                .with(Arc::new(events.clone())),
        );

        let scheduler = TickScheduler::new(engine.clone(), publisher, config.tick_interval());

        Ok(Self {
            config,
            engine,
            metrics,
            events,
            scheduler,
            health_server: Mutex::new(None),
            background_tasks: Mutex::new(Vec::new()),
            is_running: Arc::new(RwLock::new(false)),
            started_at: Instant::now(),
        })
    }

    /// Start the tick loop, the health server and the metrics task
    pub async fn start(self: &Arc<Self>) -> Result<(), ServiceError> {
        info!("Starting {} matchmaking service", self.config.service.name);

        *self.is_running.write().await = true;

        self.scheduler
            .start()
            .map_err(|e| ServiceError::BackgroundTask {
                message: format!("Failed to start tick scheduler: {}", e),
            })?;

        self.start_health_server().await;
        self.start_health_metrics_task().await;

        info!("Matchmaking service started");
        Ok(())
    }

    async fn start_health_server(self: &Arc<Self>) {
        let health_config = HealthServerConfig {
            port: self.config.service.health_port,
            host: "0.0.0.0".to_string(),
        };
        let server = Arc::new(
            HealthServer::new(health_config, self.metrics.clone()).with_app_state(self.clone()),
        );
        *self.health_server.lock().await = Some(server.clone());

        let handle = tokio::spawn(async move {
            if let Err(e) = server.start().await {
                error!("Health server failed: {}", e);
            }
        });
        self.background_tasks.lock().await.push(handle);

        info!(
            "Health endpoints available on port {}",
            self.config.service.health_port
        );
    }

    async fn start_health_metrics_task(self: &Arc<Self>) {
        let app_state = Arc::downgrade(self);
        let is_running = self.is_running.clone();

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(HEALTH_METRICS_INTERVAL);
            debug!("Health metrics task started");

            while *is_running.read().await {
                interval.tick().await;
                let Some(app_state) = app_state.upgrade() else {
                    break;
                };

                app_state.metrics.update_uptime(app_state.uptime());
                match HealthCheck::check(app_state.clone()).await {
                    Ok(health) => {
                        app_state
                            .metrics
                            .update_health_status(health.status.as_gauge());
                        for check in &health.checks {
                            app_state.metrics.update_component_health(
                                &check.name,
                                check.status != crate::service::health::HealthStatus::Unhealthy,
                            );
                        }
                        debug!(
                            "Health: {} - {} queued lobbies, {} matches so far",
                            health.status, health.stats.queued_lobbies, health.stats.matches_created
                        );
                    }
                    Err(e) => warn!("Health check failed: {}", e),
                }
            }

            debug!("Health metrics task stopped");
        });
        self.background_tasks.lock().await.push(handle);
    }

    /// Stop ticking, close the health server and log final statistics
    pub async fn shutdown(&self) -> Result<(), ServiceError> {
        info!("Starting graceful shutdown");

        *self.is_running.write().await = false;

        self.scheduler
            .stop()
            .await
            .map_err(|e| ServiceError::BackgroundTask {
                message: format!("Failed to stop tick scheduler: {}", e),
            })?;

        if let Some(server) = self.health_server.lock().await.take() {
            if let Err(e) = server.stop().await {
                warn!("Failed to stop health server: {}", e);
            }
        }

        let tasks: Vec<JoinHandle<()>> = self.background_tasks.lock().await.drain(..).collect();
        for task in tasks {
            task.abort();
        }

        let final_stats = self.engine.lock().await.stats();
        info!("Final matchmaking statistics: {:?}", final_stats);
        info!("Shutdown completed");
        Ok(())
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub async fn is_running(&self) -> bool {
        *self.is_running.read().await
    }

    pub fn engine(&self) -> SharedMatchmaker {
        self.engine.clone()
    }

    pub fn metrics(&self) -> Arc<MetricsCollector> {
        self.metrics.clone()
    }

    /// In-process event feed; every published event is also logged
    pub fn events(&self) -> &BroadcastEventPublisher {
        &self.events
    }

    pub fn scheduler(&self) -> &TickScheduler {
        &self.scheduler
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }
}
