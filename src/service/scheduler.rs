//! Periodic tick driver
//!
//! Runs `Matchmaker::tick` on a fixed interval and hands each tick's events to
//! the configured publisher once the engine lock has been released.

use crate::error::{MatchmakingError, Result};
use crate::events::EventPublisher;
use crate::matchmaking::{Matchmaker, TickReport};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

/// Engine handle shared between the scheduler and request handlers
pub type SharedMatchmaker = Arc<Mutex<Matchmaker>>;

/// Drives the engine at a fixed tick rate
pub struct TickScheduler {
    engine: SharedMatchmaker,
    publisher: Arc<dyn EventPublisher>,
    period: Duration,
    ticks_run: Arc<AtomicU64>,
    shutdown_tx: watch::Sender<bool>,
    handle: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl TickScheduler {
    pub fn new(engine: SharedMatchmaker, publisher: Arc<dyn EventPublisher>, period: Duration) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            engine,
            publisher,
            period,
            ticks_run: Arc::new(AtomicU64::new(0)),
            shutdown_tx,
            handle: std::sync::Mutex::new(None),
        }
    }

    pub fn engine(&self) -> SharedMatchmaker {
        self.engine.clone()
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Ticks completed since the scheduler was created
    pub fn ticks_run(&self) -> u64 {
        self.ticks_run.load(Ordering::SeqCst)
    }

    pub fn is_running(&self) -> bool {
        self.handle
            .lock()
            .map(|handle| handle.as_ref().is_some_and(|task| !task.is_finished()))
            .unwrap_or(false)
    }

    /// Run one tick and publish its events
    pub async fn tick_once(
        engine: &SharedMatchmaker,
        publisher: &dyn EventPublisher,
    ) -> Result<TickReport> {
        let report = {
            let mut engine = engine.lock().await;
            engine.tick()
        };

        if !report.matches.is_empty() {
            publisher.publish_all(report.events()).await?;
        }

        Ok(report)
    }

    /// Spawn the tick loop; calling it twice is an error
    pub fn start(&self) -> Result<()> {
        let mut handle = self
            .handle
            .lock()
            .map_err(|_| MatchmakingError::InternalError {
                message: "Failed to acquire scheduler handle lock".to_string(),
            })?;

        if handle.as_ref().is_some_and(|task| !task.is_finished()) {
            return Err(MatchmakingError::InternalError {
                message: "Tick scheduler is already running".to_string(),
            }
            .into());
        }

        self.shutdown_tx.send_replace(false);
        let shutdown_rx = self.shutdown_tx.subscribe();
        let engine = self.engine.clone();
        let publisher = self.publisher.clone();
        let ticks_run = self.ticks_run.clone();
        let period = self.period;

        *handle = Some(tokio::spawn(async move {
            run_loop(engine, publisher, period, ticks_run, shutdown_rx).await;
        }));

        info!("Tick scheduler started ({}ms interval)", period.as_millis());
        Ok(())
    }

    /// Signal the loop to stop and wait for it to finish the current tick
    pub async fn stop(&self) -> Result<()> {
        self.shutdown_tx.send_replace(true);

        let task = self
            .handle
            .lock()
            .map_err(|_| MatchmakingError::InternalError {
                message: "Failed to acquire scheduler handle lock".to_string(),
            })?
            .take();

        if let Some(task) = task {
            if let Err(e) = task.await {
                warn!("Tick scheduler task ended abnormally: {}", e);
            }
            info!("Tick scheduler stopped after {} ticks", self.ticks_run());
        }
        Ok(())
    }
}

async fn run_loop(
    engine: SharedMatchmaker,
    publisher: Arc<dyn EventPublisher>,
    period: Duration,
    ticks_run: Arc<AtomicU64>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                match TickScheduler::tick_once(&engine, publisher.as_ref()).await {
                    Ok(report) => {
                        ticks_run.fetch_add(1, Ordering::SeqCst);
                        if !report.matches.is_empty() {
                            debug!(
                                "Tick {} published {} matches",
                                report.tick,
                                report.matches.len()
                            );
                        }
                    }
                    Err(e) => {
                        ticks_run.fetch_add(1, Ordering::SeqCst);
                        error!("Failed to publish tick events: {}", e);
                    }
                }
            }
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    debug!("Tick loop received shutdown signal");
                    break;
                }
            }
        }
    }
}
