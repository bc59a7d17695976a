//! Metrics and monitoring for the matchmaking service
//!
//! Prometheus collectors fed by the engine, and the HTTP server exposing them
//! alongside health probes.

pub mod collector;
pub mod health;

pub use collector::{
    MatchMetrics, MetricsCollector, PerformanceMetrics, QueueMetrics, ServiceMetrics,
};
pub use health::{HealthServer, HealthServerConfig};
