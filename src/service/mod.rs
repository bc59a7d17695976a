//! Service layer for the matchmaking engine
//!
//! Application state, the periodic tick scheduler, health reporting and the
//! HTTP lobby API.

pub mod api;
pub mod app;
pub mod health;
pub mod scheduler;

pub use app::{AppState, ServiceError};
pub use health::{ComponentCheck, HealthCheck, HealthStatus, ServiceStats};
pub use scheduler::{SharedMatchmaker, TickScheduler};
