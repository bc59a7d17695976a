//! Delivery of engine output to the outside world
//!
//! The engine itself never publishes; the scheduler hands each tick's events
//! to an [`EventPublisher`] after the engine lock is released.

pub mod envelope;
pub mod publisher;

pub use envelope::{EventEnvelope, LOBBY_CONSUMED_ROUTING_KEY, MATCH_CREATED_ROUTING_KEY};
pub use publisher::{
    BroadcastEventPublisher, EventPublisher, FanoutEventPublisher, LoggingEventPublisher,
    MockEventPublisher,
};
