//! Event publishers for engine output

use crate::error::{MatchmakingError, Result};
use crate::events::envelope::EventEnvelope;
use crate::types::{EngineEvent, LobbyConsumed, MatchCreated};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, error, info};

/// Trait for publishing matchmaking events
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish a MatchCreated event
    async fn publish_match_created(&self, event: MatchCreated) -> Result<()>;

    /// Publish a LobbyConsumed event
    async fn publish_lobby_consumed(&self, event: LobbyConsumed) -> Result<()>;

    /// Publish a batch in order, stopping at the first failure
    async fn publish_all(&self, events: Vec<EngineEvent>) -> Result<()> {
        for event in events {
            match event {
                EngineEvent::MatchCreated(event) => self.publish_match_created(event).await?,
                EngineEvent::LobbyConsumed(event) => self.publish_lobby_consumed(event).await?,
            }
        }
        Ok(())
    }
}

/// Writes every event to the log as JSON
#[derive(Debug, Default)]
pub struct LoggingEventPublisher;

impl LoggingEventPublisher {
    pub fn new() -> Self {
        Self
    }

    fn log(&self, event: EngineEvent) -> Result<()> {
        let envelope = EventEnvelope::new(event);
        let json = envelope.to_json()?;
        info!(routing_key = %envelope.routing_key, "{}", json);
        Ok(())
    }
}

#[async_trait]
impl EventPublisher for LoggingEventPublisher {
    async fn publish_match_created(&self, event: MatchCreated) -> Result<()> {
        self.log(EngineEvent::MatchCreated(event))
    }

    async fn publish_lobby_consumed(&self, event: LobbyConsumed) -> Result<()> {
        self.log(EngineEvent::LobbyConsumed(event))
    }
}

/// In-process fan-out to any number of subscribers.
///
/// Publishing with no subscribers is not an error; the event is dropped.
#[derive(Debug, Clone)]
pub struct BroadcastEventPublisher {
    sender: broadcast::Sender<EventEnvelope>,
}

impl BroadcastEventPublisher {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.sender.subscribe()
    }

    /// Subscribe as a `Stream`; lagging subscribers see `Err` items
    pub fn stream(&self) -> BroadcastStream<EventEnvelope> {
        BroadcastStream::new(self.sender.subscribe())
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    fn send(&self, event: EngineEvent) -> Result<()> {
        let envelope = EventEnvelope::new(event);
        match self.sender.send(envelope) {
            Ok(receivers) => {
                debug!("Broadcast event to {} subscribers", receivers);
            }
            Err(broadcast::error::SendError(envelope)) => {
                debug!(
                    "No subscribers for {} event {}, dropping",
                    envelope.routing_key, envelope.correlation_id
                );
            }
        }
        Ok(())
    }
}

impl Default for BroadcastEventPublisher {
    fn default() -> Self {
        Self::new(1024)
    }
}

#[async_trait]
impl EventPublisher for BroadcastEventPublisher {
    async fn publish_match_created(&self, event: MatchCreated) -> Result<()> {
        self.send(EngineEvent::MatchCreated(event))
    }

    async fn publish_lobby_consumed(&self, event: LobbyConsumed) -> Result<()> {
        self.send(EngineEvent::LobbyConsumed(event))
    }
}

/// Forwards every event to each inner publisher.
///
/// All publishers are attempted; the first error is returned afterwards.
#[derive(Default)]
pub struct FanoutEventPublisher {
    publishers: Vec<Arc<dyn EventPublisher>>,
}

impl FanoutEventPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, publisher: Arc<dyn EventPublisher>) -> Self {
        self.publishers.push(publisher);
        self
    }

    pub fn len(&self) -> usize {
        self.publishers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.publishers.is_empty()
    }

    async fn forward(&self, event: EngineEvent) -> Result<()> {
        let mut first_error = None;
        for publisher in &self.publishers {
            let result = match event.clone() {
                EngineEvent::MatchCreated(event) => publisher.publish_match_created(event).await,
                EngineEvent::LobbyConsumed(event) => publisher.publish_lobby_consumed(event).await,
            };
            if let Err(e) = result {
                error!("Failed to publish {} event: {}", event.kind(), e);
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl EventPublisher for FanoutEventPublisher {
    async fn publish_match_created(&self, event: MatchCreated) -> Result<()> {
        self.forward(EngineEvent::MatchCreated(event)).await
    }

    async fn publish_lobby_consumed(&self, event: LobbyConsumed) -> Result<()> {
        self.forward(EngineEvent::LobbyConsumed(event)).await
    }
}

/// Mock event publisher for testing
#[derive(Debug, Default)]
pub struct MockEventPublisher {
    published_events: std::sync::Mutex<Vec<EngineEvent>>,
    fail: std::sync::atomic::AtomicBool,
}

impl MockEventPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent publish fail
    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, std::sync::atomic::Ordering::SeqCst);
    }

    /// Get all published events (for testing)
    pub fn get_published_events(&self) -> Vec<EngineEvent> {
        self.published_events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Published event type names, in order
    pub fn get_published_kinds(&self) -> Vec<String> {
        self.get_published_events()
            .iter()
            .map(|event| event.kind().to_string())
            .collect()
    }

    pub fn clear_events(&self) {
        if let Ok(mut events) = self.published_events.lock() {
            events.clear();
        }
    }

    fn record(&self, event: EngineEvent) -> Result<()> {
        if self.fail.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(MatchmakingError::InternalError {
                message: format!("mock publisher rejected {}", event.kind()),
            }
            .into());
        }
        let mut events = self
            .published_events
            .lock()
            .map_err(|_| MatchmakingError::InternalError {
                message: "Failed to acquire published events lock".to_string(),
            })?;
        events.push(event);
        Ok(())
    }
}

#[async_trait]
impl EventPublisher for MockEventPublisher {
    async fn publish_match_created(&self, event: MatchCreated) -> Result<()> {
        self.record(EngineEvent::MatchCreated(event))
    }

    async fn publish_lobby_consumed(&self, event: LobbyConsumed) -> Result<()> {
        self.record(EngineEvent::LobbyConsumed(event))
    }
}
