//! Outbound event envelope and JSON encoding

use crate::error::{MatchmakingError, Result};
use crate::types::EngineEvent;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Routing keys for engine events
pub const MATCH_CREATED_ROUTING_KEY: &str = "match.created";
pub const LOBBY_CONSUMED_ROUTING_KEY: &str = "lobby.consumed";

/// Event with delivery metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub payload: EngineEvent,
    pub correlation_id: String,
    pub timestamp: DateTime<Utc>,
    pub routing_key: String,
}

impl EventEnvelope {
    pub fn new(payload: EngineEvent) -> Self {
        let routing_key = match &payload {
            EngineEvent::MatchCreated(_) => MATCH_CREATED_ROUTING_KEY,
            EngineEvent::LobbyConsumed(_) => LOBBY_CONSUMED_ROUTING_KEY,
        };

        Self {
            payload,
            correlation_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            routing_key: routing_key.to_string(),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| {
            MatchmakingError::InternalError {
                message: format!("Failed to serialize event: {}", e),
            }
            .into()
        })
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| {
            MatchmakingError::InternalError {
                message: format!("Failed to deserialize event: {}", e),
            }
            .into()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::LobbyConsumed;
    use crate::utils::{current_timestamp, generate_match_id};

    #[test]
    fn test_routing_key_follows_event_type() {
        let envelope = EventEnvelope::new(EngineEvent::LobbyConsumed(LobbyConsumed {
            lobby_id: 4,
            match_id: generate_match_id(),
            timestamp: current_timestamp(),
        }));
        assert_eq!(envelope.routing_key, LOBBY_CONSUMED_ROUTING_KEY);
        assert!(!envelope.correlation_id.is_empty());
    }

    #[test]
    fn test_json_carries_event_tag() {
        let envelope = EventEnvelope::new(EngineEvent::LobbyConsumed(LobbyConsumed {
            lobby_id: 4,
            match_id: generate_match_id(),
            timestamp: current_timestamp(),
        }));
        let json = envelope.to_json().unwrap();
        assert!(json.contains("\"type\":\"LobbyConsumed\""));

        let decoded = EventEnvelope::from_json(&json).unwrap();
        assert_eq!(decoded.correlation_id, envelope.correlation_id);
        assert!(matches!(
            decoded.payload,
            EngineEvent::LobbyConsumed(LobbyConsumed { lobby_id: 4, .. })
        ));
    }

    #[test]
    fn test_invalid_json_rejected() {
        assert!(EventEnvelope::from_json("{\"payload\":").is_err());
    }
}
