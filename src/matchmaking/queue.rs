//! Ordered queue of lobbies eligible for matching
//!
//! Entries are kept sorted by join time (oldest first, ties broken by lobby id)
//! so every search pass walks the queue in age order.

use crate::types::LobbyId;
use chrono::{DateTime, Utc};

/// Queue entry that preserves join order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueEntry {
    pub lobby_id: LobbyId,
    pub joined_at: DateTime<Utc>,
}

/// The set of queued lobbies, ordered by join time
#[derive(Debug, Clone, Default)]
pub struct MatchQueue {
    entries: Vec<QueueEntry>,
}

impl MatchQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a lobby; returns false (and changes nothing) if it is already queued
    pub fn insert(&mut self, lobby_id: LobbyId, joined_at: DateTime<Utc>) -> bool {
        if self.contains(lobby_id) {
            return false;
        }

        let entry = QueueEntry {
            lobby_id,
            joined_at,
        };
        // Insert after every entry that sorts before or equal to the new one
        let position = self
            .entries
            .partition_point(|existing| (existing.joined_at, existing.lobby_id) <= (joined_at, lobby_id));
        self.entries.insert(position, entry);
        true
    }

    /// Remove a lobby; returns false if it was not queued
    pub fn remove(&mut self, lobby_id: LobbyId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.lobby_id != lobby_id);
        self.entries.len() != before
    }

    pub fn contains(&self, lobby_id: LobbyId) -> bool {
        self.entries.iter().any(|entry| entry.lobby_id == lobby_id)
    }

    /// Queued lobby ids, oldest first
    pub fn lobby_ids(&self) -> Vec<LobbyId> {
        self.entries.iter().map(|entry| entry.lobby_id).collect()
    }

    pub fn entries(&self) -> &[QueueEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
