//! Owning collection of lobbies
//!
//! The roster allocates lobby ids and holds every lobby that exists, queued or
//! not. Ids come from a monotonically increasing counter so they are never
//! reused while the roster lives.

use crate::error::{MatchmakingError, Result};
use crate::lobby::instance::{Lobby, LobbyInstance};
use crate::types::{ClassId, LobbyId};
use std::collections::HashMap;
use tracing::debug;

/// Collection of all live lobbies keyed by id
#[derive(Debug, Clone)]
pub struct LobbyRoster {
    lobbies: HashMap<LobbyId, LobbyInstance>,
    next_id: LobbyId,
}

impl Default for LobbyRoster {
    fn default() -> Self {
        Self::new()
    }
}

impl LobbyRoster {
    pub fn new() -> Self {
        Self {
            lobbies: HashMap::new(),
            next_id: 1,
        }
    }

    /// Create an empty lobby and return its id
    pub fn create(&mut self, class_id: ClassId) -> LobbyId {
        let lobby_id = self.next_id;
        self.next_id += 1;
        self.lobbies
            .insert(lobby_id, LobbyInstance::new(lobby_id, class_id));
        debug!("Created lobby {} (class {})", lobby_id, class_id);
        lobby_id
    }

    pub fn get(&self, lobby_id: LobbyId) -> Option<&LobbyInstance> {
        self.lobbies.get(&lobby_id)
    }

    pub fn get_mut(&mut self, lobby_id: LobbyId) -> Option<&mut LobbyInstance> {
        self.lobbies.get_mut(&lobby_id)
    }

    /// Like [`get`](Self::get) but reports a missing lobby as an error
    pub fn require(&self, lobby_id: LobbyId) -> Result<&LobbyInstance> {
        self.get(lobby_id)
            .ok_or_else(|| MatchmakingError::LobbyNotFound { lobby_id }.into())
    }

    /// Like [`get_mut`](Self::get_mut) but reports a missing lobby as an error
    pub fn require_mut(&mut self, lobby_id: LobbyId) -> Result<&mut LobbyInstance> {
        self.get_mut(lobby_id)
            .ok_or_else(|| MatchmakingError::LobbyNotFound { lobby_id }.into())
    }

    pub fn contains(&self, lobby_id: LobbyId) -> bool {
        self.lobbies.contains_key(&lobby_id)
    }

    /// Delete a lobby, returning it if it existed
    pub fn remove(&mut self, lobby_id: LobbyId) -> Option<LobbyInstance> {
        let removed = self.lobbies.remove(&lobby_id);
        if removed.is_some() {
            debug!("Deleted lobby {}", lobby_id);
        }
        removed
    }

    /// Lobbies ordered by id (creation order)
    pub fn iter(&self) -> impl Iterator<Item = &LobbyInstance> {
        let mut lobbies: Vec<&LobbyInstance> = self.lobbies.values().collect();
        lobbies.sort_by_key(|lobby| lobby.lobby_id());
        lobbies.into_iter()
    }

    /// Mutable access to every lobby, in no particular order
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut LobbyInstance> {
        self.lobbies.values_mut()
    }

    pub fn len(&self) -> usize {
        self.lobbies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lobbies.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_never_reused() {
        let mut roster = LobbyRoster::new();
        let first = roster.create(0);
        let second = roster.create(1);
        assert_eq!(first, 1);
        assert_eq!(second, 2);

        roster.remove(second);
        let third = roster.create(0);
        assert_eq!(third, 3);
        assert_eq!(roster.len(), 2);
    }

    #[test]
    fn test_require_missing_lobby() {
        let mut roster = LobbyRoster::new();
        let err = roster.require_mut(42).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<MatchmakingError>(),
            Some(MatchmakingError::LobbyNotFound { lobby_id: 42 })
        ));
        assert!(roster.require(42).is_err());
    }

    #[test]
    fn test_iter_is_ordered_by_id() {
        let mut roster = LobbyRoster::new();
        for class_id in [3, 1, 2] {
            roster.create(class_id);
        }
        let ids: Vec<LobbyId> = roster.iter().map(|lobby| lobby.lobby_id()).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn test_remove_missing_lobby_is_noop() {
        let mut roster = LobbyRoster::new();
        assert!(roster.remove(5).is_none());
        assert!(roster.is_empty());
    }
}
