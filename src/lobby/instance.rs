//! Lobby instance implementation and lifecycle management
//!
//! A lobby is a small group (up to three members) that queues as a unit.
//! Members are held in fixed slots; the lobby is ready to queue only when it
//! has at least one member and every member is ready.

use crate::error::{MatchmakingError, Result};
use crate::types::{ClassId, LobbyId, LobbySnapshot};
use crate::utils::{current_timestamp, elapsed_ms};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maximum number of members in one lobby
pub const LOBBY_CAPACITY: usize = 3;

/// A single member slot occupant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub name: String,
    pub ready: bool,
}

impl Member {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ready: false,
        }
    }
}

/// Read-only view of a lobby used by the queue, eligibility clock and search
pub trait Lobby: Send + Sync {
    /// Get lobby ID
    fn lobby_id(&self) -> LobbyId;

    /// Get the lobby's class
    fn class_id(&self) -> ClassId;

    /// Number of occupied member slots
    fn player_count(&self) -> usize;

    /// True when at least one member is present and every member is ready
    fn all_ready(&self) -> bool;

    /// When the lobby entered the queue, if it is queued
    fn time_joined(&self) -> Option<DateTime<Utc>>;

    /// Whether the lobby has waited long enough to combine with other waiting lobbies
    fn ai_eligible(&self) -> bool;

    /// Milliseconds spent in the queue so far
    fn waited_ms(&self, now: DateTime<Utc>) -> Option<i64> {
        self.time_joined().map(|joined| elapsed_ms(joined, now))
    }
}

/// Concrete implementation of a lobby
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LobbyInstance {
    id: LobbyId,
    class_id: ClassId,
    slots: [Option<Member>; LOBBY_CAPACITY],
    time_joined: Option<DateTime<Utc>>,
    ai_eligible: bool,
    created_at: DateTime<Utc>,
}

impl LobbyInstance {
    /// Create an empty lobby
    pub fn new(id: LobbyId, class_id: ClassId) -> Self {
        Self {
            id,
            class_id,
            slots: Default::default(),
            time_joined: None,
            ai_eligible: false,
            created_at: current_timestamp(),
        }
    }

    /// Create a lobby pre-filled with members sharing one ready flag
    pub fn with_members(id: LobbyId, class_id: ClassId, names: &[&str], ready: bool) -> Result<Self> {
        let mut lobby = Self::new(id, class_id);
        for name in names {
            let slot = lobby.add_member(*name)?;
            lobby.set_ready(slot, ready)?;
        }
        Ok(lobby)
    }

    /// Get created timestamp
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Change the lobby's class
    pub fn set_class_id(&mut self, class_id: ClassId) {
        self.class_id = class_id;
    }

    /// All slots in order, empty ones included
    pub fn slots(&self) -> &[Option<Member>; LOBBY_CAPACITY] {
        &self.slots
    }

    /// Occupied slots in order
    pub fn members(&self) -> impl Iterator<Item = &Member> {
        self.slots.iter().flatten()
    }

    /// Names of the current members in slot order
    pub fn member_names(&self) -> Vec<String> {
        self.members().map(|member| member.name.clone()).collect()
    }

    /// Check if every slot is occupied
    pub fn is_full(&self) -> bool {
        self.slots.iter().all(Option::is_some)
    }

    fn check_slot(&self, slot: usize) -> Result<()> {
        if slot >= LOBBY_CAPACITY {
            return Err(MatchmakingError::InvalidSlot {
                lobby_id: self.id,
                slot,
            }
            .into());
        }
        Ok(())
    }

    fn occupied_slot_mut(&mut self, slot: usize) -> Result<&mut Member> {
        self.check_slot(slot)?;
        let lobby_id = self.id;
        self.slots[slot]
            .as_mut()
            .ok_or_else(|| MatchmakingError::MemberNotFound { lobby_id, slot }.into())
    }

    /// Add an unready member to the first empty slot, returning the slot index
    pub fn add_member(&mut self, name: impl Into<String>) -> Result<usize> {
        let name = name.into();

        if self.members().any(|member| member.name == name) {
            return Err(MatchmakingError::DuplicateMember {
                lobby_id: self.id,
                name,
            }
            .into());
        }

        let slot = self
            .slots
            .iter()
            .position(Option::is_none)
            .ok_or(MatchmakingError::LobbyFull { lobby_id: self.id })?;

        self.slots[slot] = Some(Member::new(name));
        Ok(slot)
    }

    /// Remove the member in `slot`
    pub fn remove_member(&mut self, slot: usize) -> Result<Member> {
        self.check_slot(slot)?;
        self.slots[slot].take().ok_or_else(|| {
            MatchmakingError::MemberNotFound {
                lobby_id: self.id,
                slot,
            }
            .into()
        })
    }

    /// Set a member's ready flag, returning whether it changed
    pub fn set_ready(&mut self, slot: usize, ready: bool) -> Result<bool> {
        let member = self.occupied_slot_mut(slot)?;
        let changed = member.ready != ready;
        member.ready = ready;
        Ok(changed)
    }

    /// Flip a member's ready flag, returning the new value
    pub fn toggle_ready(&mut self, slot: usize) -> Result<bool> {
        let member = self.occupied_slot_mut(slot)?;
        member.ready = !member.ready;
        Ok(member.ready)
    }

    /// Freeze the lobby for a match report
    pub fn snapshot(&self, now: DateTime<Utc>) -> LobbySnapshot {
        LobbySnapshot {
            lobby_id: self.id,
            class_id: self.class_id,
            members: self.member_names(),
            waited_ms: self.waited_ms(now).unwrap_or(0),
        }
    }

    /// Stamp the lobby as queued at `now`
    pub(crate) fn mark_queued(&mut self, now: DateTime<Utc>) {
        self.time_joined = Some(now);
        self.ai_eligible = false;
    }

    /// Clear every queue-derived field
    pub(crate) fn mark_dequeued(&mut self) {
        self.time_joined = None;
        self.ai_eligible = false;
    }

    /// Promote to AI-eligible; never demotes
    pub(crate) fn mark_ai_eligible(&mut self) {
        self.ai_eligible = true;
    }
}

impl Lobby for LobbyInstance {
    fn lobby_id(&self) -> LobbyId {
        self.id
    }

    fn class_id(&self) -> ClassId {
        self.class_id
    }

    fn player_count(&self) -> usize {
        self.members().count()
    }

    fn all_ready(&self) -> bool {
        self.player_count() > 0 && self.members().all(|member| member.ready)
    }

    fn time_joined(&self) -> Option<DateTime<Utc>> {
        self.time_joined
    }

    fn ai_eligible(&self) -> bool {
        self.ai_eligible
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_new_lobby_is_empty_and_not_ready() {
        let lobby = LobbyInstance::new(1, 0);
        assert_eq!(lobby.player_count(), 0);
        assert!(!lobby.all_ready());
        assert!(lobby.time_joined().is_none());
        assert!(!lobby.ai_eligible());
        assert!(!lobby.is_full());
    }

    #[test]
    fn test_add_members_fills_first_empty_slot() {
        let mut lobby = LobbyInstance::new(1, 0);
        assert_eq!(lobby.add_member("ana").unwrap(), 0);
        assert_eq!(lobby.add_member("bo").unwrap(), 1);

        lobby.remove_member(0).unwrap();
        assert_eq!(lobby.add_member("cy").unwrap(), 0);
        assert_eq!(lobby.member_names(), vec!["cy", "bo"]);
    }

    #[test]
    fn test_lobby_capacity() {
        let mut lobby = LobbyInstance::new(7, 0);
        for name in ["a", "b", "c"] {
            lobby.add_member(name).unwrap();
        }
        assert!(lobby.is_full());

        let err = lobby.add_member("d").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<MatchmakingError>(),
            Some(MatchmakingError::LobbyFull { lobby_id: 7 })
        ));
    }

    #[test]
    fn test_duplicate_member_rejected() {
        let mut lobby = LobbyInstance::new(1, 0);
        lobby.add_member("ana").unwrap();
        let err = lobby.add_member("ana").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<MatchmakingError>(),
            Some(MatchmakingError::DuplicateMember { .. })
        ));
    }

    #[test]
    fn test_all_ready_requires_every_member() {
        let mut lobby = LobbyInstance::new(1, 0);
        lobby.add_member("ana").unwrap();
        lobby.add_member("bo").unwrap();
        assert!(!lobby.all_ready());

        assert!(lobby.set_ready(0, true).unwrap());
        assert!(!lobby.all_ready());

        assert!(lobby.toggle_ready(1).unwrap());
        assert!(lobby.all_ready());

        // Setting the same value again reports no change
        assert!(!lobby.set_ready(1, true).unwrap());
    }

    #[test]
    fn test_slot_errors() {
        let mut lobby = LobbyInstance::new(3, 0);
        assert!(matches!(
            lobby.set_ready(5, true).unwrap_err().downcast_ref::<MatchmakingError>(),
            Some(MatchmakingError::InvalidSlot { slot: 5, .. })
        ));
        assert!(matches!(
            lobby.remove_member(1).unwrap_err().downcast_ref::<MatchmakingError>(),
            Some(MatchmakingError::MemberNotFound { slot: 1, .. })
        ));
    }

    #[test]
    fn test_queue_markers() {
        let mut lobby = LobbyInstance::with_members(1, 2, &["ana", "bo"], true).unwrap();
        let now = current_timestamp();

        lobby.mark_queued(now);
        assert_eq!(lobby.time_joined(), Some(now));
        assert_eq!(lobby.waited_ms(now + Duration::seconds(4)), Some(4000));

        lobby.mark_ai_eligible();
        assert!(lobby.ai_eligible());

        lobby.mark_dequeued();
        assert!(lobby.time_joined().is_none());
        assert!(!lobby.ai_eligible());
        assert!(lobby.waited_ms(now).is_none());
    }

    #[test]
    fn test_snapshot() {
        let mut lobby = LobbyInstance::with_members(9, 4, &["ana", "bo", "cy"], true).unwrap();
        let now = current_timestamp();
        lobby.mark_queued(now);

        let snapshot = lobby.snapshot(now + Duration::milliseconds(750));
        assert_eq!(snapshot.lobby_id, 9);
        assert_eq!(snapshot.class_id, 4);
        assert_eq!(snapshot.player_count(), 3);
        assert_eq!(snapshot.waited_ms, 750);
    }
}
