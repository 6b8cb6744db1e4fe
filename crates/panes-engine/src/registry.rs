//! Session registry: the authoritative id → session map.
//!
//! Only bookkeeping lives here. Attaching processes and moving sessions
//! through their lifecycle is the orchestrator's job.

use std::collections::BTreeMap;

use panes_core::{DomainError, DomainResult, Session, SessionId, MAX_SESSIONS};
use tracing::debug;

/// Owns every occupied session slot.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: BTreeMap<SessionId, Session>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Occupies the lowest free id with an `Empty` session.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::CapacityExceeded`] when all ids are taken. The
    /// registry is left untouched.
    pub fn create(&mut self) -> DomainResult<SessionId> {
        if self.is_full() {
            return Err(DomainError::CapacityExceeded { max: MAX_SESSIONS });
        }
        let id = SessionId::all()
            .find(|id| !self.sessions.contains_key(id))
            .ok_or(DomainError::CapacityExceeded { max: MAX_SESSIONS })?;
        self.sessions.insert(id, Session::new(id));
        debug!(session_id = %id, total = self.sessions.len(), "Session slot created");
        Ok(id)
    }

    pub fn get(&self, id: SessionId) -> Option<&Session> {
        self.sessions.get(&id)
    }

    pub fn get_mut(&mut self, id: SessionId) -> Option<&mut Session> {
        self.sessions.get_mut(&id)
    }

    /// Like [`Self::get_mut`], but a missing id is a stale reference.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::StaleReference`] if `id` is not occupied.
    pub fn require_mut(&mut self, id: SessionId) -> DomainResult<&mut Session> {
        self.sessions
            .get_mut(&id)
            .ok_or(DomainError::StaleReference { session_id: id })
    }

    /// Frees `id`. Removing an absent id is a no-op.
    pub fn remove(&mut self, id: SessionId) -> Option<Session> {
        let removed = self.sessions.remove(&id);
        if removed.is_none() {
            debug!(session_id = %id, "Remove of absent session ignored");
        }
        removed
    }

    pub fn contains(&self, id: SessionId) -> bool {
        self.sessions.contains_key(&id)
    }

    /// Occupied ids in ascending order.
    pub fn active_ids(&self) -> Vec<SessionId> {
        self.sessions.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.sessions.len() >= MAX_SESSIONS
    }

    pub fn iter(&self) -> impl Iterator<Item = &Session> {
        self.sessions.values()
    }

    /// Finds the session whose current process has `generation`.
    pub fn find_by_generation(&self, id: SessionId, generation: u64) -> Option<&Session> {
        self.sessions
            .get(&id)
            .filter(|s| s.process_generation() == Some(generation))
    }
}
