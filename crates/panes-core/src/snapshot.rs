//! Point-in-time view of the whole engine state.

use crate::{AttentionFlags, LayoutSnapshot, SessionId, SessionView};
use serde::{Deserialize, Serialize};

/// Attention flags of one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionAttention {
    pub session_id: SessionId,
    pub flags: AttentionFlags,
}

/// Everything a presentation layer needs to render from scratch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineSnapshot {
    /// Sessions ordered by id.
    pub sessions: Vec<SessionView>,
    pub attention: Vec<SessionAttention>,
    pub layout: LayoutSnapshot,
    pub focused: Option<SessionId>,
}

impl EngineSnapshot {
    /// View of one session.
    pub fn session(&self, id: SessionId) -> Option<&SessionView> {
        self.sessions.iter().find(|s| s.id == id)
    }

    /// Attention flags of one session.
    pub fn attention_of(&self, id: SessionId) -> Option<AttentionFlags> {
        self.attention
            .iter()
            .find(|a| a.session_id == id)
            .map(|a| a.flags)
    }
}
