//! Per-session attention flags and input classification.

use serde::{Deserialize, Serialize};

/// Attention state of one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AttentionFlags {
    /// The backing process is waiting on the user and the user was notified.
    pub needs_attention: bool,

    /// The user is typing; notifications are suppressed until a quiet interval passes.
    pub notifications_blocked: bool,

    /// The backing process printed a confirmation prompt.
    pub waiting_for_interaction: bool,
}

impl AttentionFlags {
    /// Returns true if no flag is set.
    #[must_use]
    pub fn is_clear(&self) -> bool {
        !self.needs_attention && !self.notifications_blocked && !self.waiting_for_interaction
    }
}

/// Returns true for inputs that answer a prompt: a newline, or a bare `y`/`n`.
///
/// Only these inputs may lift a typing block, and only while the session is
/// focused and waiting for interaction.
pub fn is_meaningful_input(bytes: &[u8]) -> bool {
    if bytes.iter().any(|b| *b == b'\r' || *b == b'\n') {
        return true;
    }
    matches!(bytes, [b'y' | b'n' | b'Y' | b'N'])
}
