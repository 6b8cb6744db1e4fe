//! Attention tracking: who needs the user, and who is being typed into.
//!
//! Each session owns one [`AttentionFlags`] record and one typing-block
//! deadline. Every mutating call returns the new flags when something
//! changed so the caller can publish exactly one event per change.

use std::collections::HashMap;

use panes_core::{is_meaningful_input, AttentionFlags, SessionId};
use tokio::time::{Duration, Instant};
use tracing::debug;

use crate::timer::{earliest, Deadline};

#[derive(Debug, Default)]
struct AttentionEntry {
    flags: AttentionFlags,
    block: Deadline,
}

/// Per-session attention state.
#[derive(Debug)]
pub struct AttentionTracker {
    entries: HashMap<SessionId, AttentionEntry>,
    typing_block: Duration,
}

impl AttentionTracker {
    /// Creates a tracker whose typing block lasts `typing_block`.
    pub fn new(typing_block: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            typing_block,
        }
    }

    /// Starts tracking a session with all flags clear.
    pub fn attach(&mut self, id: SessionId) {
        self.entries.insert(id, AttentionEntry::default());
    }

    pub fn detach(&mut self, id: SessionId) {
        self.entries.remove(&id);
    }

    pub fn flags(&self, id: SessionId) -> Option<AttentionFlags> {
        self.entries.get(&id).map(|e| e.flags)
    }

    /// Sets `needs_attention`. Idempotent.
    pub fn mark_needs_attention(&mut self, id: SessionId) -> Option<AttentionFlags> {
        self.update(id, |e| e.flags.needs_attention = true)
    }

    /// Clears `needs_attention`.
    pub fn clear(&mut self, id: SessionId) -> Option<AttentionFlags> {
        self.update(id, |e| e.flags.needs_attention = false)
    }

    /// Records a confirmation prompt in the output.
    ///
    /// The session starts waiting for interaction; the user is only flagged
    /// when they are not typing into it.
    pub fn on_prompt_detected(&mut self, id: SessionId, now: Instant) -> Option<AttentionFlags> {
        let blocked = self.is_blocked(id, now);
        self.update(id, |e| {
            e.flags.waiting_for_interaction = true;
            if !blocked {
                e.flags.needs_attention = true;
            }
        })
    }

    /// Suppresses notifications and restarts the quiet interval.
    pub fn block_while_typing(&mut self, id: SessionId, now: Instant) -> Option<AttentionFlags> {
        let typing_block = self.typing_block;
        self.update(id, |e| {
            e.flags.notifications_blocked = true;
            e.block.arm(now, typing_block);
        })
    }

    /// Lifts the typing block after an answer to a prompt.
    pub fn unblock(&mut self, id: SessionId) -> Option<AttentionFlags> {
        self.update(id, |e| {
            e.flags.notifications_blocked = false;
            e.flags.waiting_for_interaction = false;
            e.block.cancel();
        })
    }

    /// True while the typing block is in force at `now`.
    pub fn is_blocked(&self, id: SessionId, now: Instant) -> bool {
        self.entries
            .get(&id)
            .is_some_and(|e| e.flags.notifications_blocked && !e.block.is_due(now))
    }

    /// Applies the typing rules to one input.
    ///
    /// A meaningful answer to a prompt in the focused session unblocks it.
    /// Anything else (re)starts the typing block.
    pub fn handle_input(
        &mut self,
        id: SessionId,
        bytes: &[u8],
        focused: bool,
        now: Instant,
    ) -> Option<AttentionFlags> {
        let waiting = self
            .entries
            .get(&id)
            .is_some_and(|e| e.flags.waiting_for_interaction);

        if focused && waiting && is_meaningful_input(bytes) {
            debug!(session_id = %id, "Prompt answered, lifting typing block");
            self.unblock(id)
        } else {
            self.block_while_typing(id, now)
        }
    }

    /// Resets every flag of every session in one pass.
    pub fn clear_all(&mut self) -> Vec<(SessionId, AttentionFlags)> {
        let mut changed = Vec::new();
        for (id, entry) in &mut self.entries {
            entry.block.cancel();
            if !entry.flags.is_clear() {
                entry.flags = AttentionFlags::default();
                changed.push((*id, entry.flags));
            }
        }
        changed.sort_by_key(|(id, _)| *id);
        changed
    }

    /// Ends typing blocks whose quiet interval has passed.
    pub fn poll_expired(&mut self, now: Instant) -> Vec<(SessionId, AttentionFlags)> {
        let mut changed = Vec::new();
        for (id, entry) in &mut self.entries {
            if entry.block.take_expired(now) && entry.flags.notifications_blocked {
                entry.flags.notifications_blocked = false;
                debug!(session_id = %id, "Typing block expired");
                changed.push((*id, entry.flags));
            }
        }
        changed.sort_by_key(|(id, _)| *id);
        changed
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        earliest(self.entries.values().map(|e| e.block.deadline()))
    }

    fn update(
        &mut self,
        id: SessionId,
        apply: impl FnOnce(&mut AttentionEntry),
    ) -> Option<AttentionFlags> {
        let Some(entry) = self.entries.get_mut(&id) else {
            debug!(session_id = %id, "Attention update for unknown session ignored");
            return None;
        };
        let before = entry.flags;
        apply(entry);
        (entry.flags != before).then_some(entry.flags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BLOCK: Duration = Duration::from_secs(3);

    fn id(n: u8) -> SessionId {
        SessionId::new(n).unwrap()
    }

    fn tracker() -> AttentionTracker {
        let mut t = AttentionTracker::new(BLOCK);
        t.attach(id(0));
        t.attach(id(1));
        t
    }

    #[test]
    fn test_mark_is_idempotent() {
        let mut t = tracker();
        assert!(t.mark_needs_attention(id(1)).is_some());
        assert!(t.mark_needs_attention(id(1)).is_none());
        assert!(t.flags(id(1)).unwrap().needs_attention);

        assert!(t.clear(id(1)).is_some());
        assert!(!t.flags(id(1)).unwrap().needs_attention);
    }

    #[test]
    fn test_block_expires_after_last_call() {
        let mut t = tracker();
        let start = Instant::now();

        // Keystrokes every second for four seconds.
        for s in 0..5 {
            let now = start + Duration::from_secs(s);
            t.block_while_typing(id(0), now);
            assert!(t.is_blocked(id(0), now));
        }
        let last = start + Duration::from_secs(4);

        assert!(t.is_blocked(id(0), last + Duration::from_millis(2_999)));
        assert!(t.poll_expired(last + Duration::from_millis(2_999)).is_empty());

        assert!(!t.is_blocked(id(0), last + BLOCK));
        let expired = t.poll_expired(last + BLOCK);
        assert_eq!(expired.len(), 1);
        assert!(!expired[0].1.notifications_blocked);
        assert_eq!(t.next_deadline(), None);
    }

    #[test]
    fn test_only_meaningful_focused_input_unblocks() {
        let mut t = tracker();
        let now = Instant::now();
        t.on_prompt_detected(id(0), now);
        t.block_while_typing(id(0), now);

        // Not focused: keeps blocking.
        t.handle_input(id(0), b"y", false, now);
        assert!(t.is_blocked(id(0), now));

        // Focused but not an answer.
        t.handle_input(id(0), b"x", true, now);
        assert!(t.is_blocked(id(0), now));

        let flags = t.handle_input(id(0), b"\r", true, now).unwrap();
        assert!(!flags.notifications_blocked);
        assert!(!flags.waiting_for_interaction);
        assert!(!t.is_blocked(id(0), now));
    }

    #[test]
    fn test_meaningful_input_without_prompt_blocks() {
        let mut t = tracker();
        let now = Instant::now();
        t.handle_input(id(0), b"\r", true, now);
        assert!(t.is_blocked(id(0), now));
    }

    #[test]
    fn test_prompt_while_typing_does_not_flag_user() {
        let mut t = tracker();
        let now = Instant::now();
        t.block_while_typing(id(1), now);

        let flags = t.on_prompt_detected(id(1), now + Duration::from_secs(1)).unwrap();
        assert!(flags.waiting_for_interaction);
        assert!(!flags.needs_attention);

        let flags = t.on_prompt_detected(id(0), now).unwrap();
        assert!(flags.needs_attention);
    }

    #[test]
    fn test_clear_all() {
        let mut t = tracker();
        let now = Instant::now();
        t.mark_needs_attention(id(0));
        t.block_while_typing(id(1), now);

        let changed = t.clear_all();
        assert_eq!(changed.len(), 2);
        assert!(t.flags(id(0)).unwrap().is_clear());
        assert!(t.flags(id(1)).unwrap().is_clear());
        assert_eq!(t.next_deadline(), None);
    }

    #[test]
    fn test_unknown_session_is_noop() {
        let mut t = tracker();
        assert!(t.mark_needs_attention(id(5)).is_none());
        assert!(!t.is_blocked(id(5), Instant::now()));
    }
}
