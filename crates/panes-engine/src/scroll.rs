//! Scroll guard: automatic scroll-to-bottom never fights the user.
//!
//! Scrolling up marks the session as user-scrolling and arms a release
//! deadline. Output arriving while that deadline is armed pushes it back, so
//! the guard only releases after a full quiet interval.

use std::collections::HashMap;

use panes_core::SessionId;
use tokio::time::{Duration, Instant};
use tracing::debug;

use crate::timer::{earliest, Deadline};

#[derive(Debug, Default)]
struct ScrollEntry {
    user_scrolling: bool,
    release: Deadline,
}

/// Per-session scroll state.
#[derive(Debug)]
pub struct ScrollGuard {
    entries: HashMap<SessionId, ScrollEntry>,
    release_after: Duration,
}

impl ScrollGuard {
    pub fn new(release_after: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            release_after,
        }
    }

    /// Starts tracking a session, not scrolling.
    pub fn attach(&mut self, id: SessionId) {
        self.entries.insert(id, ScrollEntry::default());
    }

    pub fn detach(&mut self, id: SessionId) {
        self.entries.remove(&id);
    }

    #[cfg(test)]
    pub fn is_user_scrolling(&self, id: SessionId) -> bool {
        self.entries.get(&id).is_some_and(|e| e.user_scrolling)
    }

    /// Output arrived: an armed release deadline starts over.
    pub fn on_output_burst(&mut self, id: SessionId, now: Instant) {
        let release_after = self.release_after;
        if let Some(entry) = self.entries.get_mut(&id) {
            if entry.release.is_armed() && !entry.release.is_due(now) {
                entry.release.arm(now, release_after);
            }
        }
    }

    /// The user scrolled. Reaching the bottom releases the guard at once.
    pub fn on_user_scroll(&mut self, id: SessionId, at_bottom: bool, now: Instant) {
        let release_after = self.release_after;
        let Some(entry) = self.entries.get_mut(&id) else {
            debug!(session_id = %id, "Scroll for unknown session ignored");
            return;
        };
        if at_bottom {
            entry.user_scrolling = false;
            entry.release.cancel();
        } else {
            entry.user_scrolling = true;
            entry.release.arm(now, release_after);
        }
    }

    /// Whether an automatic scroll-to-bottom may happen now.
    pub fn on_programmatic_scroll_request(&mut self, id: SessionId, now: Instant) -> bool {
        let Some(entry) = self.entries.get_mut(&id) else {
            return false;
        };
        if entry.release.take_expired(now) {
            entry.user_scrolling = false;
        }
        !entry.user_scrolling
    }

    /// Releases guards whose quiet interval has passed.
    pub fn poll_expired(&mut self, now: Instant) -> Vec<SessionId> {
        let mut released: Vec<SessionId> = self
            .entries
            .iter_mut()
            .filter_map(|(id, entry)| {
                entry.release.take_expired(now).then(|| {
                    entry.user_scrolling = false;
                    *id
                })
            })
            .collect();
        released.sort();
        for id in &released {
            debug!(session_id = %id, "Scroll guard released");
        }
        released
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        earliest(self.entries.values().map(|e| e.release.deadline()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RELEASE: Duration = Duration::from_secs(30);

    fn id(n: u8) -> SessionId {
        SessionId::new(n).unwrap()
    }

    fn guard() -> ScrollGuard {
        let mut g = ScrollGuard::new(RELEASE);
        g.attach(id(0));
        g
    }

    #[test]
    fn test_starts_following() {
        let mut g = guard();
        assert!(g.on_programmatic_scroll_request(id(0), Instant::now()));
    }

    #[test]
    fn test_scrolled_up_refuses_until_quiet() {
        let mut g = guard();
        let start = Instant::now();
        g.on_user_scroll(id(0), false, start);

        for s in [0, 1, 10, 29] {
            assert!(!g.on_programmatic_scroll_request(id(0), start + Duration::from_secs(s)));
        }
        assert!(g.on_programmatic_scroll_request(id(0), start + RELEASE));
        assert!(!g.is_user_scrolling(id(0)));
    }

    #[test]
    fn test_output_extends_release() {
        let mut g = guard();
        let start = Instant::now();
        g.on_user_scroll(id(0), false, start);
        g.on_output_burst(id(0), start + Duration::from_secs(20));

        assert!(g.poll_expired(start + RELEASE).is_empty());
        assert!(g.is_user_scrolling(id(0)));
        assert_eq!(
            g.poll_expired(start + Duration::from_secs(50)),
            vec![id(0)]
        );
        assert!(!g.is_user_scrolling(id(0)));
    }

    #[test]
    fn test_output_without_scroll_arms_nothing() {
        let mut g = guard();
        g.on_output_burst(id(0), Instant::now());
        assert_eq!(g.next_deadline(), None);
    }

    #[test]
    fn test_scroll_to_bottom_releases_immediately() {
        let mut g = guard();
        let now = Instant::now();
        g.on_user_scroll(id(0), false, now);
        g.on_user_scroll(id(0), true, now + Duration::from_secs(1));
        assert!(g.on_programmatic_scroll_request(id(0), now + Duration::from_secs(1)));
        assert_eq!(g.next_deadline(), None);
    }

    #[test]
    fn test_unknown_session_never_follows() {
        let mut g = guard();
        assert!(!g.on_programmatic_scroll_request(id(3), Instant::now()));
    }
}
