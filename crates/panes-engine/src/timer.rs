//! Single-slot deadlines.
//!
//! Every per-session timer in the engine is a [`Deadline`]: arming it again
//! replaces the pending instant, so timers never stack. Nothing here sleeps;
//! the orchestrator sleeps until the earliest armed deadline and then asks
//! each component which of its deadlines expired.

use tokio::time::{Duration, Instant};

/// One re-armable deadline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Deadline {
    at: Option<Instant>,
}

impl Deadline {
    /// Arms (or re-arms) the deadline `after` from `now`.
    pub fn arm(&mut self, now: Instant, after: Duration) {
        self.at = Some(now + after);
    }

    pub fn cancel(&mut self) {
        self.at = None;
    }

    pub fn is_armed(&self) -> bool {
        self.at.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.at
    }

    /// True if armed and due at `now`.
    pub fn is_due(&self, now: Instant) -> bool {
        self.at.is_some_and(|at| at <= now)
    }

    /// Disarms and returns true if the deadline was due at `now`.
    pub fn take_expired(&mut self, now: Instant) -> bool {
        if self.is_due(now) {
            self.at = None;
            true
        } else {
            false
        }
    }
}

/// Earliest of several optional instants.
pub fn earliest(instants: impl IntoIterator<Item = Option<Instant>>) -> Option<Instant> {
    instants.into_iter().flatten().min()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rearm_replaces() {
        let now = Instant::now();
        let mut deadline = Deadline::default();
        deadline.arm(now, Duration::from_secs(3));
        deadline.arm(now + Duration::from_secs(2), Duration::from_secs(3));

        assert!(!deadline.is_due(now + Duration::from_secs(3)));
        assert!(deadline.is_due(now + Duration::from_secs(5)));
    }

    #[test]
    fn test_take_expired_disarms() {
        let now = Instant::now();
        let mut deadline = Deadline::default();
        deadline.arm(now, Duration::from_millis(300));

        assert!(!deadline.take_expired(now));
        assert!(deadline.take_expired(now + Duration::from_millis(300)));
        assert!(!deadline.is_armed());
        assert!(!deadline.take_expired(now + Duration::from_secs(1)));
    }

    #[test]
    fn test_earliest() {
        let now = Instant::now();
        let later = now + Duration::from_secs(1);
        assert_eq!(earliest([None, Some(later), Some(now)]), Some(now));
        assert_eq!(earliest([None, None]), None);
    }
}
