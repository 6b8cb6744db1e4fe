//! Domain-specific error types following panic-free policy.

use crate::{LifecycleState, SessionId};
use thiserror::Error;

/// Errors that can occur in domain operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    /// All session slots are occupied.
    #[error("session capacity exceeded (max: {max} sessions)")]
    CapacityExceeded { max: usize },

    /// The session id is no longer in the registry.
    ///
    /// Expected under concurrent close requests; callers treat it as a no-op.
    #[error("stale session reference: {session_id}")]
    StaleReference { session_id: SessionId },

    /// The lifecycle state machine does not allow this edge.
    #[error("invalid transition for session {session_id}: {from} -> {to}")]
    InvalidTransition {
        session_id: SessionId,
        from: LifecycleState,
        to: LifecycleState,
    },

    /// Invalid field value
    #[error("Invalid {field}: {value} (expected {expected})")]
    InvalidFieldValue {
        field: String,
        value: String,
        expected: String,
    },
}

impl DomainError {
    /// Shorthand for an [`DomainError::InvalidFieldValue`].
    pub fn invalid(field: &str, value: impl ToString, expected: &str) -> Self {
        Self::InvalidFieldValue {
            field: field.to_string(),
            value: value.to_string(),
            expected: expected.to_string(),
        }
    }

    /// Returns true for errors that are expected races rather than faults.
    #[must_use]
    pub fn is_stale(&self) -> bool {
        matches!(self, Self::StaleReference { .. })
    }
}

/// Result type for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DomainError::CapacityExceeded { max: 6 };
        assert_eq!(err.to_string(), "session capacity exceeded (max: 6 sessions)");

        let id = SessionId::new(2).unwrap();
        let err = DomainError::StaleReference { session_id: id };
        assert_eq!(err.to_string(), "stale session reference: 2");
        assert!(err.is_stale());

        let err = DomainError::InvalidTransition {
            session_id: id,
            from: LifecycleState::Empty,
            to: LifecycleState::Ready,
        };
        assert_eq!(
            err.to_string(),
            "invalid transition for session 2: empty -> ready"
        );
        assert!(!err.is_stale());
    }

    #[test]
    fn test_invalid_helper() {
        let err = DomainError::invalid("mode", "turbo", "new|resume");
        assert_eq!(err.to_string(), "Invalid mode: turbo (expected new|resume)");
    }
}
