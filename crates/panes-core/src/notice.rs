//! Out-of-band notices and removal reasons reported to front-ends.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Severity of a notice shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

impl NoticeLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            NoticeLevel::Info => "info",
            NoticeLevel::Warning => "warning",
            NoticeLevel::Error => "error",
        }
    }
}

impl fmt::Display for NoticeLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a session slot was released.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemovalReason {
    /// The user closed a slot that never had a process.
    Cancelled,
    /// A requested close completed after the process exited.
    Closed,
    /// The process exited without being asked to.
    UnexpectedExit,
}

impl fmt::Display for RemovalReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RemovalReason::Cancelled => "cancelled",
            RemovalReason::Closed => "closed",
            RemovalReason::UnexpectedExit => "unexpected_exit",
        };
        f.write_str(s)
    }
}
