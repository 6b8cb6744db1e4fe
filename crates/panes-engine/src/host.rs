//! Boundary to whatever runs the backing processes.
//!
//! The orchestrator drives a [`ProcessHost`] through four calls and hears
//! back through a channel of [`HostEvent`]s. Every event echoes the
//! generation of the spawn it belongs to, so late events from a previous
//! occupant of a reused id can be told apart.

use std::io;
use std::path::PathBuf;

use async_trait::async_trait;
use panes_core::{SessionId, SessionMode};
use thiserror::Error;

use crate::resize::CellSize;

/// Everything needed to launch one backing process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpawnRequest {
    pub session_id: SessionId,
    pub generation: u64,
    pub directory: PathBuf,
    pub mode: SessionMode,
    pub size: CellSize,
}

/// Events reported by a process host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    /// A chunk of terminal output, in arrival order.
    Output {
        session_id: SessionId,
        generation: u64,
        bytes: Vec<u8>,
    },
    /// The process is gone. `code` is `None` when it died from a signal.
    Exited {
        session_id: SessionId,
        generation: u64,
        code: Option<i32>,
    },
}

impl HostEvent {
    pub fn session_id(&self) -> SessionId {
        match self {
            HostEvent::Output { session_id, .. } | HostEvent::Exited { session_id, .. } => {
                *session_id
            }
        }
    }

    pub fn generation(&self) -> u64 {
        match self {
            HostEvent::Output { generation, .. } | HostEvent::Exited { generation, .. } => {
                *generation
            }
        }
    }
}

/// Errors reported by a process host.
#[derive(Error, Debug)]
pub enum HostError {
    #[error("failed to spawn process for session {session_id}: {message}")]
    SpawnFailed {
        session_id: SessionId,
        message: String,
    },

    #[error("no running process for session {session_id}")]
    NotRunning { session_id: SessionId },

    #[error("process I/O failed for session {session_id}: {source}")]
    Io {
        session_id: SessionId,
        #[source]
        source: io::Error,
    },
}

/// Runs backing processes on behalf of the orchestrator.
#[async_trait]
pub trait ProcessHost: Send + Sync {
    /// Starts the process for a session.
    ///
    /// # Errors
    ///
    /// Returns [`HostError::SpawnFailed`] if the process could not be started.
    async fn spawn(&self, request: SpawnRequest) -> Result<(), HostError>;

    /// Writes keystrokes to the session's process.
    async fn send_input(&self, session_id: SessionId, bytes: &[u8]) -> Result<(), HostError>;

    /// Changes the terminal size seen by the process.
    async fn resize(&self, session_id: SessionId, size: CellSize) -> Result<(), HostError>;

    /// Asks the process to exit. Exit is reported later as [`HostEvent::Exited`].
    async fn terminate(&self, session_id: SessionId) -> Result<(), HostError>;
}
