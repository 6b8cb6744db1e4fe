//! Error types for the panes TUI.
//!
//! Terminal setup and teardown failures carry the underlying message so the
//! binary can print something actionable before exiting.

use std::io;

use panes_engine::OrchestratorError;
use thiserror::Error;

/// TUI application errors.
#[derive(Error, Debug)]
pub enum TuiError {
    /// Raw mode or the alternate screen could not be set up.
    ///
    /// Usually means stdout is not a terminal.
    #[error("Failed to initialize terminal: {0}")]
    TerminalInit(String),

    /// The terminal could not be restored; running `reset` can help.
    #[error("Failed to restore terminal: {0}")]
    TerminalCleanup(String),

    /// The engine refused a request or has stopped.
    #[error("Engine error: {0}")]
    Engine(#[from] OrchestratorError),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Convenience Result type alias for TUI operations.
pub type Result<T> = std::result::Result<T, TuiError>;
