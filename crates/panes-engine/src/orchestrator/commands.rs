//! Orchestrator commands, errors, and events.
//!
//! - `OrchestratorCommand`: requests sent to the actor, most with a oneshot reply
//! - `OrchestratorError`: what a request can fail with
//! - `EngineEvent`: state changes published to every subscriber

use std::path::PathBuf;

use panes_core::{
    Arrangement, AttentionFlags, DomainError, EngineSnapshot, LayoutMode, LayoutSnapshot,
    MoveDirection, NoticeLevel, RemovalReason, SessionId, SessionMode, SessionView, SplitHandle,
    SplitRatio,
};
use thiserror::Error;
use tokio::sync::oneshot;

/// Reply channel of a fallible command.
pub type Reply<T> = oneshot::Sender<Result<T, OrchestratorError>>;

// ============================================================================
// Commands
// ============================================================================

/// Requests handled by the orchestrator actor, one at a time.
///
/// Each command is processed to completion before the next one starts, so a
/// layout switch and the resizes it plans happen as one step.
#[derive(Debug)]
pub enum OrchestratorCommand {
    /// Occupy the lowest free slot and start prompting for a directory.
    AddSession { respond_to: Reply<SessionId> },

    /// Move an `Empty` slot to `AwaitingDirectory`.
    OpenSlot {
        session_id: SessionId,
        respond_to: Reply<()>,
    },

    /// Move an `AwaitingDirectory` slot back to `Empty`.
    CancelDirectory {
        session_id: SessionId,
        respond_to: Reply<()>,
    },

    /// Spawn the backing process for a non-danger mode.
    Start {
        session_id: SessionId,
        directory: PathBuf,
        mode: SessionMode,
        task: Option<String>,
        respond_to: Reply<()>,
    },

    /// Begin the hold-to-confirm that starts a danger mode.
    BeginDangerHold {
        session_id: SessionId,
        directory: PathBuf,
        mode: SessionMode,
        task: Option<String>,
        respond_to: Reply<()>,
    },

    /// Abandon a hold; its progress resets to zero.
    CancelDangerHold {
        session_id: SessionId,
        respond_to: Reply<()>,
    },

    /// Progress of a hold in `0.0..=1.0`.
    HoldProgress {
        session_id: SessionId,
        respond_to: oneshot::Sender<f32>,
    },

    /// Keystrokes for the session's process. Fire-and-forget.
    SendInput {
        session_id: SessionId,
        bytes: Vec<u8>,
    },

    /// The user scrolled the session's output. Fire-and-forget.
    UserScroll {
        session_id: SessionId,
        at_bottom: bool,
    },

    Focus {
        session_id: SessionId,
        respond_to: Reply<()>,
    },

    /// Close a session; sessions that reached `Ready` need confirmation.
    RequestClose {
        session_id: SessionId,
        respond_to: Reply<CloseOutcome>,
    },

    /// Close without asking.
    ConfirmClose {
        session_id: SessionId,
        respond_to: Reply<CloseOutcome>,
    },

    Swap {
        a: SessionId,
        b: SessionId,
        respond_to: Reply<()>,
    },

    /// Returns the moved pane's new position.
    MoveByPosition {
        position: usize,
        direction: MoveDirection,
        respond_to: Reply<usize>,
    },

    SetMode {
        mode: LayoutMode,
        respond_to: Reply<()>,
    },

    SetArrangement {
        name: String,
        respond_to: Reply<()>,
    },

    /// Advance to the next arrangement for the current count.
    CycleArrangement { respond_to: Reply<Arrangement> },

    /// Returns the ratio actually stored after clamping.
    SetSplitRatio {
        handle: SplitHandle,
        percent: f32,
        respond_to: Reply<SplitRatio>,
    },

    SelectTab {
        session_id: SessionId,
        respond_to: Reply<()>,
    },

    SetTitle {
        session_id: SessionId,
        title: Option<String>,
        respond_to: Reply<()>,
    },

    /// The container changed size. Fire-and-forget.
    WindowResized { cols: u16, rows: u16 },

    MarkNeedsAttention {
        session_id: SessionId,
        respond_to: Reply<()>,
    },

    ClearAttention {
        session_id: SessionId,
        respond_to: Reply<()>,
    },

    ClearAllAttention { respond_to: oneshot::Sender<()> },

    Snapshot {
        respond_to: oneshot::Sender<EngineSnapshot>,
    },

    /// Terminate every process and stop the actor.
    Shutdown { respond_to: oneshot::Sender<()> },
}

/// What a close request did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CloseOutcome {
    /// The slot had no process and is gone.
    Removed,
    /// Termination was requested; removal follows the exit.
    Closing,
    /// A close was already in progress.
    AlreadyClosing,
    /// The session no longer exists.
    #[default]
    Gone,
}

// ============================================================================
// Errors
// ============================================================================

/// Errors returned by orchestrator operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OrchestratorError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("failed to start session {session_id}: {message}")]
    ProcessSpawnFailed {
        session_id: SessionId,
        message: String,
    },

    #[error("closing session {session_id} requires confirmation")]
    NeedsConfirmation { session_id: SessionId },

    #[error("orchestrator channel closed")]
    ChannelClosed,
}

impl OrchestratorError {
    pub fn is_stale(&self) -> bool {
        matches!(self, OrchestratorError::Domain(e) if e.is_stale())
    }
}

// ============================================================================
// Events
// ============================================================================

/// State changes published to subscribers.
///
/// A presentation layer can be rebuilt from these alone.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    SessionStateChanged { session: SessionView },

    SessionRemoved {
        session_id: SessionId,
        reason: RemovalReason,
    },

    AttentionChanged {
        session_id: SessionId,
        flags: AttentionFlags,
    },

    LayoutChanged { layout: LayoutSnapshot },

    FocusChanged { focused: Option<SessionId> },

    /// Output of a session, with whether the view may follow it to the bottom.
    Output {
        session_id: SessionId,
        bytes: Vec<u8>,
        follow: bool,
    },

    /// The directory this slot used last time.
    DirectorySuggested {
        session_id: SessionId,
        directory: PathBuf,
    },

    Notice {
        session_id: Option<SessionId>,
        level: NoticeLevel,
        message: String,
    },

    ConfirmationRequired { session_id: SessionId },
}
