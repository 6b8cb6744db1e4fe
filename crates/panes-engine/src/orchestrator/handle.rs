//! Client interface for the orchestrator actor.
//!
//! `OrchestratorHandle` is cheap to clone and can be shared between the key
//! handler, the renderer, and the serve loop. Channel failures map to
//! `OrchestratorError::ChannelClosed`.

use std::path::PathBuf;

use panes_core::{
    Arrangement, EngineSnapshot, LayoutMode, MoveDirection, SessionId, SessionMode, SplitHandle,
    SplitRatio,
};
use tokio::sync::{broadcast, mpsc, oneshot};

use super::commands::{CloseOutcome, EngineEvent, OrchestratorCommand, OrchestratorError, Reply};

// ============================================================================
// Orchestrator Handle
// ============================================================================

/// Handle for talking to the orchestrator actor.
///
/// ```ignore
/// let id = handle.add_session().await?;
/// handle.start(id, "/work/app".into(), SessionMode::New, None).await?;
///
/// let mut events = handle.subscribe();
/// while let Ok(event) = events.recv().await {
///     // render
/// }
/// ```
#[derive(Clone)]
pub struct OrchestratorHandle {
    sender: mpsc::Sender<OrchestratorCommand>,
    event_sender: broadcast::Sender<EngineEvent>,
}

impl OrchestratorHandle {
    pub fn new(
        sender: mpsc::Sender<OrchestratorCommand>,
        event_sender: broadcast::Sender<EngineEvent>,
    ) -> Self {
        Self {
            sender,
            event_sender,
        }
    }

    /// Sends a command and waits for its reply.
    async fn call<T>(
        &self,
        make: impl FnOnce(Reply<T>) -> OrchestratorCommand,
    ) -> Result<T, OrchestratorError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(make(tx))
            .await
            .map_err(|_| OrchestratorError::ChannelClosed)?;
        rx.await.map_err(|_| OrchestratorError::ChannelClosed)?
    }

    /// Sends a command whose reply cannot fail.
    async fn query<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> OrchestratorCommand,
    ) -> Result<T, OrchestratorError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(make(tx))
            .await
            .map_err(|_| OrchestratorError::ChannelClosed)?;
        rx.await.map_err(|_| OrchestratorError::ChannelClosed)
    }

    /// Occupies the lowest free slot and opens its directory prompt.
    ///
    /// # Errors
    ///
    /// - `DomainError::CapacityExceeded` when all slots are taken
    /// - `ChannelClosed` if the actor has shut down
    pub async fn add_session(&self) -> Result<SessionId, OrchestratorError> {
        self.call(|respond_to| OrchestratorCommand::AddSession { respond_to })
            .await
    }

    /// Opens the directory prompt of an `Empty` slot.
    ///
    /// # Errors
    ///
    /// `DomainError::InvalidTransition` if the slot is not empty.
    pub async fn open_slot(&self, session_id: SessionId) -> Result<(), OrchestratorError> {
        self.call(|respond_to| OrchestratorCommand::OpenSlot {
            session_id,
            respond_to,
        })
        .await
    }

    /// Leaves the directory prompt; the slot goes back to `Empty`.
    ///
    /// # Errors
    ///
    /// `DomainError::InvalidTransition` if the slot is not awaiting a directory.
    pub async fn cancel_directory(&self, session_id: SessionId) -> Result<(), OrchestratorError> {
        self.call(|respond_to| OrchestratorCommand::CancelDirectory {
            session_id,
            respond_to,
        })
        .await
    }

    /// Launches the agent for a non-danger mode.
    ///
    /// # Errors
    ///
    /// - `DomainError::InvalidFieldValue` for a danger mode or empty directory
    /// - `DomainError::InvalidTransition` if the slot is not awaiting a directory
    /// - `ProcessSpawnFailed` if the host could not start the process
    pub async fn start(
        &self,
        session_id: SessionId,
        directory: PathBuf,
        mode: SessionMode,
        task: Option<String>,
    ) -> Result<(), OrchestratorError> {
        self.call(|respond_to| OrchestratorCommand::Start {
            session_id,
            directory,
            mode,
            task,
            respond_to,
        })
        .await
    }

    /// Starts the hold that launches a danger mode when it completes.
    ///
    /// # Errors
    ///
    /// `DomainError::InvalidFieldValue` for a non-danger mode.
    pub async fn begin_danger_hold(
        &self,
        session_id: SessionId,
        directory: PathBuf,
        mode: SessionMode,
        task: Option<String>,
    ) -> Result<(), OrchestratorError> {
        self.call(|respond_to| OrchestratorCommand::BeginDangerHold {
            session_id,
            directory,
            mode,
            task,
            respond_to,
        })
        .await
    }

    /// Abandons a hold; progress goes back to zero.
    ///
    /// # Errors
    ///
    /// `ChannelClosed` if the actor has shut down.
    pub async fn cancel_danger_hold(&self, session_id: SessionId) -> Result<(), OrchestratorError> {
        self.call(|respond_to| OrchestratorCommand::CancelDangerHold {
            session_id,
            respond_to,
        })
        .await
    }

    /// Hold progress in `0.0..=1.0`; zero when no hold is running.
    pub async fn hold_progress(&self, session_id: SessionId) -> f32 {
        self.query(|respond_to| OrchestratorCommand::HoldProgress {
            session_id,
            respond_to,
        })
        .await
        .unwrap_or(0.0)
    }

    /// Forwards keystrokes to the session's process. Fire-and-forget.
    pub async fn send_input(&self, session_id: SessionId, bytes: Vec<u8>) {
        // Ignore send error - actor may be shutting down
        let _ = self
            .sender
            .send(OrchestratorCommand::SendInput { session_id, bytes })
            .await;
    }

    /// Reports a manual scroll. Fire-and-forget.
    pub async fn user_scroll(&self, session_id: SessionId, at_bottom: bool) {
        let _ = self
            .sender
            .send(OrchestratorCommand::UserScroll {
                session_id,
                at_bottom,
            })
            .await;
    }

    /// Focuses a session and clears its attention flag.
    ///
    /// # Errors
    ///
    /// `ChannelClosed` if the actor has shut down.
    pub async fn focus(&self, session_id: SessionId) -> Result<(), OrchestratorError> {
        self.call(|respond_to| OrchestratorCommand::Focus {
            session_id,
            respond_to,
        })
        .await
    }

    /// Closes a session.
    ///
    /// # Errors
    ///
    /// `NeedsConfirmation` if the session has been ready; follow up with
    /// [`Self::confirm_close`].
    pub async fn request_close(&self, session_id: SessionId) -> Result<CloseOutcome, OrchestratorError> {
        self.call(|respond_to| OrchestratorCommand::RequestClose {
            session_id,
            respond_to,
        })
        .await
    }

    /// Closes a session without asking.
    ///
    /// # Errors
    ///
    /// `ChannelClosed` if the actor has shut down.
    pub async fn confirm_close(&self, session_id: SessionId) -> Result<CloseOutcome, OrchestratorError> {
        self.call(|respond_to| OrchestratorCommand::ConfirmClose {
            session_id,
            respond_to,
        })
        .await
    }

    /// Exchanges the screen positions of two sessions.
    ///
    /// # Errors
    ///
    /// `ChannelClosed` if the actor has shut down.
    pub async fn swap(&self, a: SessionId, b: SessionId) -> Result<(), OrchestratorError> {
        self.call(|respond_to| OrchestratorCommand::Swap { a, b, respond_to })
            .await
    }

    /// Moves the pane at `position` one step, wrapping around.
    ///
    /// # Errors
    ///
    /// `DomainError::InvalidFieldValue` if `position` is out of range.
    pub async fn move_by_position(
        &self,
        position: usize,
        direction: MoveDirection,
    ) -> Result<usize, OrchestratorError> {
        self.call(|respond_to| OrchestratorCommand::MoveByPosition {
            position,
            direction,
            respond_to,
        })
        .await
    }

    /// Switches between grid and tabs.
    ///
    /// # Errors
    ///
    /// `ChannelClosed` if the actor has shut down.
    pub async fn set_mode(&self, mode: LayoutMode) -> Result<(), OrchestratorError> {
        self.call(|respond_to| OrchestratorCommand::SetMode { mode, respond_to })
            .await
    }

    /// Picks an arrangement by name.
    ///
    /// # Errors
    ///
    /// `DomainError::InvalidFieldValue` for an unknown name.
    pub async fn set_arrangement(&self, name: impl Into<String>) -> Result<(), OrchestratorError> {
        let name = name.into();
        self.call(|respond_to| OrchestratorCommand::SetArrangement { name, respond_to })
            .await
    }

    /// Cycles the arrangement for the current session count.
    ///
    /// # Errors
    ///
    /// `ChannelClosed` if the actor has shut down.
    pub async fn cycle_arrangement(&self) -> Result<Arrangement, OrchestratorError> {
        self.call(|respond_to| OrchestratorCommand::CycleArrangement { respond_to })
            .await
    }

    /// Drags a splitter; returns the clamped ratio that was stored.
    ///
    /// # Errors
    ///
    /// `DomainError::InvalidFieldValue` if the current arrangement has no such splitter.
    pub async fn set_split_ratio(
        &self,
        handle: SplitHandle,
        percent: f32,
    ) -> Result<SplitRatio, OrchestratorError> {
        self.call(|respond_to| OrchestratorCommand::SetSplitRatio {
            handle,
            percent,
            respond_to,
        })
        .await
    }

    /// Shows and focuses a tab.
    ///
    /// # Errors
    ///
    /// `ChannelClosed` if the actor has shut down.
    pub async fn select_tab(&self, session_id: SessionId) -> Result<(), OrchestratorError> {
        self.call(|respond_to| OrchestratorCommand::SelectTab {
            session_id,
            respond_to,
        })
        .await
    }

    /// Overrides the display title; `None` or blank restores the default.
    ///
    /// # Errors
    ///
    /// `ChannelClosed` if the actor has shut down.
    pub async fn set_title(
        &self,
        session_id: SessionId,
        title: Option<String>,
    ) -> Result<(), OrchestratorError> {
        self.call(|respond_to| OrchestratorCommand::SetTitle {
            session_id,
            title,
            respond_to,
        })
        .await
    }

    /// Reports the container size in cells. Fire-and-forget.
    pub async fn window_resized(&self, cols: u16, rows: u16) {
        let _ = self
            .sender
            .send(OrchestratorCommand::WindowResized { cols, rows })
            .await;
    }

    /// Flags a session as needing the user.
    ///
    /// # Errors
    ///
    /// `ChannelClosed` if the actor has shut down.
    pub async fn mark_needs_attention(&self, session_id: SessionId) -> Result<(), OrchestratorError> {
        self.call(|respond_to| OrchestratorCommand::MarkNeedsAttention {
            session_id,
            respond_to,
        })
        .await
    }

    /// Clears a session's attention flag.
    ///
    /// # Errors
    ///
    /// `ChannelClosed` if the actor has shut down.
    pub async fn clear_attention(&self, session_id: SessionId) -> Result<(), OrchestratorError> {
        self.call(|respond_to| OrchestratorCommand::ClearAttention {
            session_id,
            respond_to,
        })
        .await
    }

    /// Resets every attention flag of every session.
    ///
    /// # Errors
    ///
    /// `ChannelClosed` if the actor has shut down.
    pub async fn clear_all_attention(&self) -> Result<(), OrchestratorError> {
        self.query(|respond_to| OrchestratorCommand::ClearAllAttention { respond_to })
            .await
    }

    /// Full current state.
    ///
    /// # Errors
    ///
    /// `ChannelClosed` if the actor has shut down.
    pub async fn snapshot(&self) -> Result<EngineSnapshot, OrchestratorError> {
        self.query(|respond_to| OrchestratorCommand::Snapshot { respond_to })
            .await
    }

    /// Terminates every process and stops the actor.
    pub async fn shutdown(&self) {
        let _ = self
            .query(|respond_to| OrchestratorCommand::Shutdown { respond_to })
            .await;
    }

    /// Subscribes to engine events.
    ///
    /// Synchronous; does not talk to the actor.
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.event_sender.subscribe()
    }

    /// Returns true while the actor is running.
    pub fn is_connected(&self) -> bool {
        !self.sender.is_closed()
    }
}
