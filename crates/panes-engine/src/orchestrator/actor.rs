//! Orchestrator actor - owns every component and all per-session state.
//!
//! The actor is the only place session state changes. It waits on three
//! sources at once: commands from handles, events from the process host,
//! and the earliest armed deadline of any component. Each wake-up is handled
//! to completion before the next one, which gives per-session ordering and
//! makes multi-step operations (a mode switch and its resizes) atomic.
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Host and store failures are logged and rolled back, never fatal
//! - Channel send failures are ignored (subscribers may be gone)

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use panes_core::{
    AttentionFlags, DomainError, EngineSnapshot, LayoutMode, LifecycleState, NoticeLevel, Region,
    RemovalReason, SessionAttention, SessionId, SessionMode, SessionView, SignatureScanner,
};
use tokio::sync::{broadcast, mpsc};
use tokio::time::{sleep_until, Duration, Instant};
use tracing::{debug, info, warn};

use super::commands::{CloseOutcome, EngineEvent, OrchestratorCommand, OrchestratorError};
use crate::attention::AttentionTracker;
use crate::config::{EngineConfig, TimingConfig};
use crate::host::{HostError, HostEvent, ProcessHost, SpawnRequest};
use crate::layout::LayoutEngine;
use crate::registry::SessionRegistry;
use crate::resize::{CellSize, ResizeCoordinator};
use crate::scroll::ScrollGuard;
use crate::store::DirectoryStore;
use crate::timer::{earliest, Deadline};

type OrchestratorResult<T> = Result<T, OrchestratorError>;

// ============================================================================
// Per-session bookkeeping
// ============================================================================

/// A session waiting to become ready.
struct PendingStart {
    /// Fail-open deadline.
    ready: Deadline,
    scanner: SignatureScanner,
    /// Text typed into the session once it is ready.
    task: Option<String>,
}

/// A hold-to-confirm in progress for a danger mode.
struct DangerHold {
    started: Instant,
    length: Duration,
    completes: Deadline,
    directory: PathBuf,
    mode: SessionMode,
    task: Option<String>,
}

impl DangerHold {
    fn progress(&self, now: Instant) -> f32 {
        if self.length.is_zero() {
            return 1.0;
        }
        let elapsed = now.saturating_duration_since(self.started);
        (elapsed.as_secs_f32() / self.length.as_secs_f32()).clamp(0.0, 1.0)
    }
}

// ============================================================================
// Orchestrator Actor
// ============================================================================

/// The orchestrator actor.
///
/// # Ownership
///
/// - `registry`: the only structure every component reads ids from
/// - `attention`, `scroll`, `layout`, `resize`: each owns its per-id state
/// - `pending_starts`, `holds`, `prompts`: lifecycle bookkeeping
pub struct OrchestratorActor {
    receiver: mpsc::Receiver<OrchestratorCommand>,
    host_events: mpsc::Receiver<HostEvent>,
    event_publisher: broadcast::Sender<EngineEvent>,

    host: Arc<dyn ProcessHost>,
    store: Arc<dyn DirectoryStore>,
    timing: TimingConfig,

    registry: SessionRegistry,
    attention: AttentionTracker,
    scroll: ScrollGuard,
    layout: LayoutEngine,
    resize: ResizeCoordinator,

    pending_starts: HashMap<SessionId, PendingStart>,
    holds: HashMap<SessionId, DangerHold>,
    /// Confirmation-prompt scanners for sessions with a process.
    prompts: HashMap<SessionId, SignatureScanner>,

    focused: Option<SessionId>,
    next_generation: u64,
}

impl OrchestratorActor {
    pub fn new(
        config: &EngineConfig,
        receiver: mpsc::Receiver<OrchestratorCommand>,
        host_events: mpsc::Receiver<HostEvent>,
        event_publisher: broadcast::Sender<EngineEvent>,
        host: Arc<dyn ProcessHost>,
        store: Arc<dyn DirectoryStore>,
    ) -> Self {
        let timing = config.timing.clone();
        Self {
            receiver,
            host_events,
            event_publisher,
            host,
            store,
            registry: SessionRegistry::new(),
            attention: AttentionTracker::new(timing.typing_block()),
            scroll: ScrollGuard::new(timing.scroll_release()),
            layout: LayoutEngine::new(&config.layout),
            resize: ResizeCoordinator::new(timing.resize_debounce()),
            timing,
            pending_starts: HashMap::new(),
            holds: HashMap::new(),
            prompts: HashMap::new(),
            focused: None,
            next_generation: 1,
        }
    }

    /// Runs the actor until shutdown or until every handle is dropped.
    pub async fn run(mut self) {
        info!("Orchestrator starting");
        let mut host_open = true;

        loop {
            let wake = self.next_deadline();
            tokio::select! {
                cmd = self.receiver.recv() => match cmd {
                    Some(OrchestratorCommand::Shutdown { respond_to }) => {
                        self.shutdown().await;
                        let _ = respond_to.send(());
                        break;
                    }
                    Some(cmd) => self.handle_command(cmd).await,
                    None => {
                        self.shutdown().await;
                        break;
                    }
                },
                event = self.host_events.recv(), if host_open => match event {
                    Some(event) => self.handle_host_event(event).await,
                    None => {
                        warn!("Process host event channel closed");
                        host_open = false;
                    }
                },
                () = wait_until(wake) => self.handle_timers(Instant::now()).await,
            }
        }

        info!(sessions = self.registry.len(), "Orchestrator stopped");
    }

    /// Dispatches a command to its handler.
    async fn handle_command(&mut self, cmd: OrchestratorCommand) {
        let now = Instant::now();
        match cmd {
            OrchestratorCommand::AddSession { respond_to } => {
                let result = self.handle_add_session(now);
                // Ignore send error - client may have dropped the receiver
                let _ = respond_to.send(result);
            }
            OrchestratorCommand::OpenSlot {
                session_id,
                respond_to,
            } => {
                let result = absorb_stale(self.handle_open_slot(session_id));
                let _ = respond_to.send(result);
            }
            OrchestratorCommand::CancelDirectory {
                session_id,
                respond_to,
            } => {
                let result = absorb_stale(self.handle_cancel_directory(session_id));
                let _ = respond_to.send(result);
            }
            OrchestratorCommand::Start {
                session_id,
                directory,
                mode,
                task,
                respond_to,
            } => {
                let result = if mode.is_dangerous() {
                    Err(DomainError::invalid(
                        "mode",
                        mode.as_str(),
                        "new or resume (danger modes start through a hold)",
                    )
                    .into())
                } else {
                    absorb_stale(self.start_session(session_id, directory, mode, task).await)
                };
                let _ = respond_to.send(result);
            }
            OrchestratorCommand::BeginDangerHold {
                session_id,
                directory,
                mode,
                task,
                respond_to,
            } => {
                let result = absorb_stale(
                    self.handle_begin_danger_hold(session_id, directory, mode, task, now),
                );
                let _ = respond_to.send(result);
            }
            OrchestratorCommand::CancelDangerHold {
                session_id,
                respond_to,
            } => {
                if self.holds.remove(&session_id).is_some() {
                    debug!(session_id = %session_id, "Danger hold cancelled");
                }
                let _ = respond_to.send(Ok(()));
            }
            OrchestratorCommand::HoldProgress {
                session_id,
                respond_to,
            } => {
                let progress = self
                    .holds
                    .get(&session_id)
                    .map_or(0.0, |hold| hold.progress(now));
                let _ = respond_to.send(progress);
            }
            OrchestratorCommand::SendInput { session_id, bytes } => {
                self.handle_send_input(session_id, bytes, now).await;
            }
            OrchestratorCommand::UserScroll {
                session_id,
                at_bottom,
            } => {
                self.scroll.on_user_scroll(session_id, at_bottom, now);
            }
            OrchestratorCommand::Focus {
                session_id,
                respond_to,
            } => {
                let result = absorb_stale(self.handle_focus(session_id, now));
                let _ = respond_to.send(result);
            }
            OrchestratorCommand::RequestClose {
                session_id,
                respond_to,
            } => {
                let result = absorb_stale(self.handle_close(session_id, false, now).await);
                let _ = respond_to.send(result);
            }
            OrchestratorCommand::ConfirmClose {
                session_id,
                respond_to,
            } => {
                let result = absorb_stale(self.handle_close(session_id, true, now).await);
                let _ = respond_to.send(result);
            }
            OrchestratorCommand::Swap { a, b, respond_to } => {
                let result = absorb_stale(
                    self.layout
                        .swap(a, b)
                        .map(|()| self.relayout(now))
                        .map_err(Into::into),
                );
                let _ = respond_to.send(result);
            }
            OrchestratorCommand::MoveByPosition {
                position,
                direction,
                respond_to,
            } => {
                let result = self
                    .layout
                    .move_by_position(position, direction)
                    .map(|new_position| {
                        self.relayout(now);
                        new_position
                    })
                    .map_err(Into::into);
                let _ = respond_to.send(result);
            }
            OrchestratorCommand::SetMode { mode, respond_to } => {
                self.handle_set_mode(mode, now);
                let _ = respond_to.send(Ok(()));
            }
            OrchestratorCommand::SetArrangement { name, respond_to } => {
                let result = self
                    .layout
                    .set_arrangement(&name)
                    .map(|changed| {
                        if changed {
                            self.relayout(now);
                        }
                    })
                    .map_err(Into::into);
                let _ = respond_to.send(result);
            }
            OrchestratorCommand::CycleArrangement { respond_to } => {
                let arrangement = self.layout.cycle_arrangement();
                self.relayout(now);
                let _ = respond_to.send(Ok(arrangement));
            }
            OrchestratorCommand::SetSplitRatio {
                handle,
                percent,
                respond_to,
            } => {
                let result = self
                    .layout
                    .set_split_ratio(handle, percent)
                    .map(|ratio| {
                        self.relayout(now);
                        ratio
                    })
                    .map_err(Into::into);
                let _ = respond_to.send(result);
            }
            OrchestratorCommand::SelectTab {
                session_id,
                respond_to,
            } => {
                let result = absorb_stale(self.handle_focus(session_id, now));
                let _ = respond_to.send(result);
            }
            OrchestratorCommand::SetTitle {
                session_id,
                title,
                respond_to,
            } => {
                let result = absorb_stale(self.handle_set_title(session_id, title));
                let _ = respond_to.send(result);
            }
            OrchestratorCommand::WindowResized { cols, rows } => {
                if self.resize.set_container(cols, rows) {
                    debug!(cols, rows, "Container resized");
                    self.relayout(now);
                }
            }
            OrchestratorCommand::MarkNeedsAttention {
                session_id,
                respond_to,
            } => {
                let result = absorb_stale(self.require(session_id).map(|()| {
                    if let Some(flags) = self.attention.mark_needs_attention(session_id) {
                        self.publish_attention(session_id, flags);
                    }
                }));
                let _ = respond_to.send(result);
            }
            OrchestratorCommand::ClearAttention {
                session_id,
                respond_to,
            } => {
                let result = absorb_stale(self.require(session_id).map(|()| {
                    if let Some(flags) = self.attention.clear(session_id) {
                        self.publish_attention(session_id, flags);
                    }
                }));
                let _ = respond_to.send(result);
            }
            OrchestratorCommand::ClearAllAttention { respond_to } => {
                for (session_id, flags) in self.attention.clear_all() {
                    self.publish_attention(session_id, flags);
                }
                debug!("Cleared all attention flags");
                let _ = respond_to.send(());
            }
            OrchestratorCommand::Snapshot { respond_to } => {
                let _ = respond_to.send(self.snapshot());
            }
            OrchestratorCommand::Shutdown { respond_to } => {
                // Handled in run(); kept exhaustive.
                let _ = respond_to.send(());
            }
        }
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    fn handle_add_session(&mut self, now: Instant) -> OrchestratorResult<SessionId> {
        let id = self.registry.create().map_err(|e| {
            warn!(error = %e, "Cannot add session");
            e
        })?;
        self.attention.attach(id);
        self.scroll.attach(id);
        self.registry
            .require_mut(id)?
            .transition_to(LifecycleState::AwaitingDirectory)?;

        info!(session_id = %id, total = self.registry.len(), "Session added");
        self.publish_session(id);
        self.relayout(now);
        self.set_focus(id, now);
        self.suggest_directory(id);
        Ok(id)
    }

    fn handle_open_slot(&mut self, id: SessionId) -> OrchestratorResult<()> {
        self.registry
            .require_mut(id)?
            .transition_to(LifecycleState::AwaitingDirectory)?;
        self.publish_session(id);
        self.suggest_directory(id);
        Ok(())
    }

    fn handle_cancel_directory(&mut self, id: SessionId) -> OrchestratorResult<()> {
        self.registry
            .require_mut(id)?
            .transition_to(LifecycleState::Empty)?;
        self.holds.remove(&id);
        debug!(session_id = %id, "Directory selection cancelled");
        self.publish_session(id);
        Ok(())
    }

    /// Spawns the backing process; a failed spawn rolls back to directory selection.
    async fn start_session(
        &mut self,
        id: SessionId,
        directory: PathBuf,
        mode: SessionMode,
        task: Option<String>,
    ) -> OrchestratorResult<()> {
        if directory.as_os_str().is_empty() {
            return Err(DomainError::invalid("directory", "", "a working directory").into());
        }
        {
            let session = self.registry.require_mut(id)?;
            let from = session.state();
            if !from.can_transition_to(LifecycleState::Starting) {
                return Err(DomainError::InvalidTransition {
                    session_id: id,
                    from,
                    to: LifecycleState::Starting,
                }
                .into());
            }
            session.working_directory = Some(directory.clone());
            session.mode = Some(mode);
            session.transition_to(LifecycleState::Starting)?;
        }
        self.holds.remove(&id);
        self.publish_session(id);

        let generation = self.next_generation;
        self.next_generation += 1;
        let size = self.spawn_size(id);
        let request = SpawnRequest {
            session_id: id,
            generation,
            directory: directory.clone(),
            mode,
            size,
        };

        if let Err(e) = self.host.spawn(request).await {
            warn!(session_id = %id, error = %e, "Spawn failed, returning to directory selection");
            if let Some(session) = self.registry.get_mut(id) {
                if let Err(e) = session.transition_to(LifecycleState::AwaitingDirectory) {
                    warn!(session_id = %id, error = %e, "Rollback after spawn failure refused");
                }
            }
            self.publish_session(id);
            // Offer the rejected directory again so it can be corrected.
            self.publish(EngineEvent::DirectorySuggested {
                session_id: id,
                directory,
            });
            self.notice(
                Some(id),
                NoticeLevel::Error,
                format!("Could not start session {}: {e}", id.number()),
            );
            return Err(OrchestratorError::ProcessSpawnFailed {
                session_id: id,
                message: e.to_string(),
            });
        }

        if let Some(session) = self.registry.get_mut(id) {
            session.attach_process(generation);
        }
        self.resize.mark_sent(id, size);

        let timeout = self.timing.ready_timeout(task.is_some());
        let mut ready = Deadline::default();
        ready.arm(Instant::now(), timeout);
        self.pending_starts.insert(
            id,
            PendingStart {
                ready,
                scanner: SignatureScanner::ready(),
                task,
            },
        );
        self.prompts.insert(id, SignatureScanner::attention());

        info!(
            session_id = %id,
            generation,
            mode = %mode.as_str(),
            directory = %directory.display(),
            timeout_ms = timeout.as_millis() as u64,
            "Session starting"
        );
        self.persist_directory(id, directory);
        Ok(())
    }

    fn handle_begin_danger_hold(
        &mut self,
        id: SessionId,
        directory: PathBuf,
        mode: SessionMode,
        task: Option<String>,
        now: Instant,
    ) -> OrchestratorResult<()> {
        if !mode.is_dangerous() {
            return Err(
                DomainError::invalid("mode", mode.as_str(), "dangerous or dangerous-resume").into(),
            );
        }
        let from = self
            .registry
            .get(id)
            .map(|s| s.state())
            .ok_or(DomainError::StaleReference { session_id: id })?;
        if !from.can_transition_to(LifecycleState::Starting) {
            return Err(DomainError::InvalidTransition {
                session_id: id,
                from,
                to: LifecycleState::Starting,
            }
            .into());
        }

        let length = self.timing.danger_hold();
        let mut completes = Deadline::default();
        completes.arm(now, length);
        self.holds.insert(
            id,
            DangerHold {
                started: now,
                length,
                completes,
                directory,
                mode,
                task,
            },
        );
        debug!(
            session_id = %id,
            mode = %mode.as_str(),
            hold_ms = length.as_millis() as u64,
            "Danger hold started"
        );
        Ok(())
    }

    /// Moves a starting session to `Ready` and delivers its pending task.
    async fn mark_ready(&mut self, id: SessionId, detected: bool) {
        let Some(pending) = self.pending_starts.remove(&id) else {
            return;
        };
        let Some(session) = self.registry.get_mut(id) else {
            return;
        };
        if let Err(e) = session.transition_to(LifecycleState::Ready) {
            warn!(session_id = %id, error = %e, "Cannot mark session ready");
            return;
        }

        if detected {
            info!(session_id = %id, "Session ready");
        } else {
            info!(session_id = %id, "Readiness not detected in time, showing session anyway");
        }
        self.publish_session(id);

        if let Some(task) = pending.task {
            let mut payload = task.into_bytes();
            payload.push(b'\r');
            match self.host.send_input(id, &payload).await {
                Ok(()) => debug!(session_id = %id, bytes = payload.len(), "Delivered pending task"),
                Err(e) => warn!(session_id = %id, error = %e, "Failed to deliver pending task"),
            }
        }
    }

    async fn handle_close(
        &mut self,
        id: SessionId,
        confirmed: bool,
        now: Instant,
    ) -> OrchestratorResult<CloseOutcome> {
        let session = self
            .registry
            .get(id)
            .ok_or(DomainError::StaleReference { session_id: id })?;

        match session.state() {
            LifecycleState::Empty | LifecycleState::AwaitingDirectory => {
                self.remove_session(id, RemovalReason::Cancelled, now);
                Ok(CloseOutcome::Removed)
            }
            LifecycleState::Closing => Ok(CloseOutcome::AlreadyClosing),
            LifecycleState::Starting | LifecycleState::Ready => {
                if !confirmed && session.requires_close_confirmation() {
                    debug!(session_id = %id, "Close needs confirmation");
                    self.publish(EngineEvent::ConfirmationRequired { session_id: id });
                    return Err(OrchestratorError::NeedsConfirmation { session_id: id });
                }
                self.begin_close(id, now).await
            }
        }
    }

    async fn begin_close(
        &mut self,
        id: SessionId,
        now: Instant,
    ) -> OrchestratorResult<CloseOutcome> {
        self.registry
            .require_mut(id)?
            .transition_to(LifecycleState::Closing)?;
        self.pending_starts.remove(&id);
        self.holds.remove(&id);
        self.publish_session(id);
        info!(session_id = %id, "Closing session");

        match self.host.terminate(id).await {
            Ok(()) => Ok(CloseOutcome::Closing),
            Err(HostError::NotRunning { .. }) => {
                debug!(session_id = %id, "Process already gone");
                self.remove_session(id, RemovalReason::Closed, now);
                Ok(CloseOutcome::Removed)
            }
            Err(e) => {
                warn!(session_id = %id, error = %e, "Terminate failed, waiting for exit");
                self.notice(
                    Some(id),
                    NoticeLevel::Warning,
                    format!("Session {} did not accept the close request: {e}", id.number()),
                );
                Ok(CloseOutcome::Closing)
            }
        }
    }

    /// Frees a slot and every piece of per-session state.
    fn remove_session(&mut self, id: SessionId, reason: RemovalReason, now: Instant) {
        if self.registry.remove(id).is_none() {
            return;
        }
        self.attention.detach(id);
        self.scroll.detach(id);
        self.resize.forget(id);
        self.pending_starts.remove(&id);
        self.holds.remove(&id);
        self.prompts.remove(&id);

        info!(session_id = %id, %reason, remaining = self.registry.len(), "Session removed");
        self.publish(EngineEvent::SessionRemoved {
            session_id: id,
            reason,
        });
        self.relayout(now);

        if self.focused == Some(id) {
            self.focused = self.layout.active_tab();
            self.publish(EngineEvent::FocusChanged {
                focused: self.focused,
            });
        }
    }

    // ========================================================================
    // Input, focus, layout
    // ========================================================================

    async fn handle_send_input(&mut self, id: SessionId, bytes: Vec<u8>, now: Instant) {
        let accepts_input = self
            .registry
            .get(id)
            .is_some_and(|s| {
                matches!(s.state(), LifecycleState::Starting | LifecycleState::Ready)
            });
        if !accepts_input {
            debug!(session_id = %id, "Input for session without a live process ignored");
            return;
        }

        let focused = self.focused == Some(id);
        if let Some(flags) = self.attention.handle_input(id, &bytes, focused, now) {
            self.publish_attention(id, flags);
        }
        if let Err(e) = self.host.send_input(id, &bytes).await {
            warn!(session_id = %id, error = %e, "Failed to send input");
        }
    }

    fn handle_focus(&mut self, id: SessionId, now: Instant) -> OrchestratorResult<()> {
        self.require(id)?;
        self.set_focus(id, now);
        Ok(())
    }

    /// Focuses a session, clears its attention flag, and shows its tab.
    fn set_focus(&mut self, id: SessionId, now: Instant) {
        if self.focused != Some(id) {
            self.focused = Some(id);
            self.publish(EngineEvent::FocusChanged { focused: Some(id) });
        }
        if let Some(flags) = self.attention.clear(id) {
            self.publish_attention(id, flags);
        }
        if let Ok(true) = self.layout.select_tab(id) {
            if self.layout.mode() == LayoutMode::Tabbed {
                self.relayout(now);
            }
        }
    }

    /// Switches Grid and Tabbed in one step, including the resizes it causes.
    fn handle_set_mode(&mut self, mode: LayoutMode, now: Instant) {
        if !self.layout.set_mode(mode, self.focused) {
            return;
        }
        if mode == LayoutMode::Tabbed {
            let tab = self.layout.active_tab();
            if tab.is_some() && tab != self.focused {
                self.focused = tab;
                self.publish(EngineEvent::FocusChanged { focused: tab });
            }
        }
        info!(mode = %mode, "Layout mode switched");
        self.relayout(now);
    }

    fn handle_set_title(&mut self, id: SessionId, title: Option<String>) -> OrchestratorResult<()> {
        self.registry.require_mut(id)?.set_title(title);
        self.publish_session(id);
        Ok(())
    }

    /// Reconciles the layout with the registry, plans resizes for visible
    /// processes, and publishes the new layout.
    fn relayout(&mut self, now: Instant) {
        self.layout.sync(&self.registry.active_ids());
        self.layout.ensure_valid();
        let snapshot = self.layout.snapshot();

        let registry = &self.registry;
        self.resize.plan(&snapshot.topology, now, |id| {
            registry
                .get(id)
                .is_some_and(|s| matches!(s.state(), LifecycleState::Starting | LifecycleState::Ready))
        });
        self.publish(EngineEvent::LayoutChanged { layout: snapshot });
    }

    fn spawn_size(&self, id: SessionId) -> CellSize {
        let topology = self.layout.topology();
        let region = topology
            .placement_for(id)
            .map_or(Region::FULL, |p| p.region);
        self.resize.cell_size(&region)
    }

    // ========================================================================
    // Host events and timers
    // ========================================================================

    async fn handle_host_event(&mut self, event: HostEvent) {
        let id = event.session_id();
        let generation = event.generation();
        if self.registry.find_by_generation(id, generation).is_none() {
            debug!(session_id = %id, generation, "Dropping event from a previous process");
            return;
        }

        let now = Instant::now();
        match event {
            HostEvent::Output { bytes, .. } => self.handle_output(id, bytes, now).await,
            HostEvent::Exited { code, .. } => self.handle_exit(id, code, now),
        }
    }

    async fn handle_output(&mut self, id: SessionId, bytes: Vec<u8>, now: Instant) {
        let state = self.registry.get(id).map(|s| s.state());

        let ready_signature = match state {
            Some(LifecycleState::Starting) => self
                .pending_starts
                .get_mut(&id)
                .and_then(|p| p.scanner.scan(&bytes)),
            _ => None,
        };
        let prompt_signature = match state {
            Some(LifecycleState::Starting | LifecycleState::Ready) => {
                self.prompts.get_mut(&id).and_then(|s| s.scan(&bytes))
            }
            _ => None,
        };

        self.scroll.on_output_burst(id, now);
        let follow = self.scroll.on_programmatic_scroll_request(id, now);
        self.publish(EngineEvent::Output {
            session_id: id,
            bytes,
            follow,
        });

        if let Some(signature) = ready_signature {
            debug!(session_id = %id, signature, "Readiness signature seen");
            self.mark_ready(id, true).await;
        }
        if let Some(signature) = prompt_signature {
            debug!(session_id = %id, signature, "Confirmation prompt seen");
            if let Some(flags) = self.attention.on_prompt_detected(id, now) {
                self.publish_attention(id, flags);
            }
        }
    }

    fn handle_exit(&mut self, id: SessionId, code: Option<i32>, now: Instant) {
        let state = self.registry.get(id).map(|s| s.state());
        if let Some(session) = self.registry.get_mut(id) {
            session.detach_process();
        }

        if state == Some(LifecycleState::Closing) {
            info!(session_id = %id, ?code, "Process exited after close");
            self.remove_session(id, RemovalReason::Closed, now);
        } else {
            warn!(session_id = %id, ?code, ?state, "Process exited unexpectedly");
            let detail = code.map_or_else(
                || " (killed by signal)".to_string(),
                |c| format!(" (exit code {c})"),
            );
            self.notice(
                Some(id),
                NoticeLevel::Warning,
                format!("Session {} exited unexpectedly{detail}", id.number()),
            );
            self.remove_session(id, RemovalReason::UnexpectedExit, now);
        }
    }

    async fn handle_timers(&mut self, now: Instant) {
        for (id, flags) in self.attention.poll_expired(now) {
            self.publish_attention(id, flags);
        }
        self.scroll.poll_expired(now);

        for (id, size) in self.resize.poll_due(now) {
            if let Err(e) = self.host.resize(id, size).await {
                debug!(session_id = %id, error = %e, "Resize not delivered");
            }
        }

        let mut timed_out: Vec<SessionId> = self
            .pending_starts
            .iter()
            .filter(|(_, p)| p.ready.is_due(now))
            .map(|(id, _)| *id)
            .collect();
        timed_out.sort();
        for id in timed_out {
            self.mark_ready(id, false).await;
        }

        let mut completed: Vec<SessionId> = self
            .holds
            .iter()
            .filter(|(_, h)| h.completes.is_due(now))
            .map(|(id, _)| *id)
            .collect();
        completed.sort();
        for id in completed {
            let Some(hold) = self.holds.remove(&id) else {
                continue;
            };
            info!(session_id = %id, mode = %hold.mode.as_str(), "Danger hold completed");
            if let Err(e) = self
                .start_session(id, hold.directory, hold.mode, hold.task)
                .await
            {
                warn!(session_id = %id, error = %e, "Start after danger hold failed");
            }
        }
    }

    fn next_deadline(&self) -> Option<Instant> {
        earliest([
            self.attention.next_deadline(),
            self.scroll.next_deadline(),
            self.resize.next_deadline(),
            earliest(self.pending_starts.values().map(|p| p.ready.deadline())),
            earliest(self.holds.values().map(|h| h.completes.deadline())),
        ])
    }

    async fn shutdown(&mut self) {
        let live: Vec<SessionId> = self
            .registry
            .iter()
            .filter(|s| s.state().has_process())
            .map(|s| s.id)
            .collect();
        for id in live {
            if let Err(e) = self.host.terminate(id).await {
                debug!(session_id = %id, error = %e, "Terminate on shutdown failed");
            }
        }
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    fn require(&self, id: SessionId) -> OrchestratorResult<()> {
        if self.registry.contains(id) {
            Ok(())
        } else {
            Err(DomainError::StaleReference { session_id: id }.into())
        }
    }

    fn snapshot(&self) -> EngineSnapshot {
        EngineSnapshot {
            sessions: self.registry.iter().map(SessionView::from_session).collect(),
            attention: self
                .registry
                .active_ids()
                .into_iter()
                .filter_map(|session_id| {
                    self.attention
                        .flags(session_id)
                        .map(|flags| SessionAttention { session_id, flags })
                })
                .collect(),
            layout: self.layout.snapshot(),
            focused: self.focused,
        }
    }

    fn publish(&self, event: EngineEvent) {
        // Ignore send error - there may be no subscribers
        let _ = self.event_publisher.send(event);
    }

    fn publish_session(&self, id: SessionId) {
        if let Some(session) = self.registry.get(id) {
            self.publish(EngineEvent::SessionStateChanged {
                session: SessionView::from_session(session),
            });
        }
    }

    fn publish_attention(&self, id: SessionId, flags: AttentionFlags) {
        self.publish(EngineEvent::AttentionChanged {
            session_id: id,
            flags,
        });
    }

    fn notice(&self, session_id: Option<SessionId>, level: NoticeLevel, message: String) {
        self.publish(EngineEvent::Notice {
            session_id,
            level,
            message,
        });
    }

    /// Looks up the slot's last directory without blocking the actor.
    fn suggest_directory(&self, id: SessionId) {
        let store = Arc::clone(&self.store);
        let publisher = self.event_publisher.clone();
        tokio::spawn(async move {
            match store.load_last_directory(id).await {
                Ok(Some(directory)) => {
                    let _ = publisher.send(EngineEvent::DirectorySuggested {
                        session_id: id,
                        directory,
                    });
                }
                Ok(None) => {}
                Err(e) => warn!(session_id = %id, error = %e, "Failed to load last directory"),
            }
        });
    }

    fn persist_directory(&self, id: SessionId, directory: PathBuf) {
        let store = Arc::clone(&self.store);
        tokio::spawn(async move {
            if let Err(e) = store.save_last_directory(id, &directory).await {
                warn!(session_id = %id, error = %e, "Failed to save last directory");
            }
        });
    }
}

/// Turns a stale-reference failure into a logged no-op.
fn absorb_stale<T: Default>(result: OrchestratorResult<T>) -> OrchestratorResult<T> {
    match result {
        Err(e) if e.is_stale() => {
            debug!(error = %e, "Stale session reference ignored");
            Ok(T::default())
        }
        other => other,
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => sleep_until(at).await,
        None => std::future::pending::<()>().await,
    }
}
