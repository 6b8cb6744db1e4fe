//! Session domain entities and value objects.

use crate::{DomainError, DomainResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;

/// Maximum number of concurrent sessions.
pub const MAX_SESSIONS: usize = 6;

/// Number of colors in the project header palette.
pub const PROJECT_PALETTE_SIZE: usize = 8;

// ============================================================================
// Type-Safe Identifiers
// ============================================================================

/// Identifier of one session slot.
///
/// A small 0-based index below [`MAX_SESSIONS`]. Ids are stable for the
/// lifetime of a session and are reused once the session is removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct SessionId(u8);

impl SessionId {
    /// Creates a session id, returning `None` when out of range.
    pub fn new(index: u8) -> Option<Self> {
        if usize::from(index) < MAX_SESSIONS {
            Some(Self(index))
        } else {
            None
        }
    }

    /// Returns the underlying slot index.
    #[must_use]
    pub fn index(self) -> u8 {
        self.0
    }

    /// Iterates over every valid id, lowest first.
    pub fn all() -> impl Iterator<Item = SessionId> {
        (0..MAX_SESSIONS as u8).map(SessionId)
    }

    /// Human-facing slot number (1-based).
    #[must_use]
    pub fn number(self) -> u8 {
        self.0.saturating_add(1)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<u8> for SessionId {
    type Error = DomainError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value).ok_or_else(|| {
            DomainError::invalid("session id", value, &format!("0..{MAX_SESSIONS}"))
        })
    }
}

impl From<SessionId> for u8 {
    fn from(id: SessionId) -> Self {
        id.0
    }
}

// ============================================================================
// Lifecycle State
// ============================================================================

/// Lifecycle of one session slot.
///
/// ```text
/// Empty -> AwaitingDirectory -> Starting -> Ready -> Closing -> (removed)
///            ^         |            |                  ^
///            +--cancel-+            +--spawn failed----+ (back to AwaitingDirectory)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    /// Slot exists but nothing was chosen yet.
    #[default]
    Empty,

    /// The directory/session chooser is open.
    AwaitingDirectory,

    /// The backing process was spawned; waiting for it to announce readiness.
    Starting,

    /// The backing process is live and shown.
    Ready,

    /// Termination was requested; waiting for the host to confirm exit.
    Closing,
}

impl LifecycleState {
    /// Returns the display label for this state.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::AwaitingDirectory => "choose directory",
            Self::Starting => "starting",
            Self::Ready => "ready",
            Self::Closing => "closing",
        }
    }

    /// Returns true if a backing process may exist in this state.
    #[must_use]
    pub fn has_process(&self) -> bool {
        matches!(self, Self::Starting | Self::Ready | Self::Closing)
    }

    /// Returns true if the state machine permits `self -> next`.
    #[must_use]
    pub fn can_transition_to(&self, next: LifecycleState) -> bool {
        use LifecycleState::*;
        matches!(
            (self, next),
            (Empty, AwaitingDirectory)
                | (AwaitingDirectory, Empty)
                | (AwaitingDirectory, Starting)
                | (Starting, Ready)
                | (Starting, AwaitingDirectory)
                | (Starting, Closing)
                | (Ready, Closing)
        )
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Empty => "empty",
            Self::AwaitingDirectory => "awaiting_directory",
            Self::Starting => "starting",
            Self::Ready => "ready",
            Self::Closing => "closing",
        };
        f.write_str(name)
    }
}

// ============================================================================
// Session Mode
// ============================================================================

/// How the agent inside a session is launched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionMode {
    /// Fresh agent conversation.
    New,
    /// Resume a previous conversation.
    Resume,
    /// Fresh conversation with permission prompts skipped.
    Dangerous,
    /// Resumed conversation with permission prompts skipped.
    DangerousResume,
}

impl SessionMode {
    /// Every mode, in chooser order.
    pub const ALL: [SessionMode; 4] = [
        SessionMode::New,
        SessionMode::Resume,
        SessionMode::Dangerous,
        SessionMode::DangerousResume,
    ];

    /// Wire name of the mode.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Resume => "resume",
            Self::Dangerous => "dangerous",
            Self::DangerousResume => "dangerous-resume",
        }
    }

    /// Danger modes require a hold-to-confirm before starting.
    #[must_use]
    pub fn is_dangerous(&self) -> bool {
        matches!(self, Self::Dangerous | Self::DangerousResume)
    }

    #[must_use]
    pub fn is_resume(&self) -> bool {
        matches!(self, Self::Resume | Self::DangerousResume)
    }

    /// Next mode in chooser order, wrapping around.
    #[must_use]
    pub fn next(&self) -> SessionMode {
        match self {
            Self::New => Self::Resume,
            Self::Resume => Self::Dangerous,
            Self::Dangerous => Self::DangerousResume,
            Self::DangerousResume => Self::New,
        }
    }
}

impl fmt::Display for SessionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionMode {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|mode| mode.as_str() == s)
            .ok_or_else(|| {
                DomainError::invalid("session mode", s, "new|resume|dangerous|dangerous-resume")
            })
    }
}

// ============================================================================
// Session
// ============================================================================

/// One interactive shell slot.
///
/// The lifecycle state is private: every change goes through
/// [`Session::transition_to`], which enforces the state machine and the
/// `Ready` invariant (a ready session has a directory and a live process).
#[derive(Debug, Clone)]
pub struct Session {
    /// Slot id.
    pub id: SessionId,

    state: LifecycleState,

    /// Chosen working directory; set once the user picks one.
    pub working_directory: Option<PathBuf>,

    /// Launch mode chosen alongside the directory.
    pub mode: Option<SessionMode>,

    /// Title from an external title update, overriding the project name.
    custom_title: Option<String>,

    /// Generation of the live backing process, if any.
    process_generation: Option<u64>,

    /// Whether this session ever reached `Ready`.
    has_been_ready: bool,

    /// When the slot was created.
    pub created_at: DateTime<Utc>,
}

impl Session {
    /// Creates an empty session slot.
    pub fn new(id: SessionId) -> Self {
        Self {
            id,
            state: LifecycleState::Empty,
            working_directory: None,
            mode: None,
            custom_title: None,
            process_generation: None,
            has_been_ready: false,
            created_at: Utc::now(),
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// Moves the session along the lifecycle state machine.
    ///
    /// Returns the previous state.
    ///
    /// # Errors
    ///
    /// `DomainError::InvalidTransition` if the edge is not allowed, or if the
    /// target is `Ready` without a working directory and a live process.
    pub fn transition_to(&mut self, next: LifecycleState) -> DomainResult<LifecycleState> {
        let invalid = DomainError::InvalidTransition {
            session_id: self.id,
            from: self.state,
            to: next,
        };

        if !self.state.can_transition_to(next) {
            return Err(invalid);
        }
        if next == LifecycleState::Ready
            && (self.working_directory.is_none() || self.process_generation.is_none())
        {
            return Err(invalid);
        }

        let previous = self.state;
        self.state = next;

        match next {
            LifecycleState::Ready => self.has_been_ready = true,
            // Neither state has a directory or a process.
            LifecycleState::Empty | LifecycleState::AwaitingDirectory => {
                self.process_generation = None;
                self.working_directory = None;
                self.mode = None;
            }
            LifecycleState::Starting | LifecycleState::Closing => {}
        }

        debug!(session_id = %self.id, from = %previous, to = %next, "Lifecycle transition");
        Ok(previous)
    }

    /// Records the live backing process.
    pub fn attach_process(&mut self, generation: u64) {
        self.process_generation = Some(generation);
    }

    /// Forgets the backing process handle.
    pub fn detach_process(&mut self) {
        self.process_generation = None;
    }

    /// Generation of the live backing process.
    #[must_use]
    pub fn process_generation(&self) -> Option<u64> {
        self.process_generation
    }

    #[must_use]
    pub fn has_been_ready(&self) -> bool {
        self.has_been_ready
    }

    /// Closing a session that reached `Ready` needs explicit confirmation.
    #[must_use]
    pub fn requires_close_confirmation(&self) -> bool {
        self.has_been_ready && self.state != LifecycleState::Closing
    }

    /// Last path segment of the working directory.
    #[must_use]
    pub fn project_name(&self) -> Option<String> {
        self.working_directory.as_deref().and_then(project_name_of)
    }

    /// Sets or clears the externally provided title.
    ///
    /// A blank title restores the project-derived default.
    pub fn set_title(&mut self, title: Option<String>) {
        self.custom_title = title
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());
    }

    /// Title shown in the pane header.
    #[must_use]
    pub fn display_title(&self) -> String {
        if let Some(title) = &self.custom_title {
            return title.clone();
        }
        self.project_name()
            .unwrap_or_else(|| format!("Session {}", self.id.number()))
    }
}

/// Extracts the project name from a directory path.
pub fn project_name_of(path: &Path) -> Option<String> {
    path.file_name()
        .and_then(|name| name.to_str())
        .filter(|name| !name.is_empty())
        .map(str::to_string)
}

/// Up to two uppercase initials for a project name.
///
/// `my-project` -> `MP`, `panes` -> `PA`.
pub fn project_initials(name: &str) -> String {
    let words: Vec<&str> = name
        .split(|c: char| c == '-' || c == '_' || c == '.' || c.is_whitespace())
        .filter(|w| !w.is_empty())
        .collect();

    let initials: String = if words.len() >= 2 {
        words
            .iter()
            .take(2)
            .filter_map(|w| w.chars().next())
            .collect()
    } else {
        name.chars().filter(|c| c.is_alphanumeric()).take(2).collect()
    };

    initials.to_uppercase()
}

/// Stable palette index for a project name.
///
/// FNV-1a so the color survives restarts and layout switches.
pub fn project_color_index(name: &str) -> u8 {
    let mut hash: u32 = 0x811c_9dc5;
    for byte in name.bytes() {
        hash ^= u32::from(byte);
        hash = hash.wrapping_mul(0x0100_0193);
    }
    (hash % PROJECT_PALETTE_SIZE as u32) as u8
}

// ============================================================================
// Session View (presentation projection)
// ============================================================================

/// Read-only projection of a session for the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionView {
    pub id: SessionId,
    pub state: LifecycleState,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_name: Option<String>,
    pub initials: String,
    pub color_index: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub working_directory: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<SessionMode>,
    pub has_been_ready: bool,
    pub created_at: String,
}

impl SessionView {
    /// Builds the view from the domain entity.
    pub fn from_session(session: &Session) -> Self {
        let project_name = session.project_name();
        let (initials, color_index) = match &project_name {
            Some(name) => (project_initials(name), project_color_index(name)),
            None => (format!("{}", session.id.number()), 0),
        };

        Self {
            id: session.id,
            state: session.state(),
            title: session.display_title(),
            project_name,
            initials,
            color_index,
            working_directory: session
                .working_directory
                .as_ref()
                .map(|p| p.display().to_string()),
            mode: session.mode,
            has_been_ready: session.has_been_ready(),
            created_at: session.created_at.to_rfc3339(),
        }
    }
}
