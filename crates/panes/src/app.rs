//! Application state for the panes TUI.
//!
//! Everything here is rebuilt from engine events; the TUI never decides
//! lifecycle or layout on its own. Local state is limited to what the engine
//! does not model: directory prompt text, output tails, scroll offsets, and
//! the prefix-key latch.
//!
//! All code follows the panic-free policy: no `.unwrap()`, `.expect()`,
//! `panic!()`, `unreachable!()`, `todo!()`, or direct indexing `[i]`.

use std::collections::{BTreeMap, HashMap};

use panes_core::{
    AttentionFlags, EngineSnapshot, LayoutMode, LayoutSnapshot, LifecycleState, NoticeLevel,
    SessionId, SessionMode, SessionView, SplitHandle, Topology,
};
use panes_engine::EngineEvent;

use crate::input::Action;
use crate::output::OutputTail;

/// Text typed into an `AwaitingDirectory` pane.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryPrompt {
    pub input: String,
    pub mode: SessionMode,
    /// The input is a suggestion the user has not edited yet.
    pub suggested: bool,
}

impl DirectoryPrompt {
    fn new(default_directory: &str) -> Self {
        Self {
            input: default_directory.to_string(),
            mode: SessionMode::New,
            suggested: true,
        }
    }

    pub fn push(&mut self, c: char) {
        if self.suggested {
            self.input.clear();
            self.suggested = false;
        }
        self.input.push(c);
    }

    pub fn backspace(&mut self) {
        self.suggested = false;
        self.input.pop();
    }

    pub fn cycle_mode(&mut self) {
        self.mode = self.mode.next();
    }
}

/// A danger-mode hold the user is waiting on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HoldState {
    pub session_id: SessionId,
    pub progress: f32,
}

/// Core application state.
#[derive(Debug, Clone)]
pub struct App {
    pub sessions: BTreeMap<SessionId, SessionView>,
    pub attention: HashMap<SessionId, AttentionFlags>,
    pub layout: LayoutSnapshot,
    pub focused: Option<SessionId>,

    tails: HashMap<SessionId, OutputTail>,
    /// Lines scrolled up from the bottom, per session.
    scroll: HashMap<SessionId, usize>,
    prompts: HashMap<SessionId, DirectoryPrompt>,
    default_directory: String,

    /// Session whose close is waiting for `y`.
    pub confirm_close: Option<SessionId>,
    pub hold: Option<HoldState>,
    pub notice: Option<(NoticeLevel, String)>,

    /// `Ctrl-a` was pressed; the next key is a command.
    pub prefix: bool,
    pub should_quit: bool,

    /// Whether blinking attention markers are currently visible.
    pub blink_visible: bool,
    tick_count: u32,
}

impl Default for App {
    fn default() -> Self {
        Self::new(String::new())
    }
}

impl App {
    /// `default_directory` pre-fills new directory prompts.
    pub fn new(default_directory: String) -> Self {
        Self {
            sessions: BTreeMap::new(),
            attention: HashMap::new(),
            layout: LayoutSnapshot {
                mode: LayoutMode::Grid,
                visual_order: Vec::new(),
                active_tab: None,
                topology: Topology::empty(),
            },
            focused: None,
            tails: HashMap::new(),
            scroll: HashMap::new(),
            prompts: HashMap::new(),
            default_directory,
            confirm_close: None,
            hold: None,
            notice: None,
            prefix: false,
            should_quit: false,
            blink_visible: true,
            tick_count: 0,
        }
    }

    /// Replaces all state with a full engine snapshot.
    pub fn apply_snapshot(&mut self, snapshot: EngineSnapshot) {
        self.sessions = snapshot
            .sessions
            .into_iter()
            .map(|s| (s.id, s))
            .collect();
        self.attention = snapshot
            .attention
            .into_iter()
            .map(|a| (a.session_id, a.flags))
            .collect();
        self.layout = snapshot.layout;
        self.focused = snapshot.focused;

        let awaiting: Vec<SessionId> = self
            .sessions
            .values()
            .filter(|s| s.state == LifecycleState::AwaitingDirectory)
            .map(|s| s.id)
            .collect();
        for id in awaiting {
            self.ensure_prompt(id);
        }
        let sessions = &self.sessions;
        self.tails.retain(|id, _| sessions.contains_key(id));
        self.prompts.retain(|id, _| sessions.contains_key(id));
    }

    /// Applies one engine event.
    ///
    /// Returns an action to send back to the engine, e.g. a title announced
    /// by the session's output.
    pub fn apply_event(&mut self, event: EngineEvent) -> Option<Action> {
        match event {
            EngineEvent::SessionStateChanged { session } => {
                let id = session.id;
                match session.state {
                    LifecycleState::AwaitingDirectory => self.ensure_prompt(id),
                    LifecycleState::Empty | LifecycleState::Ready | LifecycleState::Closing => {
                        self.prompts.remove(&id);
                    }
                    LifecycleState::Starting => {}
                }
                if session.state != LifecycleState::AwaitingDirectory
                    && self.hold.is_some_and(|h| h.session_id == id)
                {
                    self.hold = None;
                }
                self.sessions.insert(id, session);
            }
            EngineEvent::SessionRemoved { session_id, .. } => {
                self.sessions.remove(&session_id);
                self.attention.remove(&session_id);
                self.tails.remove(&session_id);
                self.scroll.remove(&session_id);
                self.prompts.remove(&session_id);
                if self.hold.is_some_and(|h| h.session_id == session_id) {
                    self.hold = None;
                }
                if self.confirm_close == Some(session_id) {
                    self.confirm_close = None;
                }
            }
            EngineEvent::AttentionChanged { session_id, flags } => {
                self.attention.insert(session_id, flags);
            }
            EngineEvent::LayoutChanged { layout } => self.layout = layout,
            EngineEvent::FocusChanged { focused } => self.focused = focused,
            EngineEvent::Output {
                session_id,
                bytes,
                follow,
            } => {
                if follow {
                    self.scroll.remove(&session_id);
                }
                let title = self.tails.entry(session_id).or_default().push(&bytes)?;
                let title = title.trim();
                let current = self.sessions.get(&session_id).map(|s| s.title.as_str());
                if current == Some(title) {
                    return None;
                }
                let title = (!title.is_empty()).then(|| title.to_string());
                return Some(Action::SetTitle(session_id, title));
            }
            EngineEvent::DirectorySuggested {
                session_id,
                directory,
            } => {
                if let Some(prompt) = self.prompts.get_mut(&session_id) {
                    if prompt.suggested {
                        prompt.input = directory.display().to_string();
                    }
                }
            }
            EngineEvent::Notice { level, message, .. } => {
                self.notice = Some((level, message));
            }
            EngineEvent::ConfirmationRequired { session_id } => {
                self.confirm_close = Some(session_id);
            }
        }
        None
    }

    fn ensure_prompt(&mut self, id: SessionId) {
        let default = &self.default_directory;
        self.prompts
            .entry(id)
            .or_insert_with(|| DirectoryPrompt::new(default));
    }

    pub fn focused_session(&self) -> Option<&SessionView> {
        self.focused.and_then(|id| self.sessions.get(&id))
    }

    pub fn prompt(&self, id: SessionId) -> Option<&DirectoryPrompt> {
        self.prompts.get(&id)
    }

    pub fn prompt_mut(&mut self, id: SessionId) -> Option<&mut DirectoryPrompt> {
        self.prompts.get_mut(&id)
    }

    pub fn tail(&self, id: SessionId) -> Option<&OutputTail> {
        self.tails.get(&id)
    }

    pub fn attention_of(&self, id: SessionId) -> AttentionFlags {
        self.attention.get(&id).copied().unwrap_or_default()
    }

    /// Visual position of a session.
    pub fn position_of(&self, id: SessionId) -> Option<usize> {
        self.layout.visual_order.iter().position(|s| *s == id)
    }

    /// Session after `id` in visual order, wrapping around.
    pub fn next_in_order(&self, id: SessionId) -> Option<SessionId> {
        let order = &self.layout.visual_order;
        let position = self.position_of(id)?;
        let next = order.get((position + 1) % order.len()).copied()?;
        (next != id).then_some(next)
    }

    /// First share of the outermost splitter, if the arrangement has one.
    pub fn main_ratio(&self) -> Option<f32> {
        self.layout
            .topology
            .handles
            .iter()
            .find(|h| h.handle == SplitHandle::Main)
            .map(|h| h.ratio.first())
    }

    pub fn scroll_offset(&self, id: SessionId) -> usize {
        self.scroll.get(&id).copied().unwrap_or(0)
    }

    /// Scrolls a pane's tail up by `lines`. Returns false when already at the top.
    pub fn scroll_up(&mut self, id: SessionId, lines: usize) -> bool {
        let available = self
            .tails
            .get(&id)
            .map_or(0, |t| t.last_lines(usize::MAX).len());
        let offset = self.scroll.entry(id).or_insert(0);
        let target = offset.saturating_add(lines).min(available.saturating_sub(1));
        let moved = target != *offset;
        *offset = target;
        moved
    }

    /// Scrolls a pane's tail down by `lines`. Returns true when back at the bottom.
    pub fn scroll_down(&mut self, id: SessionId, lines: usize) -> bool {
        let offset = self.scroll_offset(id).saturating_sub(lines);
        if offset == 0 {
            self.scroll.remove(&id);
            true
        } else {
            self.scroll.insert(id, offset);
            false
        }
    }

    /// Sessions with `needs_attention` set.
    pub fn attention_count(&self) -> usize {
        self.attention.values().filter(|f| f.needs_attention).count()
    }

    /// Advances the blink animation; called every 100ms tick.
    pub fn tick(&mut self) {
        self.tick_count = self.tick_count.wrapping_add(1);
        if self.tick_count % 5 == 0 {
            self.blink_visible = !self.blink_visible;
        }
    }

    pub fn quit(&mut self) {
        self.should_quit = true;
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use panes_core::{RemovalReason, Session};
    use std::path::PathBuf;

    pub(crate) fn view(n: u8, state: LifecycleState) -> SessionView {
        let mut session = Session::new(SessionId::new(n).unwrap());
        if state != LifecycleState::Empty {
            session
                .transition_to(LifecycleState::AwaitingDirectory)
                .unwrap();
        }
        if matches!(state, LifecycleState::Starting | LifecycleState::Ready) {
            session.working_directory = Some(PathBuf::from("/work/app"));
            session.mode = Some(SessionMode::New);
            session.transition_to(LifecycleState::Starting).unwrap();
            session.attach_process(1);
        }
        if state == LifecycleState::Ready {
            session.transition_to(LifecycleState::Ready).unwrap();
        }
        SessionView::from_session(&session)
    }

    fn id(n: u8) -> SessionId {
        SessionId::new(n).unwrap()
    }

    #[test]
    fn test_awaiting_session_gets_prompt() {
        let mut app = App::new("/home/me".to_string());
        app.apply_event(EngineEvent::SessionStateChanged {
            session: view(0, LifecycleState::AwaitingDirectory),
        });
        let prompt = app.prompt(id(0)).unwrap();
        assert_eq!(prompt.input, "/home/me");
        assert_eq!(prompt.mode, SessionMode::New);

        // A suggestion replaces the untouched default.
        app.apply_event(EngineEvent::DirectorySuggested {
            session_id: id(0),
            directory: PathBuf::from("/work/last"),
        });
        assert_eq!(app.prompt(id(0)).unwrap().input, "/work/last");
    }

    #[test]
    fn test_suggestion_does_not_override_typing() {
        let mut app = App::default();
        app.apply_event(EngineEvent::SessionStateChanged {
            session: view(0, LifecycleState::AwaitingDirectory),
        });
        app.prompt_mut(id(0)).unwrap().push('x');
        app.apply_event(EngineEvent::DirectorySuggested {
            session_id: id(0),
            directory: PathBuf::from("/work/last"),
        });
        assert_eq!(app.prompt(id(0)).unwrap().input, "x");
    }

    #[test]
    fn test_prompt_survives_failed_start() {
        let mut app = App::default();
        app.apply_event(EngineEvent::SessionStateChanged {
            session: view(0, LifecycleState::AwaitingDirectory),
        });
        app.prompt_mut(id(0)).unwrap().push('/');
        app.apply_event(EngineEvent::SessionStateChanged {
            session: view(0, LifecycleState::Starting),
        });
        app.apply_event(EngineEvent::SessionStateChanged {
            session: view(0, LifecycleState::AwaitingDirectory),
        });
        assert_eq!(app.prompt(id(0)).unwrap().input, "/");

        app.apply_event(EngineEvent::SessionStateChanged {
            session: view(0, LifecycleState::Ready),
        });
        assert!(app.prompt(id(0)).is_none());
    }

    #[test]
    fn test_removal_clears_local_state() {
        let mut app = App::default();
        app.apply_event(EngineEvent::SessionStateChanged {
            session: view(1, LifecycleState::Ready),
        });
        app.apply_event(EngineEvent::Output {
            session_id: id(1),
            bytes: b"hello\n".to_vec(),
            follow: true,
        });
        app.confirm_close = Some(id(1));

        app.apply_event(EngineEvent::SessionRemoved {
            session_id: id(1),
            reason: RemovalReason::Closed,
        });
        assert!(app.sessions.is_empty());
        assert!(app.tail(id(1)).is_none());
        assert_eq!(app.confirm_close, None);
    }

    #[test]
    fn test_output_title_becomes_action() {
        let mut app = App::default();
        app.apply_event(EngineEvent::SessionStateChanged {
            session: view(0, LifecycleState::Ready),
        });
        let action = app.apply_event(EngineEvent::Output {
            session_id: id(0),
            bytes: b"\x1b]0;Fixing tests\x07".to_vec(),
            follow: true,
        });
        assert_eq!(
            action,
            Some(Action::SetTitle(id(0), Some("Fixing tests".to_string())))
        );

        // The current title is not re-sent.
        let action = app.apply_event(EngineEvent::Output {
            session_id: id(0),
            bytes: b"\x1b]0;app\x07".to_vec(),
            follow: true,
        });
        assert_eq!(action, None);
    }

    #[test]
    fn test_scroll_offsets() {
        let mut app = App::default();
        app.apply_event(EngineEvent::Output {
            session_id: id(0),
            bytes: b"1\n2\n3\n4\n".to_vec(),
            follow: true,
        });
        assert!(app.scroll_up(id(0), 2));
        assert_eq!(app.scroll_offset(id(0)), 2);
        assert!(app.scroll_up(id(0), 10));
        assert_eq!(app.scroll_offset(id(0)), 3);
        assert!(!app.scroll_up(id(0), 1));

        assert!(!app.scroll_down(id(0), 1));
        assert!(app.scroll_down(id(0), 5));

        // Output that may follow resets the offset.
        app.scroll_up(id(0), 1);
        app.apply_event(EngineEvent::Output {
            session_id: id(0),
            bytes: b"5\n".to_vec(),
            follow: true,
        });
        assert_eq!(app.scroll_offset(id(0)), 0);
    }

    #[test]
    fn test_next_in_order_wraps() {
        let mut app = App::default();
        app.layout.visual_order = vec![id(2), id(0), id(1)];
        assert_eq!(app.next_in_order(id(0)), Some(id(1)));
        assert_eq!(app.next_in_order(id(1)), Some(id(2)));
        app.layout.visual_order = vec![id(2)];
        assert_eq!(app.next_in_order(id(2)), None);
    }

    #[test]
    fn test_blink_toggles_every_five_ticks() {
        let mut app = App::default();
        for _ in 0..4 {
            app.tick();
        }
        assert!(app.blink_visible);
        app.tick();
        assert!(!app.blink_visible);
    }
}
