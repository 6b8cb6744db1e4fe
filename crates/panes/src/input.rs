//! Keyboard input handling for the panes TUI.
//!
//! Keys either edit local state (the directory prompt, the prefix latch) or
//! turn into an [`Action`] the main loop forwards to the engine.
//!
//! All code follows the panic-free policy: no `.unwrap()`, `.expect()`,
//! `panic!()`, `unreachable!()`, `todo!()`, or direct indexing `[i]`.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use panes_core::{LayoutMode, LifecycleState, MoveDirection, SessionId, SessionMode};
use panes_engine::EngineEvent;

use crate::app::{App, HoldState};

/// Main-splitter step for `[` / `]`, in percent.
pub const SPLIT_STEP: f32 = 5.0;

/// Lines scrolled per `PageUp` / `PageDown`.
pub const SCROLL_STEP: usize = 10;

// ============================================================================
// Event Types
// ============================================================================

/// Events that drive the main loop.
#[derive(Debug, Clone)]
pub enum Event {
    /// Keyboard input from the user.
    Key(KeyEvent),

    /// Terminal window resize event.
    Resize(u16, u16),

    /// Event published by the engine.
    Engine(EngineEvent),

    /// The event subscription fell behind; state must be re-read.
    Lagged,
}

// ============================================================================
// Action Types
// ============================================================================

/// Engine requests resulting from user input.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// No action required.
    None,

    /// Quit the application.
    Quit,

    AddSession,
    OpenSlot(SessionId),
    CancelDirectory(SessionId),
    Start {
        session_id: SessionId,
        directory: String,
        mode: SessionMode,
    },
    BeginDangerHold {
        session_id: SessionId,
        directory: String,
        mode: SessionMode,
    },
    CancelDangerHold(SessionId),
    SendInput(SessionId, Vec<u8>),
    UserScroll {
        session_id: SessionId,
        at_bottom: bool,
    },
    Focus(SessionId),
    SelectTab(SessionId),
    RequestClose(SessionId),
    ConfirmClose(SessionId),
    SetMode(LayoutMode),
    CycleArrangement,
    Move {
        position: usize,
        direction: MoveDirection,
    },
    Swap(SessionId, SessionId),
    /// New first share of the main splitter, in percent.
    SetMainSplit(f32),
    ClearAllAttention,
    SetTitle(SessionId, Option<String>),
}

// ============================================================================
// Input Handler
// ============================================================================

/// Handles a keyboard event and updates application state accordingly.
///
/// # Key Bindings
///
/// Commands follow the `Ctrl-a` prefix:
///
/// | Key            | Action                                   |
/// |----------------|------------------------------------------|
/// | `n`            | Add a session                            |
/// | `x`            | Close the focused session (`y` confirms) |
/// | `t`            | Toggle Grid / Tabbed                     |
/// | `a`            | Cycle the arrangement                    |
/// | `h`, `l`       | Move the focused pane left / right       |
/// | `s`            | Swap the focused pane with the next      |
/// | `1`-`6`        | Focus (or select the tab of) a slot      |
/// | `[`, `]`       | Shrink / grow the main splitter          |
/// | `PgUp`, `PgDn` | Scroll the focused pane's output         |
/// | `c`            | Clear all attention                      |
/// | `q`            | Quit                                     |
/// | `Ctrl-a`       | Send a literal `Ctrl-a`                  |
///
/// Other keys go to the focused session, or edit its directory prompt while
/// it awaits one (`Tab` cycles the mode, `Enter` starts, `Esc` cancels).
#[must_use]
pub fn handle_key_event(key: KeyEvent, app: &mut App) -> Action {
    if let Some(session_id) = app.confirm_close.take() {
        return match key.code {
            KeyCode::Char('y') | KeyCode::Char('Y') => Action::ConfirmClose(session_id),
            _ => Action::None,
        };
    }

    if app.prefix {
        app.prefix = false;
        return handle_command_key(key, app);
    }

    if is_prefix(&key) {
        app.prefix = true;
        return Action::None;
    }

    let Some(session) = app.focused_session() else {
        return Action::None;
    };
    let (session_id, state) = (session.id, session.state);

    match state {
        LifecycleState::Empty => match key.code {
            KeyCode::Enter => Action::OpenSlot(session_id),
            _ => Action::None,
        },
        LifecycleState::AwaitingDirectory => handle_prompt_key(key, session_id, app),
        LifecycleState::Starting | LifecycleState::Ready => key_to_bytes(&key)
            .map(|bytes| Action::SendInput(session_id, bytes))
            .unwrap_or(Action::None),
        LifecycleState::Closing => Action::None,
    }
}

fn is_prefix(key: &KeyEvent) -> bool {
    key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('a')
}

fn handle_command_key(key: KeyEvent, app: &mut App) -> Action {
    let focused = app.focused;

    if is_prefix(&key) {
        return match app.focused_session() {
            Some(s) if s.state.has_process() => Action::SendInput(s.id, vec![0x01]),
            _ => Action::None,
        };
    }

    match key.code {
        KeyCode::Char('n') => Action::AddSession,
        KeyCode::Char('x') => focused.map_or(Action::None, Action::RequestClose),
        KeyCode::Char('t') => Action::SetMode(app.layout.mode.toggled()),
        KeyCode::Char('a') => Action::CycleArrangement,
        KeyCode::Char('h') => move_focused(app, MoveDirection::Left),
        KeyCode::Char('l') => move_focused(app, MoveDirection::Right),
        KeyCode::Char('s') => focused
            .and_then(|id| Some(Action::Swap(id, app.next_in_order(id)?)))
            .unwrap_or(Action::None),
        KeyCode::Char(c @ '1'..='6') => {
            let target = c
                .to_digit(10)
                .and_then(|d| u8::try_from(d).ok())
                .and_then(|d| SessionId::new(d.saturating_sub(1)))
                .filter(|id| app.sessions.contains_key(id));
            match (target, app.layout.mode) {
                (Some(id), LayoutMode::Tabbed) => Action::SelectTab(id),
                (Some(id), LayoutMode::Grid) => Action::Focus(id),
                (None, _) => Action::None,
            }
        }
        KeyCode::Char('[') => app
            .main_ratio()
            .map_or(Action::None, |r| Action::SetMainSplit(r - SPLIT_STEP)),
        KeyCode::Char(']') => app
            .main_ratio()
            .map_or(Action::None, |r| Action::SetMainSplit(r + SPLIT_STEP)),
        KeyCode::PageUp => match focused {
            Some(session_id) => {
                app.scroll_up(session_id, SCROLL_STEP);
                Action::UserScroll {
                    session_id,
                    at_bottom: false,
                }
            }
            None => Action::None,
        },
        KeyCode::PageDown => match focused {
            Some(session_id) => {
                let at_bottom = app.scroll_down(session_id, SCROLL_STEP);
                Action::UserScroll {
                    session_id,
                    at_bottom,
                }
            }
            None => Action::None,
        },
        KeyCode::Char('c') => Action::ClearAllAttention,
        KeyCode::Char('q') => {
            app.quit();
            Action::Quit
        }
        _ => Action::None,
    }
}

fn move_focused(app: &App, direction: MoveDirection) -> Action {
    app.focused
        .and_then(|id| app.position_of(id))
        .map_or(Action::None, |position| Action::Move {
            position,
            direction,
        })
}

fn handle_prompt_key(key: KeyEvent, session_id: SessionId, app: &mut App) -> Action {
    let holding = app.hold.is_some_and(|h| h.session_id == session_id);
    if holding {
        // Only Esc does anything while the hold runs.
        if key.code == KeyCode::Esc {
            app.hold = None;
            return Action::CancelDangerHold(session_id);
        }
        return Action::None;
    }

    let Some(prompt) = app.prompt_mut(session_id) else {
        return Action::None;
    };

    match key.code {
        KeyCode::Esc => Action::CancelDirectory(session_id),
        KeyCode::Tab => {
            prompt.cycle_mode();
            Action::None
        }
        KeyCode::Backspace => {
            prompt.backspace();
            Action::None
        }
        KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
            prompt.push(c);
            Action::None
        }
        KeyCode::Enter => {
            let directory = prompt.input.trim().to_string();
            if directory.is_empty() {
                return Action::None;
            }
            let mode = prompt.mode;
            if mode.is_dangerous() {
                app.hold = Some(HoldState {
                    session_id,
                    progress: 0.0,
                });
                Action::BeginDangerHold {
                    session_id,
                    directory,
                    mode,
                }
            } else {
                Action::Start {
                    session_id,
                    directory,
                    mode,
                }
            }
        }
        _ => Action::None,
    }
}

/// Encodes a key as the bytes a terminal would send for it.
pub fn key_to_bytes(key: &KeyEvent) -> Option<Vec<u8>> {
    let bytes: Vec<u8> = match key.code {
        KeyCode::Char(c) if key.modifiers.contains(KeyModifiers::CONTROL) => {
            let lower = c.to_ascii_lowercase();
            match lower {
                'a'..='z' => vec![lower as u8 - b'a' + 1],
                '@' | ' ' => vec![0x00],
                '[' => vec![0x1b],
                '\\' => vec![0x1c],
                ']' => vec![0x1d],
                _ => return None,
            }
        }
        KeyCode::Char(c) => {
            let mut buf = [0u8; 4];
            let encoded = c.encode_utf8(&mut buf).as_bytes().to_vec();
            if key.modifiers.contains(KeyModifiers::ALT) {
                let mut with_escape = vec![0x1b];
                with_escape.extend(encoded);
                with_escape
            } else {
                encoded
            }
        }
        KeyCode::Enter => b"\r".to_vec(),
        KeyCode::Backspace => vec![0x7f],
        KeyCode::Tab => b"\t".to_vec(),
        KeyCode::BackTab => b"\x1b[Z".to_vec(),
        KeyCode::Esc => vec![0x1b],
        KeyCode::Up => b"\x1b[A".to_vec(),
        KeyCode::Down => b"\x1b[B".to_vec(),
        KeyCode::Right => b"\x1b[C".to_vec(),
        KeyCode::Left => b"\x1b[D".to_vec(),
        KeyCode::Home => b"\x1b[H".to_vec(),
        KeyCode::End => b"\x1b[F".to_vec(),
        KeyCode::PageUp => b"\x1b[5~".to_vec(),
        KeyCode::PageDown => b"\x1b[6~".to_vec(),
        KeyCode::Insert => b"\x1b[2~".to_vec(),
        KeyCode::Delete => b"\x1b[3~".to_vec(),
        _ => return None,
    };
    Some(bytes)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::tests::view;
    use panes_core::{
        Arrangement, Region, ResizeHandleSpec, SplitAxis, SplitHandle, SplitRatio, Topology,
    };

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn ctrl(c: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(c), KeyModifiers::CONTROL)
    }

    fn id(n: u8) -> SessionId {
        SessionId::new(n).unwrap()
    }

    fn app_with(states: &[LifecycleState]) -> App {
        let mut app = App::new("/home/me".to_string());
        for (n, state) in states.iter().enumerate() {
            app.apply_event(EngineEvent::SessionStateChanged {
                session: view(n as u8, *state),
            });
            app.layout.visual_order.push(id(n as u8));
        }
        app.focused = Some(id(0));
        app
    }

    fn command(app: &mut App, code: KeyCode) -> Action {
        assert_eq!(handle_key_event(ctrl('a'), app), Action::None);
        assert!(app.prefix);
        handle_key_event(key(code), app)
    }

    #[test]
    fn test_prefix_commands() {
        let mut app = app_with(&[LifecycleState::Ready, LifecycleState::Ready]);

        assert_eq!(command(&mut app, KeyCode::Char('n')), Action::AddSession);
        assert!(!app.prefix);
        assert_eq!(
            command(&mut app, KeyCode::Char('x')),
            Action::RequestClose(id(0))
        );
        assert_eq!(
            command(&mut app, KeyCode::Char('t')),
            Action::SetMode(LayoutMode::Tabbed)
        );
        assert_eq!(
            command(&mut app, KeyCode::Char('l')),
            Action::Move {
                position: 0,
                direction: MoveDirection::Right
            }
        );
        assert_eq!(
            command(&mut app, KeyCode::Char('s')),
            Action::Swap(id(0), id(1))
        );
        assert_eq!(command(&mut app, KeyCode::Char('2')), Action::Focus(id(1)));
        assert_eq!(command(&mut app, KeyCode::Char('5')), Action::None);
        assert_eq!(
            command(&mut app, KeyCode::Char('c')),
            Action::ClearAllAttention
        );
        assert_eq!(command(&mut app, KeyCode::Char('q')), Action::Quit);
        assert!(app.should_quit);
    }

    #[test]
    fn test_digit_selects_tab_in_tabbed_mode() {
        let mut app = app_with(&[LifecycleState::Ready, LifecycleState::Ready]);
        app.layout.mode = LayoutMode::Tabbed;
        assert_eq!(
            command(&mut app, KeyCode::Char('2')),
            Action::SelectTab(id(1))
        );
    }

    #[test]
    fn test_double_prefix_sends_literal() {
        let mut app = app_with(&[LifecycleState::Ready]);
        handle_key_event(ctrl('a'), &mut app);
        assert_eq!(
            handle_key_event(ctrl('a'), &mut app),
            Action::SendInput(id(0), vec![0x01])
        );
    }

    #[test]
    fn test_split_keys_step_main_ratio() {
        let mut app = app_with(&[LifecycleState::Ready, LifecycleState::Ready]);
        assert_eq!(command(&mut app, KeyCode::Char(']')), Action::None);

        app.layout.topology = Topology {
            arrangement: Arrangement::Horizontal,
            placements: Vec::new(),
            handles: vec![ResizeHandleSpec {
                handle: SplitHandle::Main,
                axis: SplitAxis::Columns,
                ratio: SplitRatio::new(60.0),
                bounds: Region::FULL,
            }],
        };
        assert_eq!(
            command(&mut app, KeyCode::Char(']')),
            Action::SetMainSplit(65.0)
        );
        assert_eq!(
            command(&mut app, KeyCode::Char('[')),
            Action::SetMainSplit(55.0)
        );
    }

    #[test]
    fn test_close_confirmation_consumes_next_key() {
        let mut app = app_with(&[LifecycleState::Ready]);
        app.confirm_close = Some(id(0));
        assert_eq!(
            handle_key_event(key(KeyCode::Char('y')), &mut app),
            Action::ConfirmClose(id(0))
        );

        app.confirm_close = Some(id(0));
        assert_eq!(handle_key_event(key(KeyCode::Char('n')), &mut app), Action::None);
        assert_eq!(app.confirm_close, None);
    }

    #[test]
    fn test_ready_session_receives_keys() {
        let mut app = app_with(&[LifecycleState::Ready]);
        assert_eq!(
            handle_key_event(key(KeyCode::Char('h')), &mut app),
            Action::SendInput(id(0), b"h".to_vec())
        );
        assert_eq!(
            handle_key_event(key(KeyCode::Enter), &mut app),
            Action::SendInput(id(0), b"\r".to_vec())
        );
        assert_eq!(
            handle_key_event(ctrl('c'), &mut app),
            Action::SendInput(id(0), vec![0x03])
        );
    }

    #[test]
    fn test_empty_slot_opens_on_enter() {
        let mut app = app_with(&[LifecycleState::Empty]);
        assert_eq!(
            handle_key_event(key(KeyCode::Enter), &mut app),
            Action::OpenSlot(id(0))
        );
    }

    #[test]
    fn test_directory_prompt_editing() {
        let mut app = app_with(&[LifecycleState::AwaitingDirectory]);

        // Typing replaces the suggested default.
        for c in "/srv/apx".chars() {
            handle_key_event(key(KeyCode::Char(c)), &mut app);
        }
        handle_key_event(key(KeyCode::Backspace), &mut app);
        handle_key_event(key(KeyCode::Char('p')), &mut app);
        handle_key_event(key(KeyCode::Tab), &mut app);

        assert_eq!(
            handle_key_event(key(KeyCode::Enter), &mut app),
            Action::Start {
                session_id: id(0),
                directory: "/srv/app".to_string(),
                mode: SessionMode::Resume,
            }
        );
    }

    #[test]
    fn test_danger_mode_begins_hold_and_esc_cancels() {
        let mut app = app_with(&[LifecycleState::AwaitingDirectory]);
        handle_key_event(key(KeyCode::Tab), &mut app);
        handle_key_event(key(KeyCode::Tab), &mut app);

        assert_eq!(
            handle_key_event(key(KeyCode::Enter), &mut app),
            Action::BeginDangerHold {
                session_id: id(0),
                directory: "/home/me".to_string(),
                mode: SessionMode::Dangerous,
            }
        );
        assert!(app.hold.is_some());

        // Typing is ignored during the hold.
        assert_eq!(handle_key_event(key(KeyCode::Char('z')), &mut app), Action::None);
        assert_eq!(
            handle_key_event(key(KeyCode::Esc), &mut app),
            Action::CancelDangerHold(id(0))
        );
        assert!(app.hold.is_none());

        // Without a hold, Esc leaves directory selection.
        assert_eq!(
            handle_key_event(key(KeyCode::Esc), &mut app),
            Action::CancelDirectory(id(0))
        );
    }

    #[test]
    fn test_blank_directory_does_not_start() {
        let mut app = App::default();
        app.apply_event(EngineEvent::SessionStateChanged {
            session: view(0, LifecycleState::AwaitingDirectory),
        });
        app.focused = Some(id(0));
        assert_eq!(handle_key_event(key(KeyCode::Enter), &mut app), Action::None);
    }

    #[test]
    fn test_key_to_bytes() {
        assert_eq!(key_to_bytes(&key(KeyCode::Up)), Some(b"\x1b[A".to_vec()));
        assert_eq!(key_to_bytes(&key(KeyCode::Backspace)), Some(vec![0x7f]));
        assert_eq!(
            key_to_bytes(&KeyEvent::new(KeyCode::Char('b'), KeyModifiers::ALT)),
            Some(b"\x1bb".to_vec())
        );
        assert_eq!(key_to_bytes(&key(KeyCode::Char('é'))), Some("é".as_bytes().to_vec()));
        assert_eq!(key_to_bytes(&key(KeyCode::F(5))), None);
    }
}
