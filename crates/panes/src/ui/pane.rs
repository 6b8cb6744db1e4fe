//! One session pane.
//!
//! The border carries the project initials, title, lifecycle state and
//! attention marker. The body depends on the state: a hint for empty slots,
//! the directory prompt (and hold gauge) while awaiting a directory, or the
//! output tail once a process runs.

use panes_core::{LifecycleState, SessionView};
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Gauge, Paragraph},
    Frame,
};

use super::theme::{attention_icon, border_color, project_color, state_color};
use crate::app::App;

/// Renders a session into `area`.
pub fn render_pane(frame: &mut Frame, area: Rect, session: &SessionView, app: &App) {
    let focused = app.focused == Some(session.id);
    let flags = app.attention_of(session.id);

    let mut title = vec![
        Span::raw(" "),
        Span::styled(
            session.initials.clone(),
            Style::default()
                .fg(project_color(session.color_index))
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw(" "),
        Span::styled(
            session.title.clone(),
            if focused {
                Style::default().add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            },
        ),
        Span::raw(" "),
    ];
    if let Some(mode) = session.mode.filter(|m| m.is_dangerous()) {
        title.push(Span::styled(
            format!("[{mode}] "),
            Style::default().fg(Color::Red),
        ));
    }

    let status = Line::from(vec![
        Span::styled(
            attention_icon(flags, app.blink_visible),
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw(" "),
        Span::styled(
            session.state.label(),
            Style::default().fg(state_color(session.state)),
        ),
        Span::raw(" "),
    ])
    .alignment(Alignment::Right);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color(focused, flags)))
        .title_top(Line::from(title))
        .title_top(status);

    let inner = block.inner(area);
    frame.render_widget(block, area);

    match session.state {
        LifecycleState::Empty => render_hint(frame, inner, "Empty slot. Enter to open."),
        LifecycleState::AwaitingDirectory => render_prompt(frame, inner, session, app),
        LifecycleState::Starting | LifecycleState::Ready | LifecycleState::Closing => {
            render_output(frame, inner, session, app)
        }
    }
}

fn render_hint(frame: &mut Frame, area: Rect, text: &str) {
    let hint = Paragraph::new(Line::from(Span::styled(
        text.to_string(),
        Style::default().fg(Color::DarkGray),
    )))
    .alignment(Alignment::Center);
    frame.render_widget(hint, area);
}

fn render_prompt(frame: &mut Frame, area: Rect, session: &SessionView, app: &App) {
    let Some(prompt) = app.prompt(session.id) else {
        return;
    };
    let label = Style::default().fg(Color::DarkGray);
    let cursor = if app.focused == Some(session.id) && app.blink_visible {
        "_"
    } else {
        " "
    };
    let mode_style = if prompt.mode.is_dangerous() {
        Style::default().fg(Color::Red).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::Cyan)
    };

    let lines = vec![
        Line::from(vec![
            Span::styled("Directory ", label),
            Span::raw(prompt.input.clone()),
            Span::raw(cursor),
        ]),
        Line::from(vec![
            Span::styled("Mode      ", label),
            Span::styled(prompt.mode.as_str(), mode_style),
            Span::styled("  (Tab to change)", label),
        ]),
        Line::from(Span::styled("Enter to start, Esc to cancel", label)),
    ];

    let [text_area, gauge_area] = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(4), Constraint::Length(1)])
        .areas(area);
    frame.render_widget(Paragraph::new(lines), text_area);

    if let Some(hold) = app.hold.filter(|h| h.session_id == session.id) {
        let progress = f64::from(hold.progress.clamp(0.0, 1.0));
        let gauge = Gauge::default()
            .gauge_style(Style::default().fg(Color::Red))
            .ratio(progress)
            .label(format!("hold to start {:.0}%", progress * 100.0));
        frame.render_widget(gauge, gauge_area);
    }
}

fn render_output(frame: &mut Frame, area: Rect, session: &SessionView, app: &App) {
    let tail = app.tail(session.id).filter(|t| !t.is_empty());
    let Some(tail) = tail else {
        if session.state == LifecycleState::Starting {
            render_hint(frame, area, "starting...");
        }
        return;
    };

    let height = usize::from(area.height);
    let offset = app.scroll_offset(session.id);
    let lines: Vec<Line> = tail
        .last_lines(height.saturating_add(offset))
        .into_iter()
        .take(height)
        .map(|l| Line::raw(l.to_string()))
        .collect();
    frame.render_widget(Paragraph::new(lines), area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::tests::view;
    use crate::app::HoldState;
    use panes_core::{SessionId, SessionMode};
    use panes_engine::EngineEvent;
    use ratatui::{backend::TestBackend, Terminal};

    fn draw(app: &App, session: &SessionView) -> String {
        let mut terminal = Terminal::new(TestBackend::new(50, 8)).unwrap();
        terminal
            .draw(|frame| render_pane(frame, frame.area(), session, app))
            .unwrap();
        terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|c| c.symbol())
            .collect()
    }

    #[test]
    fn test_ready_pane_shows_title_and_tail() {
        let session = view(0, LifecycleState::Ready);
        let mut app = App::default();
        app.apply_event(EngineEvent::SessionStateChanged {
            session: session.clone(),
        });
        app.apply_event(EngineEvent::Output {
            session_id: session.id,
            bytes: b"\x1b[32mhello world\x1b[0m\n".to_vec(),
            follow: true,
        });

        let screen = draw(&app, &session);
        assert!(screen.contains("AP app"));
        assert!(screen.contains("ready"));
        assert!(screen.contains("hello world"));
    }

    #[test]
    fn test_prompt_pane_shows_hold_gauge() {
        let session = view(0, LifecycleState::AwaitingDirectory);
        let mut app = App::new("/srv/app".to_string());
        app.apply_event(EngineEvent::SessionStateChanged {
            session: session.clone(),
        });
        if let Some(prompt) = app.prompt_mut(session.id) {
            prompt.mode = SessionMode::Dangerous;
        }
        app.hold = Some(HoldState {
            session_id: SessionId::new(0).unwrap(),
            progress: 0.5,
        });

        let screen = draw(&app, &session);
        assert!(screen.contains("/srv/app"));
        assert!(screen.contains("dangerous"));
        assert!(screen.contains("hold to start 50%"));
    }

    #[test]
    fn test_empty_pane_shows_hint() {
        let session = view(2, LifecycleState::Empty);
        let screen = draw(&App::default(), &session);
        assert!(screen.contains("Enter to open"));
    }
}
