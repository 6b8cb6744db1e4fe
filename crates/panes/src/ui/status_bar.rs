//! Header and footer bars for the panes TUI.
//!
//! - Header: name, layout mode and arrangement, the tab strip in Tabbed mode
//! - Footer: close confirmation, prefix hints, or the last notice

use panes_core::LayoutMode;
use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};

use super::theme::{attention_icon, notice_color, project_color};
use crate::app::App;

/// Renders the header line.
pub fn render_header(frame: &mut Frame, area: Rect, app: &App) {
    let sep = Style::default().fg(Color::DarkGray);
    let mut spans = vec![
        Span::styled(
            " panes ",
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled("| ", sep),
        Span::raw(app.layout.mode.as_str()),
    ];

    match app.layout.mode {
        LayoutMode::Grid => {
            if !app.layout.visual_order.is_empty() {
                spans.push(Span::styled(" | ", sep));
                spans.push(Span::raw(app.layout.topology.arrangement.name()));
            }
        }
        LayoutMode::Tabbed => {
            spans.push(Span::styled(" |", sep));
            for id in &app.layout.visual_order {
                let Some(session) = app.sessions.get(id) else {
                    continue;
                };
                let active = app.layout.active_tab == Some(*id);
                let mut style = Style::default().fg(project_color(session.color_index));
                if active {
                    style = style.add_modifier(Modifier::REVERSED | Modifier::BOLD);
                }
                let marker = attention_icon(app.attention_of(*id), app.blink_visible);
                spans.push(Span::raw(" "));
                spans.push(Span::styled(
                    format!(" {}:{}{} ", id.number(), session.initials, marker),
                    style,
                ));
            }
        }
    }

    let attention = app.attention_count();
    if attention > 0 {
        spans.push(Span::styled(" | ", sep));
        spans.push(Span::styled(
            format!("{attention} need attention"),
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        ));
    }

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

/// Renders the footer line.
pub fn render_footer(frame: &mut Frame, area: Rect, app: &App) {
    let key_style = Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD);

    let line = if let Some(id) = app.confirm_close {
        let title = app
            .sessions
            .get(&id)
            .map_or_else(|| format!("session {}", id.number()), |s| s.title.clone());
        Line::from(vec![
            Span::styled(
                format!(" Close {title}? "),
                Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
            ),
            Span::styled("y", key_style),
            Span::raw(" confirm, any other key cancels"),
        ])
    } else if app.prefix {
        let mut spans = vec![Span::styled(" ^a ", Style::default().fg(Color::Yellow))];
        for (key, label) in [
            ("n", "add"),
            ("x", "close"),
            ("t", "mode"),
            ("a", "arrange"),
            ("h/l", "move"),
            ("s", "swap"),
            ("1-6", "focus"),
            ("[/]", "split"),
            ("c", "clear"),
            ("q", "quit"),
        ] {
            spans.push(Span::styled(key, key_style));
            spans.push(Span::raw(format!(" {label}  ")));
        }
        Line::from(spans)
    } else if let Some((level, message)) = &app.notice {
        Line::from(Span::styled(
            format!(" {level}: {message}"),
            Style::default().fg(notice_color(*level)),
        ))
    } else {
        Line::from(vec![
            Span::styled(" ^a", key_style),
            Span::raw(" commands  "),
            Span::styled("^a n", key_style),
            Span::raw(" new session  "),
            Span::styled("^a q", key_style),
            Span::raw(" quit"),
        ])
    };

    frame.render_widget(Paragraph::new(line), area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::tests::view;
    use panes_core::{LifecycleState, NoticeLevel, SessionId};
    use panes_engine::EngineEvent;
    use ratatui::{backend::TestBackend, Terminal};

    fn draw(app: &App, footer: bool) -> String {
        let mut terminal = Terminal::new(TestBackend::new(100, 1)).unwrap();
        terminal
            .draw(|frame| {
                if footer {
                    render_footer(frame, frame.area(), app)
                } else {
                    render_header(frame, frame.area(), app)
                }
            })
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
    fn test_header_shows_tabs_in_tabbed_mode() {
        let mut app = App::default();
        for n in 0..2 {
            app.apply_event(EngineEvent::SessionStateChanged {
                session: view(n, LifecycleState::Ready),
            });
            app.layout.visual_order.push(SessionId::new(n).unwrap());
        }
        app.layout.mode = LayoutMode::Tabbed;
        app.layout.active_tab = SessionId::new(1);

        let header = draw(&app, false);
        assert!(header.contains("tabbed"));
        assert!(header.contains("1:AP"));
        assert!(header.contains("2:AP"));
    }

    #[test]
    fn test_footer_priorities() {
        let mut app = App::default();
        assert!(draw(&app, true).contains("^a commands"));

        app.notice = Some((NoticeLevel::Error, "spawn failed".to_string()));
        assert!(draw(&app, true).contains("error: spawn failed"));

        app.prefix = true;
        assert!(draw(&app, true).contains("arrange"));

        app.confirm_close = SessionId::new(3);
        assert!(draw(&app, true).contains("Close session 4?"));
    }
}
