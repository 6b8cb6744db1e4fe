//! UI rendering module for the panes TUI.
//!
//! # Layout Structure
//!
//! ```text
//! +--------------------------------------------------+
//! | panes | grid | 3-top1                            |  <- 1 line
//! +--------------------------------------------------+
//! | +- AP app ----------------------------- ready -+ |
//! | | output tail                                  | |
//! | +----------------------------------------------+ |
//! | +- WS web ----- ! ready -++- DB db ---- ready -+ |  <- engine topology
//! | |                        ||                    | |
//! | +------------------------++--------------------+ |
//! +--------------------------------------------------+
//! | ^a commands  ^a n new session  ^a q quit         |  <- 1 line
//! +--------------------------------------------------+
//! ```
//!
//! Pane rectangles come straight from the engine's topology; this module only
//! scales them to the terminal.

pub mod layout;
pub mod pane;
pub mod status_bar;
pub mod theme;

use ratatui::{
    layout::Alignment,
    style::{Color, Style},
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};

use crate::app::App;
use layout::{region_rect, AppLayout};

pub use pane::render_pane;
pub use status_bar::{render_footer, render_header};

/// Renders the complete TUI interface.
pub fn render(frame: &mut Frame, app: &App) {
    let layout = AppLayout::new(frame.area());

    render_header(frame, layout.header, app);
    render_footer(frame, layout.footer, app);

    if app.layout.topology.placements.is_empty() {
        let hint = Paragraph::new(Line::from(Span::styled(
            "No sessions. Press Ctrl-a n to add one.",
            Style::default().fg(Color::DarkGray),
        )))
        .alignment(Alignment::Center);
        frame.render_widget(hint, layout.panes);
        return;
    }

    for placement in &app.layout.topology.placements {
        let Some(session) = app.sessions.get(&placement.session_id) else {
            continue;
        };
        let area = region_rect(layout.panes, &placement.region);
        if area.width < 3 || area.height < 3 {
            continue;
        }
        render_pane(frame, area, session, app);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::tests::view;
    use panes_core::{
        compute_topology, Arrangement, LayoutMode, LayoutSnapshot, LifecycleState, Placement,
        Region, SessionId, SplitRatio, Topology,
    };
    use panes_engine::EngineEvent;
    use ratatui::{backend::TestBackend, Terminal};

    fn screen(app: &App) -> String {
        let mut terminal = Terminal::new(TestBackend::new(80, 24)).unwrap();
        terminal.draw(|frame| render(frame, app)).unwrap();
        terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|c| c.symbol())
            .collect()
    }

    #[test]
    fn test_render_empty_state() {
        let app = App::default();
        assert!(screen(&app).contains("No sessions"));
    }

    #[test]
    fn test_render_placements() {
        let mut app = App::default();
        let ids: Vec<SessionId> = (0..2).map(|n| SessionId::new(n).unwrap()).collect();
        for n in 0..2 {
            app.apply_event(EngineEvent::SessionStateChanged {
                session: view(n, LifecycleState::Ready),
            });
        }
        let half = Region {
            x: 0.0,
            y: 0.0,
            width: 50.0,
            height: 100.0,
        };
        app.apply_event(EngineEvent::LayoutChanged {
            layout: LayoutSnapshot {
                mode: LayoutMode::Grid,
                visual_order: ids.clone(),
                active_tab: None,
                topology: Topology {
                    arrangement: Arrangement::Horizontal,
                    placements: vec![
                        Placement {
                            position: 0,
                            session_id: ids[0],
                            region: half,
                        },
                        Placement {
                            position: 1,
                            session_id: ids[1],
                            region: Region { x: 50.0, ..half },
                        },
                    ],
                    handles: Vec::new(),
                },
            },
        });

        let rendered = screen(&app);
        assert!(rendered.contains("horizontal"));
        assert_eq!(rendered.matches("AP app").count(), 2);
    }

    #[test]
    fn test_render_engine_topology() {
        // Whatever the engine computes must render without panicking.
        let mut app = App::default();
        let ids: Vec<SessionId> = (0..6).map(|n| SessionId::new(n).unwrap()).collect();
        for n in 0..6 {
            app.apply_event(EngineEvent::SessionStateChanged {
                session: view(n, LifecycleState::AwaitingDirectory),
            });
        }
        app.layout.visual_order = ids.clone();
        app.layout.topology =
            compute_topology(Arrangement::Rows, &ids, |_, _| SplitRatio::DEFAULT);
        screen(&app);
    }
}
