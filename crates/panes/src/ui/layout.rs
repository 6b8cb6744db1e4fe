//! Layout helpers for the panes TUI.
//!
//! Splits the screen into header, pane container and footer, and maps the
//! engine's percent regions onto terminal cells.

use panes_core::Region;
use ratatui::layout::{Constraint, Direction, Layout, Rect};

/// Main application layout areas.
///
/// - Header (1 line): title, mode, tabs
/// - Panes (fills remaining): the session grid
/// - Footer (1 line): notices and keybinding hints
#[derive(Debug, Clone, Copy)]
pub struct AppLayout {
    pub header: Rect,
    pub panes: Rect,
    pub footer: Rect,
}

impl AppLayout {
    pub fn new(area: Rect) -> Self {
        let [header, panes, footer] = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1),
                Constraint::Min(3),
                Constraint::Length(1),
            ])
            .areas(area);

        Self {
            header,
            panes,
            footer,
        }
    }
}

/// Projects a region (percent of the container) onto `area`.
///
/// Edges are rounded independently so adjacent regions tile without gaps.
pub fn region_rect(area: Rect, region: &Region) -> Rect {
    let edge = |origin: u16, size: u16, percent: f32| -> u16 {
        let offset = (f32::from(size) * percent / 100.0).round();
        origin.saturating_add((offset.max(0.0) as u16).min(size))
    };

    let left = edge(area.x, area.width, region.x);
    let right = edge(area.x, area.width, region.x + region.width);
    let top = edge(area.y, area.height, region.y);
    let bottom = edge(area.y, area.height, region.y + region.height);

    Rect::new(
        left,
        top,
        right.saturating_sub(left),
        bottom.saturating_sub(top),
    )
}
