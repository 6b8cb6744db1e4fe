//! Shared theme utilities for the panes TUI.
//!
//! Provides consistent styling across all UI components.

use panes_core::{AttentionFlags, LifecycleState, NoticeLevel, PROJECT_PALETTE_SIZE};
use ratatui::style::Color;

/// Colors a project can be shown in, indexed by `SessionView::color_index`.
const PROJECT_PALETTE: [Color; PROJECT_PALETTE_SIZE] = [
    Color::Cyan,
    Color::Green,
    Color::Magenta,
    Color::Blue,
    Color::Yellow,
    Color::LightRed,
    Color::LightCyan,
    Color::LightGreen,
];

/// Returns the stable color for a project palette index.
///
/// Out-of-range indices wrap, so a palette change never panics.
pub fn project_color(index: u8) -> Color {
    PROJECT_PALETTE
        .get(usize::from(index) % PROJECT_PALETTE_SIZE)
        .copied()
        .unwrap_or(Color::White)
}

/// Returns the label color for a lifecycle state.
pub fn state_color(state: LifecycleState) -> Color {
    match state {
        LifecycleState::Empty => Color::DarkGray,
        LifecycleState::AwaitingDirectory => Color::Yellow,
        LifecycleState::Starting => Color::Blue,
        LifecycleState::Ready => Color::Green,
        LifecycleState::Closing => Color::Red,
    }
}

/// Returns the attention marker for a pane, respecting blink visibility.
///
/// A pane needing attention blinks `!`; one waiting on a prompt with
/// notifications blocked shows a steady `?`.
pub fn attention_icon(flags: AttentionFlags, blink_visible: bool) -> &'static str {
    if flags.needs_attention {
        if blink_visible {
            "!"
        } else {
            " "
        }
    } else if flags.waiting_for_interaction {
        "?"
    } else {
        ""
    }
}

/// Returns the pane border color.
pub fn border_color(focused: bool, flags: AttentionFlags) -> Color {
    if flags.needs_attention {
        Color::Yellow
    } else if focused {
        Color::Cyan
    } else {
        Color::DarkGray
    }
}

pub fn notice_color(level: NoticeLevel) -> Color {
    match level {
        NoticeLevel::Info => Color::Gray,
        NoticeLevel::Warning => Color::Yellow,
        NoticeLevel::Error => Color::Red,
    }
}
