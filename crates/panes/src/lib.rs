//! panes TUI - terminal front-end for the panes engine
//!
//! # Architecture
//!
//! The TUI is event-driven with three tasks:
//!
//! 1. **Keyboard Task**: Polls for keyboard input and sends events to the main loop
//! 2. **Engine Event Task**: Forwards the engine's broadcast events to the main loop
//! 3. **Main Event Loop**: Applies events to [`App`], dispatches actions, renders
//!
//! The view state is rebuilt purely from engine events; all tasks respect a
//! shared `CancellationToken` for graceful shutdown.

pub mod app;
pub mod dispatch;
pub mod error;
pub mod input;
pub mod output;
pub mod ui;

// Re-export commonly used types
pub use app::App;
pub use dispatch::dispatch;
pub use error::{Result, TuiError};
pub use input::{handle_key_event, Action, Event};
