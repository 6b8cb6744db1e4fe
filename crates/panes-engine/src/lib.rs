//! panes engine - session lifecycle and layout orchestration
//!
//! This crate owns all mutable session state:
//! - `orchestrator` - actor composing the components below, the single writer
//! - `registry` - the six session slots
//! - `attention`, `scroll` - per-session notification and auto-scroll timers
//! - `layout`, `resize` - screen topology and debounced process resizes
//! - `pty` - the pseudo-terminal process host
//! - `store` - last-used directory per slot
//! - `serve` - JSON-lines channel for external front-ends
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        panes engine                         │
//! ├─────────────────────────────────────────────────────────────┤
//! │                                                             │
//! │  ┌─────────────────┐     ┌─────────────────────────────┐    │
//! │  │ TUI  /  serve   │────▶│     OrchestratorActor       │    │
//! │  │ (handle users)  │     │  (session state owner)      │    │
//! │  └────────▲────────┘     └──────┬───────────────▲──────┘    │
//! │           │                     │ spawn/input   │ output    │
//! │           │ events              ▼               │ exit      │
//! │  ┌────────┴────────┐     ┌─────────────────────────────┐    │
//! │  │broadcast::Sender│     │          PtyHost            │    │
//! │  └─────────────────┘     └─────────────────────────────┘    │
//! │                                                             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations return `Result` or `Option`
//! - Channel operations handle closure gracefully

pub mod attention;
pub mod config;
pub mod host;
pub mod layout;
pub mod orchestrator;
pub mod pty;
pub mod registry;
pub mod resize;
pub mod scroll;
pub mod serve;
pub mod store;
pub mod timer;

pub use config::{ConfigError, EngineConfig};
pub use host::{HostError, HostEvent, ProcessHost, SpawnRequest};
pub use orchestrator::{
    spawn_orchestrator, CloseOutcome, EngineEvent, OrchestratorError, OrchestratorHandle,
};
pub use pty::PtyHost;
pub use resize::CellSize;
pub use serve::{serve, ServeError};
pub use store::{DirectoryStore, FileDirectoryStore, MemoryDirectoryStore, StoreError};
