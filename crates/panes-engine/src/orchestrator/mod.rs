//! Session orchestration using the actor pattern.
//!
//! The orchestrator composes the registry, attention tracker, scroll guard,
//! layout engine, and resize coordinator, and binds them to the process
//! host. It is the single writer of all session state.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐  OrchestratorCommand  ┌───────────────────┐  EngineEvent  ┌──────────────┐
//! │   Handles    │──────(mpsc)──────────▶│                   │──(broadcast)─▶│ Presentation │
//! └──────────────┘                       │ OrchestratorActor │               └──────────────┘
//! ┌──────────────┐      HostEvent        │                   │
//! │ ProcessHost  │──────(mpsc)──────────▶│  registry         │
//! │              │◀── spawn/input/... ───│  attention        │
//! └──────────────┘                       │  scroll, layout   │
//!                                        │  resize, timers   │
//!                                        └───────────────────┘
//! ```
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()` or `.expect()` in production code
//! - Host and store failures are recovered locally
//! - Channel operations handle closure gracefully

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};

mod actor;
mod commands;
mod handle;

pub use actor::OrchestratorActor;
pub use commands::{CloseOutcome, EngineEvent, OrchestratorCommand, OrchestratorError, Reply};
pub use handle::OrchestratorHandle;

use crate::config::EngineConfig;
use crate::host::{HostEvent, ProcessHost};
use crate::store::DirectoryStore;

/// Channel buffer sizes
const COMMAND_BUFFER: usize = 100;
const EVENT_BUFFER: usize = 1024;

/// Spawns the orchestrator actor and returns a handle to it.
///
/// `host_events` must be the receiver paired with `host`.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use panes_engine::config::EngineConfig;
/// use panes_engine::orchestrator::spawn_orchestrator;
/// use panes_engine::pty::PtyHost;
/// use panes_engine::store::MemoryDirectoryStore;
///
/// #[tokio::main]
/// async fn main() {
///     let config = EngineConfig::default();
///     let (host, host_events) = PtyHost::new(config.launch.clone(), config.timing.terminate_grace());
///     let handle = spawn_orchestrator(
///         &config,
///         Arc::new(host),
///         host_events,
///         Arc::new(MemoryDirectoryStore::new()),
///     );
///     let id = handle.add_session().await;
/// }
/// ```
pub fn spawn_orchestrator(
    config: &EngineConfig,
    host: Arc<dyn ProcessHost>,
    host_events: mpsc::Receiver<HostEvent>,
    store: Arc<dyn DirectoryStore>,
) -> OrchestratorHandle {
    let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_BUFFER);
    let (event_tx, _) = broadcast::channel(EVENT_BUFFER);

    let actor = OrchestratorActor::new(config, cmd_rx, host_events, event_tx.clone(), host, store);
    tokio::spawn(actor.run());

    OrchestratorHandle::new(cmd_tx, event_tx)
}
