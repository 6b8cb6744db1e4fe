//! panes - side-by-side interactive agent sessions
//!
//! Runs up to six agent processes in pseudo-terminals and lays them out in a
//! resizable grid or as tabs.
//!
//! # Usage
//!
//! ```text
//! panes                    # Interactive TUI
//! panes serve              # Headless engine speaking JSON lines on stdio
//! panes config             # Print the effective configuration
//! panes --config FILE ...  # Use another config file
//! ```

use std::fs::{self, OpenOptions};
use std::io::{self, Stdout};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use crossterm::{
    event::{self, Event as CrosstermEvent, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use panes_engine::{
    spawn_orchestrator, DirectoryStore, EngineConfig, FileDirectoryStore, MemoryDirectoryStore,
    OrchestratorHandle, PtyHost,
};
use panes_tui::{
    app::{App, HoldState},
    dispatch, handle_key_event,
    ui::{self, layout::AppLayout},
    Action, Event, Result as TuiResult, TuiError,
};
use ratatui::{backend::CrosstermBackend, layout::Rect, Terminal};
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

/// Main loop tick; drives blinking and hold progress.
const TICK_RATE: Duration = Duration::from_millis(100);

// ============================================================================
// CLI Arguments
// ============================================================================

/// panes - side-by-side interactive agent sessions
#[derive(Parser, Debug)]
#[command(name = "panes", version, about)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Config file (default: $XDG_CONFIG_HOME/panes/config.toml)
    #[arg(long, short = 'c', global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the engine headless, speaking JSON lines on stdin/stdout
    Serve,
    /// Print the effective configuration as TOML
    Config,
}

// ============================================================================
// Engine
// ============================================================================

fn start_engine(config: &EngineConfig) -> OrchestratorHandle {
    let (host, host_events) =
        PtyHost::new(config.launch.clone(), config.timing.terminate_grace());

    let store: Arc<dyn DirectoryStore> = match config.store.resolved_path() {
        Some(path) => {
            debug!(path = %path.display(), "Using directory store");
            Arc::new(FileDirectoryStore::new(path))
        }
        None => {
            warn!("No data directory; last-used directories will not persist");
            Arc::new(MemoryDirectoryStore::new())
        }
    };

    spawn_orchestrator(config, Arc::new(host), host_events, store)
}

// ============================================================================
// Terminal Setup / Cleanup
// ============================================================================

fn setup_terminal() -> TuiResult<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode().map_err(|e| TuiError::TerminalInit(e.to_string()))?;

    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).map_err(|e| TuiError::TerminalInit(e.to_string()))?;

    let backend = CrosstermBackend::new(stdout);
    Terminal::new(backend).map_err(|e| TuiError::TerminalInit(e.to_string()))
}

/// Restores the terminal. Always called before exiting, even on error.
fn cleanup_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> TuiResult<()> {
    disable_raw_mode().map_err(|e| TuiError::TerminalCleanup(e.to_string()))?;

    execute!(terminal.backend_mut(), LeaveAlternateScreen)
        .map_err(|e| TuiError::TerminalCleanup(e.to_string()))?;

    terminal
        .show_cursor()
        .map_err(|e| TuiError::TerminalCleanup(e.to_string()))?;

    Ok(())
}

// ============================================================================
// Input Tasks
// ============================================================================

/// Polls crossterm for keys and resizes.
///
/// Crossterm polling is synchronous, so each poll runs on the blocking pool
/// with a short timeout to notice cancellation.
fn spawn_keyboard_task(
    event_tx: mpsc::UnboundedSender<Event>,
    cancel_token: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            if cancel_token.is_cancelled() {
                debug!("Keyboard task shutting down");
                break;
            }

            let poll_result = tokio::task::spawn_blocking(|| {
                if event::poll(Duration::from_millis(50)).unwrap_or(false) {
                    event::read().ok()
                } else {
                    None
                }
            })
            .await;

            let event = match poll_result {
                Ok(Some(CrosstermEvent::Key(key))) if key.kind != KeyEventKind::Release => {
                    Event::Key(key)
                }
                Ok(Some(CrosstermEvent::Resize(width, height))) => Event::Resize(width, height),
                Ok(_) => continue,
                Err(e) => {
                    error!(error = %e, "Keyboard polling task panicked");
                    break;
                }
            };
            if event_tx.send(event).is_err() {
                debug!("Event channel closed, keyboard task exiting");
                break;
            }
        }
    })
}

/// Forwards engine events into the main loop's channel.
fn spawn_engine_event_task(
    mut events: broadcast::Receiver<panes_engine::EngineEvent>,
    event_tx: mpsc::UnboundedSender<Event>,
    cancel_token: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let received = tokio::select! {
                _ = cancel_token.cancelled() => break,
                received = events.recv() => received,
            };
            let event = match received {
                Ok(event) => Event::Engine(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Engine events lagged, resyncing");
                    Event::Lagged
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("Engine event stream closed");
                    break;
                }
            };
            if event_tx.send(event).is_err() {
                break;
            }
        }
    })
}

// ============================================================================
// Main Event Loop
// ============================================================================

/// Reports the pane container size for a terminal of `width` x `height`.
async fn report_container_size(handle: &OrchestratorHandle, width: u16, height: u16) {
    let panes = AppLayout::new(Rect::new(0, 0, width, height)).panes;
    handle.window_resized(panes.width, panes.height).await;
}

async fn run_event_loop(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    app: &mut App,
    handle: &OrchestratorHandle,
    event_rx: &mut mpsc::UnboundedReceiver<Event>,
    cancel_token: &CancellationToken,
) -> Result<()> {
    loop {
        app.tick();
        terminal.draw(|frame| ui::render(frame, app))?;

        let received = tokio::time::timeout(TICK_RATE, event_rx.recv()).await;

        match received {
            Ok(Some(Event::Key(key))) => {
                let action = handle_key_event(key, app);
                if action == Action::Quit {
                    info!("User requested quit");
                    break;
                }
                dispatch(action, handle, app).await?;
            }
            Ok(Some(Event::Resize(width, height))) => {
                debug!(width, height, "Terminal resized");
                report_container_size(handle, width, height).await;
            }
            Ok(Some(Event::Engine(event))) => {
                if let Some(action) = app.apply_event(event) {
                    dispatch(action, handle, app).await?;
                }
            }
            Ok(Some(Event::Lagged)) => {
                app.apply_snapshot(handle.snapshot().await?);
            }
            Ok(None) => {
                warn!("Event channel closed");
                break;
            }
            Err(_) => {
                if let Some(hold) = app.hold {
                    let progress = handle.hold_progress(hold.session_id).await;
                    app.hold = Some(HoldState { progress, ..hold });
                }
            }
        }

        if app.should_quit || cancel_token.is_cancelled() {
            break;
        }
    }

    Ok(())
}

// ============================================================================
// Logging Setup
// ============================================================================

fn log_filter() -> EnvFilter {
    let mut filter = EnvFilter::from_default_env();
    for directive in ["panes=info", "panes_tui=info", "panes_engine=info"] {
        if let Ok(directive) = directive.parse() {
            filter = filter.add_directive(directive);
        }
    }
    filter
}

/// Opens `$XDG_STATE_HOME/panes/panes.log` for the TUI.
///
/// Warnings go to stderr before the TUI takes over the terminal.
fn create_log_file() -> Option<fs::File> {
    let log_dir = dirs::state_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join(".local/state")))?
        .join("panes");

    if let Err(e) = fs::create_dir_all(&log_dir) {
        eprintln!("Warning: Failed to create log directory {log_dir:?}: {e}");
        return None;
    }

    let log_path = log_dir.join("panes.log");
    match OpenOptions::new().create(true).append(true).open(&log_path) {
        Ok(file) => Some(file),
        Err(e) => {
            eprintln!("Warning: Failed to open log file {log_path:?}: {e}");
            None
        }
    }
}

fn init_tui_logging() {
    match create_log_file() {
        Some(file) => {
            tracing_subscriber::fmt()
                .with_env_filter(log_filter())
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(EnvFilter::new("off"))
                .init();
        }
    }
}

// ============================================================================
// Entry Points
// ============================================================================

async fn run_tui(config: EngineConfig) -> Result<()> {
    init_tui_logging();
    info!(version = env!("CARGO_PKG_VERSION"), "panes starting");

    let handle = start_engine(&config);
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<Event>();
    let cancel_token = CancellationToken::new();

    let default_directory = std::env::current_dir()
        .map(|dir| dir.display().to_string())
        .unwrap_or_default();
    // Subscribe first so nothing published after the snapshot is missed.
    let events = handle.subscribe();
    let mut app = App::new(default_directory);
    app.apply_snapshot(handle.snapshot().await?);

    let mut terminal = setup_terminal()?;
    if let Ok(size) = terminal.size() {
        report_container_size(&handle, size.width, size.height).await;
    }

    let engine_task = spawn_engine_event_task(events, event_tx.clone(), cancel_token.clone());
    let keyboard_task = spawn_keyboard_task(event_tx, cancel_token.clone());

    let result =
        run_event_loop(&mut terminal, &mut app, &handle, &mut event_rx, &cancel_token).await;

    cancel_token.cancel();
    handle.shutdown().await;
    let _ = tokio::time::timeout(Duration::from_millis(100), engine_task).await;
    let _ = tokio::time::timeout(Duration::from_millis(100), keyboard_task).await;

    if let Err(e) = cleanup_terminal(&mut terminal) {
        error!(error = %e, "Failed to cleanup terminal");
    }

    info!("panes stopped");
    result
}

async fn run_serve(config: EngineConfig) -> Result<()> {
    // stdout carries the protocol; logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(log_filter())
        .with_writer(io::stderr)
        .init();
    info!(version = env!("CARGO_PKG_VERSION"), "panes engine serving on stdio");

    let handle = start_engine(&config);
    let cancel_token = CancellationToken::new();

    let signal_token = cancel_token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received SIGINT");
            signal_token.cancel();
        }
    });

    panes_engine::serve(handle, tokio::io::stdin(), tokio::io::stdout(), cancel_token)
        .await
        .context("Front-end channel failed")?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = EngineConfig::load(args.config.as_deref()).context("Failed to load config")?;

    match args.command {
        None => run_tui(config).await,
        Some(Command::Serve) => run_serve(config).await,
        Some(Command::Config) => {
            print!("{}", config.to_toml());
            Ok(())
        }
    }
}
