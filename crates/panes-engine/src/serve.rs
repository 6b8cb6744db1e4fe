//! JSON-lines front-end channel.
//!
//! `panes serve` runs the engine headless and speaks the
//! [`panes_protocol`] wire format over a byte stream, normally stdin and
//! stdout:
//! - a `hello` line is written first
//! - every inbound line is one command, answered only when it fails or asks
//!   for data (`snapshot`, `ping`)
//! - every [`EngineEvent`] is forwarded as it is published
//!
//! # Panic-Free Guarantees
//!
//! - Malformed, oversized or non-UTF-8 lines produce an `error` message and
//!   the loop continues
//! - A lagging event subscriber is resynchronized with a full snapshot
//! - Write failures end the loop with an error instead of panicking

use std::time::Duration;

use panes_core::MAX_SESSIONS;
use panes_protocol::{
    encode_server_message, parse_client_line, Command, ErrorCode, ProtocolError, ProtocolVersion,
    ServerMessage, MAX_LINE_BYTES,
};
use thiserror::Error;
use tokio::io::{
    AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader,
    BufWriter,
};
use tokio::sync::{broadcast, mpsc};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::orchestrator::{EngineEvent, OrchestratorError, OrchestratorHandle};

/// Outbound messages waiting for the writer.
const OUTBOUND_BUFFER: usize = 1024;

/// Write timeout (10 seconds)
const WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors that end the serve loop.
#[derive(Error, Debug)]
pub enum ServeError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("write timeout")]
    WriteTimeout,

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

/// Serves one front-end until its input closes, it sends `shutdown`, or
/// `shutdown` is cancelled. The engine is shut down on the way out.
///
/// # Errors
///
/// Returns an error if reading the input or writing a message fails.
pub async fn serve<R, W>(
    handle: OrchestratorHandle,
    reader: R,
    writer: W,
    shutdown: CancellationToken,
) -> Result<(), ServeError>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (out_tx, out_rx) = mpsc::channel(OUTBOUND_BUFFER);

    // Subscribe before the hello so no event published after it is missed.
    let events = handle.subscribe();
    let writer_task = tokio::spawn(write_messages(writer, out_rx, shutdown.clone()));
    let _ = out_tx.send(ServerMessage::hello(MAX_SESSIONS)).await;

    let forwarder = tokio::spawn(forward_events(
        handle.clone(),
        events,
        out_tx.clone(),
        shutdown.clone(),
    ));

    let result = read_commands(&handle, reader, &out_tx, &shutdown).await;

    handle.shutdown().await;
    shutdown.cancel();
    drop(out_tx);
    let _ = forwarder.await;

    let written = match writer_task.await {
        Ok(written) => written,
        Err(e) => {
            warn!(error = %e, "Writer task failed");
            Ok(())
        }
    };
    info!("Front-end channel closed");
    result.and(written)
}

async fn read_commands<R>(
    handle: &OrchestratorHandle,
    reader: R,
    out: &mpsc::Sender<ServerMessage>,
    shutdown: &CancellationToken,
) -> Result<(), ServeError>
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();

    loop {
        let inbound = tokio::select! {
            _ = shutdown.cancelled() => return Ok(()),
            read = next_line(&mut reader, &mut buf) => read?,
        };
        let line = match inbound {
            Inbound::Eof => {
                debug!("Front-end sent EOF");
                return Ok(());
            }
            Inbound::Line(line) => line,
            Inbound::Rejected(e) => {
                debug!(error = %e, "Unreadable command line");
                send(out, ServerMessage::error(ErrorCode::BadRequest, e.to_string())).await;
                continue;
            }
        };

        let message = match parse_client_line(&line) {
            Ok(message) => message,
            Err(ProtocolError::Empty) => continue,
            Err(ProtocolError::Version(e)) => {
                warn!(error = %e, "Rejected command");
                send(
                    out,
                    ServerMessage::Rejected {
                        reason: e.to_string(),
                        protocol_version: ProtocolVersion::CURRENT,
                    },
                )
                .await;
                continue;
            }
            Err(e) => {
                debug!(error = %e, size = line.len(), "Bad command line");
                send(out, ServerMessage::error(ErrorCode::BadRequest, e.to_string())).await;
                continue;
            }
        };

        if matches!(message.command, Command::Shutdown) {
            info!("Front-end requested shutdown");
            return Ok(());
        }

        if let Some(reply) = dispatch(handle, message.command).await {
            send(out, reply).await;
        }
    }
}

/// One inbound line, or why it could not be read as one.
enum Inbound {
    Eof,
    Line(String),
    Rejected(ProtocolError),
}

/// Reads the next line without ever buffering more than [`MAX_LINE_BYTES`].
///
/// An oversized line is skipped up to its newline.
async fn next_line<R>(reader: &mut R, buf: &mut Vec<u8>) -> std::io::Result<Inbound>
where
    R: AsyncBufRead + Unpin,
{
    let limit = MAX_LINE_BYTES as u64 + 1;
    buf.clear();
    let read = (&mut *reader).take(limit).read_until(b'\n', buf).await?;
    if read == 0 {
        return Ok(Inbound::Eof);
    }

    if !buf.ends_with(b"\n") && buf.len() > MAX_LINE_BYTES {
        let mut size = buf.len();
        loop {
            buf.clear();
            let read = (&mut *reader).take(limit).read_until(b'\n', buf).await?;
            size += read;
            if read == 0 || buf.ends_with(b"\n") {
                break;
            }
        }
        return Ok(Inbound::Rejected(ProtocolError::TooLarge {
            size,
            max: MAX_LINE_BYTES,
        }));
    }

    match String::from_utf8(std::mem::take(buf)) {
        Ok(line) => Ok(Inbound::Line(line)),
        Err(e) => Ok(Inbound::Rejected(ProtocolError::InvalidUtf8(e.utf8_error()))),
    }
}

/// Runs one command and returns the message to answer with, if any.
async fn dispatch(handle: &OrchestratorHandle, command: Command) -> Option<ServerMessage> {
    let result = match command {
        Command::AddSession => handle.add_session().await.map(|_| ()),
        Command::OpenSlot { session_id } => handle.open_slot(session_id).await,
        Command::CancelDirectory { session_id } => handle.cancel_directory(session_id).await,
        Command::Start {
            session_id,
            directory,
            mode,
            task,
        } => handle.start(session_id, directory.into(), mode, task).await,
        Command::BeginDangerHold {
            session_id,
            directory,
            mode,
            task,
        } => {
            handle
                .begin_danger_hold(session_id, directory.into(), mode, task)
                .await
        }
        Command::CancelDangerHold { session_id } => handle.cancel_danger_hold(session_id).await,
        Command::Input { session_id, data } => {
            handle.send_input(session_id, data.into_bytes()).await;
            Ok(())
        }
        Command::UserScroll {
            session_id,
            at_bottom,
        } => {
            handle.user_scroll(session_id, at_bottom).await;
            Ok(())
        }
        Command::Focus { session_id } => handle.focus(session_id).await,
        Command::Close { session_id } => handle.request_close(session_id).await.map(|_| ()),
        Command::ConfirmClose { session_id } => {
            handle.confirm_close(session_id).await.map(|_| ())
        }
        Command::Swap { a, b } => handle.swap(a, b).await,
        Command::Move {
            position,
            direction,
        } => handle
            .move_by_position(position, direction)
            .await
            .map(|_| ()),
        Command::SetMode { mode } => handle.set_mode(mode).await,
        Command::SetArrangement { arrangement } => handle.set_arrangement(arrangement).await,
        Command::SetSplit { handle: split, percent } => {
            handle.set_split_ratio(split, percent).await.map(|_| ())
        }
        Command::SelectTab { session_id } => handle.select_tab(session_id).await,
        Command::SetTitle { session_id, title } => handle.set_title(session_id, title).await,
        Command::WindowResize { cols, rows } => {
            handle.window_resized(cols, rows).await;
            Ok(())
        }
        Command::ClearAllAttention => handle.clear_all_attention().await,
        Command::Snapshot => {
            return Some(match handle.snapshot().await {
                Ok(snapshot) => ServerMessage::Snapshot { snapshot },
                Err(e) => error_message(&e),
            })
        }
        Command::Ping { seq } => return Some(ServerMessage::Pong { seq }),
        Command::Shutdown => Ok(()),
    };

    match result {
        Ok(()) => None,
        Err(e) if e.is_stale() => {
            debug!(error = %e, "Ignoring command for a removed session");
            None
        }
        // Already announced through a ConfirmationRequired event.
        Err(OrchestratorError::NeedsConfirmation { .. }) => None,
        Err(e) => Some(error_message(&e)),
    }
}

/// Maps an orchestrator failure onto the wire error category.
pub fn error_code(error: &OrchestratorError) -> ErrorCode {
    use panes_core::DomainError;

    match error {
        OrchestratorError::Domain(DomainError::CapacityExceeded { .. }) => {
            ErrorCode::CapacityExceeded
        }
        OrchestratorError::Domain(DomainError::StaleReference { .. }) => ErrorCode::StaleReference,
        OrchestratorError::Domain(DomainError::InvalidTransition { .. }) => {
            ErrorCode::InvalidTransition
        }
        OrchestratorError::Domain(DomainError::InvalidFieldValue { .. }) => ErrorCode::InvalidValue,
        OrchestratorError::ProcessSpawnFailed { .. } => ErrorCode::SpawnFailed,
        OrchestratorError::NeedsConfirmation { .. } => ErrorCode::NeedsConfirmation,
        OrchestratorError::ChannelClosed => ErrorCode::Unavailable,
    }
}

fn error_message(error: &OrchestratorError) -> ServerMessage {
    ServerMessage::error(error_code(error), error.to_string())
}

impl From<EngineEvent> for ServerMessage {
    fn from(event: EngineEvent) -> Self {
        match event {
            EngineEvent::SessionStateChanged { session } => {
                ServerMessage::SessionStateChanged { session }
            }
            EngineEvent::SessionRemoved { session_id, reason } => {
                ServerMessage::SessionRemoved { session_id, reason }
            }
            EngineEvent::AttentionChanged { session_id, flags } => {
                ServerMessage::AttentionChanged { session_id, flags }
            }
            EngineEvent::LayoutChanged { layout } => ServerMessage::LayoutChanged { layout },
            EngineEvent::FocusChanged { focused } => ServerMessage::FocusChanged { focused },
            EngineEvent::Output {
                session_id,
                bytes,
                follow,
            } => ServerMessage::Output {
                session_id,
                data: String::from_utf8_lossy(&bytes).into_owned(),
                follow,
            },
            EngineEvent::DirectorySuggested {
                session_id,
                directory,
            } => ServerMessage::DirectorySuggested {
                session_id,
                directory: directory.to_string_lossy().into_owned(),
            },
            EngineEvent::Notice {
                session_id,
                level,
                message,
            } => ServerMessage::Notice {
                session_id,
                level,
                message,
            },
            EngineEvent::ConfirmationRequired { session_id } => {
                ServerMessage::ConfirmationRequired { session_id }
            }
        }
    }
}

async fn forward_events(
    handle: OrchestratorHandle,
    mut events: broadcast::Receiver<EngineEvent>,
    out: mpsc::Sender<ServerMessage>,
    shutdown: CancellationToken,
) {
    loop {
        let event = tokio::select! {
            _ = shutdown.cancelled() => return,
            event = events.recv() => event,
        };
        match event {
            Ok(event) => {
                if out.send(event.into()).await.is_err() {
                    return;
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "Event subscriber lagged, sending snapshot");
                if let Ok(snapshot) = handle.snapshot().await {
                    send(&out, ServerMessage::Snapshot { snapshot }).await;
                }
            }
            Err(broadcast::error::RecvError::Closed) => return,
        }
    }
}

async fn write_messages<W>(
    writer: W,
    mut messages: mpsc::Receiver<ServerMessage>,
    shutdown: CancellationToken,
) -> Result<(), ServeError>
where
    W: AsyncWrite + Unpin,
{
    let mut writer = BufWriter::new(writer);
    while let Some(message) = messages.recv().await {
        let line = encode_server_message(&message)?;
        let written = timeout(WRITE_TIMEOUT, async {
            writer.write_all(line.as_bytes()).await?;
            writer.flush().await
        })
        .await;
        match written {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                shutdown.cancel();
                return Err(e.into());
            }
            Err(_) => {
                shutdown.cancel();
                return Err(ServeError::WriteTimeout);
            }
        }
    }
    Ok(())
}

async fn send(out: &mpsc::Sender<ServerMessage>, message: ServerMessage) {
    // Ignore send error - the writer already stopped
    let _ = out.send(message).await;
}
