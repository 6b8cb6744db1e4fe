//! Native process host backed by pseudo-terminals.
//!
//! Each session runs `<shell> -l -c "<agent command> [flags]"` on its own
//! pty. `portable_pty` makes the child a session leader, so signals go to
//! the whole process group. A reader thread per process forwards output; a
//! waiter task reports the exit once the reader has drained.

use std::collections::HashMap;
use std::io::{self, Read, Write};
use std::sync::{Arc, Mutex as StdMutex};
use std::thread;

use async_trait::async_trait;
use panes_core::SessionId;
use portable_pty::{native_pty_system, CommandBuilder, MasterPty, PtySize};
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::LaunchConfig;
use crate::host::{HostError, HostEvent, ProcessHost, SpawnRequest};
use crate::resize::CellSize;

/// Buffered host events before readers block.
const EVENT_BUFFER: usize = 256;

/// Bytes read from a pty master per chunk.
const READ_CHUNK: usize = 4096;

/// How long the exit report waits for trailing output.
const READER_DRAIN: Duration = Duration::from_millis(500);

type SharedWriter = Arc<StdMutex<Box<dyn Write + Send>>>;
type SharedMaster = Arc<StdMutex<Box<dyn MasterPty + Send>>>;

struct PtyProcess {
    generation: u64,
    master: SharedMaster,
    writer: SharedWriter,
    /// Process id of the session leader, which is also its group id.
    pid: i32,
    exited: CancellationToken,
}

/// [`ProcessHost`] that runs each session on its own pseudo-terminal.
pub struct PtyHost {
    launch: LaunchConfig,
    terminate_grace: Duration,
    processes: Arc<Mutex<HashMap<SessionId, PtyProcess>>>,
    events: mpsc::Sender<HostEvent>,
}

impl PtyHost {
    /// Creates the host and the receiver its events arrive on.
    pub fn new(launch: LaunchConfig, terminate_grace: Duration) -> (Self, mpsc::Receiver<HostEvent>) {
        let (events, rx) = mpsc::channel(EVENT_BUFFER);
        let host = Self {
            launch,
            terminate_grace,
            processes: Arc::new(Mutex::new(HashMap::new())),
            events,
        };
        (host, rx)
    }

    fn command_for(&self, request: &SpawnRequest) -> CommandBuilder {
        let mut cmd = CommandBuilder::new(&self.launch.shell);
        cmd.arg("-l");
        cmd.arg("-c");
        cmd.arg(self.launch.command_line(request.mode));
        cmd.cwd(&request.directory);
        cmd.env("TERM", "xterm-256color");
        cmd.env("COLORTERM", "truecolor");
        cmd.env("PWD", &request.directory);
        cmd
    }
}

#[async_trait]
impl ProcessHost for PtyHost {
    async fn spawn(&self, request: SpawnRequest) -> Result<(), HostError> {
        let session_id = request.session_id;
        let generation = request.generation;
        let spawn_failed = |message: String| HostError::SpawnFailed {
            session_id,
            message,
        };

        // portable_pty falls back to $HOME for a missing cwd; a session must
        // never silently start somewhere else.
        if !request.directory.is_dir() {
            return Err(spawn_failed(format!(
                "{} is not a directory",
                request.directory.display()
            )));
        }

        let pair = native_pty_system()
            .openpty(pty_size(request.size))
            .map_err(|e| spawn_failed(format!("failed to open pty: {e}")))?;

        let mut child = pair
            .slave
            .spawn_command(self.command_for(&request))
            .map_err(|e| spawn_failed(e.to_string()))?;
        // The reader only sees EOF once no slave copy outside the child is open.
        drop(pair.slave);

        let pid = child
            .process_id()
            .and_then(|pid| i32::try_from(pid).ok())
            .ok_or_else(|| spawn_failed("process exited during spawn".to_string()))?;

        let reader = pair
            .master
            .try_clone_reader()
            .map_err(|e| spawn_failed(format!("failed to clone pty reader: {e}")))?;
        let writer = pair
            .master
            .take_writer()
            .map_err(|e| spawn_failed(format!("failed to take pty writer: {e}")))?;

        let (drained_tx, drained_rx) = oneshot::channel();
        let reader_events = self.events.clone();
        thread::Builder::new()
            .name(format!("pty-reader-{session_id}"))
            .spawn(move || read_output(reader, session_id, generation, reader_events, drained_tx))
            .map_err(|e| spawn_failed(e.to_string()))?;

        let exited = CancellationToken::new();
        self.processes.lock().await.insert(
            session_id,
            PtyProcess {
                generation,
                master: Arc::new(StdMutex::new(pair.master)),
                writer: Arc::new(StdMutex::new(writer)),
                pid,
                exited: exited.clone(),
            },
        );

        let processes = Arc::clone(&self.processes);
        let events = self.events.clone();
        tokio::spawn(async move {
            let code = match tokio::task::spawn_blocking(move || child.wait()).await {
                Ok(Ok(status)) => i32::try_from(status.exit_code()).ok(),
                Ok(Err(e)) => {
                    warn!(session_id = %session_id, error = %e, "Failed to wait for process");
                    None
                }
                Err(e) => {
                    warn!(session_id = %session_id, error = %e, "Wait task failed");
                    None
                }
            };
            exited.cancel();
            let _ = tokio::time::timeout(READER_DRAIN, drained_rx).await;

            {
                let mut processes = processes.lock().await;
                if processes.get(&session_id).is_some_and(|p| p.generation == generation) {
                    processes.remove(&session_id);
                }
            }

            debug!(session_id = %session_id, generation, ?code, "Process exited");
            // Ignore send error - the orchestrator may have shut down
            let _ = events
                .send(HostEvent::Exited {
                    session_id,
                    generation,
                    code,
                })
                .await;
        });

        info!(
            session_id = %session_id,
            generation,
            pid,
            directory = %request.directory.display(),
            mode = %request.mode.as_str(),
            "Process spawned"
        );
        Ok(())
    }

    async fn send_input(&self, session_id: SessionId, bytes: &[u8]) -> Result<(), HostError> {
        let writer = self
            .processes
            .lock()
            .await
            .get(&session_id)
            .map(|p| Arc::clone(&p.writer))
            .ok_or(HostError::NotRunning { session_id })?;
        let bytes = bytes.to_vec();
        let result = tokio::task::spawn_blocking(move || {
            let mut writer = writer
                .lock()
                .map_err(|_| io::Error::other("pty writer lock poisoned"))?;
            writer.write_all(&bytes)?;
            writer.flush()
        })
        .await
        .map_err(io::Error::other)
        .and_then(|r| r);
        result.map_err(|source| HostError::Io { session_id, source })
    }

    async fn resize(&self, session_id: SessionId, size: CellSize) -> Result<(), HostError> {
        let master = self
            .processes
            .lock()
            .await
            .get(&session_id)
            .map(|p| Arc::clone(&p.master))
            .ok_or(HostError::NotRunning { session_id })?;
        let master = master.lock().map_err(|_| HostError::Io {
            session_id,
            source: io::Error::other("pty master lock poisoned"),
        })?;
        master
            .resize(pty_size(size))
            .map_err(|e| HostError::Io {
                session_id,
                source: io::Error::other(e.to_string()),
            })
    }

    async fn terminate(&self, session_id: SessionId) -> Result<(), HostError> {
        let (pid, exited) = {
            let processes = self.processes.lock().await;
            let process = processes
                .get(&session_id)
                .ok_or(HostError::NotRunning { session_id })?;
            (process.pid, process.exited.clone())
        };

        signal_group(pid, libc::SIGTERM);
        debug!(session_id = %session_id, pid, "Sent SIGTERM to process group");

        let grace = self.terminate_grace;
        tokio::spawn(async move {
            tokio::select! {
                _ = exited.cancelled() => {}
                _ = tokio::time::sleep(grace) => {
                    warn!(session_id = %session_id, pid, "Process ignored SIGTERM, sending SIGKILL");
                    signal_group(pid, libc::SIGKILL);
                }
            }
        });
        Ok(())
    }
}

fn read_output(
    mut reader: Box<dyn Read + Send>,
    session_id: SessionId,
    generation: u64,
    events: mpsc::Sender<HostEvent>,
    drained: oneshot::Sender<()>,
) {
    let mut buf = [0u8; READ_CHUNK];
    loop {
        match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => {
                let bytes = buf.get(..n).map(<[u8]>::to_vec).unwrap_or_default();
                let event = HostEvent::Output {
                    session_id,
                    generation,
                    bytes,
                };
                if events.blocking_send(event).is_err() {
                    break;
                }
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            // EIO once the last slave descriptor closes.
            Err(_) => break,
        }
    }
    let _ = drained.send(());
}

fn pty_size(size: CellSize) -> PtySize {
    PtySize {
        rows: size.rows,
        cols: size.cols,
        pixel_width: 0,
        pixel_height: 0,
    }
}

fn signal_group(pid: i32, signal: libc::c_int) {
    // SAFETY: kill has no memory-safety preconditions.
    let rc = unsafe { libc::kill(-pid, signal) };
    if rc != 0 {
        debug!(pid, signal, error = %io::Error::last_os_error(), "Signal not delivered");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use panes_core::SessionMode;

    fn sh_launch(script: &str) -> LaunchConfig {
        LaunchConfig {
            shell: "/bin/sh".to_string(),
            agent_command: script.to_string(),
            ..LaunchConfig::default()
        }
    }

    fn request(generation: u64) -> SpawnRequest {
        SpawnRequest {
            session_id: SessionId::new(0).unwrap(),
            generation,
            directory: std::env::temp_dir(),
            mode: SessionMode::New,
            size: CellSize::new(100, 30),
        }
    }

    async fn collect_until_exit(rx: &mut mpsc::Receiver<HostEvent>) -> (Vec<u8>, Option<i32>) {
        let mut output = Vec::new();
        loop {
            let event = tokio::time::timeout(Duration::from_secs(10), rx.recv())
                .await
                .expect("host event")
                .expect("channel open");
            match event {
                HostEvent::Output { bytes, .. } => output.extend(bytes),
                HostEvent::Exited { code, .. } => return (output, code),
            }
        }
    }

    #[tokio::test]
    async fn test_output_and_exit_are_reported() {
        let (host, mut rx) = PtyHost::new(sh_launch("echo hello-from-pty; exit 3"), Duration::from_secs(1));
        host.spawn(request(7)).await.unwrap();

        let (output, code) = collect_until_exit(&mut rx).await;
        assert!(String::from_utf8_lossy(&output).contains("hello-from-pty"));
        assert_eq!(code, Some(3));
    }

    #[tokio::test]
    async fn test_pty_reports_window_size() {
        let (host, mut rx) = PtyHost::new(sh_launch("stty size"), Duration::from_secs(1));
        host.spawn(request(1)).await.unwrap();

        let (output, _) = collect_until_exit(&mut rx).await;
        assert!(String::from_utf8_lossy(&output).contains("30 100"));
    }

    #[tokio::test]
    async fn test_terminate_stops_process() {
        let (host, mut rx) = PtyHost::new(sh_launch("sleep 30"), Duration::from_millis(500));
        host.spawn(request(2)).await.unwrap();
        host.terminate(SessionId::new(0).unwrap()).await.unwrap();

        let (_, code) = collect_until_exit(&mut rx).await;
        assert_ne!(code, Some(0));
    }

    #[tokio::test]
    async fn test_input_reaches_process() {
        let (host, mut rx) = PtyHost::new(
            sh_launch("read line; echo got:$line"),
            Duration::from_secs(1),
        );
        host.spawn(request(4)).await.unwrap();
        host.send_input(SessionId::new(0).unwrap(), b"ping\r")
            .await
            .unwrap();

        let (output, code) = collect_until_exit(&mut rx).await;
        assert!(String::from_utf8_lossy(&output).contains("got:ping"));
        assert_eq!(code, Some(0));
    }

    #[tokio::test]
    async fn test_resize_reaches_process() {
        let (host, mut rx) = PtyHost::new(sh_launch("sleep 1; stty size"), Duration::from_secs(1));
        host.spawn(request(5)).await.unwrap();
        host.resize(SessionId::new(0).unwrap(), CellSize::new(120, 40))
            .await
            .unwrap();

        let (output, _) = collect_until_exit(&mut rx).await;
        assert!(String::from_utf8_lossy(&output).contains("40 120"));
    }

    #[tokio::test]
    async fn test_unknown_session_is_not_running() {
        let (host, _rx) = PtyHost::new(LaunchConfig::default(), Duration::from_secs(1));
        let id = SessionId::new(4).unwrap();
        assert!(matches!(
            host.send_input(id, b"x").await,
            Err(HostError::NotRunning { .. })
        ));
        assert!(matches!(
            host.terminate(id).await,
            Err(HostError::NotRunning { .. })
        ));
    }

    #[tokio::test]
    async fn test_missing_directory_fails_spawn() {
        let (host, _rx) = PtyHost::new(sh_launch("true"), Duration::from_secs(1));
        let mut req = request(3);
        req.directory = "/definitely/not/here".into();
        assert!(matches!(
            host.spawn(req).await,
            Err(HostError::SpawnFailed { .. })
        ));
    }
}
