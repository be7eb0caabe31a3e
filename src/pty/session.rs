use std::io::{Read, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use portable_pty::{native_pty_system, ChildKiller, CommandBuilder, MasterPty, PtySize};
use tokio::sync::{mpsc, watch};

use super::prompt::{OutputChunk, PromptParser};
use super::PtyError;

/// Size of each raw read from the pseudo-terminal
pub const READ_BUFFER_SIZE: usize = 4096;
const OUTPUT_CHANNEL_CAPACITY: usize = 256;

/// What to launch inside the pseudo-terminal
#[derive(Debug, Clone)]
pub struct PtySpawnConfig {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub rows: u16,
    pub cols: u16,
}

impl PtySpawnConfig {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            rows: 40,
            cols: 120,
        }
    }

    /// Resume `session_id` interactively and submit `message` as the first prompt.
    pub fn resume(program: impl Into<String>, session_id: &str, message: &str) -> Self {
        Self::new(program).with_args(["-i", message, "--resume", session_id])
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }
}

/// How the subprocess ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PtyExit {
    Success,
    Failed { code: u32 },
    /// Terminated by [`PtySession::close`]
    Killed,
    /// The exit status could not be collected
    Unknown(String),
}

impl PtyExit {
    /// Failure detail, or `None` for a clean or requested exit.
    pub fn failure(&self) -> Option<String> {
        match self {
            PtyExit::Success | PtyExit::Killed => None,
            PtyExit::Failed { code } => Some(format!("exited with code {code}")),
            PtyExit::Unknown(reason) => Some(reason.clone()),
        }
    }
}

/// Output stream of a running [`PtySession`]
pub struct PtyOutput {
    /// Cleaned chunks that carried text or a detected prompt
    pub chunks: mpsc::Receiver<OutputChunk>,
    /// Holds the exit once the subprocess is gone
    pub exited: watch::Receiver<Option<PtyExit>>,
}

/// An interactive subprocess attached to a pseudo-terminal
pub struct PtySession {
    writer: Mutex<Option<Box<dyn Write + Send>>>,
    killer: Mutex<Option<Box<dyn ChildKiller + Send + Sync>>>,
    master: Mutex<Option<Box<dyn MasterPty + Send>>>,
    closed: Arc<AtomicBool>,
    exited: watch::Receiver<Option<PtyExit>>,
}

impl PtySession {
    /// Spawn `config` and start draining its output.
    pub fn spawn(config: PtySpawnConfig) -> Result<(Arc<Self>, PtyOutput), PtyError> {
        let pty_system = native_pty_system();
        let pair = pty_system
            .openpty(PtySize {
                rows: config.rows,
                cols: config.cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(|e| PtyError::Open(e.to_string()))?;

        let mut cmd = CommandBuilder::new(&config.program);
        cmd.args(&config.args);
        if let Some(cwd) = &config.cwd {
            cmd.cwd(cwd);
        }
        for (key, value) in std::env::vars() {
            cmd.env(key, value);
        }
        cmd.env("TERM", "xterm-256color");

        let mut child = pair
            .slave
            .spawn_command(cmd)
            .map_err(|e| PtyError::Spawn {
                program: config.program.clone(),
                reason: e.to_string(),
            })?;
        // The child holds its own handle to the slave side
        drop(pair.slave);

        let killer = child.clone_killer();
        let reader = pair
            .master
            .try_clone_reader()
            .map_err(|e| PtyError::Open(e.to_string()))?;
        let writer = pair
            .master
            .take_writer()
            .map_err(|e| PtyError::Open(e.to_string()))?;

        let (chunk_tx, chunk_rx) = mpsc::channel(OUTPUT_CHANNEL_CAPACITY);
        let (exit_tx, exit_rx) = watch::channel(None);
        let closed = Arc::new(AtomicBool::new(false));

        tracing::info!(
            program = %config.program,
            pid = ?child.process_id(),
            "Spawned PTY subprocess"
        );

        std::thread::Builder::new()
            .name("pty-reader".into())
            .spawn(move || read_loop(reader, chunk_tx))
            .map_err(PtyError::Io)?;

        std::thread::Builder::new()
            .name("pty-wait".into())
            .spawn({
                let closed = closed.clone();
                move || {
                    let exit = match child.wait() {
                        Ok(status) => {
                            tracing::debug!(exit_code = status.exit_code(), "PTY subprocess exited");
                            if status.success() {
                                PtyExit::Success
                            } else if closed.load(Ordering::SeqCst) {
                                PtyExit::Killed
                            } else {
                                PtyExit::Failed {
                                    code: status.exit_code(),
                                }
                            }
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, "Failed to wait for PTY subprocess");
                            PtyExit::Unknown(e.to_string())
                        }
                    };
                    let _ = exit_tx.send(Some(exit));
                }
            })
            .map_err(PtyError::Io)?;

        let session = Arc::new(Self {
            writer: Mutex::new(Some(writer)),
            killer: Mutex::new(Some(killer)),
            master: Mutex::new(Some(pair.master)),
            closed,
            exited: exit_rx.clone(),
        });

        Ok((
            session,
            PtyOutput {
                chunks: chunk_rx,
                exited: exit_rx,
            },
        ))
    }

    /// Spawn an arbitrary program with no resume arguments.
    pub fn spawn_raw(program: &str, args: &[&str]) -> Result<(Arc<Self>, PtyOutput), PtyError> {
        Self::spawn(PtySpawnConfig::new(program).with_args(args.iter().copied()))
    }

    /// Send literal bytes to the subprocess, e.g. `"1\n"` to pick an option.
    pub fn write(&self, text: &str) -> Result<(), PtyError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(PtyError::Closed);
        }
        let mut guard = self.writer.lock();
        let writer = guard.as_mut().ok_or(PtyError::Closed)?;
        writer.write_all(text.as_bytes())?;
        writer.flush()?;
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        !self.closed.load(Ordering::SeqCst) && self.exited.borrow().is_none()
    }

    /// Receiver that holds the exit once the subprocess is gone.
    pub fn exited(&self) -> watch::Receiver<Option<PtyExit>> {
        self.exited.clone()
    }

    /// Terminate the subprocess. Does not wait for it to exit; later calls are no-ops.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        self.writer.lock().take();
        if let Some(mut killer) = self.killer.lock().take() {
            if self.exited.borrow().is_none() {
                if let Err(e) = killer.kill() {
                    tracing::debug!(error = %e, "Failed to kill PTY subprocess");
                }
            }
        }
        self.master.lock().take();
    }
}

impl Drop for PtySession {
    fn drop(&mut self) {
        self.close();
    }
}

fn read_loop(mut reader: Box<dyn Read + Send>, tx: mpsc::Sender<OutputChunk>) {
    let mut parser = PromptParser::new();
    let mut buf = [0u8; READ_BUFFER_SIZE];

    loop {
        match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => {
                let chunk = parser.feed(&buf[..n]);
                if !chunk.has_content() {
                    continue;
                }
                if tx.blocking_send(chunk).is_err() {
                    break;
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => {
                // EIO is how Linux reports the slave side closing
                if e.raw_os_error() != Some(5) {
                    let notice = OutputChunk {
                        cleaned: format!("[PTY error: {e}]"),
                        ..OutputChunk::default()
                    };
                    let _ = tx.blocking_send(notice);
                }
                break;
            }
        }
    }
    tracing::trace!("PTY read loop finished");
}
