use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use futures::StreamExt;
use parking_lot::Mutex;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::mpsc;
use tokio_util::codec::{FramedRead, LinesCodec, LinesCodecError};
use tokio_util::sync::CancellationToken;

use super::envelope::HookEnvelope;
use super::HookError;

/// Longest accepted envelope line
pub const MAX_LINE_BYTES: usize = 1024 * 1024;
/// Capacity of the envelope queue; envelopes beyond it are dropped
pub const QUEUE_CAPACITY: usize = 64;

/// Unix-socket listener for hook envelopes
pub struct HookServer {
    socket_path: PathBuf,
    listener: Mutex<Option<UnixListener>>,
    tx: mpsc::Sender<HookEnvelope>,
    cancel: CancellationToken,
    closed: AtomicBool,
}

impl HookServer {
    /// Bind at `socket_path`, replacing a stale socket file.
    ///
    /// Must be called from within a tokio runtime.
    pub fn bind(
        socket_path: impl Into<PathBuf>,
    ) -> Result<(Self, mpsc::Receiver<HookEnvelope>), HookError> {
        let socket_path = socket_path.into();

        if let Some(parent) = socket_path.parent() {
            create_private_dir(parent)?;
        }
        if socket_path.exists() {
            std::fs::remove_file(&socket_path).map_err(|source| HookError::Bind {
                path: socket_path.clone(),
                source,
            })?;
            tracing::debug!(path = %socket_path.display(), "Removed stale hook socket");
        }

        let listener = UnixListener::bind(&socket_path).map_err(|source| HookError::Bind {
            path: socket_path.clone(),
            source,
        })?;
        let (tx, rx) = mpsc::channel(QUEUE_CAPACITY);

        tracing::info!(path = %socket_path.display(), "Hook server listening");

        Ok((
            Self {
                socket_path,
                listener: Mutex::new(Some(listener)),
                tx,
                cancel: CancellationToken::new(),
                closed: AtomicBool::new(false),
            },
            rx,
        ))
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Accept connections until [`HookServer::close`] is called.
    ///
    /// Returns immediately when the server was already closed or is already serving.
    pub async fn serve(&self) {
        let Some(listener) = self.listener.lock().take() else {
            return;
        };

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                accepted = listener.accept() => match accepted {
                    Ok((stream, _)) => {
                        let tx = self.tx.clone();
                        let cancel = self.cancel.clone();
                        tokio::spawn(async move {
                            tokio::select! {
                                _ = cancel.cancelled() => {}
                                _ = read_connection(stream, tx) => {}
                            }
                        });
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Hook socket accept failed");
                    }
                },
            }
        }
        tracing::debug!("Hook server accept loop stopped");
    }

    /// Stop accepting and remove the socket file. Later calls are no-ops.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.cancel.cancel();
        self.listener.lock().take();

        if let Err(e) = std::fs::remove_file(&self.socket_path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(path = %self.socket_path.display(), error = %e, "Failed to remove hook socket");
            }
        }
    }
}

impl Drop for HookServer {
    fn drop(&mut self) {
        self.close();
    }
}

async fn read_connection(stream: UnixStream, tx: mpsc::Sender<HookEnvelope>) {
    let mut lines = FramedRead::new(stream, LinesCodec::new_with_max_length(MAX_LINE_BYTES));

    while let Some(line) = lines.next().await {
        let line = match line {
            Ok(line) => line,
            Err(LinesCodecError::MaxLineLengthExceeded) => {
                // The codec does not resume after an error
                tracing::debug!("Oversized hook envelope; closing connection");
                break;
            }
            Err(LinesCodecError::Io(e)) => {
                tracing::debug!(error = %e, "Hook connection read failed");
                break;
            }
        };

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let envelope = match HookEnvelope::parse(trimmed) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::trace!(error = %e, "Skipping malformed hook envelope");
                continue;
            }
        };

        if let Err(e) = tx.try_send(envelope) {
            tracing::debug!(error = %e, "Hook queue full; dropping envelope");
        }
    }
}

fn create_private_dir(dir: &Path) -> Result<(), HookError> {
    if dir.as_os_str().is_empty() || dir.exists() {
        return Ok(());
    }

    let mut builder = std::fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o700);
    }
    builder.create(dir).map_err(|source| HookError::Bind {
        path: dir.to_path_buf(),
        source,
    })
}
