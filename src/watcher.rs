//! Debounced observation of the session-state directory
//!
//! The root is watched non-recursively for new session directories; each
//! session directory is added with [`SessionWatcher::watch_session`].
//! Writes to a session's `events.jsonl` are coalesced: the debouncer
//! collects affected session ids and only emits once no write has been
//! seen for [`DEBOUNCE`].

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::event::{CreateKind, ModifyKind, RemoveKind};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::history::EVENTS_FILE;

/// Quiet period before accumulated changes are emitted
pub const DEBOUNCE: Duration = Duration::from_millis(100);
/// Capacity of the outgoing notification channel
pub const CHANNEL_CAPACITY: usize = 64;

#[derive(Error, Debug)]
pub enum WatchError {
    #[error("session-state root {} does not exist", .0.display())]
    MissingRoot(PathBuf),

    #[error("filesystem watcher error: {0}")]
    Notify(#[from] notify::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    /// A session's log was written to (debounced)
    FileChanged { session_id: String, path: PathBuf },
    /// A directory appeared or disappeared directly under the root
    SessionSetChanged,
}

/// A filesystem change after classification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawChange {
    LogWritten(String),
    DirectoryChanged,
}

/// Classify a notify event relative to the session-state `root`.
pub fn classify(root: &Path, event: &Event) -> Vec<RawChange> {
    let relevant = matches!(
        event.kind,
        EventKind::Create(_)
            | EventKind::Remove(_)
            | EventKind::Modify(ModifyKind::Data(_))
            | EventKind::Modify(ModifyKind::Any)
    );
    if !relevant {
        return Vec::new();
    }

    let mut changes = Vec::new();
    for path in &event.paths {
        let Ok(relative) = path.strip_prefix(root) else {
            continue;
        };
        let parts: Vec<_> = relative.components().collect();
        match parts.as_slice() {
            [_] if is_directory_change(&event.kind, path) => {
                changes.push(RawChange::DirectoryChanged);
            }
            [session, file]
                if file.as_os_str() == EVENTS_FILE
                    && !matches!(event.kind, EventKind::Remove(_)) =>
            {
                changes.push(RawChange::LogWritten(
                    session.as_os_str().to_string_lossy().into_owned(),
                ));
            }
            _ => {}
        }
    }
    changes
}

fn is_directory_change(kind: &EventKind, path: &Path) -> bool {
    match kind {
        EventKind::Create(CreateKind::Folder) | EventKind::Remove(RemoveKind::Folder) => true,
        EventKind::Create(_) => path.is_dir(),
        _ => false,
    }
}

/// Watches a session-state root and emits debounced [`WatchEvent`]s
pub struct SessionWatcher {
    root: PathBuf,
    watcher: Mutex<RecommendedWatcher>,
    cancel: CancellationToken,
}

impl SessionWatcher {
    /// Start watching `root`. Must be called from within a tokio runtime.
    pub fn start(root: impl Into<PathBuf>) -> Result<(Self, mpsc::Receiver<WatchEvent>), WatchError> {
        let root = root.into();
        if !root.is_dir() {
            return Err(WatchError::MissingRoot(root));
        }
        // Backends such as FSEvents report resolved paths (/private/var/...)
        let root = root.canonicalize().unwrap_or(root);

        let (raw_tx, raw_rx) = mpsc::unbounded_channel::<RawChange>();
        let (event_tx, event_rx) = mpsc::channel(CHANNEL_CAPACITY);

        let callback_root = root.clone();
        let mut watcher = RecommendedWatcher::new(
            move |res: Result<Event, notify::Error>| match res {
                Ok(event) => {
                    for change in classify(&callback_root, &event) {
                        let _ = raw_tx.send(change);
                    }
                }
                Err(err) => tracing::warn!(error = %err, "Session watcher event error"),
            },
            notify::Config::default(),
        )?;
        watcher.watch(&root, RecursiveMode::NonRecursive)?;

        let cancel = CancellationToken::new();
        tokio::spawn(run_debouncer(
            root.clone(),
            raw_rx,
            event_tx,
            DEBOUNCE,
            cancel.clone(),
        ));

        tracing::info!(path = %root.display(), "Session watcher started");

        Ok((
            Self {
                root,
                watcher: Mutex::new(watcher),
                cancel,
            },
            event_rx,
        ))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn watch_session(&self, session_id: &str) -> Result<(), WatchError> {
        let dir = self.root.join(session_id);
        self.watcher.lock().watch(&dir, RecursiveMode::NonRecursive)?;
        tracing::debug!(session_id = %session_id, "Watching session directory");
        Ok(())
    }

    pub fn unwatch_session(&self, session_id: &str) -> Result<(), WatchError> {
        let dir = self.root.join(session_id);
        self.watcher.lock().unwatch(&dir)?;
        Ok(())
    }

    /// Stop emitting events. Safe to call more than once.
    pub fn close(&self) {
        self.cancel.cancel();
    }
}

impl Drop for SessionWatcher {
    fn drop(&mut self) {
        self.close();
    }
}

/// Coalesce raw changes into debounced notifications.
///
/// Every log write pushes the deadline out by `window`; when it passes,
/// one `FileChanged` per accumulated session is emitted. Directory
/// creation is forwarded immediately. Sends never block: a full channel
/// drops the notification.
pub async fn run_debouncer(
    root: PathBuf,
    mut raw_rx: mpsc::UnboundedReceiver<RawChange>,
    tx: mpsc::Sender<WatchEvent>,
    window: Duration,
    cancel: CancellationToken,
) {
    let mut pending: BTreeSet<String> = BTreeSet::new();
    let mut deadline: Option<Instant> = None;

    loop {
        let flush_at = deadline;
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            change = raw_rx.recv() => match change {
                Some(RawChange::LogWritten(session_id)) => {
                    pending.insert(session_id);
                    deadline = Some(Instant::now() + window);
                }
                Some(RawChange::DirectoryChanged) => {
                    emit(&tx, WatchEvent::SessionSetChanged);
                }
                None => break,
            },
            _ = sleep_until(flush_at), if flush_at.is_some() => {
                for session_id in std::mem::take(&mut pending) {
                    let path = root.join(&session_id).join(EVENTS_FILE);
                    emit(&tx, WatchEvent::FileChanged { session_id, path });
                }
                deadline = None;
            }
        }
    }
    tracing::debug!("Session watcher debouncer stopped");
}

async fn sleep_until(deadline: Option<Instant>) {
    if let Some(deadline) = deadline {
        tokio::time::sleep_until(deadline).await;
    }
}

fn emit(tx: &mpsc::Sender<WatchEvent>, event: WatchEvent) {
    if let Err(e) = tx.try_send(event) {
        tracing::debug!(error = %e, "Dropping watcher notification");
    }
}
