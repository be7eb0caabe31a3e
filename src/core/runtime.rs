use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::agent::{
    AgentError, CopilotAdapter, ProtocolConfig, ProtocolEvent, ProtocolEventKind, SessionProtocol,
};
use crate::alerts::{LogNotifier, NotificationRouter};
use crate::config::Config;
use crate::history::{LogReader, Record};
use crate::hooks::HookServer;
use crate::pty::{PtyExit, PtyOutput, PtySession, PtySpawnConfig};
use crate::session::SessionSource;
use crate::watcher::{SessionWatcher, WatchEvent};

use super::effect::Effect;
use super::event::AppEvent;
use super::scheduler::App;

/// Creates a protocol connection together with its event stream
pub type ProtocolFactory = Box<
    dyn FnMut() -> Result<(Arc<dyn SessionProtocol>, mpsc::Receiver<ProtocolEvent>), AgentError>
        + Send,
>;

/// Factory that launches the Copilot CLI in server mode.
pub fn copilot_protocol(config: ProtocolConfig) -> ProtocolFactory {
    Box::new(move || {
        let (adapter, events) = CopilotAdapter::spawn(&config)?;
        Ok((Arc::new(adapter) as Arc<dyn SessionProtocol>, events))
    })
}

/// Owns the scheduler and every event source feeding it
pub struct Runtime {
    app: App,
    source: Arc<dyn SessionSource>,
    events_tx: mpsc::UnboundedSender<AppEvent>,
    events_rx: mpsc::UnboundedReceiver<AppEvent>,
    protocol_factory: ProtocolFactory,
    protocol: Option<Arc<dyn SessionProtocol>>,
    watcher: Option<SessionWatcher>,
    hooks: Option<Arc<HookServer>>,
    ptys: HashMap<String, Arc<PtySession>>,
    notifications: Arc<NotificationRouter>,
    tasks: Vec<JoinHandle<()>>,
}

impl Runtime {
    pub fn new(
        config: Config,
        source: Arc<dyn SessionSource>,
        protocol_factory: ProtocolFactory,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let notifications = Arc::new(NotificationRouter::new());
        notifications.add(Arc::new(LogNotifier));

        Self {
            app: App::new(config),
            source,
            events_tx,
            events_rx,
            protocol_factory,
            protocol: None,
            watcher: None,
            hooks: None,
            ptys: HashMap::new(),
            notifications,
            tasks: Vec::new(),
        }
    }

    /// Handle for pushing user commands into the scheduler
    pub fn sender(&self) -> mpsc::UnboundedSender<AppEvent> {
        self.events_tx.clone()
    }

    pub fn notifications(&self) -> Arc<NotificationRouter> {
        self.notifications.clone()
    }

    pub fn app(&self) -> &App {
        &self.app
    }

    /// Run until a `Quit` event, calling `render` after every applied event.
    ///
    /// Returns the scheduler in its final state.
    pub async fn run(mut self, mut render: impl FnMut(&App)) -> App {
        self.start_sources();
        self.apply(AppEvent::Refresh);
        render(&self.app);

        while let Some(event) = self.events_rx.recv().await {
            let stop = self.apply(event);
            render(&self.app);
            if stop {
                break;
            }
        }

        self.shutdown().await;
        self.app
    }

    /// Apply one event and execute its effects. Returns whether to stop.
    fn apply(&mut self, event: AppEvent) -> bool {
        self.observe(&event);
        let mut stop = false;
        for effect in self.app.update(event, Instant::now()) {
            match effect {
                Effect::Shutdown => stop = true,
                effect => self.execute(effect),
            }
        }
        stop
    }

    /// Release runtime-owned handles the event says are dead.
    fn observe(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Protocol(ProtocolEvent {
                kind: ProtocolEventKind::Disconnected { reason },
                ..
            }) => {
                tracing::warn!(reason = %reason, "Session protocol disconnected");
                self.protocol = None;
            }
            AppEvent::PtyExited { session_id, .. } => {
                self.ptys.remove(session_id);
            }
            _ => {}
        }
    }

    fn start_sources(&mut self) {
        let config = self.app.config().clone();

        match SessionWatcher::start(&config.session_state_dir) {
            Ok((watcher, mut rx)) => {
                let tx = self.events_tx.clone();
                self.tasks.push(tokio::spawn(async move {
                    while let Some(event) = rx.recv().await {
                        let event = match event {
                            WatchEvent::FileChanged { session_id, .. } => {
                                AppEvent::FileChanged { session_id }
                            }
                            WatchEvent::SessionSetChanged => AppEvent::SessionSetChanged,
                        };
                        if tx.send(event).is_err() {
                            break;
                        }
                    }
                }));
                self.watcher = Some(watcher);
            }
            Err(e) => {
                tracing::warn!(error = %e, "Session watcher unavailable; relying on periodic rescans");
            }
        }

        if config.hooks.enabled {
            match HookServer::bind(&config.hooks.socket_path) {
                Ok((server, mut rx)) => {
                    let server = Arc::new(server);
                    let serving = server.clone();
                    self.tasks
                        .push(tokio::spawn(async move { serving.serve().await }));

                    let tx = self.events_tx.clone();
                    self.tasks.push(tokio::spawn(async move {
                        while let Some(envelope) = rx.recv().await {
                            if tx.send(AppEvent::Hook(envelope)).is_err() {
                                break;
                            }
                        }
                    }));
                    self.hooks = Some(server);
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Hook server unavailable; continuing without hook events");
                }
            }
        }

        let tx = self.events_tx.clone();
        let period = config.tick_interval;
        self.tasks.push(tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                if tx.send(AppEvent::Tick).is_err() {
                    break;
                }
            }
        }));
    }

    fn protocol(&mut self) -> Result<Arc<dyn SessionProtocol>, AgentError> {
        if let Some(protocol) = &self.protocol {
            return Ok(protocol.clone());
        }

        let (protocol, mut events) = (self.protocol_factory)()?;
        let tx = self.events_tx.clone();
        self.tasks.push(tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                if tx.send(AppEvent::Protocol(event)).is_err() {
                    break;
                }
            }
        }));
        self.protocol = Some(protocol.clone());
        Ok(protocol)
    }

    fn execute(&mut self, effect: Effect) {
        let tx = self.events_tx.clone();

        match effect {
            Effect::LoadSessions => {
                let source = self.source.clone();
                tokio::spawn(async move {
                    let result = match tokio::task::spawn_blocking(move || source.list()).await {
                        Ok(listed) => listed.map_err(|e| e.to_string()),
                        Err(e) => Err(e.to_string()),
                    };
                    let _ = tx.send(AppEvent::SessionsLoaded { result });
                });
            }
            Effect::WatchSession(session_id) => {
                if let Some(watcher) = &self.watcher {
                    if let Err(e) = watcher.watch_session(&session_id) {
                        tracing::debug!(session_id = %session_id, error = %e, "Cannot watch session");
                    }
                }
            }
            Effect::UnwatchSession(session_id) => {
                if let Some(watcher) = &self.watcher {
                    if let Err(e) = watcher.unwatch_session(&session_id) {
                        tracing::trace!(session_id = %session_id, error = %e, "Cannot unwatch session");
                    }
                }
            }
            Effect::ReadRecords {
                session_id,
                generation,
                reader,
                full,
            } => {
                let path = reader.path().to_path_buf();
                tokio::spawn(async move {
                    let (reader, result) =
                        match tokio::task::spawn_blocking(move || read_records(reader, full)).await
                        {
                            Ok(done) => done,
                            Err(e) => (LogReader::new(path), Err(e.to_string())),
                        };
                    let _ = tx.send(AppEvent::RecordsLoaded {
                        session_id,
                        generation,
                        reader,
                        full,
                        result,
                    });
                });
            }
            Effect::ProtocolSend {
                session_id,
                text,
                resume,
            } => {
                let protocol = match self.protocol() {
                    Ok(protocol) => protocol,
                    Err(e) => {
                        let _ = tx.send(AppEvent::SendFinished {
                            session_id,
                            result: Err(e.to_string()),
                        });
                        return;
                    }
                };
                tokio::spawn(async move {
                    if resume || !protocol.is_resumed(&session_id) {
                        if let Err(e) = protocol.resume_session(&session_id).await {
                            let _ = tx.send(AppEvent::SendFinished {
                                session_id,
                                result: Err(format!("resume failed: {e}")),
                            });
                            return;
                        }
                        let _ = tx.send(AppEvent::SessionResumed {
                            session_id: session_id.clone(),
                        });
                    }
                    let result = protocol
                        .send(&session_id, &text)
                        .await
                        .map_err(|e| e.to_string());
                    let _ = tx.send(AppEvent::SendFinished { session_id, result });
                });
            }
            Effect::ProtocolAbort { session_id } => {
                let Some(protocol) = self.protocol.clone() else {
                    return;
                };
                tokio::spawn(async move {
                    if let Err(e) = protocol.abort(&session_id).await {
                        let _ = tx.send(AppEvent::EffectFailed {
                            session_id: Some(session_id),
                            error: format!("abort failed: {e}"),
                        });
                    }
                });
            }
            Effect::SpawnPty { session_id, config } => self.spawn_pty(session_id, config),
            Effect::WritePty { session_id, text } => {
                let result = match self.ptys.get(&session_id) {
                    Some(pty) => pty.write(&text).map_err(|e| e.to_string()),
                    None => Err("no running subprocess".to_string()),
                };
                if let Err(error) = result {
                    let _ = tx.send(AppEvent::EffectFailed {
                        session_id: Some(session_id),
                        error,
                    });
                }
            }
            Effect::ClosePty { session_id } => {
                if let Some(pty) = self.ptys.get(&session_id) {
                    pty.close();
                }
            }
            Effect::Notify(notification) => self.notifications.notify(&notification),
            Effect::RenameSession {
                session_id,
                summary,
            } => {
                let source = self.source.clone();
                tokio::spawn(async move {
                    let id = session_id.clone();
                    let result =
                        match tokio::task::spawn_blocking(move || source.rename(&id, &summary))
                            .await
                        {
                            Ok(renamed) => renamed.map_err(|e| e.to_string()),
                            Err(e) => Err(e.to_string()),
                        };
                    let _ = tx.send(AppEvent::RenameFinished { session_id, result });
                });
            }
            Effect::Export { path, markdown } => {
                tokio::spawn(async move {
                    let result =
                        match tokio::task::spawn_blocking(move || write_export(path, markdown))
                            .await
                        {
                            Ok(written) => written,
                            Err(e) => Err(e.to_string()),
                        };
                    let _ = tx.send(AppEvent::ExportFinished { result });
                });
            }
            Effect::Shutdown => {}
        }
    }

    fn spawn_pty(&mut self, session_id: String, config: PtySpawnConfig) {
        let tx = self.events_tx.clone();
        let (pty, output) = match PtySession::spawn(config) {
            Ok(spawned) => spawned,
            Err(e) => {
                let _ = tx.send(AppEvent::SendFinished {
                    session_id,
                    result: Err(e.to_string()),
                });
                return;
            }
        };

        self.ptys.insert(session_id.clone(), pty);
        let _ = tx.send(AppEvent::PtyStarted {
            session_id: session_id.clone(),
        });
        self.tasks
            .push(tokio::spawn(forward_pty(session_id, output, tx)));
    }

    async fn shutdown(&mut self) {
        tracing::info!("Shutting down");
        if let Some(watcher) = self.watcher.take() {
            watcher.close();
        }
        if let Some(hooks) = self.hooks.take() {
            hooks.close();
        }
        for (_, pty) in self.ptys.drain() {
            pty.close();
        }
        if let Some(protocol) = self.protocol.take() {
            protocol.close().await;
        }
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}

fn read_records(mut reader: LogReader, full: bool) -> (LogReader, Result<Vec<Record>, String>) {
    let result = if full {
        reader.read_all()
    } else {
        reader.read_new()
    };
    (reader, result.map_err(|e| e.to_string()))
}

fn write_export(path: PathBuf, markdown: String) -> Result<PathBuf, String> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| e.to_string())?;
    }
    std::fs::write(&path, markdown).map_err(|e| e.to_string())?;
    Ok(path)
}

/// Relay subprocess output until it exits.
async fn forward_pty(session_id: String, output: PtyOutput, tx: mpsc::UnboundedSender<AppEvent>) {
    let PtyOutput {
        mut chunks,
        mut exited,
    } = output;

    loop {
        tokio::select! {
            chunk = chunks.recv() => match chunk {
                Some(chunk) => {
                    let event = AppEvent::PtyOutput { session_id: session_id.clone(), chunk };
                    if tx.send(event).is_err() {
                        return;
                    }
                }
                None => break,
            },
            _ = exited.wait_for(Option::is_some) => {
                while let Ok(chunk) = chunks.try_recv() {
                    let _ = tx.send(AppEvent::PtyOutput { session_id: session_id.clone(), chunk });
                }
                break;
            }
        }
    }

    // The reader can finish before the wait thread notices the exit
    let error = match exited.wait_for(Option::is_some).await {
        Ok(exit) => exit.as_ref().and_then(PtyExit::failure),
        Err(_) => Some("exit status lost".to_string()),
    };
    tracing::debug!(session_id = %session_id, error = ?error, "Interactive session exited");
    let _ = tx.send(AppEvent::PtyExited { session_id, error });
}
