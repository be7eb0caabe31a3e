//! The single writer of session and conversation state
//!
//! Every producer talks to the scheduler through [`AppEvent`]s. `update`
//! applies one event and hands back the [`Effect`]s the runtime must
//! perform; results come back as further events.

use std::collections::HashMap;
use std::mem;
use std::path::PathBuf;
use std::time::Instant;

use chrono::Utc;

use crate::agent::{
    PermissionDecision, PermissionRequest, ProtocolEvent, ProtocolEventKind, UserInputAnswer,
    UserInputRequest,
};
use crate::alerts::Notification;
use crate::config::{Config, PermissionPolicy, SendMode, UserInputPolicy};
use crate::history::{reconcile, Conversation, LogReader, Record, RecordKind, EVENTS_FILE};
use crate::hooks::{HookEnvelope, HookEventKind};
use crate::pty::{OutputChunk, PtySpawnConfig};
use crate::session::Session;

use super::effect::Effect;
use super::event::AppEvent;
use super::export::{export_path, render_markdown};
use super::state::{
    ParkedPermission, ParkedUserInput, PendingTool, SessionState, StatusFlash, StatusLevel,
};

pub struct App {
    config: Config,
    sessions: HashMap<String, SessionState>,
    /// Display order (most recently updated first, as discovered)
    order: Vec<String>,
    selected: Option<String>,
    conversation: Conversation,
    /// `None` while a read is in flight
    reader: Option<LogReader>,
    /// Bumped on every selection so stale reads can be recognised
    generation: u64,
    /// A read requested while the reader was out; `Some(true)` means full
    pending_read: Option<bool>,
    status: Option<StatusFlash>,
    should_quit: bool,
}

impl App {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            sessions: HashMap::new(),
            order: Vec::new(),
            selected: None,
            conversation: Conversation::default(),
            reader: None,
            generation: 0,
            pending_read: None,
            status: None,
            should_quit: false,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Sessions in display order
    pub fn sessions(&self) -> impl Iterator<Item = &SessionState> {
        self.order.iter().filter_map(|id| self.sessions.get(id))
    }

    pub fn session(&self, session_id: &str) -> Option<&SessionState> {
        self.sessions.get(session_id)
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn selected_state(&self) -> Option<&SessionState> {
        self.selected.as_ref().and_then(|id| self.sessions.get(id))
    }

    /// Conversation of the selected session
    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn status(&self) -> Option<&StatusFlash> {
        self.status.as_ref()
    }

    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    fn log_path(&self, session_id: &str) -> PathBuf {
        self.config
            .session_state_dir
            .join(session_id)
            .join(EVENTS_FILE)
    }

    /// Apply one event.
    pub fn update(&mut self, event: AppEvent, now: Instant) -> Vec<Effect> {
        let mut effects = Vec::new();

        match event {
            AppEvent::SessionsLoaded { result } => match result {
                Ok(sessions) => self.merge_sessions(sessions, &mut effects),
                Err(e) => self.flash(format!("Session scan failed: {e}"), StatusLevel::Error, now),
            },
            AppEvent::RecordsLoaded {
                session_id,
                generation,
                reader,
                full,
                result,
            } => self.on_records_loaded(session_id, generation, reader, full, result, now, &mut effects),
            AppEvent::FileChanged { session_id } => {
                if self.selected.as_deref() == Some(session_id.as_str()) {
                    effects.extend(self.request_read(false));
                } else if let Some(state) = self.sessions.get_mut(&session_id) {
                    state.unread += 1;
                    state.session.touch(Utc::now());
                }
            }
            AppEvent::SessionSetChanged => effects.push(Effect::LoadSessions),
            AppEvent::Hook(envelope) => self.on_hook(envelope, now, &mut effects),
            AppEvent::Protocol(event) => self.on_protocol(event, now),
            AppEvent::SelectSession(session_id) => self.select(session_id, now, &mut effects),
            AppEvent::SendRequested { session_id, text } => {
                self.on_send_requested(session_id, text, now, &mut effects)
            }
            AppEvent::SessionResumed { session_id } => {
                if let Some(state) = self.sessions.get_mut(&session_id) {
                    state.resumed = true;
                    state.not_resumable = None;
                }
            }
            AppEvent::SendFinished { session_id, result } => match result {
                Ok(message_id) => {
                    tracing::debug!(session_id = %session_id, message_id = %message_id, "Message accepted");
                }
                Err(e) => {
                    if let Some(state) = self.sessions.get_mut(&session_id) {
                        state.sending = false;
                    }
                    self.flash(format!("Send failed: {e}"), StatusLevel::Error, now);
                }
            },
            AppEvent::AbortRequested { session_id } => {
                let (pty_active, sending) = self
                    .sessions
                    .get(&session_id)
                    .map_or((false, false), |s| (s.pty_active, s.sending));
                if pty_active {
                    effects.push(Effect::ClosePty { session_id });
                } else if sending {
                    effects.push(Effect::ProtocolAbort { session_id });
                } else {
                    self.flash("Nothing to abort".to_string(), StatusLevel::Info, now);
                }
            }
            AppEvent::PermissionDecided {
                session_id,
                decision,
            } => self.on_permission_decided(&session_id, decision, now),
            AppEvent::UserInputAnswered { session_id, answer } => {
                self.on_user_input_answered(&session_id, answer, now)
            }
            AppEvent::PtyStarted { session_id } => {
                if let Some(state) = self.sessions.get_mut(&session_id) {
                    state.pty_active = true;
                    state.not_resumable = None;
                }
            }
            AppEvent::PtyOutput { session_id, chunk } => self.on_pty_output(session_id, chunk, now),
            AppEvent::ApprovalSelected {
                session_id,
                shortcut,
            } => self.on_approval_selected(session_id, shortcut, now, &mut effects),
            AppEvent::PtyExited { session_id, error } => {
                self.on_pty_exited(session_id, error, now, &mut effects)
            }
            AppEvent::EffectFailed { session_id, error } => {
                let text = match session_id {
                    Some(id) => format!("{}: {error}", crate::session::short_id(&id)),
                    None => error,
                };
                self.flash(text, StatusLevel::Error, now);
            }
            AppEvent::RenameRequested {
                session_id,
                summary,
            } => {
                let summary = summary.trim().to_string();
                if summary.is_empty() {
                    self.flash("Name cannot be empty".to_string(), StatusLevel::Info, now);
                } else if !self.sessions.contains_key(&session_id) {
                    self.flash(format!("Unknown session {session_id}"), StatusLevel::Error, now);
                } else {
                    effects.push(Effect::RenameSession {
                        session_id,
                        summary,
                    });
                }
            }
            AppEvent::RenameFinished { session_id, result } => match result {
                Ok(()) => {
                    let text = format!("Renamed {}", crate::session::short_id(&session_id));
                    self.flash(text, StatusLevel::Info, now);
                    effects.push(Effect::LoadSessions);
                }
                Err(e) => self.flash(format!("Rename failed: {e}"), StatusLevel::Error, now),
            },
            AppEvent::ExportRequested => self.on_export_requested(now, &mut effects),
            AppEvent::ExportFinished { result } => match result {
                Ok(path) => self.flash(
                    format!("Exported to {}", path.display()),
                    StatusLevel::Info,
                    now,
                ),
                Err(e) => self.flash(format!("Export failed: {e}"), StatusLevel::Error, now),
            },
            AppEvent::Tick => self.on_tick(now, &mut effects),
            AppEvent::Refresh => {
                effects.push(Effect::LoadSessions);
                effects.extend(self.request_read(true));
            }
            AppEvent::Quit => {
                self.answer_all_parked();
                self.should_quit = true;
                effects.push(Effect::Shutdown);
            }
        }

        effects
    }

    fn flash(&mut self, text: String, level: StatusLevel, now: Instant) {
        match level {
            StatusLevel::Info => tracing::info!(status = %text, "Status"),
            StatusLevel::Error => tracing::warn!(status = %text, "Status"),
        }
        self.status = Some(StatusFlash {
            text,
            level,
            expires_at: now + self.config.status_flash,
        });
    }

    fn merge_sessions(&mut self, discovered: Vec<Session>, effects: &mut Vec<Effect>) {
        let mut previous = mem::take(&mut self.sessions);
        let mut order = Vec::with_capacity(discovered.len());

        for session in discovered {
            let id = session.id.clone();
            let state = match previous.remove(&id) {
                Some(mut state) => {
                    let updated_at = state.session.updated_at.max(session.updated_at);
                    state.session = session;
                    state.session.updated_at = updated_at;
                    state
                }
                None => {
                    effects.push(Effect::WatchSession(id.clone()));
                    SessionState::new(session)
                }
            };
            if self.sessions.insert(id.clone(), state).is_none() {
                order.push(id);
            }
        }

        // Sessions gone from disk are kept only while something is still attached to them
        for id in mem::take(&mut self.order) {
            let Some(state) = previous.remove(&id) else {
                continue;
            };
            if state.sending
                || state.pty_active
                || !state.permissions.is_empty()
                || !state.user_inputs.is_empty()
            {
                order.push(id.clone());
                self.sessions.insert(id, state);
            } else {
                tracing::debug!(session_id = %id, "Session no longer listed");
                effects.push(Effect::UnwatchSession(id));
            }
        }

        self.order = order;
    }

    fn select(&mut self, session_id: String, now: Instant, effects: &mut Vec<Effect>) {
        let Some(state) = self.sessions.get_mut(&session_id) else {
            self.flash(format!("Unknown session {session_id}"), StatusLevel::Error, now);
            return;
        };
        state.unread = 0;

        self.generation += 1;
        self.conversation = Conversation::default();
        self.reader = Some(LogReader::new(self.log_path(&session_id)));
        self.pending_read = None;
        self.selected = Some(session_id);
        effects.extend(self.request_read(true));
    }

    /// Hand the reader to a read effect, or remember the request until it returns.
    fn request_read(&mut self, full: bool) -> Option<Effect> {
        let session_id = self.selected.clone()?;
        match self.reader.take() {
            Some(reader) => Some(Effect::ReadRecords {
                session_id,
                generation: self.generation,
                reader,
                full,
            }),
            None => {
                self.pending_read = Some(self.pending_read.unwrap_or(false) || full);
                None
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn on_records_loaded(
        &mut self,
        session_id: String,
        generation: u64,
        reader: LogReader,
        full: bool,
        result: Result<Vec<Record>, String>,
        now: Instant,
        effects: &mut Vec<Effect>,
    ) {
        if generation != self.generation || self.selected.as_deref() != Some(session_id.as_str()) {
            tracing::trace!(session_id = %session_id, "Dropping stale read");
            return;
        }
        self.reader = Some(reader);

        match result {
            Ok(records) => {
                if full {
                    self.conversation = reconcile(&records);
                } else {
                    self.conversation.extend(&records);
                }
                if let Some(state) = self.sessions.get_mut(&session_id) {
                    if records
                        .iter()
                        .any(|r| r.kind == RecordKind::ToolExecutionComplete)
                    {
                        state.clear_allowed_tools();
                    }
                    if let Some(at) = records.iter().filter_map(|r| r.timestamp).max() {
                        state.session.touch(at);
                    }
                }
            }
            Err(e) => self.flash(format!("Failed to read log: {e}"), StatusLevel::Error, now),
        }

        if let Some(full) = self.pending_read.take() {
            effects.extend(self.request_read(full));
        }
    }

    fn on_hook(&mut self, envelope: HookEnvelope, now: Instant, effects: &mut Vec<Effect>) {
        effects.push(Effect::Notify(Notification::from_envelope(&envelope)));

        if !self.sessions.contains_key(&envelope.session_id) {
            // Not discovered yet; track it now and let the next scan fill in metadata
            let session = Session::new(envelope.session_id.clone(), envelope.cwd.clone());
            self.order.insert(0, session.id.clone());
            self.sessions
                .insert(session.id.clone(), SessionState::new(session));
            effects.push(Effect::WatchSession(envelope.session_id.clone()));
            effects.push(Effect::LoadSessions);
        }

        let deny_reason = envelope.tool_use().and_then(|tool| {
            self.config
                .permissions
                .deny_reason(&tool.tool_name, &envelope.tool_args_text())
        });
        let selected = self.selected.as_deref() == Some(envelope.session_id.as_str());
        let Some(state) = self.sessions.get_mut(&envelope.session_id) else {
            return;
        };
        state
            .session
            .touch(envelope.timestamp.unwrap_or_else(Utc::now));
        if !selected {
            state.unread += 1;
        }

        match envelope.event {
            HookEventKind::PreToolUse => {
                if let Some(tool) = envelope.tool_use() {
                    tracing::debug!(
                        session_id = %envelope.session_id,
                        tool = %tool.tool_name,
                        denied = deny_reason.is_some(),
                        "Tool awaiting permission"
                    );
                    state.pending_tools.push(PendingTool {
                        tool_name: tool.tool_name,
                        tool_args: envelope.tool_args_text(),
                        denied: deny_reason.is_some(),
                        deny_reason,
                    });
                }
            }
            HookEventKind::PostToolUse => {
                if let Some(tool) = envelope.tool_use() {
                    state.resolve_pending_tool(&tool.tool_name);
                }
            }
            HookEventKind::ErrorOccurred => {
                let message = envelope
                    .error_message()
                    .unwrap_or_else(|| "unknown error".to_string());
                let text = format!("{} error: {message}", state.session.short_id());
                self.flash(text, StatusLevel::Error, now);
            }
            HookEventKind::SessionStart
            | HookEventKind::SessionEnd
            | HookEventKind::UserPromptSubmitted
            | HookEventKind::Other => {}
        }

        // The log usually moved along with the hook
        if selected {
            effects.extend(self.request_read(false));
        }
    }

    fn on_send_requested(
        &mut self,
        session_id: String,
        text: String,
        now: Instant,
        effects: &mut Vec<Effect>,
    ) {
        if text.trim().is_empty() {
            return;
        }
        let Some(state) = self.sessions.get_mut(&session_id) else {
            self.flash(format!("Unknown session {session_id}"), StatusLevel::Error, now);
            return;
        };
        if state.sending {
            tracing::debug!(session_id = %session_id, "Send refused; one already in flight");
            return;
        }

        state.sending = true;
        state.streaming.clear();
        if let Some(reason) = state.not_resumable.take() {
            tracing::info!(session_id = %session_id, reason = %reason, "Retrying session after failure");
        }

        match self.config.send_mode {
            SendMode::Protocol => effects.push(Effect::ProtocolSend {
                resume: !state.resumed,
                session_id,
                text,
            }),
            SendMode::Pty => {
                let mut config =
                    PtySpawnConfig::resume(&self.config.copilot_binary, &session_id, &text)
                        .with_args(
                            self.config
                                .security_mode
                                .cli_args(&self.config.allowed_tools),
                        );
                if let Some(dir) = state.session.working_dir() {
                    config = config.with_cwd(dir);
                }
                effects.push(Effect::SpawnPty { session_id, config });
            }
        }
    }

    fn on_protocol(&mut self, event: ProtocolEvent, now: Instant) {
        let ProtocolEvent { session_id, kind } = event;
        let selected = self.selected.as_deref() == Some(session_id.as_str());

        match kind {
            ProtocolEventKind::SessionIdle => {
                if let Some(state) = self.sessions.get_mut(&session_id) {
                    state.sending = false;
                    state.streaming.clear();
                }
            }
            ProtocolEventKind::MessageDelta { delta } => {
                if let Some(state) = self.sessions.get_mut(&session_id) {
                    state.streaming.push_str(&delta);
                }
            }
            ProtocolEventKind::AssistantMessage { message_id, .. } => {
                tracing::trace!(session_id = %session_id, message_id = %message_id, "Assistant message");
                if let Some(state) = self.sessions.get_mut(&session_id) {
                    state.streaming.clear();
                }
            }
            ProtocolEventKind::ToolStarted { tool_call_id, .. } => {
                if selected {
                    self.conversation.mark_running(&tool_call_id);
                }
            }
            ProtocolEventKind::ToolCompleted {
                tool_call_id,
                success,
                summary,
            } => {
                if selected {
                    self.conversation
                        .mark_finished(&tool_call_id, success, summary);
                }
            }
            ProtocolEventKind::Error { message } => {
                self.flash(
                    format!("{}: {message}", crate::session::short_id(&session_id)),
                    StatusLevel::Error,
                    now,
                );
            }
            ProtocolEventKind::Permission(request) => self.on_permission(session_id, request, now),
            ProtocolEventKind::UserInput(request) => self.on_user_input(session_id, request, now),
            ProtocolEventKind::Disconnected { reason } => self.on_disconnected(reason, now),
            ProtocolEventKind::Other { event_type } => {
                tracing::trace!(session_id = %session_id, event_type = %event_type, "Ignoring protocol event");
            }
        }
    }

    fn on_permission(&mut self, session_id: String, request: PermissionRequest, now: Instant) {
        let permissions = &self.config.permissions;
        let deny_reason = permissions.deny_reason(&request.tool_name, &request.action);
        let Some(state) = self.sessions.get_mut(&session_id) else {
            tracing::warn!(session_id = %session_id, tool = %request.tool_name, "Permission request for unknown session; denying");
            request.responder.respond(PermissionDecision::Deny);
            return;
        };

        if let Some(reason) = deny_reason {
            tracing::info!(session_id = %session_id, tool = %request.tool_name, reason = %reason, "Permission denied");
            request.responder.respond(PermissionDecision::Deny);
            self.flash(format!("Denied {}: {reason}", request.tool_name), StatusLevel::Info, now);
            return;
        }

        match permissions.policy {
            PermissionPolicy::Allow => {
                request.responder.respond(PermissionDecision::Allow);
            }
            PermissionPolicy::Deny => {
                request.responder.respond(PermissionDecision::Deny);
            }
            PermissionPolicy::Ask => {
                state.pending_tools.push(PendingTool {
                    tool_name: request.tool_name.clone(),
                    tool_args: request.action.clone(),
                    denied: false,
                    deny_reason: None,
                });
                let text = format!(
                    "{} wants to run {}: {}",
                    state.session.short_id(),
                    request.tool_name,
                    request.action
                );
                state.permissions.push_back(ParkedPermission {
                    request,
                    deadline: now + permissions.timeout,
                });
                self.flash(text, StatusLevel::Info, now);
            }
        }
    }

    fn on_user_input(&mut self, session_id: String, request: UserInputRequest, now: Instant) {
        let timeout = self.config.user_input.timeout;
        let state = match self.config.user_input.policy {
            UserInputPolicy::Ask => self.sessions.get_mut(&session_id),
            UserInputPolicy::Auto => None,
        };
        let Some(state) = state else {
            tracing::debug!(session_id = %session_id, question = %request.question, "Answering question with empty reply");
            request.responder.respond(UserInputAnswer::default());
            return;
        };

        let text = format!("{} asks: {}", state.session.short_id(), request.question);
        state.user_inputs.push_back(ParkedUserInput {
            request,
            deadline: now + timeout,
        });
        self.flash(text, StatusLevel::Info, now);
    }

    fn on_permission_decided(&mut self, session_id: &str, decision: PermissionDecision, now: Instant) {
        let parked = self
            .sessions
            .get_mut(session_id)
            .and_then(|state| state.permissions.pop_front().map(|p| (state, p)));
        let Some((state, parked)) = parked else {
            self.flash("No pending permission request".to_string(), StatusLevel::Info, now);
            return;
        };

        state.resolve_pending_tool(&parked.request.tool_name);
        let tool = parked.request.tool_name.clone();
        if !parked.request.responder.respond(decision) {
            tracing::debug!(session_id = %session_id, tool = %tool, "Permission requester already gone");
        }
    }

    fn on_user_input_answered(&mut self, session_id: &str, answer: String, now: Instant) {
        let parked = self
            .sessions
            .get_mut(session_id)
            .and_then(|state| state.user_inputs.pop_front());
        let Some(parked) = parked else {
            self.flash("No pending question".to_string(), StatusLevel::Info, now);
            return;
        };

        let was_freeform = !parked.request.choices.iter().any(|c| c == &answer);
        if !parked
            .request
            .responder
            .respond(UserInputAnswer { answer, was_freeform })
        {
            tracing::debug!(session_id = %session_id, "Question requester already gone");
        }
    }

    fn on_disconnected(&mut self, reason: String, now: Instant) {
        for state in self.sessions.values_mut() {
            if !state.resumed && !(state.sending && !state.pty_active) {
                continue;
            }
            state.resumed = false;
            if !state.pty_active {
                state.sending = false;
            }
            state.not_resumable = Some(reason.clone());
            state.streaming.clear();
            // The connection is gone; parked requests get their fallback on drop
            state.permissions.clear();
            state.user_inputs.clear();
            state.clear_allowed_tools();
        }
        self.flash(format!("Protocol disconnected: {reason}"), StatusLevel::Error, now);
    }

    fn on_pty_output(&mut self, session_id: String, chunk: OutputChunk, now: Instant) {
        let selected = self.selected.as_deref() == Some(session_id.as_str());
        let Some(state) = self.sessions.get_mut(&session_id) else {
            return;
        };
        state.push_pty_text(&chunk.cleaned);
        if let Some(prompt) = chunk.prompt {
            tracing::debug!(session_id = %session_id, question = %prompt.question, options = prompt.options.len(), "Approval prompt detected");
            let text = format!("{} needs approval: {}", state.session.display_name(), prompt.question);
            state.prompt = Some(prompt);
            if !selected {
                self.flash(text, StatusLevel::Info, now);
            }
        }
    }

    fn on_approval_selected(
        &mut self,
        session_id: String,
        shortcut: String,
        now: Instant,
        effects: &mut Vec<Effect>,
    ) {
        let Some(state) = self.sessions.get_mut(&session_id) else {
            return;
        };
        let valid = state
            .prompt
            .as_ref()
            .is_some_and(|p| p.option_by_shortcut(&shortcut).is_some());
        if !state.pty_active || !valid {
            self.flash(format!("No approval option '{shortcut}'"), StatusLevel::Info, now);
            return;
        }
        state.prompt = None;
        effects.push(Effect::WritePty {
            session_id,
            text: format!("{shortcut}\n"),
        });
    }

    fn on_pty_exited(
        &mut self,
        session_id: String,
        error: Option<String>,
        now: Instant,
        effects: &mut Vec<Effect>,
    ) {
        let Some(state) = self.sessions.get_mut(&session_id) else {
            return;
        };
        state.pty_active = false;
        state.sending = false;
        state.prompt = None;
        let name = state.session.display_name();
        match error {
            Some(e) => {
                state.not_resumable = Some(e.clone());
                self.flash(format!("{name} failed: {e}"), StatusLevel::Error, now);
            }
            None => self.flash(format!("{name} finished"), StatusLevel::Info, now),
        }
        if self.selected.as_deref() == Some(session_id.as_str()) {
            effects.extend(self.request_read(false));
        }
    }

    fn on_export_requested(&mut self, now: Instant, effects: &mut Vec<Effect>) {
        let Some(state) = self.selected_state() else {
            self.flash("No session selected".to_string(), StatusLevel::Info, now);
            return;
        };
        effects.push(Effect::Export {
            path: export_path(&self.config.export_dir, &state.session),
            markdown: render_markdown(&state.session, self.conversation.turns()),
        });
    }

    fn on_tick(&mut self, now: Instant, effects: &mut Vec<Effect>) {
        if self.status.as_ref().is_some_and(|s| s.expires_at <= now) {
            self.status = None;
        }

        let mut expired = 0;
        for state in self.sessions.values_mut() {
            while state.permissions.front().is_some_and(|p| p.deadline <= now) {
                if let Some(parked) = state.permissions.pop_front() {
                    state.resolve_pending_tool(&parked.request.tool_name);
                    parked.request.responder.respond(PermissionDecision::Deny);
                    expired += 1;
                }
            }
            while state.user_inputs.front().is_some_and(|p| p.deadline <= now) {
                if let Some(parked) = state.user_inputs.pop_front() {
                    parked.request.responder.respond(UserInputAnswer::default());
                    expired += 1;
                }
            }
        }
        if expired > 0 {
            self.flash(
                format!("{expired} unanswered request(s) timed out"),
                StatusLevel::Info,
                now,
            );
        }

        // Rescan; covers watcher notifications dropped under load
        effects.push(Effect::LoadSessions);
        effects.extend(self.request_read(false));
    }

    fn answer_all_parked(&mut self) {
        for state in self.sessions.values_mut() {
            for parked in state.permissions.drain(..) {
                parked.request.responder.respond(PermissionDecision::Deny);
            }
            for parked in state.user_inputs.drain(..) {
                parked.request.responder.respond(UserInputAnswer::default());
            }
        }
    }
}
