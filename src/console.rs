//! Line-oriented console front end
//!
//! Commands read from stdin become [`AppEvent`]s; [`ConsoleView`] turns
//! scheduler state into plain-text lines, printing only what changed.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::agent::PermissionDecision;
use crate::core::{App, AppEvent, StatusLevel};
use crate::history::{ConversationTurn, Role, ToolCall, ToolDetail};

pub const HELP: &str = "\
commands:
  sessions              list sessions
  select <id-prefix>    show a session's conversation
  send <text>           send a message to the selected session
  approve <key>         answer the detected approval prompt
  allow | deny          decide the oldest permission request
  answer <text>         answer the oldest question
  abort                 stop the selected session
  rename <name>         change the selected session's summary
  export                write the conversation as Markdown
  refresh               rescan sessions
  quit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Sessions,
    Select(String),
    Send(String),
    Approve(String),
    Allow,
    Deny,
    Answer(String),
    Abort,
    Rename(String),
    Export,
    Refresh,
    Quit,
    Help,
}

pub fn parse_command(line: &str) -> Result<Command, String> {
    let line = line.trim();
    let (name, rest) = match line.split_once(char::is_whitespace) {
        Some((name, rest)) => (name, rest.trim()),
        None => (line, ""),
    };

    let needs_arg = |what: &str| -> Result<String, String> {
        if rest.is_empty() {
            Err(format!("{name} needs {what}"))
        } else {
            Ok(rest.to_string())
        }
    };

    match name {
        "sessions" | "ls" => Ok(Command::Sessions),
        "select" | "s" => needs_arg("a session id").map(Command::Select),
        "send" => needs_arg("a message").map(Command::Send),
        "approve" => needs_arg("an option key").map(Command::Approve),
        "allow" => Ok(Command::Allow),
        "deny" => Ok(Command::Deny),
        // An empty answer is a valid reply
        "answer" => Ok(Command::Answer(rest.to_string())),
        "abort" => Ok(Command::Abort),
        "rename" => needs_arg("a name").map(Command::Rename),
        "export" => Ok(Command::Export),
        "refresh" => Ok(Command::Refresh),
        "quit" | "q" | "exit" => Ok(Command::Quit),
        "help" | "?" => Ok(Command::Help),
        "" => Err("empty command".to_string()),
        other => Err(format!("unknown command '{other}' (try 'help')")),
    }
}

/// What the input side needs to know about scheduler state
#[derive(Debug, Clone, Default)]
pub struct ConsoleContext {
    pub selected: Option<String>,
    pub session_ids: Vec<String>,
    pub session_lines: Vec<String>,
}

impl ConsoleContext {
    /// Exact id or unique id prefix
    pub fn resolve(&self, prefix: &str) -> Result<String, String> {
        if self.session_ids.iter().any(|id| id == prefix) {
            return Ok(prefix.to_string());
        }
        let matches: Vec<&String> = self
            .session_ids
            .iter()
            .filter(|id| id.starts_with(prefix))
            .collect();
        match matches.as_slice() {
            [id] => Ok((*id).clone()),
            [] => Err(format!("no session matches '{prefix}'")),
            _ => Err(format!("'{prefix}' matches {} sessions", matches.len())),
        }
    }

    fn require_selected(&self) -> Result<String, String> {
        self.selected
            .clone()
            .ok_or_else(|| "no session selected".to_string())
    }
}

pub type SharedContext = Arc<Mutex<ConsoleContext>>;

/// Result of one console command
#[derive(Debug)]
pub enum CommandOutcome {
    Event(AppEvent),
    Print(Vec<String>),
}

impl Command {
    pub fn resolve(self, ctx: &ConsoleContext) -> Result<CommandOutcome, String> {
        let event = match self {
            Command::Help => return Ok(CommandOutcome::Print(HELP.lines().map(String::from).collect())),
            Command::Sessions => {
                let lines = if ctx.session_lines.is_empty() {
                    vec!["(no sessions)".to_string()]
                } else {
                    ctx.session_lines.clone()
                };
                return Ok(CommandOutcome::Print(lines));
            }
            Command::Select(prefix) => AppEvent::SelectSession(ctx.resolve(&prefix)?),
            Command::Send(text) => AppEvent::SendRequested {
                session_id: ctx.require_selected()?,
                text,
            },
            Command::Approve(shortcut) => AppEvent::ApprovalSelected {
                session_id: ctx.require_selected()?,
                shortcut,
            },
            Command::Allow => AppEvent::PermissionDecided {
                session_id: ctx.require_selected()?,
                decision: PermissionDecision::Allow,
            },
            Command::Deny => AppEvent::PermissionDecided {
                session_id: ctx.require_selected()?,
                decision: PermissionDecision::Deny,
            },
            Command::Answer(answer) => AppEvent::UserInputAnswered {
                session_id: ctx.require_selected()?,
                answer,
            },
            Command::Abort => AppEvent::AbortRequested {
                session_id: ctx.require_selected()?,
            },
            Command::Rename(summary) => AppEvent::RenameRequested {
                session_id: ctx.require_selected()?,
                summary,
            },
            Command::Export => AppEvent::ExportRequested,
            Command::Refresh => AppEvent::Refresh,
            Command::Quit => AppEvent::Quit,
        };
        Ok(CommandOutcome::Event(event))
    }
}

/// Renders scheduler state incrementally
#[derive(Debug, Default)]
pub struct ConsoleView {
    selected: Option<String>,
    printed_turns: usize,
    printed_pty_lines: u64,
    last_status: Option<String>,
    last_prompt: Option<String>,
    last_parked: (usize, usize),
    last_streaming: bool,
}

impl ConsoleView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lines to print for whatever changed since the last call.
    pub fn render(&mut self, app: &App, ctx: &SharedContext) -> Vec<String> {
        self.update_context(app, ctx);

        let mut out = Vec::new();

        if app.selected().map(str::to_string) != self.selected {
            self.selected = app.selected().map(str::to_string);
            self.printed_turns = 0;
            self.printed_pty_lines = 0;
            self.last_prompt = None;
            self.last_parked = (0, 0);
            if let Some(state) = app.selected_state() {
                out.push(format!(
                    "== {} ({}) {}",
                    state.session.display_name(),
                    state.session.short_id(),
                    state.session.cwd.display()
                ));
            }
        }

        let turns = app.conversation().turns();
        if turns.len() < self.printed_turns {
            self.printed_turns = 0;
        }
        for turn in &turns[self.printed_turns..] {
            out.extend(format_turn(turn));
        }
        self.printed_turns = turns.len();

        if let Some(state) = app.selected_state() {
            let first_new = state.pty_lines_total.saturating_sub(state.pty_lines.len() as u64);
            for (offset, line) in state.pty_lines.iter().enumerate() {
                if first_new + offset as u64 >= self.printed_pty_lines {
                    out.push(format!("| {line}"));
                }
            }
            self.printed_pty_lines = state.pty_lines_total;

            let streaming = !state.streaming.is_empty();
            if streaming && !self.last_streaming {
                out.push("... copilot is responding".to_string());
            }
            self.last_streaming = streaming;

            let prompt = state.prompt.as_ref().map(|p| p.question.clone());
            if prompt.is_some() && prompt != self.last_prompt {
                if let Some(p) = &state.prompt {
                    out.push(format!("? {}", p.question));
                    for option in &p.options {
                        out.push(format!("  [{}] {}", option.shortcut, option.label));
                    }
                    out.push("  (approve <key>)".to_string());
                }
            }
            self.last_prompt = prompt;

            let parked = (state.permissions.len(), state.user_inputs.len());
            if parked != self.last_parked {
                if let Some(p) = state.permissions.front() {
                    out.push(format!(
                        "? permission: {} {} (allow/deny)",
                        p.request.tool_name, p.request.action
                    ));
                }
                if let Some(q) = state.user_inputs.front() {
                    let choices = if q.request.choices.is_empty() {
                        String::new()
                    } else {
                        format!(" [{}]", q.request.choices.join(" / "))
                    };
                    out.push(format!("? {}{} (answer <text>)", q.request.question, choices));
                }
            }
            self.last_parked = parked;
        }

        let status = app.status().map(|s| match s.level {
            StatusLevel::Info => format!("-- {}", s.text),
            StatusLevel::Error => format!("!! {}", s.text),
        });
        if status.is_some() && status != self.last_status {
            out.extend(status.clone());
        }
        self.last_status = status;

        out
    }

    fn update_context(&self, app: &App, ctx: &SharedContext) {
        let session_lines = app
            .sessions()
            .map(|state| {
                let marker = if app.selected() == Some(state.id()) { "*" } else { " " };
                let unread = if state.unread > 0 {
                    format!(" ({} new)", state.unread)
                } else {
                    String::new()
                };
                let pending = state.pending_tools.len();
                let pending = if pending > 0 {
                    format!(" [{pending} pending tool(s)]")
                } else {
                    String::new()
                };
                format!(
                    "{marker} {}  {:<16} {}{unread}{pending}",
                    state.session.short_id(),
                    state.phase().label(),
                    state.session.display_name()
                )
            })
            .collect();

        let mut ctx = ctx.lock();
        ctx.selected = app.selected().map(str::to_string);
        ctx.session_ids = app.sessions().map(|s| s.id().to_string()).collect();
        ctx.session_lines = session_lines;
    }
}

fn format_turn(turn: &ConversationTurn) -> Vec<String> {
    let mut lines = Vec::new();
    let label = match turn.role {
        Role::User => "you",
        Role::Assistant | Role::Tool => "copilot",
        Role::System => "info",
    };
    if !turn.content.is_empty() {
        let mut content = turn.content.lines();
        if let Some(first) = content.next() {
            lines.push(format!("[{label}] {first}"));
        }
        lines.extend(content.map(|l| format!("    {l}")));
    }
    lines.extend(turn.tool_calls.iter().map(format_tool_call));
    lines
}

fn format_tool_call(call: &ToolCall) -> String {
    let detail = match &call.detail {
        ToolDetail::Shell { command } => format!(" $ {command}"),
        ToolDetail::Ask { question, .. } => format!(" ? {question}"),
        ToolDetail::Edit { path, .. } => format!(" {path}"),
        ToolDetail::Patch { files, .. } => format!(" {}", files.join(", ")),
        ToolDetail::None => String::new(),
    };
    let summary = call.summary.lines().next().unwrap_or_default();
    if summary.is_empty() {
        format!("  {} {}{detail}", call.status.glyph(), call.name)
    } else {
        format!("  {} {}{detail}: {summary}", call.status.glyph(), call.name)
    }
}
