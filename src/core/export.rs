//! Markdown export of a reconciled conversation

use std::fmt::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::history::{ConversationTurn, Role};
use crate::session::Session;

const SUMMARY_MAX_CHARS: usize = 100;

/// `<dir>/copilot-session-<short id>.md`
pub fn export_path(dir: &Path, session: &Session) -> PathBuf {
    dir.join(format!("copilot-session-{}.md", session.short_id()))
}

pub fn render_markdown(session: &Session, turns: &[ConversationTurn]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# Copilot Session: {}\n", session.display_name());
    let _ = writeln!(out, "- **Session ID**: `{}`", session.id);
    let _ = writeln!(out, "- **CWD**: `{}`", session.cwd.display());
    let _ = writeln!(out, "- **Created**: {}", rfc3339(session.created_at));
    let _ = writeln!(out, "- **Updated**: {}\n", rfc3339(session.updated_at));
    out.push_str("---\n\n");

    for turn in turns {
        let ts = turn
            .timestamp
            .map(|t| t.format("%H:%M:%S").to_string())
            .unwrap_or_else(|| "--:--:--".to_string());
        match turn.role {
            Role::User => {
                let _ = write!(out, "### You ({ts})\n\n{}\n\n", turn.content);
            }
            Role::Assistant | Role::Tool => {
                let _ = write!(out, "### Copilot ({ts})\n\n");
                if !turn.content.is_empty() {
                    let _ = write!(out, "{}\n\n", turn.content);
                }
                for call in &turn.tool_calls {
                    let _ = write!(out, "- **{}** {}", call.name, call.status.glyph());
                    if !call.summary.is_empty() {
                        let _ = write!(out, ": `{}`", truncate(&call.summary));
                    }
                    out.push('\n');
                }
                out.push('\n');
            }
            Role::System => {
                let _ = write!(out, "*{}* ({ts})\n\n", turn.content);
            }
        }
    }
    out
}

fn rfc3339(at: Option<DateTime<Utc>>) -> String {
    at.map(|t| t.to_rfc3339()).unwrap_or_else(|| "unknown".to_string())
}

fn truncate(text: &str) -> String {
    let single_line = text.replace('\n', " ");
    if single_line.chars().count() <= SUMMARY_MAX_CHARS {
        return single_line;
    }
    let kept: String = single_line.chars().take(SUMMARY_MAX_CHARS - 3).collect();
    format!("{kept}...")
}
