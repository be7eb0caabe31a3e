//! Approval-prompt detection over streamed terminal output
//!
//! The interactive CLI renders permission prompts as plain terminal text:
//!
//! ```text
//! Do you want to run this command?
//!
//! ❯ 1. Yes
//!   2. Yes, and don't ask again for this command
//!   3. No, and tell Copilot what to do differently (Esc)
//!
//! Confirm with number keys or ↑↓ keys and Enter, Cancel with Esc
//! ```
//!
//! PTY reads split this text at arbitrary byte positions, including inside
//! escape sequences and multi-byte characters. [`PromptParser`] carries
//! incomplete fragments between reads, strips control sequences, keeps a
//! bounded rolling buffer and reports a prompt only once the text after the
//! last option shows that the option list is finished.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Rolling buffer ceiling, in characters
pub const MAX_BUFFER_CHARS: usize = 2048;
/// Characters kept when the ceiling is exceeded
pub const RETAIN_CHARS: usize = 1024;
/// Longest escape sequence fragment carried to the next read
const MAX_CARRY_BYTES: usize = 64;

static ANSI_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"\x1b\[[0-9;?<=>!]*[ -/]*[@-~]",
        r"|\x1b\][^\x07\x1b]*(?:\x07|\x1b\\)",
        r"|\x1b[PX^_][^\x1b]*\x1b\\",
        r"|\x1b[()*+][A-Za-z0-9]",
        r"|\x1b[=>78cDEHMNOZ]",
        r"|[\x00-\x08\x0b\x0c\x0e-\x1f\x7f]",
    ))
    .expect("valid ANSI regex")
});

/// A complete escape sequence anchored at the start of the input
static COMPLETE_ESCAPE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"^(?:\x1b\[[0-9;?<=>!]*[ -/]*[@-~]",
        r"|\x1b\][^\x07\x1b]*(?:\x07|\x1b\\)",
        r"|\x1b[PX^_][^\x1b]*\x1b\\",
        r"|\x1b[()*+][A-Za-z0-9]",
        r"|\x1b[^\[\]PX^_()*+])",
    ))
    .expect("valid escape regex")
});

static QUESTION_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?im)((?:do you want|allow|approve|confirm|proceed|permission|accept|execute|apply|run this)\b.*)$",
    )
    .expect("valid question regex")
});

static OPTION_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^[ \t]*[❯›>►]?[ \t]*(\d+)\.[ \t]+(\S.*?)[ \t\r]*$").expect("valid option regex")
});

/// A line that could still grow into another numbered option
static OPTION_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[ \t]*[❯›>►]?[ \t]*(?:\d+\.?)?[ \t]*$").expect("valid prefix regex"));

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalOption {
    pub label: String,
    /// Literal key sequence that selects this option (the option number)
    pub shortcut: String,
    pub index: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalPrompt {
    pub question: String,
    pub options: Vec<ApprovalOption>,
    /// Cleaned buffer text the prompt was detected in
    pub raw: String,
}

impl ApprovalPrompt {
    pub fn option_by_shortcut(&self, shortcut: &str) -> Option<&ApprovalOption> {
        self.options.iter().find(|o| o.shortcut == shortcut)
    }
}

/// One PTY read after cleaning
#[derive(Debug, Clone, Default)]
pub struct OutputChunk {
    pub raw: Vec<u8>,
    pub cleaned: String,
    pub prompt: Option<ApprovalPrompt>,
}

impl OutputChunk {
    pub fn is_prompt(&self) -> bool {
        self.prompt.is_some()
    }

    /// Whether this chunk carries anything worth forwarding.
    pub fn has_content(&self) -> bool {
        self.is_prompt() || !self.cleaned.trim().is_empty()
    }
}

/// Remove terminal control sequences from already-decoded text.
pub fn strip_ansi(text: &str) -> String {
    ANSI_REGEX.replace_all(text, "").replace("\r\n", "\n")
}

#[derive(Debug, Default)]
pub struct PromptParser {
    buffer: String,
    carry: Vec<u8>,
}

impl PromptParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one raw read and report what it contained.
    pub fn feed(&mut self, raw: &[u8]) -> OutputChunk {
        let mut bytes = std::mem::take(&mut self.carry);
        bytes.extend_from_slice(raw);

        let utf8_tail = incomplete_utf8_tail(&bytes);
        let mut text = String::from_utf8_lossy(&bytes[..bytes.len() - utf8_tail]).into_owned();
        self.carry = bytes[bytes.len() - utf8_tail..].to_vec();

        if let Some(start) = incomplete_escape_start(&text) {
            let mut pending = text.split_off(start).into_bytes();
            pending.extend_from_slice(&self.carry);
            self.carry = pending;
        }

        let cleaned = strip_ansi(&text);
        self.push(&cleaned);

        let prompt = detect_prompt(&self.buffer);
        if prompt.is_some() {
            self.reset();
        }

        OutputChunk {
            raw: raw.to_vec(),
            cleaned,
            prompt,
        }
    }

    /// Clear accumulated text, e.g. after the user answered a prompt.
    pub fn reset(&mut self) {
        self.buffer.clear();
    }

    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    fn push(&mut self, cleaned: &str) {
        self.buffer.push_str(cleaned);
        let chars = self.buffer.chars().count();
        if chars > MAX_BUFFER_CHARS {
            let skip = chars - RETAIN_CHARS;
            let cut = self
                .buffer
                .char_indices()
                .nth(skip)
                .map(|(i, _)| i)
                .unwrap_or(self.buffer.len());
            self.buffer.drain(..cut);
        }
    }
}

/// Number of trailing bytes that form an unfinished UTF-8 sequence.
fn incomplete_utf8_tail(bytes: &[u8]) -> usize {
    match std::str::from_utf8(bytes) {
        Ok(_) => 0,
        Err(e) if e.error_len().is_none() => bytes.len() - e.valid_up_to(),
        Err(_) => {
            // Invalid bytes earlier on; only the last few bytes can be a split character
            let start = bytes.len().saturating_sub(3);
            (start..bytes.len())
                .find(|&i| {
                    matches!(std::str::from_utf8(&bytes[i..]), Err(e) if e.valid_up_to() == 0 && e.error_len().is_none())
                })
                .map(|i| bytes.len() - i)
                .unwrap_or(0)
        }
    }
}

/// Byte index of a trailing escape sequence that has not been terminated yet.
fn incomplete_escape_start(text: &str) -> Option<usize> {
    let start = text.rfind('\x1b')?;
    let tail = &text[start..];
    if tail.len() > MAX_CARRY_BYTES || COMPLETE_ESCAPE.is_match(tail) {
        None
    } else {
        Some(start)
    }
}

fn detect_prompt(buffer: &str) -> Option<ApprovalPrompt> {
    // The closest question line that still has numbered options after it
    let question = QUESTION_REGEX
        .captures_iter(buffer)
        .filter_map(|c| c.get(1))
        .filter(|m| {
            let line_start = buffer[..m.start()].rfind('\n').map_or(0, |i| i + 1);
            !OPTION_REGEX.is_match(&buffer[line_start..m.end()])
                && OPTION_REGEX.is_match(&buffer[m.end()..])
        })
        .last()?;

    let body_start = question.end();
    let mut options = Vec::new();
    let mut last_end = body_start;
    for caps in OPTION_REGEX.captures_iter(&buffer[body_start..]) {
        let (Some(whole), Some(number), Some(label)) = (caps.get(0), caps.get(1), caps.get(2))
        else {
            continue;
        };
        options.push(ApprovalOption {
            label: label.as_str().trim().to_string(),
            shortcut: number.as_str().to_string(),
            index: options.len(),
        });
        last_end = body_start + whole.end();
    }

    if options.len() < 2 || !options_finished(&buffer[last_end..]) {
        return None;
    }

    Some(ApprovalPrompt {
        question: question.as_str().trim().to_string(),
        options,
        raw: buffer.to_string(),
    })
}

/// The option list is finished once a non-blank line follows it that cannot
/// itself be the start of another numbered option.
fn options_finished(trailing: &str) -> bool {
    trailing
        .lines()
        .find(|line| !line.trim().is_empty())
        .is_some_and(|line| !OPTION_PREFIX.is_match(line))
}
