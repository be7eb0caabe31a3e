//! Per-tool detail extraction from tool invocation arguments

use serde_json::{Map, Value};

/// Tool-specific facts worth showing next to a tool call
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ToolDetail {
    #[default]
    None,
    Shell {
        command: String,
    },
    Ask {
        question: String,
        choices: Vec<String>,
    },
    Edit {
        path: String,
        diff: String,
    },
    Patch {
        patch: String,
        files: Vec<String>,
    },
}

impl ToolDetail {
    pub fn is_none(&self) -> bool {
        matches!(self, ToolDetail::None)
    }
}

pub fn extract_detail(tool_name: &str, arguments: &Value) -> ToolDetail {
    let arguments = decode_arguments(arguments);
    let args = arguments.as_object();

    match tool_name {
        "bash" | "shell" | "powershell" => ToolDetail::Shell {
            command: str_field(args, &["command", "cmd"]),
        },
        "ask_user" => ToolDetail::Ask {
            question: str_field(args, &["question", "prompt"]),
            choices: args
                .and_then(|a| a.get("choices"))
                .and_then(Value::as_array)
                .map(|items| {
                    items
                        .iter()
                        .filter_map(|c| c.as_str().map(str::to_string))
                        .collect()
                })
                .unwrap_or_default(),
        },
        "edit" | "str_replace_editor" | "str_replace" => {
            let old = str_field(args, &["old_str", "old_string"]);
            let new = str_field(args, &["new_str", "new_string"]);
            ToolDetail::Edit {
                path: str_field(args, &["path", "file_path"]),
                diff: synthesize_diff(&old, &new),
            }
        }
        "create" | "write" => ToolDetail::Edit {
            path: str_field(args, &["path", "file_path"]),
            diff: synthesize_diff("", &str_field(args, &["file_text", "content"])),
        },
        "apply_patch" => {
            let patch = match &arguments {
                Value::String(raw) => raw.clone(),
                _ => str_field(args, &["input", "patch"]),
            };
            let files = patch_files(&patch);
            ToolDetail::Patch { patch, files }
        }
        _ => ToolDetail::None,
    }
}

/// Arguments occasionally arrive JSON-encoded inside a string.
fn decode_arguments(arguments: &Value) -> Value {
    if let Value::String(raw) = arguments {
        if let Ok(decoded @ Value::Object(_)) = serde_json::from_str::<Value>(raw) {
            return decoded;
        }
    }
    arguments.clone()
}

fn str_field(args: Option<&Map<String, Value>>, keys: &[&str]) -> String {
    args.and_then(|a| keys.iter().find_map(|k| a.get(*k).and_then(Value::as_str)))
        .unwrap_or_default()
        .to_string()
}

fn synthesize_diff(old: &str, new: &str) -> String {
    let removed = old.lines().map(|l| format!("-{l}"));
    let added = new.lines().map(|l| format!("+{l}"));
    removed.chain(added).collect::<Vec<_>>().join("\n")
}

fn patch_files(patch: &str) -> Vec<String> {
    const HEADERS: [&str; 4] = [
        "*** Add File: ",
        "*** Update File: ",
        "*** Delete File: ",
        "+++ b/",
    ];

    let mut files: Vec<String> = Vec::new();
    for line in patch.lines() {
        let found = HEADERS
            .iter()
            .find_map(|h| line.strip_prefix(h))
            .map(str::trim)
            .filter(|f| !f.is_empty());
        if let Some(file) = found {
            if !files.iter().any(|f| f == file) {
                files.push(file.to_string());
            }
        }
    }
    files
}
