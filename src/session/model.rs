use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One agent conversation discovered under the session-state root
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    #[serde(default)]
    pub cwd: PathBuf,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub summary_count: u32,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn new(id: impl Into<String>, cwd: impl Into<PathBuf>) -> Self {
        Self {
            id: id.into(),
            cwd: cwd.into(),
            summary: String::new(),
            summary_count: 0,
            created_at: None,
            updated_at: None,
        }
    }

    /// First 8 characters of the id
    pub fn short_id(&self) -> &str {
        short_id(&self.id)
    }

    /// Summary, else working-directory name, else short id
    pub fn display_name(&self) -> String {
        let summary = self.summary.trim();
        if !summary.is_empty() {
            return summary.to_string();
        }
        match self.cwd.file_name() {
            Some(name) => name.to_string_lossy().into_owned(),
            None => self.short_id().to_string(),
        }
    }

    pub fn working_dir(&self) -> Option<&Path> {
        (!self.cwd.as_os_str().is_empty()).then_some(self.cwd.as_path())
    }

    /// Record activity observed now.
    pub fn touch(&mut self, at: DateTime<Utc>) {
        if self.updated_at.map_or(true, |prev| at > prev) {
            self.updated_at = Some(at);
        }
    }
}

pub fn short_id(id: &str) -> &str {
    match id.char_indices().nth(8) {
        Some((idx, _)) => &id[..idx],
        None => id,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_name_fallbacks() {
        let mut session = Session::new("0123456789abcdef", "/home/dev/icq");
        assert_eq!(session.display_name(), "icq");

        session.summary = "Fix login flow".into();
        assert_eq!(session.display_name(), "Fix login flow");

        let bare = Session::new("0123456789abcdef", "");
        assert_eq!(bare.display_name(), "01234567");
        assert_eq!(short_id("abc"), "abc");
    }

    #[test]
    fn test_touch_only_moves_forward() {
        let mut session = Session::new("s", "/tmp");
        let later = Utc::now();
        let earlier = later - chrono::Duration::seconds(60);
        session.touch(later);
        session.touch(earlier);
        assert_eq!(session.updated_at, Some(later));
    }
}
