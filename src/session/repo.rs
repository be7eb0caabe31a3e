use std::fs;
use std::path::{Path, PathBuf};

use serde_yaml::{Mapping, Value};

use crate::history::EVENTS_FILE;

use super::model::Session;
use super::SessionError;

/// Metadata document inside each session directory
pub const WORKSPACE_FILE: &str = "workspace.yaml";

/// Session discovery
pub trait SessionSource: Send + Sync {
    /// All known sessions, most recently updated first.
    fn list(&self) -> Result<Vec<Session>, SessionError>;

    fn root(&self) -> &Path;

    /// Replace the session's summary in its metadata document.
    fn rename(&self, session_id: &str, summary: &str) -> Result<(), SessionError>;

    fn log_path(&self, session_id: &str) -> PathBuf {
        self.root().join(session_id).join(EVENTS_FILE)
    }
}

/// Reads `<root>/<id>/workspace.yaml` for every session directory
#[derive(Debug, Clone)]
pub struct SessionRepo {
    root: PathBuf,
}

impl SessionRepo {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn parse_workspace(path: &Path) -> Result<Session, SessionError> {
        let contents = fs::read_to_string(path).map_err(|source| SessionError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_yaml::from_str(&contents).map_err(|source| SessionError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    fn workspace_path(&self, session_id: &str) -> PathBuf {
        self.root.join(session_id).join(WORKSPACE_FILE)
    }
}

impl SessionSource for SessionRepo {
    fn list(&self) -> Result<Vec<Session>, SessionError> {
        let entries = fs::read_dir(&self.root).map_err(|source| SessionError::Read {
            path: self.root.clone(),
            source,
        })?;

        let mut sessions = Vec::new();
        for entry in entries.flatten() {
            if !entry.file_type().is_ok_and(|t| t.is_dir()) {
                continue;
            }
            match Self::parse_workspace(&entry.path().join(WORKSPACE_FILE)) {
                Ok(session) => sessions.push(session),
                Err(e) => tracing::trace!(error = %e, "Skipping unreadable session"),
            }
        }

        sessions.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(sessions)
    }

    fn root(&self) -> &Path {
        &self.root
    }

    fn rename(&self, session_id: &str, summary: &str) -> Result<(), SessionError> {
        let path = self.workspace_path(session_id);
        let contents = fs::read_to_string(&path).map_err(|source| SessionError::Read {
            path: path.clone(),
            source,
        })?;
        let parse_error = |source| SessionError::Parse {
            path: path.clone(),
            source,
        };

        // Edit the raw mapping so keys we do not model survive
        let mut document: Mapping = serde_yaml::from_str(&contents).map_err(parse_error)?;
        document.insert(Value::from("summary"), Value::from(summary));
        let updated = serde_yaml::to_string(&document).map_err(parse_error)?;

        fs::write(&path, updated).map_err(|source| SessionError::Write {
            path: path.clone(),
            source,
        })?;
        tracing::info!(session_id = %session_id, summary = %summary, "Renamed session");
        Ok(())
    }
}
