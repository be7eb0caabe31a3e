//! Session metadata and discovery

mod model;
mod repo;

use std::path::PathBuf;

use thiserror::Error;

pub use model::{short_id, Session};
pub use repo::{SessionRepo, SessionSource, WORKSPACE_FILE};

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
