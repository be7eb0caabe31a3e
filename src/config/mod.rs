mod settings;

use std::path::PathBuf;

use thiserror::Error;

pub use settings::{
    Config, HookConfig, PermissionConfig, PermissionPolicy, SecurityMode, SendMode,
    UserInputConfig, UserInputPolicy, EXAMPLE_CONFIG,
};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}
