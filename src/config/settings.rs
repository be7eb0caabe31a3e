use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::hooks::default_socket_path;
use crate::util::paths::{config_path, default_session_state_dir, expand_home};

use super::ConfigError;

/// Example configuration file contents (bundled with the binary)
pub const EXAMPLE_CONFIG: &str = include_str!("config.toml.example");

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Root of the Copilot CLI session state
    pub session_state_dir: PathBuf,
    /// Copilot CLI binary name or path
    pub copilot_binary: String,
    /// How outgoing messages reach the agent
    pub send_mode: SendMode,
    /// Tool access granted to PTY sends
    pub security_mode: SecurityMode,
    /// Tools allowed in scoped mode
    pub allowed_tools: Vec<String>,
    /// Directory for Markdown exports
    pub export_dir: PathBuf,
    /// Interval between full session rescans
    pub tick_interval: Duration,
    /// How long status text stays visible
    pub status_flash: Duration,
    pub permissions: PermissionConfig,
    pub user_input: UserInputConfig,
    pub hooks: HookConfig,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum SendMode {
    Protocol,
    Pty,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum SecurityMode {
    Scoped,
    FullAuto,
}

impl SecurityMode {
    /// CLI arguments granting tool access
    pub fn cli_args(&self, allowed_tools: &[String]) -> Vec<String> {
        match self {
            SecurityMode::FullAuto => vec!["--allow-all-tools".to_string()],
            SecurityMode::Scoped => allowed_tools
                .iter()
                .flat_map(|tool| ["--allow-tool".to_string(), tool.clone()])
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum PermissionPolicy {
    /// Park the request until the user decides (or the timeout denies it)
    Ask,
    Allow,
    Deny,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum UserInputPolicy {
    /// Park the question until the user answers (or the timeout sends an empty answer)
    Ask,
    /// Reply with an empty answer straight away
    Auto,
}

#[derive(Debug, Clone)]
pub struct PermissionConfig {
    pub policy: PermissionPolicy,
    pub timeout: Duration,
    pub denied_tools: Vec<String>,
    pub denied_patterns: Vec<String>,
}

impl PermissionConfig {
    /// Reason the deny lists reject this tool use, if they do.
    pub fn deny_reason(&self, tool_name: &str, args: &str) -> Option<String> {
        if self
            .denied_tools
            .iter()
            .any(|t| t.eq_ignore_ascii_case(tool_name))
        {
            return Some(format!("tool '{tool_name}' is denied by policy"));
        }

        let args = args.to_lowercase();
        self.denied_patterns
            .iter()
            .find(|p| !p.is_empty() && args.contains(&p.to_lowercase()))
            .map(|p| format!("arguments match denied pattern '{p}'"))
    }
}

#[derive(Debug, Clone)]
pub struct UserInputConfig {
    pub policy: UserInputPolicy,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct HookConfig {
    pub enabled: bool,
    pub socket_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            session_state_dir: default_session_state_dir(),
            copilot_binary: "copilot".to_string(),
            send_mode: SendMode::Protocol,
            security_mode: SecurityMode::Scoped,
            allowed_tools: ["view", "glob", "grep", "bash"]
                .into_iter()
                .map(String::from)
                .collect(),
            export_dir: PathBuf::from("."),
            tick_interval: Duration::from_secs(5),
            status_flash: Duration::from_secs(4),
            permissions: PermissionConfig {
                policy: PermissionPolicy::Ask,
                timeout: Duration::from_secs(120),
                denied_tools: Vec::new(),
                denied_patterns: Vec::new(),
            },
            user_input: UserInputConfig {
                policy: UserInputPolicy::Ask,
                timeout: Duration::from_secs(300),
            },
            hooks: HookConfig {
                enabled: true,
                socket_path: default_socket_path(),
            },
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlPermissionConfig {
    pub policy: Option<PermissionPolicy>,
    pub timeout_secs: Option<u64>,
    pub denied_tools: Option<Vec<String>>,
    pub denied_patterns: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlUserInputConfig {
    pub policy: Option<UserInputPolicy>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlHookConfig {
    pub enabled: Option<bool>,
    pub socket_path: Option<String>,
}

/// Mirror of the TOML file; every key optional
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlConfig {
    pub session_state_dir: Option<String>,
    pub copilot_binary: Option<String>,
    pub send_mode: Option<SendMode>,
    pub security_mode: Option<SecurityMode>,
    pub allowed_tools: Option<Vec<String>>,
    pub export_dir: Option<String>,
    pub tick_interval_secs: Option<u64>,
    pub status_flash_secs: Option<u64>,
    pub permissions: Option<TomlPermissionConfig>,
    pub user_input: Option<TomlUserInputConfig>,
    pub hooks: Option<TomlHookConfig>,
}

impl Config {
    /// Load configuration from ~/.copilot-icq/config.toml, merging with defaults
    pub fn load() -> Self {
        let config_file = config_path();

        // Create example config on first run
        if !config_file.exists() {
            Self::create_default_config(&config_file);
        }

        match Self::load_from(&config_file) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring unusable config file");
                Config::default()
            }
        }
    }

    /// Load a specific file. A missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Config::default());
        }
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, toml::de::Error> {
        let toml_config: TomlConfig = toml::from_str(contents)?;
        let mut config = Config::default();
        config.merge(toml_config);
        Ok(config)
    }

    fn merge(&mut self, toml: TomlConfig) {
        if let Some(dir) = toml.session_state_dir {
            self.session_state_dir = expand_home(&dir);
        }
        if let Some(binary) = toml.copilot_binary {
            self.copilot_binary = binary;
        }
        if let Some(mode) = toml.send_mode {
            self.send_mode = mode;
        }
        if let Some(mode) = toml.security_mode {
            self.security_mode = mode;
        }
        if let Some(tools) = toml.allowed_tools {
            self.allowed_tools = tools;
        }
        if let Some(dir) = toml.export_dir {
            self.export_dir = expand_home(&dir);
        }
        if let Some(secs) = toml.tick_interval_secs {
            self.tick_interval = Duration::from_secs(secs.max(1));
        }
        if let Some(secs) = toml.status_flash_secs {
            self.status_flash = Duration::from_secs(secs);
        }

        if let Some(permissions) = toml.permissions {
            if let Some(policy) = permissions.policy {
                self.permissions.policy = policy;
            }
            if let Some(secs) = permissions.timeout_secs {
                self.permissions.timeout = Duration::from_secs(secs);
            }
            if let Some(tools) = permissions.denied_tools {
                self.permissions.denied_tools = tools;
            }
            if let Some(patterns) = permissions.denied_patterns {
                self.permissions.denied_patterns = patterns;
            }
        }

        if let Some(user_input) = toml.user_input {
            if let Some(policy) = user_input.policy {
                self.user_input.policy = policy;
            }
            if let Some(secs) = user_input.timeout_secs {
                self.user_input.timeout = Duration::from_secs(secs);
            }
        }

        if let Some(hooks) = toml.hooks {
            if let Some(enabled) = hooks.enabled {
                self.hooks.enabled = enabled;
            }
            // The environment variable wins over the file
            if let Some(path) = hooks.socket_path {
                if std::env::var_os(crate::hooks::SOCKET_ENV).is_none() {
                    self.hooks.socket_path = expand_home(&path);
                }
            }
        }
    }

    /// Create the default config file from the bundled example
    fn create_default_config(path: &Path) {
        if let Some(parent) = path.parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                tracing::warn!(path = %parent.display(), error = %e, "Failed to create config directory");
                return;
            }
        }
        if let Err(e) = fs::write(path, EXAMPLE_CONFIG) {
            tracing::warn!(path = %path.display(), error = %e, "Failed to write default config");
        }
    }

    pub fn with_session_state_dir(mut self, dir: PathBuf) -> Self {
        self.session_state_dir = dir;
        self
    }

    pub fn with_send_mode(mut self, mode: SendMode) -> Self {
        self.send_mode = mode;
        self
    }

    pub fn with_socket_path(mut self, path: PathBuf) -> Self {
        self.hooks.socket_path = path;
        self
    }

    pub fn without_hooks(mut self) -> Self {
        self.hooks.enabled = false;
        self
    }
}
