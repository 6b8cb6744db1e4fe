//! Engine configuration loaded from TOML.
//!
//! Lookup order: an explicit `--config` path, then
//! `$XDG_CONFIG_HOME/panes/config.toml`. A missing file yields defaults, a
//! malformed one is an error.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use panes_core::{Arrangement, LayoutMode, SessionMode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid config value for {field}: {message}")]
    Invalid { field: &'static str, message: String },
}

/// Complete engine configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub timing: TimingConfig,
    pub launch: LaunchConfig,
    pub layout: LayoutConfig,
    pub store: StoreConfig,
}

/// Timer lengths in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub typing_block_ms: u64,
    pub scroll_release_ms: u64,
    pub resize_debounce_ms: u64,
    pub ready_timeout_ms: u64,
    pub ready_timeout_with_task_ms: u64,
    pub danger_hold_ms: u64,
    pub terminate_grace_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            typing_block_ms: 3_000,
            scroll_release_ms: 30_000,
            resize_debounce_ms: 300,
            ready_timeout_ms: 5_000,
            ready_timeout_with_task_ms: 10_000,
            danger_hold_ms: 1_500,
            terminate_grace_ms: 3_000,
        }
    }
}

impl TimingConfig {
    pub fn typing_block(&self) -> Duration {
        Duration::from_millis(self.typing_block_ms)
    }

    pub fn scroll_release(&self) -> Duration {
        Duration::from_millis(self.scroll_release_ms)
    }

    pub fn resize_debounce(&self) -> Duration {
        Duration::from_millis(self.resize_debounce_ms)
    }

    /// Readiness timeout, longer when a task must be delivered afterwards.
    pub fn ready_timeout(&self, with_task: bool) -> Duration {
        if with_task {
            Duration::from_millis(self.ready_timeout_with_task_ms)
        } else {
            Duration::from_millis(self.ready_timeout_ms)
        }
    }

    pub fn danger_hold(&self) -> Duration {
        Duration::from_millis(self.danger_hold_ms)
    }

    pub fn terminate_grace(&self) -> Duration {
        Duration::from_millis(self.terminate_grace_ms)
    }
}

/// How the agent process is launched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LaunchConfig {
    /// Login shell used to run the agent command.
    pub shell: String,
    pub agent_command: String,
    pub resume_flag: String,
    pub danger_flag: String,
}

impl Default for LaunchConfig {
    fn default() -> Self {
        Self {
            shell: std::env::var("SHELL").unwrap_or_else(|_| "/bin/bash".to_string()),
            agent_command: "claude".to_string(),
            resume_flag: "--resume".to_string(),
            danger_flag: "--dangerously-skip-permissions".to_string(),
        }
    }
}

impl LaunchConfig {
    /// Flags appended to the agent command for a session mode.
    pub fn flags_for(&self, mode: SessionMode) -> Vec<&str> {
        let mut flags = Vec::new();
        if mode.is_resume() {
            flags.push(self.resume_flag.as_str());
        }
        if mode.is_dangerous() {
            flags.push(self.danger_flag.as_str());
        }
        flags
    }

    /// The command line handed to `<shell> -l -c`.
    pub fn command_line(&self, mode: SessionMode) -> String {
        let mut line = self.agent_command.clone();
        for flag in self.flags_for(mode) {
            line.push(' ');
            line.push_str(flag);
        }
        line
    }
}

/// Initial layout choices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    pub mode: LayoutMode,
    /// Arrangement used for two sessions.
    pub two: Arrangement,
    /// Arrangement used for three sessions.
    pub three: Arrangement,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            mode: LayoutMode::Grid,
            two: Arrangement::Horizontal,
            three: Arrangement::ThreeTop1,
        }
    }
}

/// Where last-used directories are kept.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub path: Option<PathBuf>,
}

impl StoreConfig {
    /// Configured path, else `$XDG_DATA_HOME/panes/last_directories.json`.
    pub fn resolved_path(&self) -> Option<PathBuf> {
        self.path.clone().or_else(|| {
            dirs::data_dir().map(|d| d.join("panes").join("last_directories.json"))
        })
    }
}

impl EngineConfig {
    /// Default config file location.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("panes").join("config.toml"))
    }

    /// Loads configuration from `path`, or from [`Self::default_path`].
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read, parsed, or
    /// validated.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path.map(Path::to_path_buf).or_else(Self::default_path) {
            Some(p) => p,
            None => return Ok(Self::default()),
        };

        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file, using defaults");
                return Ok(Self::default());
            }
            Err(source) => return Err(ConfigError::Read { path, source }),
        };

        let config: EngineConfig =
            toml::from_str(&content).map_err(|source| ConfigError::Parse {
                path: path.clone(),
                source,
            })?;
        config.validate()?;
        tracing::debug!(path = %path.display(), "Loaded config");
        Ok(config)
    }

    /// Checks values that deserialize fine but make no sense.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !Arrangement::TWO_WAY.contains(&self.layout.two) {
            return Err(ConfigError::Invalid {
                field: "layout.two",
                message: format!("{} is not a two-session arrangement", self.layout.two),
            });
        }
        if !Arrangement::THREE_WAY.contains(&self.layout.three) {
            return Err(ConfigError::Invalid {
                field: "layout.three",
                message: format!("{} is not a three-session arrangement", self.layout.three),
            });
        }
        if self.launch.agent_command.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "launch.agent_command",
                message: "must not be empty".to_string(),
            });
        }
        Ok(())
    }

    /// Renders the effective configuration as TOML.
    pub fn to_toml(&self) -> String {
        toml::to_string_pretty(self).unwrap_or_default()
    }
}
