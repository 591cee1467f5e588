//! Configuration for aerominal.
//!
//! Settings are read from `~/.aerominal/config.toml`. Every field is
//! optional; missing fields take their defaults.
//!
//! ```toml
//! [behavior]
//! # Shell executable (default: cmd.exe on Windows, bash or sh elsewhere)
//! shell_path = "/bin/bash"
//! # How often the display drains shell output
//! poll_interval_ms = 50
//! # How long to wait for the shell on exit before killing it
//! exit_grace_ms = 500
//!
//! [appearance]
//! show_ansi_colors = true
//! prompt_symbol = "❯"
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Could not determine home directory")]
    NoHome,

    #[error("Failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Main configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub behavior: BehaviorConfig,
    pub appearance: AppearanceConfig,
}

/// Shell and timing settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BehaviorConfig {
    /// Shell executable override
    pub shell_path: Option<String>,
    pub poll_interval_ms: u64,
    pub exit_grace_ms: u64,
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self {
            shell_path: None,
            poll_interval_ms: 50,
            exit_grace_ms: 500,
        }
    }
}

/// Display settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppearanceConfig {
    pub show_ansi_colors: bool,
    pub prompt_symbol: String,
}

impl Default for AppearanceConfig {
    fn default() -> Self {
        Self {
            show_ansi_colors: true,
            prompt_symbol: "❯".to_string(),
        }
    }
}

impl Config {
    /// Load from `~/.aerominal/config.toml`, falling back to defaults
    pub fn load() -> Self {
        let Some(path) = Self::config_path() else {
            return Self::default();
        };
        if !path.exists() {
            return Self::default();
        }

        match Self::load_from(&path) {
            Ok(config) => config,
            Err(e) => {
                warn!("Ignoring config file: {}", e);
                Self::default()
            }
        }
    }

    /// Load from a specific file
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(toml::from_str(&content)?)
    }

    /// Save to `~/.aerominal/config.toml`
    pub fn save(&self) -> Result<(), ConfigError> {
        let path = Self::config_path().ok_or(ConfigError::NoHome)?;
        self.save_to(&path)
    }

    /// Save to a specific file, creating parent directories
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let io_err = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content).map_err(io_err)
    }

    /// `~/.aerominal`
    pub fn config_dir() -> Option<PathBuf> {
        home_dir().map(|home| home.join(".aerominal"))
    }

    fn config_path() -> Option<PathBuf> {
        Self::config_dir().map(|dir| dir.join("config.toml"))
    }

    /// Shell override, ignoring blank values
    pub fn shell(&self) -> Option<&str> {
        self.behavior
            .shell_path
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.behavior.poll_interval_ms.max(1))
    }

    pub fn exit_grace(&self) -> Duration {
        Duration::from_millis(self.behavior.exit_grace_ms)
    }
}

/// Get home directory
pub fn home_dir() -> Option<PathBuf> {
    std::env::var_os("USERPROFILE")
        .or_else(|| std::env::var_os("HOME"))
        .map(PathBuf::from)
}
