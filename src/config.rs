//! Configuration management for Shift Trainer
//!
//! Settings live in a TOML file in the platform config directory. A missing
//! file means defaults.
//!
//! ## Config File Locations
//!
//! | Platform | Path |
//! |----------|------|
//! | Linux | `~/.config/shift-trainer/config.toml` |
//! | macOS | `~/Library/Application Support/shift-trainer/config.toml` |
//! | Windows | `%APPDATA%\shift-trainer\config.toml` |
//!
//! ## Example
//!
//! ```no_run
//! use shift_trainer::Config;
//!
//! let mut config = Config::load().unwrap_or_default();
//! config.trials.seed = Some(7);
//! config.save().expect("Failed to save config");
//! ```

use crate::keyboard::Backend;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Error type for configuration operations
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to determine config directory
    #[error("Could not determine config directory")]
    NoConfigDir,
    /// IO error reading or writing config file
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    /// Failed to parse config file
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
    /// Failed to serialize config
    #[error("Serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Returns the path to the config file.
///
/// Touches nothing on disk; the directory is created by [`Config::save_to`].
pub fn config_path() -> Result<PathBuf, ConfigError> {
    let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
    Ok(config_dir.join("shift-trainer").join("config.toml"))
}

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Key listener settings
    #[serde(default)]
    pub listener: ListenerConfig,
    /// Console output settings
    #[serde(default)]
    pub display: DisplayConfig,
    /// Trial generation settings
    #[serde(default)]
    pub trials: TrialConfig,
}

/// Key listener configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListenerConfig {
    /// Key capture backend
    pub backend: Backend,
    /// How often the listener thread polls its source (in milliseconds)
    pub poll_interval_ms: u64,
    /// Capacity of the listener to session hand-off channel
    pub channel_capacity: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            backend: Backend::Auto,
            poll_interval_ms: 2,
            channel_capacity: 4,
        }
    }
}

/// Console output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayConfig {
    /// Colour the OK/False markers
    pub color: bool,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self { color: true }
    }
}

/// Trial generation configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrialConfig {
    /// Fixed RNG seed for a reproducible prompt sequence
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl Config {
    /// Load configuration from the default config file.
    ///
    /// Returns the default configuration if the file doesn't exist.
    /// Returns an error if the file exists but cannot be parsed.
    pub fn load() -> Result<Self, ConfigError> {
        let path = config_path()?;

        if !path.exists() {
            return Ok(Self::default());
        }

        Self::load_from(&path)
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Save configuration to the default config file.
    pub fn save(&self) -> Result<(), ConfigError> {
        let path = config_path()?;
        self.save_to(&path)
    }

    /// Save configuration to a specific path, creating missing parent
    /// directories.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }

    /// Listener poll interval, never zero
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.listener.poll_interval_ms.max(1))
    }
}
