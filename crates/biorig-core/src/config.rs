//! Rig configuration stored in a JSON file

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::buffer::BufferPolicy;
use crate::command::LineEnding;
use crate::link::{DEFAULT_BAUD_RATE, DEFAULT_TIMEOUT_MS};
use crate::plot::TimestampUnit;
use crate::presence::{DeviceIdentity, DEFAULT_POLL_INTERVAL_MS};

/// Default configuration file name
pub const CONFIG_FILE: &str = "biorig.json";

/// Errors loading or saving configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config {}: {source}", path.display())]
    Read { path: PathBuf, source: io::Error },

    #[error("Failed to write config {}: {source}", path.display())]
    Write { path: PathBuf, source: io::Error },

    #[error("Invalid config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Top-level rig configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RigConfig {
    /// Serial link settings
    pub link: LinkSettings,

    /// Streaming logger settings
    pub logging: LoggingSettings,

    /// Command wire settings
    pub commands: CommandSettings,

    /// Device presence monitoring
    pub presence: PresenceSettings,
}

/// Connection/communication settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkSettings {
    /// Serial port name
    pub port: Option<String>,

    /// Baud rate
    pub baud_rate: u32,

    /// Read timeout in milliseconds; bounds how long a stop request can go unseen
    pub timeout_ms: u64,
}

impl LinkSettings {
    /// Read timeout as a [`Duration`]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for LinkSettings {
    fn default() -> Self {
        Self {
            port: None,
            baud_rate: DEFAULT_BAUD_RATE,
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

/// Where and how samples are recorded
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Directory receiving the per-session CSV files
    pub output_dir: PathBuf,

    /// Whether the plot buffer survives across sessions
    pub buffer_policy: BufferPolicy,

    /// Keep at most this many samples in memory (unbounded when absent)
    pub max_buffer_samples: Option<usize>,

    /// Unit of the device's timestamp column
    pub timestamp_unit: TimestampUnit,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            buffer_policy: BufferPolicy::default(),
            max_buffer_samples: None,
            timestamp_unit: TimestampUnit::default(),
        }
    }
}

/// Command wire settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandSettings {
    /// Terminator appended to every command
    pub line_ending: LineEnding,
}

/// Presence monitor settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PresenceSettings {
    /// Watch for the device disappearing while running
    pub enabled: bool,

    /// Poll interval in milliseconds
    pub interval_ms: u64,

    /// Identity to look for; defaults to the configured port name
    pub identity: Option<DeviceIdentity>,
}

impl PresenceSettings {
    /// Poll interval as a [`Duration`]
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl Default for PresenceSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_ms: DEFAULT_POLL_INTERVAL_MS,
            identity: None,
        }
    }
}

impl RigConfig {
    /// Load configuration from a JSON file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load the file if it exists, otherwise fall back to defaults
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration as pretty-printed JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Identity the presence monitor should look for, if any can be derived
    pub fn presence_identity(&self) -> Option<DeviceIdentity> {
        self.presence
            .identity
            .clone()
            .or_else(|| self.link.port.as_deref().map(DeviceIdentity::port))
    }
}
