//! Configuration management.

use crate::error::{Result, UsbPassError};
use crate::paths;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Persistent configuration for usbpass.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub log_level: String,
    /// Directory holding per-VM QMP control sockets; relative socket paths
    /// announced by the VM manager are resolved against it.
    pub qmp_socket_dir: String,
    /// Depth of the producer command channel.
    pub command_queue_depth: usize,
    /// Disconnect every active passthrough when the daemon exits.
    pub drain_on_shutdown: bool,
    pub data_dir: String,
    pub runtime_dir: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            qmp_socket_dir: paths::runtime_dir().join("qmp").to_string_lossy().to_string(),
            command_queue_depth: 256,
            drain_on_shutdown: true,
            data_dir: paths::data_dir().to_string_lossy().to_string(),
            runtime_dir: paths::runtime_dir().to_string_lossy().to_string(),
        }
    }
}

impl Config {
    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        paths::config_dir().join("config.json")
    }

    /// Load configuration from disk.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from an explicit path, falling back to defaults if
    /// the file does not exist.
    pub fn load_from(path: &PathBuf) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|e| UsbPassError::InvalidConfig {
            reason: format!("Failed to read config: {}", e),
        })?;
        serde_json::from_str(&content).map_err(|e| UsbPassError::InvalidConfig {
            reason: format!("Failed to parse config: {}", e),
        })
    }

    /// Save configuration to disk.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path())
    }

    /// Save configuration to an explicit path.
    pub fn save_to(&self, path: &PathBuf) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| UsbPassError::IoError { path: parent.to_path_buf(), source: e })?;
        }
        let content = serde_json::to_string_pretty(self).map_err(|e| {
            UsbPassError::InvalidConfig { reason: format!("Failed to serialize config: {}", e) }
        })?;
        std::fs::write(path, content)
            .map_err(|e| UsbPassError::IoError { path: path.clone(), source: e })
    }
}
