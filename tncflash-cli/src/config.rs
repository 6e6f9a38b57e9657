//! Configuration file support for tncflash.
//!
//! Configuration is loaded from multiple sources with the following
//! priority (highest first):
//! 1. Command-line arguments
//! 2. Environment variables (TNCFLASH_*)
//! 3. Local config file (./tncflash.toml)
//! 4. Global config file (~/.config/tncflash/config.toml)

use directories::ProjectDirs;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Connection configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Preferred serial port (e.g., "/dev/ttyUSB0" or "COM3").
    pub port: Option<String>,
    /// Default baud rate.
    pub baud: Option<u32>,
}

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Connection settings.
    #[serde(default)]
    pub connection: ConnectionConfig,
}

impl Config {
    /// Load configuration from all available sources.
    pub fn load() -> Self {
        let mut config = Self::default();

        if let Some(dirs) = ProjectDirs::from("", "", "tncflash") {
            let global_path = dirs.config_dir().join("config.toml");
            if let Some(global) = Self::load_from_file(&global_path) {
                debug!("loaded global config from {}", global_path.display());
                config.merge(global);
            }
        }

        // Local config overrides global
        if let Some(local) = Self::load_from_file(Path::new("tncflash.toml")) {
            debug!("loaded local config from tncflash.toml");
            config.merge(local);
        }

        config
    }

    /// Load configuration from a specific file path (--config flag).
    pub fn load_from_path(path: &Path) -> Self {
        if let Some(config) = Self::load_from_file(path) {
            debug!("loaded config from {}", path.display());
            config
        } else {
            warn!(
                "could not load config from {}, using defaults",
                path.display()
            );
            Self::default()
        }
    }

    /// Load configuration from a specific file.
    fn load_from_file(path: &Path) -> Option<Self> {
        if !path.exists() {
            return None;
        }

        match fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => Some(config),
                Err(e) => {
                    warn!("failed to parse config file {}: {}", path.display(), e);
                    None
                }
            },
            Err(e) => {
                warn!("failed to read config file {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Overlay `other` on top of this configuration.
    fn merge(&mut self, other: Self) {
        if other.connection.port.is_some() {
            self.connection.port = other.connection.port;
        }
        if other.connection.baud.is_some() {
            self.connection.baud = other.connection.baud;
        }
    }
}
