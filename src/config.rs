//! CLI configuration.
//!
//! Configuration is loaded in the following order (later overrides earlier):
//! 1. Default values
//! 2. YAML config file (if specified via TUP_CONFIG or --config)
//! 3. Environment variables

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tup_protocol::{Version, VERSION_FLAT, VERSION_LEGACY};

/// Defaults applied to packets built by `tup encode`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Field layout version, 2 or 3.
    pub version: i16,
    /// Packet type tag.
    pub packet_type: i8,
    /// Message type flags.
    pub message_type: i32,
    /// Timeout in milliseconds.
    pub timeout_ms: i32,
    /// Context entries attached to every request.
    pub context: HashMap<String, String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: VERSION_FLAT,
            packet_type: 0,
            message_type: 0,
            timeout_ms: 3000,
            context: HashMap::new(),
        }
    }
}

impl Config {
    /// Loads configuration from `path` (or TUP_CONFIG), then applies
    /// environment variable overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var("TUP_CONFIG").ok().map(PathBuf::from));

        let mut config = match path {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(path.to_path_buf(), e))?;
        let config: Config = serde_yaml::from_str(&content)
            .map_err(|e| ConfigError::ParseError(path.to_path_buf(), e.to_string()))?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(version) = std::env::var("TUP_VERSION") {
            if let Ok(v) = version.parse() {
                self.version = v;
            }
        }

        if let Ok(timeout) = std::env::var("TUP_TIMEOUT_MS") {
            if let Ok(ms) = timeout.parse() {
                self.timeout_ms = ms;
            }
        }

        if let Ok(packet_type) = std::env::var("TUP_PACKET_TYPE") {
            if let Ok(t) = packet_type.parse() {
                self.packet_type = t;
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version != VERSION_LEGACY && self.version != VERSION_FLAT {
            return Err(ConfigError::ValidationError(format!(
                "version must be {} or {}, got {}",
                VERSION_LEGACY, VERSION_FLAT, self.version
            )));
        }
        if self.timeout_ms < 0 {
            return Err(ConfigError::ValidationError(
                "timeout_ms must not be negative".to_string(),
            ));
        }
        Ok(())
    }

    pub fn packet_version(&self) -> Version {
        if self.version == VERSION_LEGACY {
            Version::Legacy
        } else {
            Version::Flat
        }
    }
}

/// Configuration error.
#[derive(Debug)]
pub enum ConfigError {
    IoError(PathBuf, std::io::Error),
    ParseError(PathBuf, String),
    ValidationError(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(path, e) => {
                write!(f, "failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::ParseError(path, e) => {
                write!(f, "failed to parse config file '{}': {}", path.display(), e)
            }
            ConfigError::ValidationError(msg) => {
                write!(f, "configuration validation failed: {}", msg)
            }
        }
    }
}

impl std::error::Error for ConfigError {}
