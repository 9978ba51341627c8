//! Configuration for printlink
//!
//! Configuration is organized into logical sections:
//! - Device settings (endpoint path, optional serial baud rate)
//! - Gateway settings (listener address, WebSocket path, fan-out capacity)
//! - Session settings (handshake, status poll, reply timeout)
//! - Logging settings
//!
//! Files may be JSON or TOML; every field has a default so partial files are
//! fine.

use crate::error::{Result, SettingsError};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Device endpoint settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceSettings {
    /// Path of the device stream (pseudo terminal or serial port)
    pub path: PathBuf,
    /// Serial baud rate; `None` opens the path as a plain file-like endpoint
    pub baud_rate: Option<u32>,
}

impl Default for DeviceSettings {
    fn default() -> Self {
        Self {
            path: PathBuf::from("/tmp/printer"),
            baud_rate: None,
        }
    }
}

/// Client-facing WebSocket listener settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewaySettings {
    /// Address to bind
    pub bind_address: String,
    /// TCP port
    pub port: u16,
    /// WebSocket request path
    pub path: String,
    /// Device chunks buffered per client before it counts as lagging
    pub broadcast_capacity: usize,
    /// Mirror raw device output to standard output
    pub mirror_to_stdout: bool,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 3000,
            path: "/".to_string(),
            broadcast_capacity: 1024,
            mirror_to_stdout: true,
        }
    }
}

impl GatewaySettings {
    /// Resolve the listener address
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.bind_address, self.port)
            .parse()
            .map_err(|e| SettingsError::invalid("gateway.bind_address", format!("{}", e)))
    }
}

/// Device session settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Command sent once per new connection
    pub handshake_command: String,
    /// Status query enqueued on every poll tick when not already queued
    pub poll_command: String,
    /// Poll interval in milliseconds
    pub poll_interval_ms: u64,
    /// Warn when a command waits longer than this; 0 disables the check
    pub reply_timeout_ms: u64,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            handshake_command: "M20".to_string(),
            poll_command: "M105".to_string(),
            poll_interval_ms: 1000,
            reply_timeout_ms: 30_000,
        }
    }
}

impl SessionSettings {
    /// Poll interval as a duration
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Reply timeout as a duration, `None` when disabled
    pub fn reply_timeout(&self) -> Option<Duration> {
        (self.reply_timeout_ms > 0).then(|| Duration::from_millis(self.reply_timeout_ms))
    }
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Default level directive when RUST_LOG is unset
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Complete application configuration
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Device endpoint
    pub device: DeviceSettings,
    /// WebSocket gateway
    pub gateway: GatewaySettings,
    /// Session protocol
    pub session: SessionSettings,
    /// Logging
    pub logging: LoggingSettings,
}

impl Config {
    /// Create new config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Default config file location: `<config_dir>/printlink/config.toml`
    pub fn default_path() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|dir| dir.join("printlink").join("config.toml"))
            .ok_or_else(|| {
                SettingsError::ConfigDirectory("no configuration directory on this platform".into())
            })
    }

    /// Load the default config file, falling back to defaults when absent
    pub fn load_or_default() -> Result<Self> {
        match Self::default_path() {
            Ok(path) if path.exists() => Self::load_from_file(&path),
            Ok(path) => {
                tracing::debug!("No config at {}, using defaults", path.display());
                Ok(Self::default())
            }
            Err(e) => {
                tracing::debug!("{}, using defaults", e);
                Ok(Self::default())
            }
        }
    }

    /// Load config from file (JSON or TOML)
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            SettingsError::LoadError(format!("{}: {}", path.display(), e))
        })?;

        let config: Self = match Format::from_path(path)? {
            Format::Json => serde_json::from_str(&content)?,
            Format::Toml => toml::from_str(&content)?,
        };

        config.validate()?;
        tracing::info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Save config to file (JSON or TOML)
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        self.validate()?;

        let content = match Format::from_path(path)? {
            Format::Json => serde_json::to_string_pretty(self)?,
            Format::Toml => toml::to_string_pretty(self)?,
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)
            .map_err(|e| SettingsError::SaveError(format!("{}: {}", path.display(), e)))?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.device.path.as_os_str().is_empty() {
            return Err(SettingsError::invalid("device.path", "must not be empty"));
        }

        if self.device.baud_rate == Some(0) {
            return Err(SettingsError::invalid("device.baud_rate", "must be > 0"));
        }

        if !self.gateway.path.starts_with('/') {
            return Err(SettingsError::invalid("gateway.path", "must start with '/'"));
        }

        if self.gateway.broadcast_capacity == 0 {
            return Err(SettingsError::invalid(
                "gateway.broadcast_capacity",
                "must be > 0",
            ));
        }

        self.gateway.socket_addr()?;

        for (key, command) in [
            ("session.handshake_command", &self.session.handshake_command),
            ("session.poll_command", &self.session.poll_command),
        ] {
            if command.contains(['\r', '\n']) {
                return Err(SettingsError::invalid(key, "must be a single line"));
            }
        }

        if self.session.poll_interval_ms == 0 {
            return Err(SettingsError::invalid(
                "session.poll_interval_ms",
                "must be > 0",
            ));
        }

        Ok(())
    }
}

enum Format {
    Json,
    Toml,
}

impl Format {
    fn from_path(path: &Path) -> Result<Self> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Ok(Format::Json),
            Some("toml") => Ok(Format::Toml),
            _ => Err(SettingsError::LoadError(format!(
                "{}: config file must be .json or .toml",
                path.display()
            ))),
        }
    }
}
