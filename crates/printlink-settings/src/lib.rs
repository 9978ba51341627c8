//! Configuration and settings management for printlink
//!
//! Provides the configuration model, JSON/TOML file handling, validation and
//! the platform-specific default location.

pub mod config;
pub mod error;

pub use config::{Config, DeviceSettings, GatewaySettings, LoggingSettings, SessionSettings};
pub use error::{Result, SettingsError};
