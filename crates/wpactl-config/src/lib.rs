#![deny(unsafe_code)]

//! Configuration loading and validation for wpactl.
//!
//! Loads TOML configuration files and validates them. [`AppConfig`] is the
//! top-level structure; [`ControlConfig`] carries everything a control
//! connection needs at connect time (socket locations, timeouts, event
//! subscription), so no process-wide state is involved.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Errors that can occur during configuration loading and validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("validation error: {0}")]
    Validation(String),
}

/// Top-level application configuration.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Control-interface connection settings.
    #[serde(default)]
    pub control: ControlConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Settings for a control-interface connection.
///
/// ## TOML Example
///
/// ```toml
/// [control]
/// socket_dir = "/run/wpa_supplicant"
/// client_dir = "/tmp"
/// command_timeout_ms = 30000
/// shutdown_timeout_ms = 20000
/// attach_events = true
/// event_capacity = 16
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlConfig {
    /// Directory holding one daemon socket per network interface.
    #[serde(default = "default_socket_dir")]
    pub socket_dir: PathBuf,

    /// Directory in which the client binds its own (temporary) socket.
    #[serde(default = "default_client_dir")]
    pub client_dir: PathBuf,

    /// How long a command waits for its reply, in milliseconds.
    #[serde(default = "default_command_timeout_ms")]
    pub command_timeout_ms: u64,

    /// How long closing waits for each background task, in milliseconds.
    #[serde(default = "default_shutdown_timeout_ms")]
    pub shutdown_timeout_ms: u64,

    /// Subscribe to unsolicited events (`ATTACH`) on connect.
    #[serde(default = "default_attach_events")]
    pub attach_events: bool,

    /// Number of decoded events buffered for the consumer.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            socket_dir: default_socket_dir(),
            client_dir: default_client_dir(),
            command_timeout_ms: default_command_timeout_ms(),
            shutdown_timeout_ms: default_shutdown_timeout_ms(),
            attach_events: default_attach_events(),
            event_capacity: default_event_capacity(),
        }
    }
}

impl ControlConfig {
    /// Path of the daemon socket for `interface`.
    pub fn socket_path(&self, interface: &str) -> PathBuf {
        self.socket_dir.join(interface)
    }

    /// Reply timeout as a [`Duration`].
    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }

    /// Per-task shutdown timeout as a [`Duration`].
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.socket_dir.as_os_str().is_empty() {
            return Err(ConfigError::Validation(
                "control.socket_dir must not be empty".to_string(),
            ));
        }
        if self.client_dir.as_os_str().is_empty() {
            return Err(ConfigError::Validation(
                "control.client_dir must not be empty".to_string(),
            ));
        }
        if self.command_timeout_ms == 0 {
            return Err(ConfigError::Validation(
                "control.command_timeout_ms must be non-zero".to_string(),
            ));
        }
        if self.shutdown_timeout_ms == 0 {
            return Err(ConfigError::Validation(
                "control.shutdown_timeout_ms must be non-zero".to_string(),
            ));
        }
        if self.event_capacity == 0 {
            return Err(ConfigError::Validation(
                "control.event_capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

fn default_socket_dir() -> PathBuf {
    PathBuf::from("/run/wpa_supplicant")
}

fn default_client_dir() -> PathBuf {
    PathBuf::from("/tmp")
}

fn default_command_timeout_ms() -> u64 {
    30_000
}

fn default_shutdown_timeout_ms() -> u64 {
    20_000
}

fn default_attach_events() -> bool {
    true
}

fn default_event_capacity() -> usize {
    16
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g. "info", "debug", "trace").
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl AppConfig {
    /// Load configuration from a TOML file at the given path using async I/O.
    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = tokio::fs::read_to_string(path).await?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.control.validate()?;

        let valid_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(ConfigError::Validation(format!(
                "logging.level must be one of {:?}, got {:?}",
                valid_levels, self.logging.level
            )));
        }

        Ok(())
    }
}
