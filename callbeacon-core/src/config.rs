//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/callbeacon/config.toml`
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/callbeacon/` (~/.config/callbeacon/)
//! - State/Logs: `$XDG_STATE_HOME/callbeacon/` (~/.local/state/callbeacon/)

use crate::error::{Error, Result};
use crate::types::PrivacyConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::level_filters::LevelFilter;

/// Returns a best-effort home directory path.
fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Returns XDG_CONFIG_HOME or ~/.config
fn xdg_config_home() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
}

/// Returns XDG_STATE_HOME or ~/.local/state
fn xdg_state_home() -> PathBuf {
    std::env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/state"))
}

/// Main configuration struct
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Telemetry pipeline configuration
    #[serde(default)]
    pub telemetry: TelemetryConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
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

impl LoggingConfig {
    /// Parse `level` into a filter (`off`, `error`, `warn`, `info`, `debug`, `trace`)
    pub fn level_filter(&self) -> Result<LevelFilter> {
        self.level.parse().map_err(|_| {
            Error::Config(format!(
                "logging.level must be one of off, error, warn, info, debug, trace; got {:?}",
                self.level
            ))
        })
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Telemetry pipeline configuration
///
/// Nothing is uploaded until `endpoint` is set.
#[derive(Debug, Deserialize, Clone)]
pub struct TelemetryConfig {
    /// Collection endpoint receiving batched uploads
    pub endpoint: Option<String>,

    /// Time authority used for clock-skew correction
    #[serde(default = "default_clock_url")]
    pub clock_url: String,

    /// Quiet period after the last submission before a flush, in milliseconds
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// HTTP request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Which event fields may leave the process
    #[serde(default)]
    pub privacy: PrivacyConfig,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            clock_url: default_clock_url(),
            debounce_ms: default_debounce_ms(),
            timeout_secs: default_timeout(),
            privacy: PrivacyConfig::default(),
        }
    }
}

impl TelemetryConfig {
    /// Check if an endpoint is configured and the policy allows sending anything
    pub fn is_ready(&self) -> bool {
        self.endpoint.is_some() && self.privacy != PrivacyConfig::Flag(false)
    }

    /// Validate configuration, returning error message if invalid
    pub fn validate(&self) -> Result<()> {
        if let Some(endpoint) = &self.endpoint {
            if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
                return Err(Error::Config(format!(
                    "telemetry.endpoint must be an http(s) URL, got {:?}",
                    endpoint
                )));
            }
        }
        if !self.clock_url.starts_with("http://") && !self.clock_url.starts_with("https://") {
            return Err(Error::Config(format!(
                "telemetry.clock_url must be an http(s) URL, got {:?}",
                self.clock_url
            )));
        }
        if self.timeout_secs == 0 {
            return Err(Error::Config(
                "telemetry.timeout_secs must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// The debounce window as a [`Duration`]
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

fn default_clock_url() -> String {
    "https://worldtimeapi.org/api/timezone/Etc/UTC".to_string()
}

fn default_debounce_ms() -> u64 {
    10_000
}

fn default_timeout() -> u64 {
    30
}

impl Config {
    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            return Ok(Config::default());
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;

        config.telemetry.validate()?;
        config.logging.level_filter()?;
        Ok(config)
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/callbeacon/config.toml` (~/.config/callbeacon/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("callbeacon").join("config.toml")
    }

    /// Returns the state directory path (for logs)
    ///
    /// `$XDG_STATE_HOME/callbeacon/` (~/.local/state/callbeacon/)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("callbeacon")
    }

    /// Returns the log file path
    pub fn log_path() -> PathBuf {
        Self::state_dir().join("callbeacon.log")
    }
}
