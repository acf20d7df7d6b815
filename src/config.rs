//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.

use serde::Deserialize;
use serde::de::Error;
use std::fs;
use std::path::Path;

use crate::error::Result;
use crate::frame::protocol::DEFAULT_MAX_FRAME_BYTES;
use crate::listener::handler::Framing;
use crate::probe::ProbeMode;
use crate::telemetry::log::HeaderPolicy;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub listener: ListenerConfig,

    #[serde(default)]
    pub log: LogConfig,

    #[serde(default)]
    pub probe: ProbeConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Ingestion listener configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ListenerConfig {
    #[serde(default = "default_listen_host")]
    pub host: String,

    #[serde(default = "default_listen_port")]
    pub port: u16,

    #[serde(default = "default_backlog")]
    pub backlog: u32,

    #[serde(default = "default_max_frame_bytes")]
    pub max_frame_bytes: usize,

    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,

    #[serde(default)]
    pub framing: Framing,

    #[serde(default = "default_strict")]
    pub strict: bool,
}

/// Telemetry log configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LogConfig {
    #[serde(default = "default_log_path")]
    pub path: String,

    #[serde(default)]
    pub header_policy: HeaderPolicy,
}

/// Reachability probe configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ProbeConfig {
    #[serde(default = "default_probe_host")]
    pub host: String,

    #[serde(default = "default_listen_port")]
    pub port: u16,

    #[serde(default = "default_retry_interval_ms")]
    pub retry_interval_ms: u64,

    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    #[serde(default)]
    pub mode: ProbeMode,
}

/// Diagnostic logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Directory for daily rolling diagnostic logs; stdout only when empty
    #[serde(default)]
    pub dir: String,
}

// Default value functions
fn default_listen_host() -> String { "0.0.0.0".to_string() }
fn default_listen_port() -> u16 { 8080 }
fn default_backlog() -> u32 { 5 }
fn default_max_frame_bytes() -> usize { DEFAULT_MAX_FRAME_BYTES }
fn default_read_timeout_ms() -> u64 { 2000 }
fn default_strict() -> bool { true }

fn default_log_path() -> String { "datos.csv".to_string() }

fn default_probe_host() -> String { "127.0.0.1".to_string() }
fn default_retry_interval_ms() -> u64 { 5000 }
fn default_connect_timeout_ms() -> u64 { 3000 }

fn default_log_level() -> String { "info".to_string() }

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            host: default_listen_host(),
            port: default_listen_port(),
            backlog: default_backlog(),
            max_frame_bytes: default_max_frame_bytes(),
            read_timeout_ms: default_read_timeout_ms(),
            framing: Framing::default(),
            strict: default_strict(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            path: default_log_path(),
            header_policy: HeaderPolicy::default(),
        }
    }
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            host: default_probe_host(),
            port: default_listen_port(),
            retry_interval_ms: default_retry_interval_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
            mode: ProbeMode::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            dir: String::new(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    ///
    /// * `Result<Config>` - Loaded and validated configuration
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use telemetry_ingest::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// Called by [`Config::load`], and again by the binary after command-line
    /// overrides are applied.
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    pub fn validate(&self) -> Result<()> {
        if self.listener.host.is_empty() {
            return Err(crate::error::TelemetryError::Config(
                toml::de::Error::custom("listener host cannot be empty")
            ));
        }

        if self.listener.backlog == 0 || self.listener.backlog > 1024 {
            return Err(crate::error::TelemetryError::Config(
                toml::de::Error::custom("backlog must be between 1 and 1024")
            ));
        }

        if self.listener.max_frame_bytes == 0 || self.listener.max_frame_bytes > 65536 {
            return Err(crate::error::TelemetryError::Config(
                toml::de::Error::custom("max_frame_bytes must be between 1 and 65536")
            ));
        }

        if self.listener.read_timeout_ms == 0 || self.listener.read_timeout_ms > 60000 {
            return Err(crate::error::TelemetryError::Config(
                toml::de::Error::custom("read_timeout_ms must be between 1 and 60000")
            ));
        }

        if self.log.path.is_empty() {
            return Err(crate::error::TelemetryError::Config(
                toml::de::Error::custom("log path cannot be empty")
            ));
        }

        if self.probe.host.is_empty() {
            return Err(crate::error::TelemetryError::Config(
                toml::de::Error::custom("probe host cannot be empty")
            ));
        }

        // Port 0 means "any port" for a listener but is never a valid target
        if self.probe.port == 0 {
            return Err(crate::error::TelemetryError::Config(
                toml::de::Error::custom("probe port must be greater than 0")
            ));
        }

        if self.probe.retry_interval_ms == 0 || self.probe.retry_interval_ms > 600000 {
            return Err(crate::error::TelemetryError::Config(
                toml::de::Error::custom("retry_interval_ms must be between 1 and 600000")
            ));
        }

        if self.probe.connect_timeout_ms == 0 || self.probe.connect_timeout_ms > 60000 {
            return Err(crate::error::TelemetryError::Config(
                toml::de::Error::custom("connect_timeout_ms must be between 1 and 60000")
            ));
        }

        if !["trace", "debug", "info", "warn", "error"].contains(&self.logging.level.as_str()) {
            return Err(crate::error::TelemetryError::Config(
                toml::de::Error::custom("logging level must be one of: trace, debug, info, warn, error")
            ));
        }

        Ok(())
    }
}
