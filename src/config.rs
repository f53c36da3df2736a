//! # Configuration Management
//!
//! Centralized configuration for packet connections and logging.
//!
//! ## Configuration Sources
//! - TOML files via `from_file()`
//! - Direct instantiation with defaults and struct update syntax
//! - Environment overrides via `from_env()`
//!
//! ## Security Considerations
//! - `max_packet_size` bounds how much memory a misbehaving peer can make a
//!   single `read_packet` call accumulate. It is unset by default because the
//!   wire protocol itself has no packet ceiling.

use crate::core::header::MAX_PAYLOAD_LEN;
use crate::error::{PacketError, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::Level;

/// Capacity of the buffered reader placed over the stream
pub const DEFAULT_READ_BUFFER_SIZE: usize = 4096;

/// Starting capacity of the accumulator used by `read_packet`
pub const DEFAULT_INITIAL_READ_CAPACITY: usize = 64 * 1024;

/// Top-level configuration
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct FramingConfig {
    /// Per-connection framing settings
    #[serde(default)]
    pub connection: ConnectionConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl FramingConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(path)
            .map_err(|e| PacketError::ConfigError(format!("Failed to open config file: {e}")))?;

        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .map_err(|e| PacketError::ConfigError(format!("Failed to read config file: {e}")))?;

        Self::from_toml(&contents)
    }

    /// Load configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str::<Self>(content)
            .map_err(|e| PacketError::ConfigError(format!("Failed to parse TOML: {e}")))
    }

    /// Load configuration from environment variables on top of the defaults
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(size) = std::env::var("PACKET_CONN_READ_BUFFER_SIZE") {
            config.connection.read_buffer_size = parse_env("PACKET_CONN_READ_BUFFER_SIZE", &size)?;
        }

        if let Ok(len) = std::env::var("PACKET_CONN_MAX_PAYLOAD_LEN") {
            config.connection.max_payload_len = parse_env("PACKET_CONN_MAX_PAYLOAD_LEN", &len)?;
        }

        if let Ok(limit) = std::env::var("PACKET_CONN_MAX_PACKET_SIZE") {
            config.connection.max_packet_size =
                Some(parse_env("PACKET_CONN_MAX_PACKET_SIZE", &limit)?);
        }

        if let Ok(allow) = std::env::var("PACKET_CONN_ALLOW_EMPTY_PACKETS") {
            config.connection.allow_empty_packets =
                parse_env("PACKET_CONN_ALLOW_EMPTY_PACKETS", &allow)?;
        }

        if let Ok(level) = std::env::var("PACKET_CONN_LOG_LEVEL") {
            config.logging.log_level = level
                .parse::<Level>()
                .map_err(|_| PacketError::ConfigError(format!("Invalid log level: {level}")))?;
        }

        Ok(config)
    }

    /// Generate example configuration file content
    pub fn example_config() -> String {
        toml::to_string_pretty(&Self::default())
            .unwrap_or_else(|_| String::from("# Failed to generate example config"))
    }

    /// Validate the configuration
    ///
    /// Returns a list of validation errors. Empty list means configuration is valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        errors.extend(self.connection.validate());
        errors.extend(self.logging.validate());
        errors
    }

    /// Validate and return Result - convenience method
    pub fn validate_strict(&self) -> Result<()> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(PacketError::ConfigError(format!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            )))
        }
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value
        .parse::<T>()
        .map_err(|_| PacketError::ConfigError(format!("Invalid value for {name}: '{value}'")))
}

/// Per-connection framing settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Capacity of the buffered reader over the stream
    pub read_buffer_size: usize,

    /// Starting capacity of the `read_packet` accumulator
    pub initial_read_capacity: usize,

    /// Largest payload a single frame carries; a frame of exactly this
    /// length means more frames follow. Both peers must agree on it.
    pub max_payload_len: u32,

    /// Upper bound on a reassembled logical packet, if any
    pub max_packet_size: Option<usize>,

    /// Accept a zero-length first frame as an empty logical packet
    pub allow_empty_packets: bool,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            initial_read_capacity: DEFAULT_INITIAL_READ_CAPACITY,
            max_payload_len: MAX_PAYLOAD_LEN,
            max_packet_size: None,
            allow_empty_packets: false,
        }
    }
}

impl ConnectionConfig {
    /// Validate connection configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.read_buffer_size == 0 {
            errors.push("Read buffer size must be greater than 0".to_string());
        } else if self.read_buffer_size > 16 * 1024 * 1024 {
            errors.push(format!(
                "Read buffer size too large: {} bytes (maximum: 16 MB)",
                self.read_buffer_size
            ));
        }

        if self.max_payload_len == 0 {
            errors.push("Max payload length must be greater than 0".to_string());
        } else if self.max_payload_len > MAX_PAYLOAD_LEN {
            errors.push(format!(
                "Max payload length {} does not fit the 24-bit length field (maximum: {MAX_PAYLOAD_LEN})",
                self.max_payload_len
            ));
        }

        if let Some(limit) = self.max_packet_size {
            if limit == 0 {
                errors.push("Max packet size must be greater than 0 when set".to_string());
            }
        }

        errors
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Application name for logs
    pub app_name: String,

    /// Log level
    #[serde(with = "log_level_serde")]
    pub log_level: Level,

    /// Whether to use JSON formatting for logs
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            app_name: String::from("packet-conn"),
            log_level: Level::INFO,
            json_format: false,
        }
    }
}

impl LoggingConfig {
    /// Validate logging configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.app_name.is_empty() {
            errors.push("Application name cannot be empty".to_string());
        } else if self.app_name.len() > 64 {
            errors.push(format!(
                "Application name too long: {} characters (maximum: 64)",
                self.app_name.len()
            ));
        }

        errors
    }
}

/// Log levels are written as lowercase names (`"info"`, `"debug"`, ...).
mod log_level_serde {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};
    use tracing::Level;

    pub fn serialize<S: Serializer>(level: &Level, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&level.to_string().to_lowercase())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Level, D::Error> {
        let name = String::deserialize(deserializer)?;
        name.parse::<Level>()
            .map_err(|_| D::Error::custom(format!("Invalid log level: {name}")))
    }
}
