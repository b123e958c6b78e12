//! Configuration loading traits and types.
//!
//! This module provides a standardized way to load TOML configuration files
//! for the bootlog tooling.
//!
//! # Usage
//!
//! ```rust,no_run
//! use bootlog_common::config::{ChannelConfig, ConfigError, ConfigLoader};
//! use std::path::Path;
//!
//! fn main() -> Result<(), ConfigError> {
//!     let config = ChannelConfig::load(Path::new("bootlog.toml"))?;
//!     config.validate()?;
//!     println!("Region: {}", config.region.path.display());
//!     Ok(())
//! }
//! ```

use crate::consts::DEFAULT_REGION_PATH;
use crate::shm::consts::MIN_REGION_SIZE;
use crate::shm::layout::ControlBlock;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Error type for configuration loading operations.
///
/// This enum represents all possible errors that can occur when loading
/// configuration files.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// Configuration file not found at specified path.
    #[error("Configuration file not found")]
    FileNotFound,

    /// TOML parsing failed.
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    /// Semantic validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

/// Log level for application logging.
///
/// Represents the verbosity level of logging output.
/// Uses lowercase serde values for TOML compatibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Most verbose, detailed tracing information.
    Trace,
    /// Debug information useful during development.
    Debug,
    /// General information about application operation.
    #[default]
    Info,
    /// Warning messages for potentially problematic situations.
    Warn,
    /// Error messages for serious problems.
    Error,
}

impl LogLevel {
    /// Lowercase name, usable as an `EnvFilter` directive.
    pub const fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Common configuration fields shared across bootlog applications.
///
/// # TOML Example
///
/// ```toml
/// [shared]
/// log_level = "debug"
/// service_name = "bootlog-recorder"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharedConfig {
    /// Logging verbosity level.
    #[serde(default)]
    pub log_level: LogLevel,

    /// Application instance identifier.
    pub service_name: String,
}

impl SharedConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if:
    /// - `service_name` is empty
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.service_name.is_empty() {
            return Err(ConfigError::ValidationError(
                "service_name cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for SharedConfig {
    fn default() -> Self {
        Self {
            log_level: LogLevel::default(),
            service_name: "bootlog".to_string(),
        }
    }
}

/// Backing region of a file-hosted channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegionConfig {
    /// File mapped as the region.
    #[serde(default = "default_region_path")]
    pub path: PathBuf,

    /// Region size in bytes, control block included.
    #[serde(default = "default_region_size")]
    pub size: usize,

    /// Lock the mapping into RAM.
    #[serde(default)]
    pub locked: bool,
}

fn default_region_path() -> PathBuf {
    PathBuf::from(DEFAULT_REGION_PATH)
}

fn default_region_size() -> usize {
    MIN_REGION_SIZE
}

impl Default for RegionConfig {
    fn default() -> Self {
        Self {
            path: default_region_path(),
            size: default_region_size(),
            locked: false,
        }
    }
}

/// Secondary byte-sink settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HdwPortConfig {
    /// Stamp `HDW_PORT_DISABLED` into the control block at init.
    #[serde(default)]
    pub disabled: bool,
}

/// Full configuration of a file-hosted channel.
///
/// # TOML Example
///
/// ```toml
/// [shared]
/// service_name = "bootlog-recorder"
///
/// [region]
/// path = "/tmp/bootlog.bin"
/// size = 1048576
///
/// [hdw_port]
/// disabled = true
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Common fields.
    #[serde(default)]
    pub shared: SharedConfig,

    /// Backing region.
    #[serde(default)]
    pub region: RegionConfig,

    /// Secondary byte sink.
    #[serde(default)]
    pub hdw_port: HdwPortConfig,
}

impl ChannelConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if:
    /// - `shared` is invalid
    /// - `region.size` is below the 64 KiB minimum
    /// - the payload part of `region.size` (everything after the control
    ///   block) exceeds what a 32-bit buffer size can describe
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.shared.validate()?;

        if self.region.size < MIN_REGION_SIZE {
            return Err(ConfigError::ValidationError(format!(
                "region.size {} is below the minimum of {} bytes",
                self.region.size, MIN_REGION_SIZE
            )));
        }
        let payload = (self.region.size - size_of::<ControlBlock>()) as u64;
        if payload > u32::MAX as u64 {
            return Err(ConfigError::ValidationError(format!(
                "region.size {} leaves {} payload bytes, more than a 32-bit buffer size",
                self.region.size, payload
            )));
        }
        Ok(())
    }
}

/// Trait for loading configuration from TOML files.
///
/// This trait provides a default implementation that works with any type
/// implementing `serde::de::DeserializeOwned`.
///
/// # Contract
///
/// - Returns `ConfigError::FileNotFound` if the file does not exist
/// - Returns `ConfigError::ParseError` if TOML syntax is invalid
pub trait ConfigLoader: Sized + serde::de::DeserializeOwned {
    /// Load configuration from a TOML file.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the TOML configuration file
    fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::FileNotFound
            } else {
                ConfigError::ParseError(e.to_string())
            }
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }
}

// Blanket implementation for all types that implement DeserializeOwned.
impl<T: serde::de::DeserializeOwned> ConfigLoader for T {}
