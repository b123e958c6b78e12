//! Tool-level errors

use bootlog_common::config::ConfigError;
use bootlog_shm::{ImageError, RegionError};
use thiserror::Error;

/// Everything that can stop the tool
#[derive(Error, Debug)]
pub enum ToolError {
    /// Configuration could not be loaded or is invalid
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Backing region could not be created or mapped
    #[error("Region error: {0}")]
    Region(#[from] RegionError),

    /// Region image is not a valid log
    #[error("Image error: {0}")]
    Image(#[from] ImageError),

    /// Channel refused access after setup
    #[error("Channel unavailable at {path}")]
    Unavailable {
        /// Region file
        path: String,
    },

    /// Reading input or writing output failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for tool operations
pub type ToolResult<T> = Result<T, ToolError>;
