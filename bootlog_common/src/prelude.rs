//! Prelude module for common re-exports.
//!
//! ```rust
//! use bootlog_common::prelude::*;
//! ```

// ─── Configuration ──────────────────────────────────────────────────
pub use crate::config::{ChannelConfig, ConfigError, ConfigLoader, LogLevel, SharedConfig};

// ─── Limits ─────────────────────────────────────────────────────────
pub use crate::consts::{MAX_MESSAGE_LEN, PRINT_BUFFER_SIZE};
pub use crate::shm::consts::MIN_REGION_SIZE;

// ─── Layout ─────────────────────────────────────────────────────────
pub use crate::shm::layout::{
    CONTROL_BLOCK_SIGNATURE, ControlBlock, ControlFlags, ENTRY_SIGNATURE, EntryHeader, entry_size,
};
