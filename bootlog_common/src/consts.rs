//! System-wide constants for the bootlog workspace.
//!
//! Single source of truth for message limits and default paths.
//! Imported by all crates; do not duplicate these elsewhere.

/// Largest payload a single entry can carry (the entry length field is 16 bits).
pub const MAX_MESSAGE_LEN: usize = u16::MAX as usize;

/// Capacity of the intermediate buffer used by the formatted-print wrapper.
///
/// Rendered output longer than this is truncated before it reaches the ring.
pub const PRINT_BUFFER_SIZE: usize = 512;

/// Default configuration file consumed by `bootlog_tool`.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/bootlog/bootlog.toml";

/// Default file backing the region when no configuration is given.
pub const DEFAULT_REGION_PATH: &str = "/tmp/bootlog.bin";
