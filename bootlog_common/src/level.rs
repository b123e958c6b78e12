//! Entry level tags.
//!
//! Levels follow the firmware debug-mask convention: each category is a bit,
//! and a tag may combine several. [`UNKNOWN`] marks text that arrived through
//! the formatted-print wrapper without a category.

/// Initialization messages.
pub const INIT: u32 = 0x0000_0001;
/// Warnings.
pub const WARN: u32 = 0x0000_0002;
/// Image load events.
pub const LOAD: u32 = 0x0000_0004;
/// File system events.
pub const FS: u32 = 0x0000_0008;
/// Informational messages.
pub const INFO: u32 = 0x0000_0040;
/// Detailed debug output.
pub const VERBOSE: u32 = 0x0040_0000;
/// Errors.
pub const ERROR: u32 = 0x8000_0000;
/// Unformatted or uncategorized text.
pub const UNKNOWN: u32 = 0xFFFF_FFFF;

/// Short display name for a level tag.
///
/// Combined tags are named after their most severe bit.
pub fn name(level: u32) -> &'static str {
    match level {
        UNKNOWN => "UNKNOWN",
        l if l & ERROR != 0 => "ERROR",
        l if l & WARN != 0 => "WARN",
        l if l & INFO != 0 => "INFO",
        l if l & INIT != 0 => "INIT",
        l if l & LOAD != 0 => "LOAD",
        l if l & FS != 0 => "FS",
        l if l & VERBOSE != 0 => "VERBOSE",
        _ => "OTHER",
    }
}
