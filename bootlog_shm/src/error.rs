//! Error types for region setup, image parsing and scanning.
//!
//! The write path itself never returns errors: invalid calls are no-ops,
//! overflow is accounted, and corruption poisons the channel.

use thiserror::Error;

/// Errors that can occur while setting up a backing region
#[derive(Error, Debug)]
pub enum RegionError {
    /// Region cannot even hold the control block
    #[error("Region too small: {size} bytes (need at least {min})")]
    TooSmall {
        /// Offered size in bytes
        size: usize,
        /// Required minimum in bytes
        min: usize,
    },

    /// Region base address is not aligned for the control block
    #[error("Memory alignment error: address {address:#x} not aligned to {alignment}")]
    Misaligned {
        /// Base address
        address: usize,
        /// Required alignment
        alignment: usize,
    },

    /// IO error
    #[error("IO error: {source}")]
    Io {
        /// Source IO error
        #[from]
        source: std::io::Error,
    },
}

/// Result type for region operations
pub type RegionResult<T> = Result<T, RegionError>;

/// Errors that can occur while parsing an offline copy of a region
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ImageError {
    /// Image is shorter than the control block
    #[error("Image too short: {len} bytes")]
    TooShort {
        /// Image length in bytes
        len: usize,
    },

    /// Control block signature mismatch
    #[error("Bad control block signature: {found:#010x}")]
    BadSignature {
        /// Signature found in the image
        found: u32,
    },

    /// Control block version mismatch
    #[error("Unsupported control block version: {found}")]
    BadVersion {
        /// Version found in the image
        found: u16,
    },

    /// Control block fields contradict each other or the image size
    #[error("Inconsistent control block: {0}")]
    Inconsistent(String),
}

/// Reasons an entry scan stops early
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanError {
    /// Slot reserved but its signature is not yet published
    #[error("Entry at offset {offset} is still being written")]
    InFlight {
        /// Offset of the entry from the buffer base
        offset: usize,
    },

    /// Entry header or payload runs past the cursor
    #[error("Entry at offset {offset} runs past the end of the log")]
    Truncated {
        /// Offset of the entry from the buffer base
        offset: usize,
    },
}

/// Structural problems that poison a channel
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntegrityViolation {
    /// Signature or version no longer match
    #[error("control block signature/version mismatch")]
    BadSignature,

    /// `buffer_base` no longer points right after the control block
    #[error("buffer base {found:#x} does not match expected {expected:#x}")]
    BaseMismatch {
        /// Value found in the control block
        found: u64,
        /// Expected address
        expected: u64,
    },

    /// `cursor` left the payload region or lost its alignment
    #[error("cursor {cursor:#x} outside [{base:#x}, {limit:#x}]")]
    CursorOutOfBounds {
        /// Value found in the control block
        cursor: u64,
        /// Payload region start
        base: u64,
        /// Payload region end
        limit: u64,
    },

    /// `buffer_size` changed after it was locked
    #[error("buffer size changed from {locked} to {found}")]
    SizeChanged {
        /// Value found in the control block
        found: u32,
        /// Value locked at first observation
        locked: u32,
    },
}
