//! SHM (Shared Memory) constants.
//!
//! These constants define the fundamental parameters of the log region.
//! The signatures themselves live in [`crate::shm::layout`].

/// Minimum size of the backing region in bytes (64 KiB).
///
/// A region smaller than this leaves the channel permanently unavailable.
pub const MIN_REGION_SIZE: usize = 65536;

/// CPU cache line size in bytes.
///
/// The control block occupies exactly one cache line so that the cursor and
/// discard counter never share a line with payload bytes.
pub const CACHE_LINE_SIZE: usize = 64;

/// Alignment every entry is rounded up to.
///
/// Keeps entry headers naturally aligned so the 64-bit timestamp and the
/// 32-bit signature can be accessed without unaligned loads.
pub const ENTRY_ALIGNMENT: usize = 8;
