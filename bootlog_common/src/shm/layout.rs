//! Shared memory layout of the log region.
//!
//! Defines the `ControlBlock` (64 bytes, cache-line aligned) that sits at the
//! start of the region and the `EntryHeader` that precedes every record in the
//! payload area.
//!
//! ```text
//! ┌──────────────────────────── region ───────────────────────────────┐
//! │ ControlBlock (64B) │ Entry │ Entry │ Entry │ ...free... │          │
//! └────────────────────┴───────┴───────┴───────┴────────────┴──────────┘
//!                      ^buffer_base            ^cursor       ^buffer_base + buffer_size
//! ```
//!
//! ## Trust
//!
//! The region may be writable by less-trusted code. Every field of the
//! control block is therefore an atomic: tampering from another context is
//! never a data race, it only produces values that fail validation.
//!
//! ## Entry completion
//!
//! A writer stores header and payload with plain stores and then stores the
//! entry signature with `Release` ordering. A reader that observes
//! [`ENTRY_SIGNATURE`] with `Acquire` ordering sees the complete record.

use crate::shm::consts::{CACHE_LINE_SIZE, ENTRY_ALIGNMENT};
use bitflags::bitflags;
use core::mem::{align_of, offset_of, size_of};
use core::sync::atomic::{AtomicU16, AtomicU32, AtomicU64, Ordering};
use static_assertions::const_assert_eq;

/// Control block signature: `"ALOG"` read as a little-endian `u32`.
pub const CONTROL_BLOCK_SIGNATURE: u32 = u32::from_le_bytes(*b"ALOG");

/// Layout version stamped into every control block.
pub const CONTROL_BLOCK_VERSION: u16 = 1;

/// Entry signature: `"ALMS"` read as a little-endian `u32`.
pub const ENTRY_SIGNATURE: u32 = u32::from_le_bytes(*b"ALMS");

bitflags! {
    /// Control block flag word.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ControlFlags: u32 {
        /// Secondary fan-out to the hardware port is suppressed.
        const HDW_PORT_DISABLED    = 0x0000_0001;
        /// The hardware port has been initialized.
        const HDW_PORT_INITIALIZED = 0x0000_0002;
        /// The region lives in permanent memory (survives the current boot phase).
        const IN_PERMANENT_RAM     = 0x0000_0004;
    }
}

impl Default for ControlFlags {
    fn default() -> Self {
        Self::empty()
    }
}

/// Control block: 64 bytes, cache-line aligned, at offset 0 of the region.
///
/// Addresses (`buffer_base`, `cursor`) are absolute in the address space of
/// the context that initialized the block. Offline readers use
/// `cursor - buffer_base` only.
#[repr(C, align(64))]
pub struct ControlBlock {
    /// Must equal [`CONTROL_BLOCK_SIGNATURE`].
    pub signature: AtomicU32,
    /// Must equal [`CONTROL_BLOCK_VERSION`].
    pub version: AtomicU16,
    _reserved0: AtomicU16,
    /// Address of the first payload byte, immediately after this block.
    pub buffer_base: AtomicU64,
    /// Address of the next free payload byte.
    pub cursor: AtomicU64,
    /// Payload bytes dropped because they did not fit.
    pub discarded_bytes: AtomicU32,
    /// Payload capacity in bytes. Fixed once initialized.
    pub buffer_size: AtomicU32,
    /// [`ControlFlags`] bits.
    pub flags: AtomicU32,
    _reserved1: AtomicU32,
    /// Ticks per second of the timestamp source, 0 if unknown.
    pub timer_frequency: AtomicU64,
    _reserved2: [AtomicU64; 2],
}

const_assert_eq!(size_of::<ControlBlock>(), CACHE_LINE_SIZE);
const_assert_eq!(align_of::<ControlBlock>(), CACHE_LINE_SIZE);
const_assert_eq!(offset_of!(ControlBlock, signature), 0);
const_assert_eq!(offset_of!(ControlBlock, version), 4);
const_assert_eq!(offset_of!(ControlBlock, buffer_base), 8);
const_assert_eq!(offset_of!(ControlBlock, cursor), 16);
const_assert_eq!(offset_of!(ControlBlock, discarded_bytes), 24);
const_assert_eq!(offset_of!(ControlBlock, buffer_size), 28);
const_assert_eq!(offset_of!(ControlBlock, flags), 32);
const_assert_eq!(offset_of!(ControlBlock, timer_frequency), 40);

impl ControlBlock {
    /// Signature and version both match the constants stamped at init.
    #[inline]
    pub fn is_stamped(&self) -> bool {
        self.signature.load(Ordering::Acquire) == CONTROL_BLOCK_SIGNATURE
            && self.version.load(Ordering::Acquire) == CONTROL_BLOCK_VERSION
    }

    /// Current flag word. Unknown bits are dropped.
    #[inline]
    pub fn flags(&self) -> ControlFlags {
        ControlFlags::from_bits_truncate(self.flags.load(Ordering::Acquire))
    }

    /// Set additional flags; bits already set are kept.
    pub fn insert_flags(&self, flags: ControlFlags) {
        self.flags.fetch_or(flags.bits(), Ordering::AcqRel);
    }

    /// Secondary fan-out is suppressed.
    #[inline]
    pub fn is_hdw_port_disabled(&self) -> bool {
        self.flags().contains(ControlFlags::HDW_PORT_DISABLED)
    }

    /// Payload bytes consumed so far.
    pub fn used_bytes(&self) -> u64 {
        let base = self.buffer_base.load(Ordering::Acquire);
        self.cursor.load(Ordering::Acquire).saturating_sub(base)
    }

    /// Payload bytes dropped so far.
    #[inline]
    pub fn discarded(&self) -> u32 {
        self.discarded_bytes.load(Ordering::Acquire)
    }

    /// Payload capacity in bytes.
    #[inline]
    pub fn capacity(&self) -> u32 {
        self.buffer_size.load(Ordering::Acquire)
    }
}

/// Fixed-size header of every entry (24 bytes).
///
/// Followed by exactly `length` payload bytes, not NUL-terminated. The whole
/// record is padded to [`ENTRY_ALIGNMENT`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[repr(C)]
pub struct EntryHeader {
    /// [`ENTRY_SIGNATURE`] once the entry is complete, 0 while in flight.
    pub signature: u32,
    /// Severity/category tag.
    pub level: u32,
    /// Timestamp source value captured after the slot was reserved.
    pub timestamp: u64,
    /// Payload length in bytes.
    pub length: u16,
    /// Padding, always zero.
    pub _reserved: [u8; 6],
}

const_assert_eq!(size_of::<EntryHeader>(), 24);
const_assert_eq!(offset_of!(EntryHeader, signature), 0);
const_assert_eq!(offset_of!(EntryHeader, level), 4);
const_assert_eq!(offset_of!(EntryHeader, timestamp), 8);
const_assert_eq!(offset_of!(EntryHeader, length), 16);

/// Size of [`EntryHeader`] in bytes.
pub const ENTRY_HEADER_SIZE: usize = size_of::<EntryHeader>();

/// Round `value` up to the next multiple of `align` (a power of two).
#[inline]
pub const fn align_up(value: usize, align: usize) -> usize {
    (value + align - 1) & !(align - 1)
}

/// Bytes of payload region consumed by an entry carrying `len` payload bytes.
#[inline]
pub const fn entry_size(len: usize) -> usize {
    align_up(ENTRY_HEADER_SIZE + len, ENTRY_ALIGNMENT)
}
