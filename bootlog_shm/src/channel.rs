//! Control block ownership and validation
//!
//! A [`Channel`] owns the injected region and is the only way to obtain a
//! `&ControlBlock`. Because the region may be writable by less-trusted code,
//! the block is re-validated on every [`Channel::acquire`]; the first
//! failed check poisons the channel for good.
//!
//! ```text
//!  Uninitialized ──CAS──► Initializing ──► Active ──violation──► Poisoned
//!                                     └──► Unavailable (region too small)
//! ```
//!
//! `Unavailable` and `Poisoned` are terminal.

use crate::clock::{MonotonicClock, TimestampSource};
use crate::error::{IntegrityViolation, RegionResult};
use crate::fanout::{ByteSink, NullSink};
use crate::region::{MemoryRegion, MmapConfig, MmapRegion};
use bootlog::config::ChannelConfig;
use bootlog::shm::consts::{ENTRY_ALIGNMENT, MIN_REGION_SIZE};
use bootlog::shm::layout::{
    CONTROL_BLOCK_SIGNATURE, CONTROL_BLOCK_VERSION, ControlBlock, ControlFlags,
};
use std::mem::size_of;
use std::sync::atomic::{AtomicU8, AtomicU32, Ordering};
use tracing::{debug, error, warn};

/// Lifecycle of a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ChannelState {
    /// No caller has touched the channel yet
    Uninitialized = 0,
    /// One caller is zeroing and stamping the region
    Initializing = 1,
    /// Control block stamped and last seen valid
    Active = 2,
    /// Region was too small; never initialized
    Unavailable = 3,
    /// Control block failed validation
    Poisoned = 4,
}

impl ChannelState {
    const fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Uninitialized,
            1 => Self::Initializing,
            2 => Self::Active,
            3 => Self::Unavailable,
            _ => Self::Poisoned,
        }
    }

    /// No further transition is possible
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Unavailable | Self::Poisoned)
    }
}

/// Lock-free log channel over one shared region
pub struct Channel {
    region: Box<dyn MemoryRegion>,
    pub(crate) clock: Box<dyn TimestampSource>,
    pub(crate) sink: Box<dyn ByteSink>,
    hdw_port_disabled: bool,
    state: AtomicU8,
    region_base: u64,
    expected_base: u64,
    capacity: u32,
    locked_size: AtomicU32,
}

/// Builder for [`Channel`]
pub struct ChannelBuilder {
    region: Box<dyn MemoryRegion>,
    clock: Option<Box<dyn TimestampSource>>,
    sink: Option<Box<dyn ByteSink>>,
    hdw_port_disabled: bool,
}

impl ChannelBuilder {
    /// Timestamp source (default: [`MonotonicClock`])
    pub fn clock(mut self, clock: impl TimestampSource + 'static) -> Self {
        self.clock = Some(Box::new(clock));
        self
    }

    /// Secondary byte sink (default: [`NullSink`])
    pub fn sink(mut self, sink: impl ByteSink + 'static) -> Self {
        self.sink = Some(Box::new(sink));
        self
    }

    /// Stamp `HDW_PORT_DISABLED` at init
    pub fn hdw_port_disabled(mut self, disabled: bool) -> Self {
        self.hdw_port_disabled = disabled;
        self
    }

    /// Finish; the region is not touched until the first `acquire`
    pub fn build(self) -> Channel {
        let region_base = self.region.as_ptr() as u64;
        let header = size_of::<ControlBlock>();
        let payload = self.region.len().saturating_sub(header);
        let capacity = u32::try_from(payload).unwrap_or(u32::MAX);

        Channel {
            region: self.region,
            clock: self
                .clock
                .unwrap_or_else(|| Box::new(MonotonicClock::new())),
            sink: self.sink.unwrap_or_else(|| Box::new(NullSink)),
            hdw_port_disabled: self.hdw_port_disabled,
            state: AtomicU8::new(ChannelState::Uninitialized as u8),
            region_base,
            expected_base: region_base + header as u64,
            capacity,
            locked_size: AtomicU32::new(0),
        }
    }
}

impl Channel {
    /// Start building a channel over `region`
    pub fn builder(region: impl MemoryRegion + 'static) -> ChannelBuilder {
        ChannelBuilder {
            region: Box::new(region),
            clock: None,
            sink: None,
            hdw_port_disabled: false,
        }
    }

    /// Channel over the file-backed region described by `config`
    pub fn from_config(config: &ChannelConfig) -> RegionResult<ChannelBuilder> {
        let mmap_config = MmapConfig {
            populate: true,
            locked: config.region.locked,
        };
        let region = MmapRegion::create(&config.region.path, config.region.size, &mmap_config)?;
        Ok(Self::builder(region).hdw_port_disabled(config.hdw_port.disabled))
    }

    /// Current lifecycle state
    pub fn state(&self) -> ChannelState {
        ChannelState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Get the control block, initializing it on first use.
    ///
    /// Returns `None` while another caller is initializing, when the region
    /// is too small, or once the block has failed validation.
    pub fn acquire(&self) -> Option<&ControlBlock> {
        if self.state() == ChannelState::Uninitialized {
            self.initialize();
        }
        if self.state() != ChannelState::Active {
            return None;
        }

        let block = self.block();
        if let Err(violation) = self.validate(block) {
            self.poison(violation);
            return None;
        }
        Some(block)
    }

    /// Payload address range `[base, limit]` the cursor must stay within
    pub(crate) fn cursor_bounds(&self) -> (u64, u64) {
        let size = self.locked_size.load(Ordering::Acquire);
        (self.expected_base, self.expected_base + size as u64)
    }

    /// Check a cursor value against the private bounds.
    ///
    /// The cursor must also sit on an entry boundary (a multiple of
    /// `ENTRY_ALIGNMENT` past the base), since headers are written with
    /// aligned stores.
    pub(crate) fn check_cursor(&self, cursor: u64) -> Result<(), IntegrityViolation> {
        let (base, limit) = self.cursor_bounds();
        if cursor < base || cursor > limit || (cursor - base) % ENTRY_ALIGNMENT as u64 != 0 {
            return Err(IntegrityViolation::CursorOutOfBounds {
                cursor,
                base,
                limit,
            });
        }
        Ok(())
    }

    /// Pointer to the payload byte at absolute `address`
    pub(crate) fn payload_ptr(&self, address: u64) -> *mut u8 {
        let offset = (address - self.region_base) as usize;
        // SAFETY: callers pass addresses inside the checked cursor bounds,
        // which lie inside the region.
        unsafe { self.region.as_ptr().add(offset) }
    }

    /// Mark the channel permanently invalid
    pub(crate) fn poison(&self, violation: IntegrityViolation) {
        let previous = self
            .state
            .swap(ChannelState::Poisoned as u8, Ordering::AcqRel);
        if previous != ChannelState::Poisoned as u8 {
            error!(%violation, "control block marked invalid");
        }
    }

    fn block(&self) -> &ControlBlock {
        // SAFETY: `MemoryRegion` guarantees a cache-line aligned pointer valid
        // for at least `size_of::<ControlBlock>()` bytes, and every field of
        // the block is atomic.
        unsafe { &*(self.region.as_ptr() as *const ControlBlock) }
    }

    fn initialize(&self) {
        if self
            .state
            .compare_exchange(
                ChannelState::Uninitialized as u8,
                ChannelState::Initializing as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_err()
        {
            return;
        }

        let len = self.region.len();
        if len < MIN_REGION_SIZE {
            warn!(len, min = MIN_REGION_SIZE, "log region too small, channel unavailable");
            self.state
                .store(ChannelState::Unavailable as u8, Ordering::Release);
            return;
        }

        // SAFETY: we won the init CAS, so no caller in this process reads the
        // region until the state becomes Active.
        unsafe { std::ptr::write_bytes(self.region.as_ptr(), 0, len) };

        let block = self.block();
        let mut flags = ControlFlags::HDW_PORT_INITIALIZED | ControlFlags::IN_PERMANENT_RAM;
        if self.hdw_port_disabled {
            flags |= ControlFlags::HDW_PORT_DISABLED;
        }
        block.version.store(CONTROL_BLOCK_VERSION, Ordering::Relaxed);
        block.buffer_base.store(self.expected_base, Ordering::Relaxed);
        block.buffer_size.store(self.capacity, Ordering::Relaxed);
        block.cursor.store(self.expected_base, Ordering::Relaxed);
        block.insert_flags(flags);
        block
            .timer_frequency
            .store(self.clock.frequency(), Ordering::Relaxed);
        block
            .signature
            .store(CONTROL_BLOCK_SIGNATURE, Ordering::Release);

        self.locked_size.store(self.capacity, Ordering::Release);
        self.state
            .store(ChannelState::Active as u8, Ordering::Release);
        debug!(
            base = self.expected_base,
            capacity = self.capacity,
            "log region initialized"
        );
    }

    fn validate(&self, block: &ControlBlock) -> Result<(), IntegrityViolation> {
        if !block.is_stamped() {
            return Err(IntegrityViolation::BadSignature);
        }

        let base = block.buffer_base.load(Ordering::Acquire);
        if base != self.expected_base {
            return Err(IntegrityViolation::BaseMismatch {
                found: base,
                expected: self.expected_base,
            });
        }

        self.check_cursor(block.cursor.load(Ordering::Acquire))?;

        let size = block.buffer_size.load(Ordering::Acquire);
        match self
            .locked_size
            .compare_exchange(0, size, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => Ok(()),
            Err(locked) if locked == size => Ok(()),
            Err(locked) => Err(IntegrityViolation::SizeChanged {
                found: size,
                locked,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::region::HeapRegion;

    fn channel(len: usize) -> Channel {
        Channel::builder(HeapRegion::new(len).unwrap()).build()
    }

    #[test]
    fn test_first_acquire_stamps_block() {
        let channel = channel(MIN_REGION_SIZE);
        assert_eq!(channel.state(), ChannelState::Uninitialized);

        let block = channel.acquire().expect("valid block");
        assert_eq!(channel.state(), ChannelState::Active);
        assert!(block.is_stamped());

        let base = block.buffer_base.load(Ordering::Relaxed);
        assert_eq!(base, block as *const ControlBlock as u64 + 64);
        assert_eq!(block.cursor.load(Ordering::Relaxed), base);
        assert_eq!(block.capacity() as usize, MIN_REGION_SIZE - 64);
        assert_eq!(block.discarded(), 0);
        assert_eq!(
            block.flags(),
            ControlFlags::HDW_PORT_INITIALIZED | ControlFlags::IN_PERMANENT_RAM
        );
        assert_eq!(block.timer_frequency.load(Ordering::Relaxed), 1_000_000_000);
    }

    #[test]
    fn test_small_region_is_unavailable_forever() {
        let channel = channel(MIN_REGION_SIZE - 64);
        assert!(channel.acquire().is_none());
        assert_eq!(channel.state(), ChannelState::Unavailable);
        assert!(channel.acquire().is_none());
        assert!(channel.state().is_terminal());
    }

    #[test]
    fn test_hdw_port_disabled_flag_is_stamped() {
        let channel = Channel::builder(HeapRegion::new(MIN_REGION_SIZE).unwrap())
            .hdw_port_disabled(true)
            .build();
        let block = channel.acquire().unwrap();
        assert!(block.is_hdw_port_disabled());
    }

    #[test]
    fn test_repeated_acquire_returns_same_block() {
        let channel = channel(MIN_REGION_SIZE);
        let first = channel.acquire().unwrap() as *const ControlBlock;
        for _ in 0..100 {
            let again = channel.acquire().unwrap() as *const ControlBlock;
            assert_eq!(first, again);
        }
        assert_eq!(channel.state(), ChannelState::Active);
    }

    #[test]
    fn test_bad_signature_poisons() {
        let channel = channel(MIN_REGION_SIZE);
        let block = channel.acquire().unwrap();
        block.signature.store(0, Ordering::Relaxed);
        assert!(channel.acquire().is_none());
        assert_eq!(channel.state(), ChannelState::Poisoned);
    }

    #[test]
    fn test_cursor_out_of_bounds_poisons() {
        let channel = channel(MIN_REGION_SIZE);
        let block = channel.acquire().unwrap();
        let base = block.buffer_base.load(Ordering::Relaxed);
        block.cursor.store(base - 8, Ordering::Relaxed);
        assert!(channel.acquire().is_none());
        assert_eq!(channel.state(), ChannelState::Poisoned);
    }

    #[test]
    fn test_cursor_at_limit_is_valid() {
        let channel = channel(MIN_REGION_SIZE);
        let block = channel.acquire().unwrap();
        let limit = block.buffer_base.load(Ordering::Relaxed) + block.capacity() as u64;
        block.cursor.store(limit, Ordering::Relaxed);
        assert!(channel.acquire().is_some());
        block.cursor.store(limit + 8, Ordering::Relaxed);
        assert!(channel.acquire().is_none());
    }

    #[test]
    fn test_misaligned_cursor_poisons() {
        let channel = channel(MIN_REGION_SIZE);
        let block = channel.acquire().unwrap();
        block.cursor.fetch_add(3, Ordering::Relaxed);
        assert!(channel.acquire().is_none());
    }

    #[test]
    fn test_size_change_poisons() {
        let channel = channel(MIN_REGION_SIZE);
        let block = channel.acquire().unwrap();
        block.buffer_size.fetch_sub(8, Ordering::Relaxed);
        assert!(channel.acquire().is_none());
        assert_eq!(channel.state(), ChannelState::Poisoned);
    }

    #[test]
    fn test_state_from_u8_roundtrip() {
        for state in [
            ChannelState::Uninitialized,
            ChannelState::Initializing,
            ChannelState::Active,
            ChannelState::Unavailable,
            ChannelState::Poisoned,
        ] {
            assert_eq!(ChannelState::from_u8(state as u8), state);
        }
    }
}
