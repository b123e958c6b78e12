//! Timestamp sources

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Monotonic counter stamped into each entry.
///
/// Units are the source's own business; [`TimestampSource::frequency`]
/// tells readers how to convert ticks to seconds.
pub trait TimestampSource: Send + Sync {
    /// Current counter value. Never decreases.
    fn now(&self) -> u64;

    /// Ticks per second, 0 if unknown.
    fn frequency(&self) -> u64 {
        0
    }
}

/// Nanoseconds elapsed since the clock was created
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    /// Start counting from now
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl TimestampSource for MonotonicClock {
    fn now(&self) -> u64 {
        self.origin.elapsed().as_nanos() as u64
    }

    fn frequency(&self) -> u64 {
        1_000_000_000
    }
}

/// Counter that advances by one on every read.
///
/// Every call returns a distinct, strictly increasing value, which makes
/// entry ordering deterministic in tests.
#[derive(Debug, Default)]
pub struct TickCounter {
    next: AtomicU64,
}

impl TickCounter {
    /// Start at `start`
    pub fn starting_at(start: u64) -> Self {
        Self {
            next: AtomicU64::new(start),
        }
    }
}

impl TimestampSource for TickCounter {
    fn now(&self) -> u64 {
        self.next.fetch_add(1, Ordering::AcqRel)
    }
}
