//! Multi-writer append path
//!
//! Writers never block one another. Space is claimed by advancing the shared
//! cursor with compare-and-swap; the winner owns `[current, next)` outright
//! and fills it with plain stores. The entry signature is stored last with
//! `Release` ordering, so a scanner that sees the signature sees the whole
//! record.
//!
//! Nothing wraps: once the payload region is full, entries are dropped and
//! their length is added to the discard counter.

use crate::channel::Channel;
use crate::discard::record_discard;
use crate::error::IntegrityViolation;
use crate::fanout::fan_out;
use bootlog::consts::MAX_MESSAGE_LEN;
use bootlog::shm::layout::{ControlBlock, ENTRY_HEADER_SIZE, ENTRY_SIGNATURE, EntryHeader, entry_size};
use std::sync::atomic::{AtomicU32, Ordering};

/// Outcome of one reservation attempt sequence
enum Reservation {
    /// Exclusive slot starting at this address
    Slot(u64),
    /// Not enough room left
    Overflow,
    /// Cursor was tampered with while we were reserving
    Corrupt(IntegrityViolation),
}

impl Channel {
    /// Append one entry and mirror it to the hardware port.
    ///
    /// Empty payloads and payloads longer than 65535 bytes are ignored. The
    /// return value only says whether the channel is alive; an entry that did
    /// not fit shows up in the discard counter instead.
    pub fn write(&self, level: u32, payload: &[u8]) -> Option<&ControlBlock> {
        let block = self.write_memory(level, payload)?;
        fan_out(block, self.sink.as_ref(), level, payload);
        Some(block)
    }

    fn write_memory(&self, level: u32, payload: &[u8]) -> Option<&ControlBlock> {
        if payload.is_empty() || payload.len() > MAX_MESSAGE_LEN {
            return None;
        }

        let block = self.acquire()?;
        let size = entry_size(payload.len()) as u64;

        match self.reserve(block, size) {
            Reservation::Slot(address) => {
                // SAFETY: the CAS in `reserve` handed us exclusive ownership
                // of `size` bytes at `address`, inside the payload region.
                unsafe { self.commit(address, level, payload) };
            }
            Reservation::Overflow => record_discard(block, payload.len() as u32),
            Reservation::Corrupt(violation) => {
                self.poison(violation);
                return None;
            }
        }
        Some(block)
    }

    fn reserve(&self, block: &ControlBlock, size: u64) -> Reservation {
        let (base, limit) = self.cursor_bounds();
        let capacity = limit - base;

        let mut current = block.cursor.load(Ordering::Acquire);
        loop {
            if let Err(violation) = self.check_cursor(current) {
                return Reservation::Corrupt(violation);
            }

            let used = current - base;
            if used >= capacity || capacity - used < size {
                return Reservation::Overflow;
            }

            let next = current + size;
            match block
                .cursor
                .compare_exchange_weak(current, next, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => return Reservation::Slot(current),
                Err(observed) => current = observed,
            }
        }
    }

    /// Fill a reserved slot; signature last.
    ///
    /// # Safety
    ///
    /// `[address, address + entry_size(payload.len()))` must be exclusively
    /// reserved by the caller and lie inside the payload region.
    unsafe fn commit(&self, address: u64, level: u32, payload: &[u8]) {
        let slot = self.payload_ptr(address);
        let header = slot as *mut EntryHeader;
        let timestamp = self.clock.now();

        // SAFETY: `slot` is 8-byte aligned (base and every entry size are) and
        // valid for the whole entry per the caller's contract.
        unsafe {
            (&raw mut (*header).level).write(level);
            (&raw mut (*header).timestamp).write(timestamp);
            (&raw mut (*header).length).write(payload.len() as u16);
            (&raw mut (*header)._reserved).write([0; 6]);
            std::ptr::copy_nonoverlapping(
                payload.as_ptr(),
                slot.add(ENTRY_HEADER_SIZE),
                payload.len(),
            );
            AtomicU32::from_ptr(&raw mut (*header).signature)
                .store(ENTRY_SIGNATURE, Ordering::Release);
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::channel::{Channel, ChannelState};
    use crate::clock::TickCounter;
    use crate::fanout::CaptureSink;
    use crate::region::HeapRegion;
    use bootlog::shm::consts::MIN_REGION_SIZE;
    use bootlog::shm::layout::entry_size;
    use std::sync::atomic::Ordering;

    fn channel() -> Channel {
        Channel::builder(HeapRegion::new(MIN_REGION_SIZE).unwrap())
            .clock(TickCounter::starting_at(1))
            .build()
    }

    #[test]
    fn test_write_advances_cursor_by_entry_size() {
        let channel = channel();
        let block = channel.write(1, b"hello").unwrap();
        assert_eq!(block.used_bytes(), entry_size(5) as u64);

        channel.write(1, b"world!!!!").unwrap();
        assert_eq!(block.used_bytes(), (entry_size(5) + entry_size(9)) as u64);
        assert_eq!(block.discarded(), 0);
    }

    #[test]
    fn test_boundary_lengths_are_ignored() {
        let channel = channel();
        let block = channel.acquire().unwrap();
        let cursor = block.cursor.load(Ordering::Acquire);

        assert!(channel.write(1, b"").is_none());
        assert!(channel.write(1, &vec![0u8; 65536]).is_none());

        assert_eq!(block.cursor.load(Ordering::Acquire), cursor);
        assert_eq!(block.discarded(), 0);
    }

    #[test]
    fn test_max_length_entry_is_accepted() {
        let channel = Channel::builder(HeapRegion::new(2 * MIN_REGION_SIZE).unwrap()).build();
        let block = channel.write(1, &vec![0x5A; 65535]).unwrap();
        assert_eq!(block.used_bytes(), entry_size(65535) as u64);
    }

    #[test]
    fn test_overflow_is_discarded_not_stored() {
        let channel = channel();
        let block = channel.acquire().unwrap();
        let payload = vec![0xAB; 1000];
        let per_entry = entry_size(payload.len()) as u64;
        let fits = block.capacity() as u64 / per_entry;

        for _ in 0..fits + 3 {
            assert!(channel.write(2, &payload).is_some());
        }
        assert_eq!(block.used_bytes(), fits * per_entry);
        assert_eq!(block.discarded(), 3 * 1000);
    }

    #[test]
    fn test_fan_out_happens_even_on_overflow() {
        let sink = CaptureSink::new();
        let channel = Channel::builder(HeapRegion::new(MIN_REGION_SIZE).unwrap())
            .sink(sink.clone())
            .build();
        let block = channel.acquire().unwrap();
        let limit = block.buffer_base.load(Ordering::Relaxed) + block.capacity() as u64;
        block.cursor.store(limit, Ordering::Relaxed);

        channel.write(0x40, b"lost but mirrored").unwrap();
        assert_eq!(block.discarded(), 17);
        assert_eq!(sink.writes(), vec![(0x40, b"lost but mirrored".to_vec())]);
    }

    #[test]
    fn test_fan_out_suppressed_when_disabled() {
        let sink = CaptureSink::new();
        let channel = Channel::builder(HeapRegion::new(MIN_REGION_SIZE).unwrap())
            .sink(sink.clone())
            .hdw_port_disabled(true)
            .build();
        channel.write(1, b"memory only").unwrap();
        assert!(sink.writes().is_empty());
        assert_eq!(channel.acquire().unwrap().used_bytes(), entry_size(11) as u64);
    }

    #[test]
    fn test_rejected_write_is_not_mirrored() {
        let sink = CaptureSink::new();
        let channel = Channel::builder(HeapRegion::new(MIN_REGION_SIZE).unwrap())
            .sink(sink.clone())
            .build();
        channel.write(1, b"");
        assert!(sink.writes().is_empty());
    }

    #[test]
    fn test_write_on_poisoned_channel_is_noop() {
        let sink = CaptureSink::new();
        let channel = Channel::builder(HeapRegion::new(MIN_REGION_SIZE).unwrap())
            .sink(sink.clone())
            .build();
        let block = channel.acquire().unwrap();
        block.buffer_base.fetch_add(64, Ordering::Relaxed);

        assert!(channel.write(1, b"dropped").is_none());
        assert_eq!(channel.state(), ChannelState::Poisoned);
        assert!(sink.writes().is_empty());
    }
}
