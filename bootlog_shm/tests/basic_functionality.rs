//! Basic functionality tests for the bootlog channel

use bootlog_shm::bootlog::level;
use bootlog_shm::bootlog::shm::consts::MIN_REGION_SIZE;
use bootlog_shm::bootlog::shm::layout::entry_size;
use bootlog_shm::{CaptureSink, Channel, ChannelState, HeapRegion, ScanError, TickCounter};
use std::sync::atomic::Ordering;

fn test_channel() -> Channel {
    Channel::builder(HeapRegion::new(MIN_REGION_SIZE).unwrap())
        .clock(TickCounter::starting_at(1))
        .build()
}

#[test]
fn test_three_slot_region_end_to_end() -> Result<(), ScanError> {
    // 65536 - 64 = 65472 payload bytes = 3 × entry_size(21800).
    const PAYLOAD_LEN: usize = 21800;
    assert_eq!(3 * entry_size(PAYLOAD_LEN), MIN_REGION_SIZE - 64);

    let sink = CaptureSink::new();
    let channel = Channel::builder(HeapRegion::new(MIN_REGION_SIZE).unwrap())
        .clock(TickCounter::starting_at(1))
        .sink(sink.clone())
        .build();

    for i in 0..5u8 {
        let payload = vec![b'a' + i; PAYLOAD_LEN];
        assert!(channel.write(level::INFO, &payload).is_some());
    }

    let block = channel.acquire().unwrap();
    assert_eq!(block.used_bytes(), block.capacity() as u64);
    assert_eq!(block.discarded() as usize, 2 * PAYLOAD_LEN);

    let entries = channel.entries().unwrap().collect::<Result<Vec<_>, _>>()?;
    assert_eq!(entries.len(), 3);
    for (i, entry) in entries.iter().enumerate() {
        assert_eq!(entry.offset, i * entry_size(PAYLOAD_LEN));
        assert_eq!(entry.level, level::INFO);
        assert!(entry.payload.iter().all(|&b| b == b'a' + i as u8));
    }
    assert!(entries.windows(2).all(|w| w[0].timestamp < w[1].timestamp));

    // The hardware port saw all five, including the two that did not fit.
    assert_eq!(sink.writes().len(), 5);
    Ok(())
}

#[test]
fn test_idempotent_validation() {
    let channel = test_channel();
    let first = channel.acquire().unwrap() as *const _;
    for _ in 0..1000 {
        assert_eq!(channel.acquire().unwrap() as *const _, first);
    }
}

#[test]
fn test_fail_closed_latch_survives_restore() {
    // Surface the poison event on stderr when run with RUST_LOG=error.
    bootlog_shm::init_tracing();
    let channel = test_channel();
    channel.write(level::INFO, b"before corruption").unwrap();

    let block = channel.acquire().unwrap();
    let base = block.buffer_base.load(Ordering::Acquire);
    block.buffer_base.store(base + 0x1000, Ordering::Release);
    assert!(channel.acquire().is_none());

    block.buffer_base.store(base, Ordering::Release);
    assert!(channel.acquire().is_none());
    assert!(channel.write(level::INFO, b"after restore").is_none());
    assert!(channel.entries().is_none());
    assert_eq!(channel.state(), ChannelState::Poisoned);
}

#[test]
fn test_boundary_rejection_leaves_counters_untouched() {
    let channel = test_channel();
    channel.write(level::WARN, b"seed").unwrap();
    let block = channel.acquire().unwrap();
    let cursor = block.cursor.load(Ordering::Acquire);
    let discarded = block.discarded();

    channel.write(level::WARN, &[]);
    channel.write(level::WARN, &vec![0u8; 65536]);

    assert_eq!(block.cursor.load(Ordering::Acquire), cursor);
    assert_eq!(block.discarded(), discarded);
}

#[test]
fn test_capacity_conservation_single_thread() {
    let channel = test_channel();
    let lengths = [1usize, 7, 8, 9, 500, 4096, 30_000, 30_000, 12, 65_535, 3];

    let mut expected_used = 0u64;
    let mut expected_discarded = 0u32;
    let capacity = channel.acquire().unwrap().capacity() as u64;

    for (i, &len) in lengths.iter().enumerate() {
        let size = entry_size(len) as u64;
        if capacity - expected_used >= size {
            expected_used += size;
        } else {
            expected_discarded += len as u32;
        }
        channel.write(i as u32, &vec![i as u8; len]).unwrap();
    }

    let block = channel.acquire().unwrap();
    assert_eq!(block.used_bytes(), expected_used);
    assert_eq!(block.discarded(), expected_discarded);

    let stored: u64 = channel
        .entries()
        .unwrap()
        .map(|entry| entry_size(entry.unwrap().payload.len()) as u64)
        .sum();
    assert_eq!(stored, expected_used);
}

#[test]
fn test_small_entry_still_fits_after_large_overflow() {
    let channel = test_channel();
    let big = vec![0u8; 40_000];
    channel.write(1, &big).unwrap();
    channel.write(1, &big).unwrap();
    channel.write(1, b"small").unwrap();

    let block = channel.acquire().unwrap();
    assert_eq!(block.discarded(), 40_000);
    assert_eq!(
        block.used_bytes(),
        (entry_size(40_000) + entry_size(5)) as u64
    );
}
