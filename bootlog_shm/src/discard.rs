//! Discard accounting

use bootlog::shm::layout::ControlBlock;
use std::sync::atomic::Ordering;

/// Add `len` to the control block's discarded byte count.
///
/// Read, add, CAS; retry on conflict. The 32-bit accumulator wraps silently.
pub fn record_discard(block: &ControlBlock, len: u32) {
    let mut current = block.discarded_bytes.load(Ordering::Acquire);
    loop {
        let next = current.wrapping_add(len);
        match block.discarded_bytes.compare_exchange_weak(
            current,
            next,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => return,
            Err(observed) => current = observed,
        }
    }
}
