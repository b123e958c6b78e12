//! Entry scanning for live channels and offline images
//!
//! A scan walks from the buffer base up to the cursor observed when the scan
//! started. It stops at the first record whose signature is not yet
//! published: the length of such a record cannot be trusted, so nothing past
//! it can be located.

use crate::channel::Channel;
use crate::error::{ImageError, ScanError};
use bootlog::shm::layout::{
    CONTROL_BLOCK_SIGNATURE, CONTROL_BLOCK_VERSION, ControlBlock, ControlFlags,
    ENTRY_HEADER_SIZE, ENTRY_SIGNATURE, EntryHeader, entry_size,
};
use serde::Serialize;
use std::borrow::Cow;
use std::marker::PhantomData;
use std::mem::{offset_of, size_of};
use std::sync::atomic::{AtomicU32, Ordering};

/// One complete entry copied out of the payload region
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogEntry {
    /// Offset from the buffer base
    pub offset: usize,
    /// Timestamp source value
    pub timestamp: u64,
    /// Level tag
    pub level: u32,
    /// Raw payload bytes
    pub payload: Vec<u8>,
}

impl LogEntry {
    /// Payload as text, invalid UTF-8 replaced
    pub fn message(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.payload)
    }
}

/// Iterator over the entries of a payload region
pub struct EntryIter<'a> {
    base: *const u8,
    offset: usize,
    end: usize,
    live: bool,
    finished: bool,
    _region: PhantomData<&'a [u8]>,
}

impl<'a> EntryIter<'a> {
    fn stop(&mut self, error: ScanError) -> Option<Result<LogEntry, ScanError>> {
        self.finished = true;
        Some(Err(error))
    }

    fn load_signature(&self, header: *const EntryHeader) -> u32 {
        let field = unsafe { &raw const (*header).signature };
        if self.live {
            // SAFETY: live regions are 8-byte aligned at every entry
            // boundary; the signature may be stored concurrently.
            unsafe { AtomicU32::from_ptr(field as *mut u32).load(Ordering::Acquire) }
        } else {
            // SAFETY: offline images are not mutated while borrowed.
            unsafe { field.read_unaligned() }
        }
    }
}

impl Iterator for EntryIter<'_> {
    type Item = Result<LogEntry, ScanError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished || self.offset >= self.end {
            return None;
        }

        let offset = self.offset;
        if self.end - offset < ENTRY_HEADER_SIZE {
            return self.stop(ScanError::Truncated { offset });
        }

        // SAFETY: `offset + ENTRY_HEADER_SIZE <= end`, and `end` lies
        // inside the region the iterator borrows.
        let header = unsafe { self.base.add(offset) } as *const EntryHeader;
        if self.load_signature(header) != ENTRY_SIGNATURE {
            return self.stop(ScanError::InFlight { offset });
        }

        // SAFETY: the signature was observed with Acquire (or the image is
        // quiescent), so the header fields are fully written.
        let (level, timestamp, length) = unsafe {
            (
                (&raw const (*header).level).read_unaligned(),
                (&raw const (*header).timestamp).read_unaligned(),
                (&raw const (*header).length).read_unaligned() as usize,
            )
        };

        let size = entry_size(length);
        if length == 0 || size > self.end - offset {
            return self.stop(ScanError::Truncated { offset });
        }

        let mut payload = vec![0u8; length];
        // SAFETY: `offset + size <= end` was checked above.
        unsafe {
            std::ptr::copy_nonoverlapping(
                self.base.add(offset + ENTRY_HEADER_SIZE),
                payload.as_mut_ptr(),
                length,
            );
        }

        self.offset += size;
        Some(Ok(LogEntry {
            offset,
            timestamp,
            level,
            payload,
        }))
    }
}

impl Channel {
    /// Scan the entries written so far.
    ///
    /// `None` if the channel is not available.
    pub fn entries(&self) -> Option<EntryIter<'_>> {
        let block = self.acquire()?;
        let (base, _) = self.cursor_bounds();
        let end = block.cursor.load(Ordering::Acquire);
        if let Err(violation) = self.check_cursor(end) {
            self.poison(violation);
            return None;
        }

        Some(EntryIter {
            base: self.payload_ptr(base),
            offset: 0,
            end: (end - base) as usize,
            live: true,
            finished: false,
            _region: PhantomData,
        })
    }
}

/// Validated view over an offline copy of a region
#[derive(Debug, Clone, Copy)]
pub struct LogImage<'a> {
    bytes: &'a [u8],
    used: usize,
    capacity: u32,
    discarded: u32,
    flags: ControlFlags,
    timer_frequency: u64,
}

fn read_u16(bytes: &[u8], offset: usize) -> u16 {
    let mut raw = [0u8; 2];
    raw.copy_from_slice(&bytes[offset..offset + 2]);
    u16::from_ne_bytes(raw)
}

fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&bytes[offset..offset + 4]);
    u32::from_ne_bytes(raw)
}

fn read_u64(bytes: &[u8], offset: usize) -> u64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&bytes[offset..offset + 8]);
    u64::from_ne_bytes(raw)
}

impl<'a> LogImage<'a> {
    /// Parse and validate the control block at the start of `bytes`.
    ///
    /// Absolute addresses from the writer's address space are only used
    /// relative to each other.
    pub fn parse(bytes: &'a [u8]) -> Result<Self, ImageError> {
        let header = size_of::<ControlBlock>();
        if bytes.len() < header {
            return Err(ImageError::TooShort { len: bytes.len() });
        }

        let signature = read_u32(bytes, offset_of!(ControlBlock, signature));
        if signature != CONTROL_BLOCK_SIGNATURE {
            return Err(ImageError::BadSignature { found: signature });
        }
        let version = read_u16(bytes, offset_of!(ControlBlock, version));
        if version != CONTROL_BLOCK_VERSION {
            return Err(ImageError::BadVersion { found: version });
        }

        let base = read_u64(bytes, offset_of!(ControlBlock, buffer_base));
        let cursor = read_u64(bytes, offset_of!(ControlBlock, cursor));
        let capacity = read_u32(bytes, offset_of!(ControlBlock, buffer_size));

        if cursor < base {
            return Err(ImageError::Inconsistent(format!(
                "cursor {cursor:#x} below buffer base {base:#x}"
            )));
        }
        let used = cursor - base;
        if used > capacity as u64 {
            return Err(ImageError::Inconsistent(format!(
                "{used} bytes used exceeds capacity {capacity}"
            )));
        }
        if header as u64 + capacity as u64 > bytes.len() as u64 {
            return Err(ImageError::Inconsistent(format!(
                "capacity {capacity} exceeds image of {} bytes",
                bytes.len()
            )));
        }

        Ok(Self {
            bytes,
            used: used as usize,
            capacity,
            discarded: read_u32(bytes, offset_of!(ControlBlock, discarded_bytes)),
            flags: ControlFlags::from_bits_truncate(read_u32(
                bytes,
                offset_of!(ControlBlock, flags),
            )),
            timer_frequency: read_u64(bytes, offset_of!(ControlBlock, timer_frequency)),
        })
    }

    /// Payload bytes consumed
    pub fn used(&self) -> usize {
        self.used
    }

    /// Payload capacity
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Payload bytes dropped on overflow
    pub fn discarded(&self) -> u32 {
        self.discarded
    }

    /// Control block flags
    pub fn flags(&self) -> ControlFlags {
        self.flags
    }

    /// Ticks per second of the writer's timestamp source, 0 if unknown
    pub fn timer_frequency(&self) -> u64 {
        self.timer_frequency
    }

    /// Scan the recorded entries
    pub fn entries(&self) -> EntryIter<'a> {
        let payload = &self.bytes[size_of::<ControlBlock>()..];
        EntryIter {
            base: payload.as_ptr(),
            offset: 0,
            end: self.used,
            live: false,
            finished: false,
            _region: PhantomData,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::TickCounter;
    use crate::region::{HeapRegion, MemoryRegion};
    use bootlog::shm::consts::MIN_REGION_SIZE;

    #[test]
    fn test_live_scan_returns_entries_in_order() {
        let channel = Channel::builder(HeapRegion::new(MIN_REGION_SIZE).unwrap())
            .clock(TickCounter::starting_at(100))
            .build();
        channel.write(1, b"first").unwrap();
        channel.write(2, b"second entry").unwrap();

        let entries: Vec<_> = channel.entries().unwrap().collect::<Result<_, _>>().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].offset, 0);
        assert_eq!(entries[0].timestamp, 100);
        assert_eq!(entries[0].level, 1);
        assert_eq!(entries[0].message(), "first");
        assert_eq!(entries[1].offset, entry_size(5));
        assert_eq!(entries[1].timestamp, 101);
        assert_eq!(entries[1].payload, b"second entry".to_vec());
    }

    #[test]
    fn test_scan_stops_at_in_flight_entry() {
        let channel = Channel::builder(HeapRegion::new(MIN_REGION_SIZE).unwrap()).build();
        channel.write(1, b"done").unwrap();

        // Reserve a slot without publishing it.
        let block = channel.acquire().unwrap();
        block
            .cursor
            .fetch_add(entry_size(4) as u64, Ordering::AcqRel);
        channel.write(1, b"after").unwrap();

        let results: Vec<_> = channel.entries().unwrap().collect();
        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        assert_eq!(
            results[1],
            Err(ScanError::InFlight {
                offset: entry_size(4)
            })
        );
    }

    #[test]
    fn test_image_parse_of_region_copy() {
        let region = HeapRegion::new(MIN_REGION_SIZE).unwrap();
        let base = region.as_ptr();
        let len = region.len();
        let channel = Channel::builder(region).build();
        channel.write(0x40, b"copied").unwrap();
        channel.write(0x40, &vec![b'x'; 40_000]).unwrap();
        channel.write(0x40, &vec![b'y'; 40_000]).unwrap();

        let copy = unsafe { std::slice::from_raw_parts(base, len) }.to_vec();
        let image = LogImage::parse(&copy).unwrap();
        assert_eq!(image.used(), entry_size(6) + entry_size(40_000));
        assert_eq!(image.discarded(), 40_000);
        assert!(image.flags().contains(ControlFlags::IN_PERMANENT_RAM));

        let entries: Vec<_> = image.entries().collect::<Result<_, _>>().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].message(), "copied");
        assert_eq!(entries[1].payload.len(), 40_000);
    }

    #[test]
    fn test_image_rejects_garbage() {
        assert_eq!(
            LogImage::parse(&[0u8; 10]).unwrap_err(),
            ImageError::TooShort { len: 10 }
        );
        assert_eq!(
            LogImage::parse(&[0u8; 128]).unwrap_err(),
            ImageError::BadSignature { found: 0 }
        );
    }

    #[test]
    fn test_image_rejects_capacity_beyond_image() {
        let region = HeapRegion::new(MIN_REGION_SIZE).unwrap();
        let base = region.as_ptr();
        let len = region.len();
        let channel = Channel::builder(region).build();
        channel.acquire().unwrap();

        let copy = unsafe { std::slice::from_raw_parts(base, len) }[..4096].to_vec();
        assert!(matches!(
            LogImage::parse(&copy),
            Err(ImageError::Inconsistent(_))
        ));
    }

    #[test]
    fn test_truncated_length_stops_scan() {
        let region = HeapRegion::new(MIN_REGION_SIZE).unwrap();
        let base = region.as_ptr();
        let len = region.len();
        let channel = Channel::builder(region).build();
        channel.write(1, b"tiny").unwrap();

        let mut copy = unsafe { std::slice::from_raw_parts(base, len) }.to_vec();
        let length_at = size_of::<ControlBlock>() + offset_of!(EntryHeader, length);
        copy[length_at..length_at + 2].copy_from_slice(&500u16.to_ne_bytes());

        let image = LogImage::parse(&copy).unwrap();
        let results: Vec<_> = image.entries().collect();
        assert_eq!(results, vec![Err(ScanError::Truncated { offset: 0 })]);
    }
}
