//! Backing memory regions for a log channel
//!
//! The channel never picks its own memory. A [`MemoryRegion`] is injected by
//! whoever knows where the log lives: a fixed firmware address
//! ([`RawRegion`]), a file shared between processes ([`MmapRegion`]), or a
//! private allocation for tests ([`HeapRegion`]).

use crate::error::{RegionError, RegionResult};
use bootlog::shm::consts::CACHE_LINE_SIZE;
use bootlog::shm::layout::ControlBlock;
use memmap2::{Mmap, MmapMut, MmapOptions};
use std::alloc::{Layout, alloc_zeroed, dealloc};
use std::fs::OpenOptions;
use std::path::Path;
use std::ptr::NonNull;

/// A contiguous block of memory hosting one control block plus payload.
///
/// # Safety
///
/// Implementors guarantee that for as long as the value lives:
/// - `as_ptr()` is non-null, aligned to [`CACHE_LINE_SIZE`] and valid for
///   reads and writes of `len()` bytes;
/// - `len()` is at least `size_of::<ControlBlock>()` and never changes;
/// - the memory is not freed or remapped.
pub unsafe trait MemoryRegion: Send + Sync {
    /// Base address of the region
    fn as_ptr(&self) -> *mut u8;

    /// Region size in bytes
    fn len(&self) -> usize;

    /// Region has no usable bytes
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Validate that a region can hold the control block
pub fn validate_region(address: usize, len: usize) -> RegionResult<()> {
    let min = std::mem::size_of::<ControlBlock>();
    if len < min {
        return Err(RegionError::TooSmall { size: len, min });
    }
    validate_memory_alignment(address)
}

/// Validate memory alignment
pub fn validate_memory_alignment(address: usize) -> RegionResult<()> {
    if address % CACHE_LINE_SIZE != 0 {
        return Err(RegionError::Misaligned {
            address,
            alignment: CACHE_LINE_SIZE,
        });
    }
    Ok(())
}

/// Zeroed, cache-line aligned heap allocation
pub struct HeapRegion {
    ptr: NonNull<u8>,
    layout: Layout,
}

// SAFETY: the allocation is owned exclusively by this value; concurrent
// access goes through the channel's atomics.
unsafe impl Send for HeapRegion {}
unsafe impl Sync for HeapRegion {}

impl HeapRegion {
    /// Allocate `len` zeroed bytes
    pub fn new(len: usize) -> RegionResult<Self> {
        validate_region(0, len)?;
        let layout = Layout::from_size_align(len, CACHE_LINE_SIZE).map_err(|e| RegionError::Io {
            source: std::io::Error::new(std::io::ErrorKind::InvalidInput, e),
        })?;

        // SAFETY: layout has a non-zero size, checked above.
        let raw = unsafe { alloc_zeroed(layout) };
        let ptr = NonNull::new(raw).unwrap_or_else(|| std::alloc::handle_alloc_error(layout));

        Ok(Self { ptr, layout })
    }
}

unsafe impl MemoryRegion for HeapRegion {
    fn as_ptr(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    fn len(&self) -> usize {
        self.layout.size()
    }
}

impl Drop for HeapRegion {
    fn drop(&mut self) {
        // SAFETY: allocated in `new` with the same layout.
        unsafe { dealloc(self.ptr.as_ptr(), self.layout) };
    }
}

/// Region at a fixed address supplied by the platform
pub struct RawRegion {
    ptr: NonNull<u8>,
    len: usize,
}

// SAFETY: see `RawRegion::new`.
unsafe impl Send for RawRegion {}
unsafe impl Sync for RawRegion {}

impl RawRegion {
    /// Wrap `len` bytes starting at `base`
    ///
    /// # Safety
    ///
    /// `base` must point to `len` bytes that stay mapped, readable and
    /// writable for the remainder of the program and that no other Rust code
    /// treats as ordinary (non-shared) memory.
    pub unsafe fn new(base: *mut u8, len: usize) -> RegionResult<Self> {
        validate_region(base as usize, len)?;
        let ptr = NonNull::new(base).ok_or(RegionError::Misaligned {
            address: 0,
            alignment: CACHE_LINE_SIZE,
        })?;
        Ok(Self { ptr, len })
    }
}

unsafe impl MemoryRegion for RawRegion {
    fn as_ptr(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    fn len(&self) -> usize {
        self.len
    }
}

/// Mapping options for file-backed regions
#[derive(Debug, Clone, Copy, Default)]
pub struct MmapConfig {
    /// Pre-fault the mapping
    pub populate: bool,
    /// Lock pages in RAM
    pub locked: bool,
}

/// File-backed region shared between processes
pub struct MmapRegion {
    ptr: NonNull<u8>,
    len: usize,
    _mmap: MmapMut,
}

// SAFETY: the mapping lives as long as this value; concurrent access goes
// through the channel's atomics.
unsafe impl Send for MmapRegion {}
unsafe impl Sync for MmapRegion {}

impl MmapRegion {
    /// Create (or truncate) `path` to `size` bytes and map it read-write
    pub fn create(path: &Path, size: usize, config: &MmapConfig) -> RegionResult<Self> {
        let file = OpenOptions::new()
            .create(true)
            .truncate(true)
            .read(true)
            .write(true)
            .open(path)?;
        file.set_len(size as u64)?;

        let mut mmap_options = MmapOptions::new();
        if config.populate || config.locked {
            mmap_options.populate();
        }

        // SAFETY: the file was just created with the requested size; the
        // mapping is only ever accessed through the channel.
        let mut mmap = unsafe { mmap_options.map_mut(&file)? };

        #[cfg(unix)]
        if config.locked {
            mmap.lock()?;
        }

        let raw = mmap.as_mut_ptr();
        validate_region(raw as usize, mmap.len())?;
        let ptr = NonNull::new(raw).ok_or(RegionError::Misaligned {
            address: 0,
            alignment: CACHE_LINE_SIZE,
        })?;
        tracing::debug!(path = %path.display(), size, "mapped log region");

        Ok(Self {
            ptr,
            len: size,
            _mmap: mmap,
        })
    }
}

unsafe impl MemoryRegion for MmapRegion {
    fn as_ptr(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    fn len(&self) -> usize {
        self.len
    }
}

/// Map an existing region file read-only for offline inspection
pub fn map_image(path: &Path) -> RegionResult<Mmap> {
    let file = OpenOptions::new().read(true).open(path)?;
    // SAFETY: read-only mapping; the image parser treats every byte as untrusted.
    let mmap = unsafe { Mmap::map(&file)? };
    Ok(mmap)
}
