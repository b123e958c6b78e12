//! Secondary fan-out to a byte-oriented transport
//!
//! The hardware port is independent of the memory ring: it receives every
//! accepted payload whether or not the ring had room for it.

use bootlog::shm::layout::ControlBlock;
use parking_lot::Mutex;
use std::io::Write;
use std::sync::Arc;

/// External byte sink, typically a serial port
pub trait ByteSink: Send + Sync {
    /// Emit `bytes` tagged with `level`; returns how many were consumed.
    fn write(&self, level: u32, bytes: &[u8]) -> usize;
}

impl<S: ByteSink + ?Sized> ByteSink for Arc<S> {
    fn write(&self, level: u32, bytes: &[u8]) -> usize {
        (**self).write(level, bytes)
    }
}

/// Drops everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl ByteSink for NullSink {
    fn write(&self, _level: u32, bytes: &[u8]) -> usize {
        bytes.len()
    }
}

/// Hosted stand-in for a UART: one byte at a time to stdout
#[derive(Debug, Clone, Copy, Default)]
pub struct StdoutPort;

impl ByteSink for StdoutPort {
    fn write(&self, _level: u32, bytes: &[u8]) -> usize {
        let mut out = std::io::stdout().lock();
        let mut written = 0;
        for byte in bytes {
            if out.write_all(std::slice::from_ref(byte)).is_err() {
                break;
            }
            written += 1;
        }
        let _ = out.flush();
        written
    }
}

/// Records every write; clones share the same record
#[derive(Debug, Clone, Default)]
pub struct CaptureSink {
    writes: Arc<Mutex<Vec<(u32, Vec<u8>)>>>,
}

impl CaptureSink {
    /// Empty capture
    pub fn new() -> Self {
        Self::default()
    }

    /// All `(level, bytes)` pairs seen so far
    pub fn writes(&self) -> Vec<(u32, Vec<u8>)> {
        self.writes.lock().clone()
    }

    /// All bytes seen so far, concatenated
    pub fn bytes(&self) -> Vec<u8> {
        self.writes
            .lock()
            .iter()
            .flat_map(|(_, bytes)| bytes.iter().copied())
            .collect()
    }
}

impl ByteSink for CaptureSink {
    fn write(&self, level: u32, bytes: &[u8]) -> usize {
        self.writes.lock().push((level, bytes.to_vec()));
        bytes.len()
    }
}

/// Forward `bytes` unless the control block disables the port.
pub(crate) fn fan_out(block: &ControlBlock, sink: &dyn ByteSink, level: u32, bytes: &[u8]) {
    if block.is_hdw_port_disabled() {
        return;
    }
    let consumed = sink.write(level, bytes);
    if consumed < bytes.len() {
        tracing::trace!(consumed, len = bytes.len(), "hardware port accepted a partial write");
    }
}
