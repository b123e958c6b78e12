//! Formatted messages
//!
//! Renders `format_args!` output into a fixed 512-byte stack buffer and
//! writes it as a single [`level::UNKNOWN`] entry. Output past the buffer is
//! cut off, never allocated for.

use crate::channel::Channel;
use bootlog::consts::PRINT_BUFFER_SIZE;
use bootlog::level;
use core::fmt::{self, Write};
use heapless::Vec;

/// Bounded render target that truncates instead of failing
#[derive(Default)]
pub struct PrintBuffer {
    bytes: Vec<u8, PRINT_BUFFER_SIZE>,
}

impl PrintBuffer {
    /// Empty buffer
    pub fn new() -> Self {
        Self::default()
    }

    /// Rendered bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Render `args`, keeping at most `PRINT_BUFFER_SIZE` bytes
    pub fn render(args: fmt::Arguments<'_>) -> Self {
        let mut buffer = Self::new();
        let _ = buffer.write_fmt(args);
        buffer
    }
}

impl Write for PrintBuffer {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let room = PRINT_BUFFER_SIZE - self.bytes.len();
        let take = s.len().min(room);
        let _ = self.bytes.extend_from_slice(&s.as_bytes()[..take]);
        Ok(())
    }
}

impl Channel {
    /// Render and write a formatted message; returns the bytes rendered.
    pub fn print(&self, args: fmt::Arguments<'_>) -> usize {
        let rendered = PrintBuffer::render(args);
        self.write(level::UNKNOWN, rendered.as_bytes());
        rendered.as_bytes().len()
    }
}

/// Write a formatted message to the process-wide channel.
///
/// Expands to [`global::print`](crate::global::print) and evaluates to the
/// number of bytes rendered.
///
/// ```rust
/// use bootlog_shm::bootlog;
///
/// // No channel installed yet: rendered, then dropped.
/// let n = bootlog!("boot stage {} reached", 2);
/// assert_eq!(n, 20);
/// ```
#[macro_export]
macro_rules! bootlog {
    ($($arg:tt)*) => {
        $crate::global::print(::core::format_args!($($arg)*))
    };
}
