//! Line recorder

use bootlog_common::level;
use bootlog_shm::Channel;
use std::io::BufRead;

/// Level used for lines recorded without an explicit one
pub const DEFAULT_RECORD_LEVEL: u32 = level::INFO;

/// Outcome of a recording session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecordStats {
    /// Lines offered to the channel
    pub lines: usize,
    /// Lines skipped because they were empty or too long for one entry
    pub skipped: usize,
    /// Payload bytes in use when input ended
    pub used: u64,
    /// Payload bytes dropped on overflow
    pub discarded: u32,
}

/// Write every line of `input` as one entry at `level`.
///
/// The trailing newline is kept in the payload so the hardware port sees
/// whole lines. Stops early if the channel becomes unavailable.
pub fn record_lines(channel: &Channel, input: impl BufRead, level: u32) -> std::io::Result<Option<RecordStats>> {
    let mut stats = RecordStats::default();

    for line in input.split(b'\n') {
        let mut line = line?;
        stats.lines += 1;
        if line.is_empty() || line.len() >= bootlog_common::consts::MAX_MESSAGE_LEN {
            stats.skipped += 1;
            continue;
        }
        line.push(b'\n');
        if channel.write(level, &line).is_none() {
            tracing::warn!(line = stats.lines, "channel became unavailable, stopping");
            return Ok(None);
        }
    }

    let Some(block) = channel.acquire() else {
        return Ok(None);
    };
    stats.used = block.used_bytes();
    stats.discarded = block.discarded();
    Ok(Some(stats))
}
