//! Offline image decoding
//!
//! Turns a [`LogImage`] into a [`DumpReport`] that can be printed as text or
//! serialized as JSON. A scan error ends the entry list; whatever was decoded
//! before it is kept.

use bootlog_common::level;
use bootlog_shm::{LogEntry, LogImage};
use serde::Serialize;
use std::fmt;

/// One decoded entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportEntry {
    /// Offset of the header within the payload region
    pub offset: usize,
    /// Raw timestamp
    pub timestamp: u64,
    /// Level tag
    pub level: u32,
    /// Display name of the level
    pub level_name: &'static str,
    /// Payload, lossily decoded and stripped of trailing line breaks
    pub message: String,
}

impl From<LogEntry> for ReportEntry {
    fn from(entry: LogEntry) -> Self {
        Self {
            offset: entry.offset,
            timestamp: entry.timestamp,
            level: entry.level,
            level_name: level::name(entry.level),
            message: entry.message().trim_end_matches(['\r', '\n']).to_string(),
        }
    }
}

/// Summary and entries of a region image
#[derive(Debug, Clone, Serialize)]
pub struct DumpReport {
    /// Payload capacity in bytes
    pub capacity: u32,
    /// Payload bytes in use
    pub used: usize,
    /// Payload bytes dropped on overflow
    pub discarded: u32,
    /// Raw control block flags
    pub flags: u32,
    /// Timestamp ticks per second, 0 if unknown
    pub timer_frequency: u64,
    /// Decoded entries in buffer order
    pub entries: Vec<ReportEntry>,
    /// Why the scan stopped early, if it did
    pub scan_error: Option<String>,
}

impl DumpReport {
    /// Decode every entry of `image`
    pub fn from_image(image: &LogImage<'_>) -> Self {
        let mut entries = Vec::new();
        let mut scan_error = None;
        for entry in image.entries() {
            match entry {
                Ok(entry) => entries.push(ReportEntry::from(entry)),
                Err(err) => {
                    tracing::warn!(%err, "scan stopped early");
                    scan_error = Some(err.to_string());
                }
            }
        }

        Self {
            capacity: image.capacity(),
            used: image.used(),
            discarded: image.discarded(),
            flags: image.flags().bits(),
            timer_frequency: image.timer_frequency(),
            entries,
            scan_error,
        }
    }

    fn format_timestamp(&self, ticks: u64) -> String {
        match self.timer_frequency {
            0 => format!("{ticks:>12}"),
            freq => {
                let secs = ticks / freq;
                let micros = (ticks % freq) as u128 * 1_000_000 / freq as u128;
                format!("{secs:>5}.{micros:06}")
            }
        }
    }
}

impl fmt::Display for DumpReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "# {} entries, {}/{} bytes used, {} bytes discarded, flags {:#x}",
            self.entries.len(),
            self.used,
            self.capacity,
            self.discarded,
            self.flags
        )?;
        for entry in &self.entries {
            writeln!(
                f,
                "[{}] {:<7} {}",
                self.format_timestamp(entry.timestamp),
                entry.level_name,
                entry.message
            )?;
        }
        if let Some(err) = &self.scan_error {
            writeln!(f, "# scan stopped: {err}")?;
        }
        Ok(())
    }
}
