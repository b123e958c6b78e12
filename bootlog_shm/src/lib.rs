//! # Bootlog Shared Memory Channel
//!
//! A lock-free, multi-writer, append-only log living in a caller-supplied
//! memory region. Built for code that runs before the usual services exist
//! and that may share the region with contexts it does not trust.
//!
//! ## Features
//!
//! - **Lock-Free Appends**: writers claim space with a CAS on the cursor and never block
//! - **Fail-Closed Validation**: the control block is re-checked on every access and the
//!   channel is poisoned for good on the first inconsistency
//! - **Loss Accounting**: entries that do not fit are counted, not silently dropped
//! - **Secondary Fan-out**: every accepted payload is mirrored to a byte sink
//! - **Offline Decoding**: region images can be parsed and scanned after the fact
//!
//! ## Memory Layout
//!
//! ```text
//! ┌──────────────────┬─────────────────────────────────────────────────┐
//! │ ControlBlock 64B │ [hdr|payload] [hdr|payload] ...   free          │
//! │ sig ver base     │  ▲                          ▲                   │
//! │ cursor discarded │  buffer_base                cursor              │
//! └──────────────────┴─────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use bootlog_shm::{Channel, HeapRegion, CaptureSink};
//! use bootlog_shm::bootlog::{level, shm::consts::MIN_REGION_SIZE};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let sink = CaptureSink::new();
//! let channel = Channel::builder(HeapRegion::new(MIN_REGION_SIZE)?)
//!     .sink(sink.clone())
//!     .build();
//!
//! channel.write(level::INFO, b"memory map ready");
//! channel.print(format_args!("{} cores online", 4));
//!
//! for entry in channel.entries().into_iter().flatten() {
//!     let entry = entry?;
//!     println!("[{}] {}", entry.timestamp, entry.message());
//! }
//! assert_eq!(channel.acquire().map(|b| b.discarded()), Some(0));
//! # Ok(())
//! # }
//! ```
//!
//! ## Thread Safety
//!
//! - **Channel**: `Sync`; any number of threads may write concurrently
//! - **EntryIter**: sees every entry published before the scan started and
//!   stops at the first one still being written
//! - **global**: install once, then log from anywhere

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod channel;
pub mod clock;
pub mod discard;
pub mod error;
pub mod fanout;
pub mod global;
pub mod print;
pub mod reader;
pub mod region;
pub mod writer;

pub use ::bootlog;

pub use channel::{Channel, ChannelBuilder, ChannelState};
pub use clock::{MonotonicClock, TickCounter, TimestampSource};
pub use error::{ImageError, IntegrityViolation, RegionError, RegionResult, ScanError};
pub use fanout::{ByteSink, CaptureSink, NullSink, StdoutPort};
pub use print::PrintBuffer;
pub use reader::{EntryIter, LogEntry, LogImage};
pub use region::{HeapRegion, MemoryRegion, MmapConfig, MmapRegion, RawRegion, map_image};

/// Initialize tracing for diagnostics about the channel itself
pub fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt};

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);
}
