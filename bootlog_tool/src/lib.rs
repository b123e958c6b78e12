//! # Bootlog Tool Library
//!
//! Pieces behind the `bootlog_tool` binary, kept in a library so they can be
//! tested without spawning a process.
//!
//! - [`logging`] - tracing subscriber for the tool's own diagnostics
//! - [`record`] - feed lines into a live channel
//! - [`report`] - decode a region image into text or JSON

#![deny(warnings)]
#![deny(missing_docs)]

pub mod error;
pub mod logging;
pub mod record;
pub mod report;

pub use error::{ToolError, ToolResult};
