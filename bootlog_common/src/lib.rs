//! Bootlog Common Library
//!
//! This crate provides the shared memory layout, constants and configuration
//! loading utilities for all bootlog workspace crates.
//!
//! # Module Structure
//!
//! - [`shm`] - Control block / entry layout and region constants
//! - [`level`] - Entry level tags
//! - [`config`] - Configuration loading traits and types
//! - [`prelude`] - Common re-exports for convenience
//!
//! # Usage
//!
//! Add to your `Cargo.toml` with alias for shorter imports:
//! ```toml
//! [dependencies]
//! bootlog = { package = "bootlog_common", path = "../bootlog_common" }
//! ```
//!
//! Then import:
//! ```rust
//! use bootlog_common::shm::layout::{ControlBlock, entry_size};
//! use bootlog_common::config::{ConfigLoader, ChannelConfig};
//! ```

pub mod config;
pub mod consts;
pub mod level;
pub mod prelude;
pub mod shm;
