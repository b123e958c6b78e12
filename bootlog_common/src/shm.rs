//! Shared memory subsystem.
//!
//! This module contains:
//! - `consts`: region size limits and alignment constants.
//! - `layout`: the control block and entry header layouts.

pub mod consts;
pub mod layout;
