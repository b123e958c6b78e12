//! Process-wide channel
//!
//! Code that cannot thread a `&Channel` through (panic hooks, early init,
//! the [`bootlog!`](crate::bootlog) macro) logs through the channel
//! installed here. Lookup is a single atomic load; nothing on this path
//! blocks.

use crate::channel::Channel;
use bootlog::shm::layout::ControlBlock;
use core::fmt;
use std::ptr;
use std::sync::atomic::{AtomicPtr, Ordering};

static CHANNEL: AtomicPtr<Channel> = AtomicPtr::new(ptr::null_mut());

/// Publish `channel` as the process-wide channel.
///
/// The channel is leaked so references handed out stay valid for the rest of
/// the process, including across [`reset`].
pub fn install(channel: Channel) -> &'static Channel {
    let leaked: &'static Channel = Box::leak(Box::new(channel));
    let previous = CHANNEL.swap(leaked as *const Channel as *mut Channel, Ordering::AcqRel);
    if !previous.is_null() {
        tracing::debug!("replaced process-wide log channel");
    }
    leaked
}

/// Unpublish the process-wide channel. The old channel stays allocated.
pub fn reset() {
    CHANNEL.store(ptr::null_mut(), Ordering::Release);
}

/// The installed channel, if any
pub fn channel() -> Option<&'static Channel> {
    let current = CHANNEL.load(Ordering::Acquire);
    // SAFETY: only ever set from `Box::leak`, never freed.
    unsafe { current.as_ref() }
}

/// Write to the installed channel; `None` if there is none or it is unavailable.
pub fn write(level: u32, payload: &[u8]) -> Option<&'static ControlBlock> {
    channel()?.write(level, payload)
}

/// Render and write to the installed channel; returns the bytes rendered.
pub fn print(args: fmt::Arguments<'_>) -> usize {
    match channel() {
        Some(channel) => channel.print(args),
        None => crate::print::PrintBuffer::render(args).as_bytes().len(),
    }
}
