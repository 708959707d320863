//! One-way atomic "has this happened yet" flag.
//!
//! Guards the log sink and records whether a device has been initialized.
//!
//! # Memory Ordering
//!
//! - `mark_set()` uses `Release` to publish whatever was done before it
//! - `is_set()` uses `Acquire` to observe those side-effects
//! - `is_set_relaxed()` is for logging guards that need no ordering

use core::sync::atomic::{AtomicBool, Ordering};

#[repr(transparent)]
pub struct InitFlag {
    flag: AtomicBool,
}

impl InitFlag {
    #[inline]
    pub const fn new() -> Self {
        Self {
            flag: AtomicBool::new(false),
        }
    }

    #[inline]
    pub fn is_set(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    #[inline]
    pub fn is_set_relaxed(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn mark_set(&self) {
        self.flag.store(true, Ordering::Release);
    }

    /// Only for resetting logger state; boot-time flags never go back.
    #[inline]
    pub fn reset(&self) {
        self.flag.store(false, Ordering::Release);
    }
}

impl Default for InitFlag {
    fn default() -> Self {
        Self::new()
    }
}
