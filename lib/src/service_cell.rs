//! Write-once cell holding a `&'static` service.
//!
//! The boot sequencer is installed into one of these so C code can reach it
//! through a plain function without threading a pointer around.

use core::sync::atomic::{AtomicPtr, Ordering};

pub struct ServiceCell<T> {
    ptr: AtomicPtr<T>,
    name: &'static str,
}

// SAFETY: Only stores pointer to 'static T; AtomicPtr provides synchronization.
unsafe impl<T: Sync> Sync for ServiceCell<T> {}

impl<T> ServiceCell<T> {
    /// `name` only shows up in log output.
    #[inline]
    pub const fn new(name: &'static str) -> Self {
        Self {
            ptr: AtomicPtr::new(core::ptr::null_mut()),
            name,
        }
    }

    /// Store `service` if the cell is empty. Returns `false` and leaves the
    /// existing service in place otherwise.
    #[inline]
    pub fn register(&self, service: &'static T) -> bool {
        self.ptr
            .compare_exchange(
                core::ptr::null_mut(),
                service as *const T as *mut T,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    #[inline]
    pub fn try_get(&self) -> Option<&'static T> {
        let ptr = self.ptr.load(Ordering::Acquire);
        // SAFETY: Only valid &'static T pointers are ever stored.
        unsafe { ptr.as_ref() }
    }

    #[inline]
    pub const fn name(&self) -> &'static str {
        self.name
    }
}
