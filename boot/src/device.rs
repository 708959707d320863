//! Device handles and per-device init state.
//!
//! The registry never owns devices. The device model keeps a `'static`
//! table of `Device` objects and entries refer to them by index, which keeps
//! entries plain constant data.

use core::fmt;
use core::sync::atomic::{AtomicU8, Ordering};

use sysinit_abi::InitResult;
use sysinit_lib::InitFlag;

/// Non-owning reference to a slot in the device table.
#[repr(transparent)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DeviceHandle(u16);

impl DeviceHandle {
    #[inline]
    pub const fn new(index: u16) -> Self {
        Self(index)
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// What an init function receives: the bound device, or `None` for services.
pub type DeviceRef = Option<&'static Device>;

pub struct Device {
    name: &'static str,
    initialized: InitFlag,
    init_res: AtomicU8,
}

impl Device {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            initialized: InitFlag::new(),
            init_res: AtomicU8::new(0),
        }
    }

    #[inline]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// True once the device's init entry has run, whatever its outcome.
    #[inline]
    pub fn is_initialized(&self) -> bool {
        self.initialized.is_set()
    }

    /// `None` before init ran; `Some(0)` on success, else the clamped errno.
    pub fn init_result(&self) -> Option<u8> {
        if self.initialized.is_set() {
            Some(self.init_res.load(Ordering::Relaxed))
        } else {
            None
        }
    }

    /// Dependents check this before using the device.
    #[inline]
    pub fn is_ready(&self) -> bool {
        self.init_result() == Some(0)
    }

    pub(crate) fn record_init(&self, result: InitResult) {
        let code = match result {
            Ok(()) => 0,
            Err(errno) => errno.device_code(),
        };
        self.init_res.store(code, Ordering::Relaxed);
        self.initialized.mark_set();
    }
}

impl fmt::Debug for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Device")
            .field("name", &self.name)
            .field("init_result", &self.init_result())
            .finish()
    }
}
