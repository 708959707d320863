//! Error types returned by init functions and by the boot sequencer.

use core::ffi::c_int;
use core::fmt;
use core::num::NonZeroI32;

/// Implement common methods for kernel status enums.
///
/// Generates `as_c_int()`, `from_c_int()`, `is_success()`, and `is_error()` methods
/// for `#[repr(i32)]` status enums that follow the kernel's error convention.
macro_rules! impl_kernel_error {
    ($ty:ty, fallback: $fallback:ident, variants: { $($val:literal => $variant:ident),* $(,)? }) => {
        impl $ty {
            /// Convert to C-style integer for FFI returns.
            #[inline]
            pub fn as_c_int(self) -> c_int {
                self as c_int
            }

            /// Convert from C-style integer.
            #[inline]
            pub fn from_c_int(val: c_int) -> Self {
                match val {
                    $($val => Self::$variant,)*
                    _ => Self::$fallback,
                }
            }

            /// Check if this is a success result.
            #[inline]
            pub fn is_success(self) -> bool {
                matches!(self, Self::Success)
            }

            /// Check if this is an error result.
            #[inline]
            pub fn is_error(self) -> bool {
                !self.is_success()
            }
        }
    };
}

/// Result of one init function.
pub type InitResult = Result<(), InitErrno>;

/// Nonzero failure code reported by an init function.
///
/// Codes follow the usual errno numbering; negative codes are accepted and
/// kept as-is so C drivers returning `-EIO` report faithfully.
#[repr(transparent)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct InitErrno(NonZeroI32);

impl InitErrno {
    pub const EPERM: Self = Self::from_const(1);
    pub const EIO: Self = Self::from_const(5);
    pub const ENXIO: Self = Self::from_const(6);
    pub const EAGAIN: Self = Self::from_const(11);
    pub const ENOMEM: Self = Self::from_const(12);
    pub const EBUSY: Self = Self::from_const(16);
    pub const ENODEV: Self = Self::from_const(19);
    pub const EINVAL: Self = Self::from_const(22);
    pub const ETIMEDOUT: Self = Self::from_const(110);
    pub const ENOTSUP: Self = Self::from_const(134);

    const fn from_const(code: i32) -> Self {
        match NonZeroI32::new(code) {
            Some(code) => Self(code),
            None => panic!("errno must be nonzero"),
        }
    }

    /// `None` for zero, which means success.
    pub const fn new(code: i32) -> Option<Self> {
        match NonZeroI32::new(code) {
            Some(code) => Some(Self(code)),
            None => None,
        }
    }

    #[inline]
    pub const fn code(self) -> i32 {
        self.0.get()
    }

    /// Code as stored in a device's 8-bit init state: magnitude, saturated
    /// at 255. Never zero, so a failed device never reads back as healthy.
    pub const fn device_code(self) -> u8 {
        let magnitude = self.0.get().unsigned_abs();
        if magnitude > u8::MAX as u32 {
            u8::MAX
        } else {
            magnitude as u8
        }
    }

    /// Map a C-style return code (0 = success) onto `InitResult`.
    #[inline]
    pub fn result_from_c_int(rc: c_int) -> InitResult {
        match Self::new(rc) {
            Some(errno) => Err(errno),
            None => Ok(()),
        }
    }

    fn symbol(self) -> Option<&'static str> {
        let name = match self.0.get().unsigned_abs() {
            1 => "EPERM",
            5 => "EIO",
            6 => "ENXIO",
            11 => "EAGAIN",
            12 => "ENOMEM",
            16 => "EBUSY",
            19 => "ENODEV",
            22 => "EINVAL",
            110 => "ETIMEDOUT",
            134 => "ENOTSUP",
            _ => return None,
        };
        Some(name)
    }
}

impl fmt::Display for InitErrno {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.symbol() {
            Some(name) if self.code() < 0 => write!(f, "-{name}"),
            Some(name) => f.write_str(name),
            None => write!(f, "errno {}", self.code()),
        }
    }
}

/// Status codes returned across the C boundary by the sequencer entry point.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SysInitStatus {
    /// Level ran to completion
    #[default]
    Success = 0,
    /// Every level already ran
    AlreadyDone = -1,
    /// Requested level is not the next one in walk order
    OutOfOrder = -2,
    /// Called from inside an init function
    Reentrant = -3,
    /// A failing entry stopped the boot
    Halted = -4,
    /// No sequencer has been installed
    NotInstalled = -5,
    /// Raw level ordinal does not name a level in this build
    InvalidLevel = -6,
    /// Configuration change after the first level started
    AlreadyStarted = -7,
}

impl_kernel_error!(SysInitStatus, fallback: InvalidLevel, variants: {
    0 => Success,
    -1 => AlreadyDone,
    -2 => OutOfOrder,
    -3 => Reentrant,
    -4 => Halted,
    -5 => NotInstalled,
    -6 => InvalidLevel,
    -7 => AlreadyStarted,
});
