//! Initialization levels and priorities.
//!
//! Levels are walked in ascending ordinal order. `EARLY` and the two
//! `PRE_KERNEL` levels run before the scheduler exists, so their entries may
//! not block on kernel objects. `PRE_KERNEL_1` and `PRE_KERNEL_2` run on the
//! interrupt stack; the remaining levels run in the kernel's main task.

use core::fmt;

#[cfg(not(feature = "smp"))]
pub const INIT_LEVEL_COUNT: usize = 5;
#[cfg(feature = "smp")]
pub const INIT_LEVEL_COUNT: usize = 6;

/// Highest priority value accepted by `InitPriority::new`.
pub const INIT_PRIORITY_MAX: u32 = 99;

#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum InitLevel {
    Early = 0,
    PreKernel1 = 1,
    PreKernel2 = 2,
    PostKernel = 3,
    Application = 4,
    #[cfg(feature = "smp")]
    Smp = 5,
}

impl InitLevel {
    // Declaration symbols accepted by the registration macros.
    pub const EARLY: Self = Self::Early;
    pub const PRE_KERNEL_1: Self = Self::PreKernel1;
    pub const PRE_KERNEL_2: Self = Self::PreKernel2;
    pub const POST_KERNEL: Self = Self::PostKernel;
    pub const APPLICATION: Self = Self::Application;
    #[cfg(feature = "smp")]
    pub const SMP: Self = Self::Smp;

    pub const FIRST: Self = Self::Early;
    #[cfg(not(feature = "smp"))]
    pub const LAST: Self = Self::Application;
    #[cfg(feature = "smp")]
    pub const LAST: Self = Self::Smp;

    /// Every level in walk order.
    #[cfg(not(feature = "smp"))]
    pub const ALL: [InitLevel; INIT_LEVEL_COUNT] = [
        Self::Early,
        Self::PreKernel1,
        Self::PreKernel2,
        Self::PostKernel,
        Self::Application,
    ];
    #[cfg(feature = "smp")]
    pub const ALL: [InitLevel; INIT_LEVEL_COUNT] = [
        Self::Early,
        Self::PreKernel1,
        Self::PreKernel2,
        Self::PostKernel,
        Self::Application,
        Self::Smp,
    ];

    #[inline]
    pub const fn ordinal(self) -> usize {
        self as usize
    }

    /// Convert from the raw ordinal used across the C boundary.
    pub const fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(Self::Early),
            1 => Some(Self::PreKernel1),
            2 => Some(Self::PreKernel2),
            3 => Some(Self::PostKernel),
            4 => Some(Self::Application),
            #[cfg(feature = "smp")]
            5 => Some(Self::Smp),
            _ => None,
        }
    }

    /// The level walked after this one, `None` for the last level.
    pub const fn next(self) -> Option<Self> {
        Self::from_raw(self as u8 + 1)
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Early => "EARLY",
            Self::PreKernel1 => "PRE_KERNEL_1",
            Self::PreKernel2 => "PRE_KERNEL_2",
            Self::PostKernel => "POST_KERNEL",
            Self::Application => "APPLICATION",
            #[cfg(feature = "smp")]
            Self::Smp => "SMP",
        }
    }

    /// True while no concurrency-providing kernel service exists yet.
    #[inline]
    pub const fn is_pre_kernel(self) -> bool {
        matches!(self, Self::Early | Self::PreKernel1 | Self::PreKernel2)
    }

    #[inline]
    pub const fn runs_on_interrupt_stack(self) -> bool {
        matches!(self, Self::PreKernel1 | Self::PreKernel2)
    }
}

impl fmt::Display for InitLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Intra-level ordering key in `0..=99`; lower runs earlier.
#[repr(transparent)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InitPriority(u8);

impl InitPriority {
    pub const FIRST: Self = Self(0);
    pub const LAST: Self = Self(INIT_PRIORITY_MAX as u8);
    /// Conventional slot for kernel services.
    pub const DEFAULT: Self = Self(40);
    /// Conventional slot for device drivers.
    pub const DEVICE: Self = Self(50);

    /// Build a priority. Out-of-range values abort const evaluation, which
    /// turns a bad declaration into a build error.
    pub const fn new(prio: u32) -> Self {
        match Self::try_new(prio) {
            Some(prio) => prio,
            None => panic!("init priority must be in 0..=99"),
        }
    }

    pub const fn try_new(prio: u32) -> Option<Self> {
        if prio > INIT_PRIORITY_MAX {
            None
        } else {
            Some(Self(prio as u8))
        }
    }

    #[inline]
    pub const fn get(self) -> u8 {
        self.0
    }
}

impl fmt::Display for InitPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
