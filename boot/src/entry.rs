//! Init entries and their placement.
//!
//! An entry is built in a `const` context by one of the registration macros,
//! so a priority outside `0..=99` or an unknown level name stops the build.
//! Each module publishes its entries as a `&[InitEntry]` constant and an
//! `init_table!` invocation gathers them into the ordered table.

use core::fmt;

use sysinit_abi::{EntryFlags, InitLevel, InitPriority, InitResult};

use crate::device::{DeviceHandle, DeviceRef};

/// Fixed signature of every init function.
pub type InitFn = fn(DeviceRef) -> InitResult;

fn vacant_init(_dev: DeviceRef) -> InitResult {
    Ok(())
}

#[derive(Clone, Copy)]
pub struct InitEntry {
    name: &'static str,
    module: &'static str,
    init: InitFn,
    device: Option<DeviceHandle>,
    level: InitLevel,
    priority: InitPriority,
    flags: EntryFlags,
    seq: u16,
}

impl InitEntry {
    /// Placeholder used to size arrays during table construction.
    pub(crate) const VACANT: Self = Self::new("", vacant_init, None, InitLevel::FIRST, InitPriority::FIRST);

    pub const fn new(
        name: &'static str,
        init: InitFn,
        device: Option<DeviceHandle>,
        level: InitLevel,
        priority: InitPriority,
    ) -> Self {
        Self {
            name,
            module: "",
            init,
            device,
            level,
            priority,
            flags: EntryFlags::empty(),
            seq: 0,
        }
    }

    pub const fn with_flags(self, flags: EntryFlags) -> Self {
        Self {
            flags: self.flags.union(flags),
            ..self
        }
    }

    /// A failure of this entry never halts the boot.
    pub const fn optional(self) -> Self {
        self.with_flags(EntryFlags::OPTIONAL)
    }

    /// A failure of this entry always halts the boot.
    pub const fn critical(self) -> Self {
        self.with_flags(EntryFlags::CRITICAL)
    }

    /// Scope the name to the declaring module. Names only need to be unique
    /// within one module.
    pub const fn in_module(self, module: &'static str) -> Self {
        Self { module, ..self }
    }

    pub(crate) const fn with_seq(self, seq: u16) -> Self {
        Self { seq, ..self }
    }

    #[inline]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Path of the declaring module, empty for entries built by hand.
    #[inline]
    pub const fn module(&self) -> &'static str {
        self.module
    }

    #[inline]
    pub const fn device(&self) -> Option<DeviceHandle> {
        self.device
    }

    #[inline]
    pub const fn level(&self) -> InitLevel {
        self.level
    }

    #[inline]
    pub const fn priority(&self) -> InitPriority {
        self.priority
    }

    #[inline]
    pub const fn flags(&self) -> EntryFlags {
        self.flags
    }

    /// Position among all entries of the table, in aggregation order.
    #[inline]
    pub const fn seq(&self) -> u16 {
        self.seq
    }

    pub const fn key(&self) -> OrderingKey {
        OrderingKey {
            level: self.level,
            priority: self.priority,
            seq: self.seq,
        }
    }

    pub const fn placement(&self) -> PlacementTag {
        PlacementTag::new(self.level, self.priority)
    }

    pub(crate) fn call(&self, dev: DeviceRef) -> InitResult {
        (self.init)(dev)
    }
}

impl fmt::Debug for InitEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InitEntry")
            .field("name", &self.name)
            .field("module", &self.module)
            .field("device", &self.device)
            .field("level", &self.level)
            .field("priority", &self.priority)
            .field("flags", &self.flags)
            .field("seq", &self.seq)
            .finish()
    }
}

/// Total order of entries: level, then priority, then aggregation order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OrderingKey {
    pub level: InitLevel,
    pub priority: InitPriority,
    pub seq: u16,
}

impl OrderingKey {
    /// `Ord::lt` usable during const evaluation.
    pub const fn precedes(&self, other: &Self) -> bool {
        let (a, b) = (self.level as u8, other.level as u8);
        if a != b {
            return a < b;
        }
        let (a, b) = (self.priority.get(), other.priority.get());
        if a != b {
            return a < b;
        }
        self.seq < other.seq
    }
}

const TAG_PREFIX: &[u8; 9] = b".sysinit.";
const TAG_LEN: usize = TAG_PREFIX.len() + 4;

/// Section-style name for a (level, priority) slot, e.g. `.sysinit.1.05`.
///
/// Priorities are zero-padded to two digits so byte order of tags matches
/// numeric (level, priority) order.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PlacementTag([u8; TAG_LEN]);

impl PlacementTag {
    pub const fn new(level: InitLevel, priority: InitPriority) -> Self {
        let mut tag = [0u8; TAG_LEN];
        let mut i = 0;
        while i < TAG_PREFIX.len() {
            tag[i] = TAG_PREFIX[i];
            i += 1;
        }
        let prio = priority.get();
        tag[i] = b'0' + level as u8;
        tag[i + 1] = b'.';
        tag[i + 2] = b'0' + prio / 10;
        tag[i + 3] = b'0' + prio % 10;
        Self(tag)
    }

    pub fn as_str(&self) -> &str {
        core::str::from_utf8(&self.0).unwrap_or_default()
    }
}

impl fmt::Display for PlacementTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Debug for PlacementTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PlacementTag({})", self.as_str())
    }
}

/// Build an `InitEntry` at compile time.
///
/// ```ignore
/// init_entry!(uart0, uart_init, Some(UART0), PRE_KERNEL_1, 40)
/// ```
///
/// `$level` is one of `EARLY`, `PRE_KERNEL_1`, `PRE_KERNEL_2`, `POST_KERNEL`,
/// `APPLICATION` (and `SMP` with the `smp` feature).
///
/// Priorities go up to 99:
///
/// ```
/// use sysinit_boot::{sys_init, DeviceRef, InitEntry, InitResult};
///
/// fn rtc_init(_dev: DeviceRef) -> InitResult {
///     Ok(())
/// }
///
/// const ENTRIES: &[InitEntry] = &[sys_init!(rtc_init, EARLY, 99)];
///
/// fn main() {
///     assert_eq!(ENTRIES[0].priority().get(), 99);
/// }
/// ```
///
/// and anything above that fails to build:
///
/// ```compile_fail
/// use sysinit_boot::{sys_init, DeviceRef, InitEntry, InitResult};
///
/// fn rtc_init(_dev: DeviceRef) -> InitResult {
///     Ok(())
/// }
///
/// const ENTRIES: &[InitEntry] = &[sys_init!(rtc_init, EARLY, 100)];
///
/// fn main() {
///     assert_eq!(ENTRIES[0].priority().get(), 100);
/// }
/// ```
///
/// So does a level name that does not exist:
///
/// ```compile_fail
/// use sysinit_boot::{sys_init, DeviceRef, InitEntry, InitResult};
///
/// fn rtc_init(_dev: DeviceRef) -> InitResult {
///     Ok(())
/// }
///
/// const ENTRIES: &[InitEntry] = &[sys_init!(rtc_init, LATE_KERNEL, 10)];
///
/// fn main() {
///     assert_eq!(ENTRIES.len(), 1);
/// }
/// ```
#[macro_export]
macro_rules! init_entry {
    ($name:ident, $init_fn:path, $device:expr, $level:ident, $prio:expr) => {{
        const ENTRY: $crate::InitEntry = $crate::InitEntry::new(
            ::core::stringify!($name),
            $init_fn,
            $device,
            $crate::InitLevel::$level,
            $crate::InitPriority::new($prio),
        )
        .in_module(::core::module_path!());
        ENTRY
    }};
}

/// Service entry named after its init function.
#[macro_export]
macro_rules! sys_init {
    ($init_fn:ident, $level:ident, $prio:expr) => {
        $crate::init_entry!($init_fn, $init_fn, ::core::option::Option::None, $level, $prio)
    };
}

/// Service entry with an explicit name, so one function can be registered
/// more than once.
#[macro_export]
macro_rules! sys_init_named {
    ($name:ident, $init_fn:path, $level:ident, $prio:expr) => {
        $crate::init_entry!($name, $init_fn, ::core::option::Option::None, $level, $prio)
    };
}

/// Entry bound to a device table slot.
#[macro_export]
macro_rules! device_init {
    ($name:ident, $init_fn:path, $device:expr, $level:ident, $prio:expr) => {
        $crate::init_entry!(
            $name,
            $init_fn,
            ::core::option::Option::Some($device),
            $level,
            $prio
        )
    };
}
