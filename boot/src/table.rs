//! Level table builder.
//!
//! `init_table!` concatenates the per-module entry lists in the order they
//! are named, numbers every entry in that order and stable-sorts the result
//! by (level, priority, number). All of it runs during const evaluation: the
//! table is a plain `static` by the time the kernel starts, and a bad table
//! (a name declared twice in one module, too many entries) is a build error.

use sysinit_abi::{InitLevel, INIT_LEVEL_COUNT};

use crate::entry::InitEntry;

/// Half-open index range of one level inside the table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LevelBounds {
    pub start: usize,
    pub end: usize,
}

impl LevelBounds {
    pub const EMPTY: Self = Self { start: 0, end: 0 };

    #[inline]
    pub const fn len(&self) -> usize {
        self.end - self.start
    }

    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Every entry of the image, contiguous per level and ascending within each.
pub struct OrderedTable {
    entries: &'static [InitEntry],
    bounds: [LevelBounds; INIT_LEVEL_COUNT],
}

impl OrderedTable {
    pub const EMPTY: Self = Self {
        entries: &[],
        bounds: [LevelBounds::EMPTY; INIT_LEVEL_COUNT],
    };

    /// Used by `init_table!`; `entries` must come out of `build` and
    /// `bounds` out of `level_bounds` over the same array.
    #[doc(hidden)]
    pub const fn from_sorted(
        entries: &'static [InitEntry],
        bounds: [LevelBounds; INIT_LEVEL_COUNT],
    ) -> Self {
        Self { entries, bounds }
    }

    /// The ordered entries of one level.
    pub fn level(&self, level: InitLevel) -> &'static [InitEntry] {
        let bounds = self.bounds[level.ordinal()];
        let entries: &'static [InitEntry] = self.entries;
        &entries[bounds.start..bounds.end]
    }

    #[inline]
    pub fn bounds(&self, level: InitLevel) -> LevelBounds {
        self.bounds[level.ordinal()]
    }

    #[inline]
    pub const fn entries(&self) -> &'static [InitEntry] {
        self.entries
    }

    #[inline]
    pub const fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn find(&self, name: &str) -> Option<&'static InitEntry> {
        let entries: &'static [InitEntry] = self.entries;
        entries.iter().find(|entry| entry.name() == name)
    }
}

pub const fn total_len(sources: &[&[InitEntry]]) -> usize {
    let mut total = 0;
    let mut i = 0;
    while i < sources.len() {
        total += sources[i].len();
        i += 1;
    }
    total
}

const fn str_eq(a: &str, b: &str) -> bool {
    let (a, b) = (a.as_bytes(), b.as_bytes());
    if a.len() != b.len() {
        return false;
    }
    let mut i = 0;
    while i < a.len() {
        if a[i] != b[i] {
            return false;
        }
        i += 1;
    }
    true
}

/// Concatenate, number and sort. `N` must equal `total_len(sources)`.
pub const fn build<const N: usize>(sources: &[&[InitEntry]]) -> [InitEntry; N] {
    if N > u16::MAX as usize {
        panic!("init table holds more than 65535 entries");
    }
    if total_len(sources) != N {
        panic!("init table length does not match its sources");
    }

    let mut out = [InitEntry::VACANT; N];
    let mut seq = 0;
    let mut s = 0;
    while s < sources.len() {
        let src = sources[s];
        let mut i = 0;
        while i < src.len() {
            out[seq] = src[i].with_seq(seq as u16);
            seq += 1;
            i += 1;
        }
        s += 1;
    }

    let mut i = 0;
    while i < N {
        let mut j = i + 1;
        while j < N {
            if str_eq(out[i].name(), out[j].name()) && str_eq(out[i].module(), out[j].module()) {
                panic!("duplicate init entry name");
            }
            j += 1;
        }
        i += 1;
    }

    // Insertion sort: stable, and N is small.
    let mut i = 1;
    while i < N {
        let cur = out[i];
        let mut j = i;
        while j > 0 && cur.key().precedes(&out[j - 1].key()) {
            out[j] = out[j - 1];
            j -= 1;
        }
        out[j] = cur;
        i += 1;
    }
    out
}

/// Per-level ranges over a sorted entry array.
pub const fn level_bounds(entries: &[InitEntry]) -> [LevelBounds; INIT_LEVEL_COUNT] {
    let mut bounds = [LevelBounds::EMPTY; INIT_LEVEL_COUNT];
    let mut cursor = 0;
    let mut level = 0;
    while level < INIT_LEVEL_COUNT {
        let start = cursor;
        while cursor < entries.len() && entries[cursor].level() as usize == level {
            cursor += 1;
        }
        bounds[level] = LevelBounds { start, end: cursor };
        level += 1;
    }
    if cursor != entries.len() {
        panic!("init entries are not sorted by level");
    }
    bounds
}

/// Aggregate module entry lists into one `OrderedTable` static.
///
/// ```ignore
/// init_table!(pub static BOOT_TABLE = [drivers::INIT_ENTRIES, services::INIT_ENTRIES]);
/// ```
///
/// Entries with the same level and priority keep the order in which their
/// lists are named here, then their order within each list. Also defines
/// `BOOT_TABLE_LEN`.
///
/// Registering one name twice from the same module fails to build:
///
/// ```compile_fail
/// use sysinit_boot::{init_table, sys_init_named, DeviceRef, InitEntry, InitResult};
///
/// fn rtc_init(_dev: DeviceRef) -> InitResult {
///     Ok(())
/// }
///
/// const INIT_ENTRIES: &[InitEntry] = &[
///     sys_init_named!(rtc, rtc_init, PRE_KERNEL_1, 10),
///     sys_init_named!(rtc, rtc_init, PRE_KERNEL_2, 10),
/// ];
///
/// init_table!(static BOOT_TABLE = [INIT_ENTRIES]);
///
/// fn main() {
///     assert_eq!(BOOT_TABLE.len(), 2);
/// }
/// ```
#[macro_export]
macro_rules! init_table {
    ($(#[$meta:meta])* $vis:vis static $name:ident = [$($src:expr),* $(,)?] $(;)?) => {
        $crate::paste::paste! {
            #[doc(hidden)]
            const [<__ $name _SOURCES>]: &[&[$crate::InitEntry]] = &[$($src),*];

            $vis const [<$name _LEN>]: usize = $crate::table::total_len([<__ $name _SOURCES>]);

            #[doc(hidden)]
            const [<__ $name _SORTED>]: [$crate::InitEntry; [<$name _LEN>]] =
                $crate::table::build::<{ [<$name _LEN>] }>([<__ $name _SOURCES>]);

            #[doc(hidden)]
            static [<__ $name _ENTRIES>]: [$crate::InitEntry; [<$name _LEN>]] = [<__ $name _SORTED>];

            $(#[$meta])*
            $vis static $name: $crate::OrderedTable = $crate::OrderedTable::from_sorted(
                &[<__ $name _ENTRIES>],
                $crate::table::level_bounds(&[<__ $name _SORTED>]),
            );
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::DeviceRef;
    use std::vec::Vec;
    use sysinit_abi::{InitPriority, InitResult};

    fn noop(_dev: DeviceRef) -> InitResult {
        Ok(())
    }

    const DRIVERS: &[InitEntry] = &[
        crate::sys_init_named!(timer, noop, PRE_KERNEL_2, 10),
        crate::sys_init_named!(uart, noop, PRE_KERNEL_1, 50),
        crate::sys_init_named!(clock, noop, PRE_KERNEL_1, 5),
        crate::sys_init_named!(netif, noop, POST_KERNEL, 50),
    ];

    const SERVICES: &[InitEntry] = &[
        crate::sys_init_named!(logger, noop, POST_KERNEL, 50),
        crate::sys_init_named!(shell, noop, APPLICATION, 0),
        crate::sys_init_named!(console, noop, PRE_KERNEL_1, 50),
    ];

    crate::init_table!(static TABLE = [DRIVERS, SERVICES]);
    crate::init_table!(static NOTHING = []);

    fn names(entries: &[InitEntry]) -> Vec<&'static str> {
        entries.iter().map(InitEntry::name).collect()
    }

    #[test]
    fn groups_by_level_and_sorts_by_priority() {
        assert_eq!(TABLE_LEN, 7);
        assert_eq!(TABLE.len(), 7);
        assert!(TABLE.level(InitLevel::Early).is_empty());
        assert_eq!(names(TABLE.level(InitLevel::PreKernel1)), ["clock", "uart", "console"]);
        assert_eq!(names(TABLE.level(InitLevel::PreKernel2)), ["timer"]);
        assert_eq!(names(TABLE.level(InitLevel::PostKernel)), ["netif", "logger"]);
        assert_eq!(names(TABLE.level(InitLevel::Application)), ["shell"]);
    }

    #[test]
    fn whole_table_is_contiguous_and_ascending() {
        let entries = TABLE.entries();
        for pair in entries.windows(2) {
            assert!(pair[0].key() < pair[1].key());
        }
        let mut expected_start = 0;
        for level in InitLevel::ALL {
            let bounds = TABLE.bounds(level);
            assert_eq!(bounds.start, expected_start);
            expected_start = bounds.end;
            assert!(TABLE.level(level).iter().all(|e| e.level() == level));
        }
        assert_eq!(expected_start, entries.len());
    }

    #[test]
    fn sequence_numbers_follow_aggregation_order() {
        assert_eq!(TABLE.find("timer").map(InitEntry::seq), Some(0));
        assert_eq!(TABLE.find("netif").map(InitEntry::seq), Some(3));
        assert_eq!(TABLE.find("logger").map(InitEntry::seq), Some(4));
        assert_eq!(TABLE.find("console").map(InitEntry::seq), Some(6));
        assert!(TABLE.find("missing").is_none());
    }

    #[test]
    fn empty_table() {
        assert_eq!(NOTHING_LEN, 0);
        assert!(NOTHING.is_empty());
        for level in InitLevel::ALL {
            assert!(NOTHING.bounds(level).is_empty());
        }
        assert!(OrderedTable::EMPTY.level(InitLevel::LAST).is_empty());
    }

    mod net {
        use crate::device::DeviceRef;
        use sysinit_abi::InitResult;

        fn init(_dev: DeviceRef) -> InitResult {
            Ok(())
        }

        pub const INIT_ENTRIES: &[crate::InitEntry] = &[crate::sys_init!(init, POST_KERNEL, 50)];
    }

    mod fs {
        use crate::device::DeviceRef;
        use sysinit_abi::InitResult;

        fn init(_dev: DeviceRef) -> InitResult {
            Ok(())
        }

        pub const INIT_ENTRIES: &[crate::InitEntry] = &[crate::sys_init!(init, POST_KERNEL, 50)];
    }

    crate::init_table!(static SAME_NAMES = [net::INIT_ENTRIES, fs::INIT_ENTRIES]);

    #[test]
    fn same_name_in_different_modules() {
        let entries = SAME_NAMES.level(InitLevel::PostKernel);
        assert_eq!(names(entries), ["init", "init"]);
        assert!(entries[0].module().ends_with("::net"));
        assert!(entries[1].module().ends_with("::fs"));
    }

    #[test]
    #[should_panic(expected = "duplicate init entry name")]
    fn build_rejects_duplicate_names() {
        let dup = InitEntry::new("twice", noop, None, InitLevel::Early, InitPriority::new(1));
        let _ = build::<2>(&[&[dup, dup]]);
    }

    #[test]
    #[should_panic(expected = "init table length does not match its sources")]
    fn build_rejects_wrong_length() {
        let _ = build::<3>(&[DRIVERS]);
    }
}
