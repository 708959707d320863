//! Boot sequencer.
//!
//! The kernel calls `run_level` once per level, at the milestone where that
//! level's services exist. Levels must be requested in walk order, each
//! exactly once. Within a level, entries run one at a time in table order and
//! each result is handled before the next entry starts. The lock is never held
//! while an init function runs, so an entry calling back into the sequencer
//! gets `Reentrant` instead of a deadlock.

use core::fmt;

use heapless::Vec;
use spin::Mutex;
use sysinit_abi::{InitErrno, InitLevel, InitResult, SysInitStatus, INIT_LEVEL_COUNT};
use sysinit_lib::{klog_debug, klog_trace, klog_warn};

use crate::device::Device;
use crate::entry::InitEntry;
use crate::policy::{
    resolve_action, Diagnostics, ErrorPolicy, FailureAction, InitFailure, KlogDiagnostics, Lenient,
};
use crate::table::OrderedTable;

/// Failures kept for later inspection; further ones are only counted.
pub const MAX_RECORDED_FAILURES: usize = 32;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SequencerState {
    NotStarted,
    RunningLevel(InitLevel),
    /// Previous level finished; waiting for the kernel to reach this one.
    AwaitingLevel(InitLevel),
    Done,
    Halted(InitFailure),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SequenceError {
    AlreadyDone,
    OutOfOrder {
        expected: InitLevel,
        requested: InitLevel,
    },
    /// Called from inside an init function.
    Reentrant,
    /// Sequencing stopped on this failure, now or earlier.
    Halted(InitFailure),
    /// Configuration change after the first level started.
    AlreadyStarted,
}

impl SequenceError {
    pub fn status(&self) -> SysInitStatus {
        match self {
            Self::AlreadyDone => SysInitStatus::AlreadyDone,
            Self::OutOfOrder { .. } => SysInitStatus::OutOfOrder,
            Self::Reentrant => SysInitStatus::Reentrant,
            Self::Halted(_) => SysInitStatus::Halted,
            Self::AlreadyStarted => SysInitStatus::AlreadyStarted,
        }
    }
}

impl fmt::Display for SequenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyDone => f.write_str("every init level already ran"),
            Self::OutOfOrder { expected, requested } => {
                write!(f, "requested level {requested}, next level is {expected}")
            }
            Self::Reentrant => f.write_str("init level requested from inside an init function"),
            Self::Halted(failure) => write!(f, "boot halted by {failure}"),
            Self::AlreadyStarted => f.write_str("init sequencing already started"),
        }
    }
}

/// Outcome of one completed (or halted) level.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LevelReport {
    pub level: InitLevel,
    pub ran: usize,
    pub failed: usize,
}

impl LevelReport {
    #[inline]
    pub fn is_clean(&self) -> bool {
        self.failed == 0
    }
}

/// Progress of the level currently running.
struct BootRun {
    level: InitLevel,
    ran: usize,
    failed: usize,
}

impl BootRun {
    fn new(level: InitLevel) -> Self {
        Self {
            level,
            ran: 0,
            failed: 0,
        }
    }

    fn finish(self) -> LevelReport {
        LevelReport {
            level: self.level,
            ran: self.ran,
            failed: self.failed,
        }
    }
}

/// Every failure seen so far, in the order they happened.
#[derive(Clone, Debug)]
pub struct FailureLog {
    recorded: Vec<InitFailure, MAX_RECORDED_FAILURES>,
    dropped: usize,
}

impl FailureLog {
    const fn new() -> Self {
        Self {
            recorded: Vec::new(),
            dropped: 0,
        }
    }

    fn record(&mut self, failure: InitFailure) {
        if self.recorded.push(failure).is_err() {
            self.dropped += 1;
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &InitFailure> {
        self.recorded.iter()
    }

    /// Total failures, including ones that did not fit.
    pub fn len(&self) -> usize {
        self.recorded.len() + self.dropped
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Failures counted but not kept.
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    pub fn find(&self, entry: &str) -> Option<&InitFailure> {
        self.recorded.iter().find(|failure| failure.entry == entry)
    }
}

struct SequencerInner {
    state: SequencerState,
    policy: &'static dyn ErrorPolicy,
    failures: FailureLog,
    reports: [Option<LevelReport>; INIT_LEVEL_COUNT],
}

pub struct BootSequencer {
    table: &'static OrderedTable,
    devices: &'static [Device],
    diagnostics: &'static dyn Diagnostics,
    inner: Mutex<SequencerInner>,
}

impl BootSequencer {
    /// Lenient policy, failures reported to the kernel log.
    pub const fn new(table: &'static OrderedTable, devices: &'static [Device]) -> Self {
        Self::with_parts(table, devices, &Lenient, &KlogDiagnostics)
    }

    pub const fn with_parts(
        table: &'static OrderedTable,
        devices: &'static [Device],
        policy: &'static dyn ErrorPolicy,
        diagnostics: &'static dyn Diagnostics,
    ) -> Self {
        Self {
            table,
            devices,
            diagnostics,
            inner: Mutex::new(SequencerInner {
                state: SequencerState::NotStarted,
                policy,
                failures: FailureLog::new(),
                reports: [None; INIT_LEVEL_COUNT],
            }),
        }
    }

    #[inline]
    pub fn table(&self) -> &'static OrderedTable {
        self.table
    }

    pub fn state(&self) -> SequencerState {
        self.inner.lock().state
    }

    /// Replace the error policy. Only allowed before the first level runs.
    pub fn set_policy(&self, policy: &'static dyn ErrorPolicy) -> Result<(), SequenceError> {
        let mut inner = self.inner.lock();
        if inner.state != SequencerState::NotStarted {
            return Err(SequenceError::AlreadyStarted);
        }
        inner.policy = policy;
        Ok(())
    }

    /// Level the next `run_level` call must name, `None` once finished.
    pub fn next_level(&self) -> Option<InitLevel> {
        match self.inner.lock().state {
            SequencerState::NotStarted => Some(InitLevel::FIRST),
            SequencerState::AwaitingLevel(level) => Some(level),
            _ => None,
        }
    }

    pub fn failures(&self) -> FailureLog {
        self.inner.lock().failures.clone()
    }

    pub fn report(&self, level: InitLevel) -> Option<LevelReport> {
        self.inner.lock().reports[level.ordinal()]
    }

    /// Run every entry of `level` in order.
    pub fn run_level(&self, level: InitLevel) -> Result<LevelReport, SequenceError> {
        let policy = self.begin_level(level)?;

        if level.runs_on_interrupt_stack() {
            klog_debug!("[sysinit] level start -> {} (interrupt stack)", level);
        } else {
            klog_debug!("[sysinit] level start -> {}", level);
        }
        let mut run = BootRun::new(level);

        for entry in self.table.level(level) {
            run.ran += 1;
            let Err(failure) = self.run_entry(entry) else {
                continue;
            };
            run.failed += 1;
            self.diagnostics.init_failed(&failure);

            let action = resolve_action(policy, &failure);
            let mut inner = self.inner.lock();
            inner.failures.record(failure);
            if action == FailureAction::Halt {
                inner.state = SequencerState::Halted(failure);
                inner.reports[level.ordinal()] = Some(run.finish());
                drop(inner);
                self.diagnostics.boot_halted(&failure);
                return Err(SequenceError::Halted(failure));
            }
        }

        let report = run.finish();
        {
            let mut inner = self.inner.lock();
            inner.state = match level.next() {
                Some(next) => SequencerState::AwaitingLevel(next),
                None => SequencerState::Done,
            };
            inner.reports[level.ordinal()] = Some(report);
        }
        self.diagnostics.level_complete(&report);
        Ok(report)
    }

    /// Run all remaining levels back to back.
    pub fn run_all(&self) -> Result<(), SequenceError> {
        if self.state() == SequencerState::Done {
            return Err(SequenceError::AlreadyDone);
        }
        while let Some(level) = self.next_level() {
            self.run_level(level)?;
        }
        match self.state() {
            SequencerState::Done => Ok(()),
            SequencerState::Halted(failure) => Err(SequenceError::Halted(failure)),
            SequencerState::RunningLevel(_) => Err(SequenceError::Reentrant),
            _ => Ok(()),
        }
    }

    fn begin_level(&self, level: InitLevel) -> Result<&'static dyn ErrorPolicy, SequenceError> {
        let mut inner = self.inner.lock();
        let expected = match inner.state {
            SequencerState::NotStarted => InitLevel::FIRST,
            SequencerState::AwaitingLevel(next) => next,
            SequencerState::RunningLevel(_) => return Err(SequenceError::Reentrant),
            SequencerState::Done => return Err(SequenceError::AlreadyDone),
            SequencerState::Halted(failure) => return Err(SequenceError::Halted(failure)),
        };
        if level != expected {
            return Err(SequenceError::OutOfOrder {
                expected,
                requested: level,
            });
        }
        inner.state = SequencerState::RunningLevel(level);
        Ok(inner.policy)
    }

    fn run_entry(&self, entry: &InitEntry) -> Result<(), InitFailure> {
        klog_trace!("    {} {}::{}", entry.placement(), entry.module(), entry.name());

        let device = match entry.device() {
            Some(handle) => match self.devices.get(handle.index()) {
                Some(device) => Some(device),
                None => {
                    klog_warn!(
                        "[sysinit] {} refers to missing device slot {}",
                        entry.name(),
                        handle.index()
                    );
                    return Err(InitFailure::new(entry, None, InitErrno::ENODEV));
                }
            },
            None => None,
        };

        klog_debug!("    step: {}", entry.name());
        let result: InitResult = entry.call(device);
        if let Some(device) = device {
            device.record_init(result);
        }
        result.map_err(|errno| InitFailure::new(entry, device.map(Device::name), errno))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{DeviceHandle, DeviceRef};
    use crate::policy::{PreKernelStrict, Strict};
    use core::cell::RefCell;
    use std::boxed::Box;
    use std::vec::Vec as StdVec;
    use sysinit_abi::EntryFlags;

    std::thread_local! {
        static TRACE: RefCell<StdVec<&'static str>> = const { RefCell::new(StdVec::new()) };
    }

    fn trace(name: &'static str) {
        TRACE.with(|t| t.borrow_mut().push(name));
    }

    fn take_trace() -> StdVec<&'static str> {
        TRACE.with(|t| core::mem::take(&mut *t.borrow_mut()))
    }

    fn leak(sequencer: BootSequencer) -> &'static BootSequencer {
        Box::leak(Box::new(sequencer))
    }

    fn early_ok(_dev: DeviceRef) -> InitResult {
        trace("early_ok");
        Ok(())
    }

    fn pk1_fail(_dev: DeviceRef) -> InitResult {
        trace("pk1_fail");
        Err(InitErrno::new(1).unwrap())
    }

    fn pk1_after(_dev: DeviceRef) -> InitResult {
        trace("pk1_after");
        Ok(())
    }

    fn app_ok(_dev: DeviceRef) -> InitResult {
        trace("app_ok");
        Ok(())
    }

    const FAILING: &[InitEntry] = &[
        crate::sys_init!(early_ok, EARLY, 0),
        crate::sys_init!(pk1_fail, PRE_KERNEL_1, 10),
        crate::sys_init!(pk1_after, PRE_KERNEL_1, 20),
        crate::sys_init!(app_ok, APPLICATION, 0),
    ];
    crate::init_table!(static FAILING_TABLE = [FAILING]);

    #[test]
    fn lenient_records_failure_and_keeps_going() {
        let seq = BootSequencer::new(&FAILING_TABLE, &[]);
        assert_eq!(seq.state(), SequencerState::NotStarted);
        seq.run_all().unwrap();

        assert_eq!(take_trace(), ["early_ok", "pk1_fail", "pk1_after", "app_ok"]);
        assert_eq!(seq.state(), SequencerState::Done);
        let failures = seq.failures();
        assert_eq!(failures.len(), 1);
        let failure = failures.find("pk1_fail").copied().unwrap();
        assert_eq!(failure.level, InitLevel::PreKernel1);
        assert_eq!(failure.errno.code(), 1);
        assert_eq!(
            seq.report(InitLevel::PreKernel1),
            Some(LevelReport {
                level: InitLevel::PreKernel1,
                ran: 2,
                failed: 1
            })
        );
        assert!(seq.report(InitLevel::Application).unwrap().is_clean());
    }

    #[test]
    fn strict_halts_on_first_failure() {
        let seq = BootSequencer::with_parts(&FAILING_TABLE, &[], &Strict, &KlogDiagnostics);
        seq.run_level(InitLevel::Early).unwrap();
        let err = seq.run_level(InitLevel::PreKernel1).unwrap_err();

        assert_eq!(take_trace(), ["early_ok", "pk1_fail"]);
        let SequenceError::Halted(failure) = err else {
            panic!("expected halt, got {err:?}");
        };
        assert_eq!(failure.entry, "pk1_fail");
        assert_eq!(seq.state(), SequencerState::Halted(failure));
        assert_eq!(err.status(), SysInitStatus::Halted);
        assert_eq!(seq.run_level(InitLevel::PreKernel2), Err(SequenceError::Halted(failure)));
        assert_eq!(seq.next_level(), None);
        assert!(take_trace().is_empty());
    }

    #[test]
    fn levels_must_come_in_order_and_only_once() {
        let seq = BootSequencer::new(&FAILING_TABLE, &[]);
        assert_eq!(
            seq.run_level(InitLevel::PreKernel1),
            Err(SequenceError::OutOfOrder {
                expected: InitLevel::Early,
                requested: InitLevel::PreKernel1
            })
        );
        assert!(take_trace().is_empty());

        seq.run_level(InitLevel::Early).unwrap();
        assert_eq!(seq.state(), SequencerState::AwaitingLevel(InitLevel::PreKernel1));
        assert_eq!(
            seq.run_level(InitLevel::Early),
            Err(SequenceError::OutOfOrder {
                expected: InitLevel::PreKernel1,
                requested: InitLevel::Early
            })
        );

        seq.run_all().unwrap();
        assert_eq!(seq.run_level(InitLevel::LAST), Err(SequenceError::AlreadyDone));
        assert_eq!(seq.run_all(), Err(SequenceError::AlreadyDone));
        assert_eq!(take_trace(), ["early_ok", "pk1_fail", "pk1_after", "app_ok"]);
    }

    #[test]
    fn policy_is_fixed_once_started() {
        let seq = BootSequencer::new(&FAILING_TABLE, &[]);
        seq.set_policy(&PreKernelStrict).unwrap();
        seq.run_level(InitLevel::Early).unwrap();
        assert_eq!(seq.set_policy(&Strict), Err(SequenceError::AlreadyStarted));
        assert!(matches!(
            seq.run_level(InitLevel::PreKernel1),
            Err(SequenceError::Halted(_))
        ));
        take_trace();
    }

    static DEVICES: [Device; 2] = [Device::new("uart0"), Device::new("spi0")];
    const UART0: DeviceHandle = DeviceHandle::new(0);
    const SPI0: DeviceHandle = DeviceHandle::new(1);
    const GHOST: DeviceHandle = DeviceHandle::new(7);

    fn uart_init(dev: DeviceRef) -> InitResult {
        assert_eq!(dev.map(Device::name), Some("uart0"));
        trace("uart_init");
        Ok(())
    }

    fn spi_init(dev: DeviceRef) -> InitResult {
        assert_eq!(dev.map(Device::name), Some("spi0"));
        trace("spi_init");
        Err(InitErrno::EIO)
    }

    fn ghost_init(_dev: DeviceRef) -> InitResult {
        trace("ghost_init");
        Ok(())
    }

    const DEVICE_ENTRIES: &[InitEntry] = &[
        crate::device_init!(uart0, uart_init, UART0, PRE_KERNEL_1, 40),
        crate::device_init!(spi0, spi_init, SPI0, PRE_KERNEL_1, 50).optional(),
        crate::device_init!(ghost, ghost_init, GHOST, PRE_KERNEL_1, 60),
    ];
    crate::init_table!(static DEVICE_TABLE = [DEVICE_ENTRIES]);

    // Only test touching DEVICES.
    #[test]
    fn device_state_follows_init_result() {
        let seq = BootSequencer::with_parts(&DEVICE_TABLE, &DEVICES, &Strict, &KlogDiagnostics);
        seq.run_level(InitLevel::Early).unwrap();
        let err = seq.run_level(InitLevel::PreKernel1).unwrap_err();

        // spi0 is optional, so the missing device slot is what halts.
        assert_eq!(take_trace(), ["uart_init", "spi_init"]);
        assert!(DEVICES[0].is_ready());
        assert!(DEVICES[1].is_initialized());
        assert!(!DEVICES[1].is_ready());
        assert_eq!(DEVICES[1].init_result(), Some(5));

        let SequenceError::Halted(failure) = err else {
            panic!("expected halt, got {err:?}");
        };
        assert_eq!(failure.entry, "ghost");
        assert_eq!(failure.errno, InitErrno::ENODEV);

        let failures = seq.failures();
        assert_eq!(failures.len(), 2);
        assert_eq!(failures.find("spi0").and_then(|f| f.device), Some("spi0"));
        assert!(failures.find("spi0").unwrap().flags.contains(EntryFlags::OPTIONAL));
    }

    fn reenter(_dev: DeviceRef) -> InitResult {
        let seq = REENTRANT_SEQ.with(|s| *s.borrow());
        let result = seq.map(|seq| seq.run_level(InitLevel::PreKernel1));
        assert_eq!(result, Some(Err(SequenceError::Reentrant)));
        trace("reenter");
        Ok(())
    }

    std::thread_local! {
        static REENTRANT_SEQ: RefCell<Option<&'static BootSequencer>> = const { RefCell::new(None) };
    }

    const REENTRANT: &[InitEntry] = &[crate::sys_init!(reenter, EARLY, 0)];
    crate::init_table!(static REENTRANT_TABLE = [REENTRANT]);

    #[test]
    fn entry_cannot_reenter_sequencer() {
        let seq = leak(BootSequencer::new(&REENTRANT_TABLE, &[]));
        REENTRANT_SEQ.with(|s| *s.borrow_mut() = Some(seq));
        seq.run_level(InitLevel::Early).unwrap();
        assert_eq!(take_trace(), ["reenter"]);
        assert_eq!(seq.state(), SequencerState::AwaitingLevel(InitLevel::PreKernel1));
    }

    fn always_fails(_dev: DeviceRef) -> InitResult {
        Err(InitErrno::EBUSY)
    }

    #[test]
    fn failure_log_counts_overflow() {
        let mut log = FailureLog::new();
        let entry = InitEntry::new(
            "busy",
            always_fails,
            None,
            InitLevel::Application,
            sysinit_abi::InitPriority::new(0),
        );
        for _ in 0..MAX_RECORDED_FAILURES + 3 {
            log.record(InitFailure::new(&entry, None, InitErrno::EBUSY));
        }
        assert_eq!(log.len(), MAX_RECORDED_FAILURES + 3);
        assert_eq!(log.dropped(), 3);
        assert_eq!(log.iter().count(), MAX_RECORDED_FAILURES);
    }
}
