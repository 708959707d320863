//! What happens when an init function fails.
//!
//! Every failure is handed to the `Diagnostics` collaborator first. The
//! `ErrorPolicy` then picks between continuing the level and halting the
//! boot; `EntryFlags` on the failing entry override the policy.

use core::fmt;

use sysinit_abi::{EntryFlags, InitErrno, InitLevel, InitPriority};
use sysinit_lib::{klog_error, klog_info, klog_warn};

use crate::entry::InitEntry;
use crate::sequencer::LevelReport;

/// Identity and outcome of one failed entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InitFailure {
    pub entry: &'static str,
    pub level: InitLevel,
    pub priority: InitPriority,
    pub errno: InitErrno,
    /// Name of the bound device, if any.
    pub device: Option<&'static str>,
    pub flags: EntryFlags,
}

impl InitFailure {
    pub fn new(entry: &InitEntry, device: Option<&'static str>, errno: InitErrno) -> Self {
        Self {
            entry: entry.name(),
            level: entry.level(),
            priority: entry.priority(),
            errno,
            device,
            flags: entry.flags(),
        }
    }
}

impl fmt::Display for InitFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}:{} -> {}", self.entry, self.level, self.priority, self.errno)?;
        if let Some(device) = self.device {
            write!(f, " (device {device})")?;
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureAction {
    /// Record and move on to the next entry.
    Continue,
    /// Stop sequencing; the boot cannot proceed.
    Halt,
}

pub trait ErrorPolicy: Sync {
    fn on_failure(&self, failure: &InitFailure) -> FailureAction;
}

/// Keep booting with whatever came up.
#[derive(Clone, Copy, Debug, Default)]
pub struct Lenient;

impl ErrorPolicy for Lenient {
    fn on_failure(&self, _failure: &InitFailure) -> FailureAction {
        FailureAction::Continue
    }
}

/// Halt on the first failure anywhere.
#[derive(Clone, Copy, Debug, Default)]
pub struct Strict;

impl ErrorPolicy for Strict {
    fn on_failure(&self, _failure: &InitFailure) -> FailureAction {
        FailureAction::Halt
    }
}

/// Halt on failures before the kernel is up, where later entries assume
/// earlier ones worked; continue afterwards.
#[derive(Clone, Copy, Debug, Default)]
pub struct PreKernelStrict;

impl ErrorPolicy for PreKernelStrict {
    fn on_failure(&self, failure: &InitFailure) -> FailureAction {
        if failure.level.is_pre_kernel() {
            FailureAction::Halt
        } else {
            FailureAction::Continue
        }
    }
}

/// Built-in policies, selectable from the boot command line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum PolicyKind {
    #[default]
    Lenient,
    Strict,
    PreKernelStrict,
}

impl PolicyKind {
    pub fn policy(self) -> &'static dyn ErrorPolicy {
        match self {
            Self::Lenient => &Lenient,
            Self::Strict => &Strict,
            Self::PreKernelStrict => &PreKernelStrict,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "lenient" | "continue" => Some(Self::Lenient),
            "strict" | "halt" => Some(Self::Strict),
            "prekernel" | "pre-kernel" => Some(Self::PreKernelStrict),
            _ => None,
        }
    }
}

/// Flags win over the policy; `CRITICAL` wins over `OPTIONAL`.
pub fn resolve_action(policy: &dyn ErrorPolicy, failure: &InitFailure) -> FailureAction {
    if failure.flags.contains(EntryFlags::CRITICAL) {
        FailureAction::Halt
    } else if failure.flags.contains(EntryFlags::OPTIONAL) {
        FailureAction::Continue
    } else {
        policy.on_failure(failure)
    }
}

/// External sink for boot failures.
pub trait Diagnostics: Sync {
    /// Called for every failing entry, before the policy is consulted.
    fn init_failed(&self, failure: &InitFailure);

    /// Called once when a failure stops the boot.
    fn boot_halted(&self, failure: &InitFailure);

    fn level_complete(&self, _report: &LevelReport) {}
}

/// Reports through the kernel log.
#[derive(Clone, Copy, Debug, Default)]
pub struct KlogDiagnostics;

impl Diagnostics for KlogDiagnostics {
    fn init_failed(&self, failure: &InitFailure) {
        klog_error!("[sysinit] FAILURE in {} -> {}", failure.level, failure);
    }

    fn boot_halted(&self, failure: &InitFailure) {
        klog_error!("[sysinit] boot halted by {}", failure);
    }

    fn level_complete(&self, report: &LevelReport) {
        if report.failed == 0 {
            klog_info!("[sysinit] level complete -> {} ({} entries)", report.level, report.ran);
        } else {
            klog_warn!(
                "[sysinit] level complete -> {} ({} entries, {} failed)",
                report.level,
                report.ran,
                report.failed
            );
        }
    }
}
