//! Kernel-facing entry points.
//!
//! The kernel installs its sequencer once, then calls `sys_init_run_level`
//! at each level's milestone (from Rust or from C/assembly start-up code).

use core::ffi::c_int;

use sysinit_abi::{InitLevel, SysInitStatus};
use sysinit_lib::{klog_error, ServiceCell};

use crate::sequencer::BootSequencer;

static SEQUENCER: ServiceCell<BootSequencer> = ServiceCell::new("sysinit sequencer");

/// Make `sequencer` the one driven by the C entry points. Returns `false`
/// if one is already installed.
pub fn install(sequencer: &'static BootSequencer) -> bool {
    if SEQUENCER.register(sequencer) {
        return true;
    }
    klog_error!("[sysinit] {} already installed", SEQUENCER.name());
    false
}

pub fn installed() -> Option<&'static BootSequencer> {
    SEQUENCER.try_get()
}

/// Run one level of the installed sequencer. Returns a `SysInitStatus` code.
#[unsafe(no_mangle)]
pub extern "C" fn sys_init_run_level(level: u8) -> c_int {
    let Some(level) = InitLevel::from_raw(level) else {
        return SysInitStatus::InvalidLevel.as_c_int();
    };
    let Some(sequencer) = SEQUENCER.try_get() else {
        return SysInitStatus::NotInstalled.as_c_int();
    };
    match sequencer.run_level(level) {
        Ok(_) => SysInitStatus::Success.as_c_int(),
        Err(err) => err.status().as_c_int(),
    }
}

/// Run every remaining level of the installed sequencer.
#[unsafe(no_mangle)]
pub extern "C" fn sys_init_run_all() -> c_int {
    let Some(sequencer) = SEQUENCER.try_get() else {
        return SysInitStatus::NotInstalled.as_c_int();
    };
    match sequencer.run_all() {
        Ok(()) => SysInitStatus::Success.as_c_int(),
        Err(err) => err.status().as_c_int(),
    }
}
