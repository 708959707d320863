#![no_std]

#[cfg(test)]
extern crate std;

pub mod config;
pub mod device;
pub mod entry;
pub mod ffi;
pub mod policy;
pub mod sequencer;
pub mod table;

#[doc(hidden)]
pub use paste;

pub use config::SysInitConfig;
pub use device::{Device, DeviceHandle, DeviceRef};
pub use entry::{InitEntry, InitFn, OrderingKey, PlacementTag};
pub use ffi::{install, installed, sys_init_run_all, sys_init_run_level};
pub use policy::{
    Diagnostics, ErrorPolicy, FailureAction, InitFailure, KlogDiagnostics, Lenient, PolicyKind,
    PreKernelStrict, Strict,
};
pub use sequencer::{
    BootSequencer, FailureLog, LevelReport, SequenceError, SequencerState, MAX_RECORDED_FAILURES,
};
pub use sysinit_abi::{
    EntryFlags, InitErrno, InitLevel, InitPriority, InitResult, SysInitStatus, INIT_LEVEL_COUNT,
};
pub use table::{LevelBounds, OrderedTable};
