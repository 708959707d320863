//! Boot-init shared types.
//!
//! Plain data shared between the registry, the kernel that drives it and
//! any C code calling into the FFI entry point:
//! - `InitLevel` / `InitPriority` - the two halves of an entry's placement
//! - `EntryFlags` - per-entry failure handling overrides
//! - `InitErrno` / `InitResult` - what an init function returns
//! - `SysInitStatus` - C status codes for the sequencer entry point

#![no_std]

#[cfg(test)]
extern crate std;

pub mod error;
pub mod flags;
pub mod level;

pub use error::*;
pub use flags::*;
pub use level::*;
