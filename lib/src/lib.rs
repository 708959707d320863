#![no_std]

#[cfg(test)]
extern crate std;

pub mod init_flag;
pub mod klog;
pub mod service_cell;

pub use init_flag::InitFlag;
pub use klog::{
    klog_attach_sink, klog_get_level, klog_init, klog_is_enabled, klog_set_level, KlogLevel,
    KlogSink,
};
pub use service_cell::ServiceCell;
