//! Boot command line options.
//!
//! Recognised tokens:
//! - `sysinit.debug=on|1|true` / `sysinit.debug=off|0|false` - log level
//! - `sysinit.policy=lenient|strict|prekernel` - error policy
//!
//! Unknown tokens are ignored; the last occurrence of an option wins.

use sysinit_lib::{klog_debug, klog_info, klog_set_level, klog_warn, KlogLevel};

use crate::policy::PolicyKind;
use crate::sequencer::{BootSequencer, SequenceError};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SysInitConfig {
    /// `None` leaves the log level alone.
    pub debug: Option<bool>,
    /// `None` keeps the sequencer's built-in policy.
    pub policy: Option<PolicyKind>,
}

fn parse_switch(value: &str) -> Option<bool> {
    match value {
        "on" | "1" | "true" => Some(true),
        "off" | "0" | "false" => Some(false),
        _ => None,
    }
}

impl SysInitConfig {
    pub fn from_cmdline(cmdline: &str) -> Self {
        let mut config = Self::default();
        for token in cmdline.split_ascii_whitespace() {
            let Some((key, value)) = token.split_once('=') else {
                continue;
            };
            match key {
                "sysinit.debug" => match parse_switch(value) {
                    Some(debug) => config.debug = Some(debug),
                    None => klog_warn!("[sysinit] ignoring sysinit.debug={}", value),
                },
                "sysinit.policy" => match PolicyKind::from_name(value) {
                    Some(policy) => config.policy = Some(policy),
                    None => klog_warn!("[sysinit] unknown policy '{}', keeping default", value),
                },
                _ => {}
            }
        }
        config
    }

    /// Apply to the log and to `sequencer`, which must not have started.
    pub fn apply(&self, sequencer: &BootSequencer) -> Result<(), SequenceError> {
        match self.debug {
            Some(true) => {
                klog_set_level(KlogLevel::Debug);
                klog_info!("[sysinit] boot option: debug logging enabled");
            }
            Some(false) => {
                klog_set_level(KlogLevel::Info);
                klog_debug!("[sysinit] boot option: debug logging disabled");
            }
            None => {}
        }
        if let Some(kind) = self.policy {
            sequencer.set_policy(kind.policy())?;
            klog_info!("[sysinit] boot option: {:?} error policy", kind);
        }
        Ok(())
    }
}
