use bitflags::bitflags;

bitflags! {
    /// Per-entry overrides of the sequencer's error policy.
    #[repr(transparent)]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct EntryFlags: u32 {
        /// A failure is logged and the level continues, whatever the policy says.
        const OPTIONAL = 1 << 0;
        /// A failure halts the boot, whatever the policy says.
        const CRITICAL = 1 << 1;
    }
}
