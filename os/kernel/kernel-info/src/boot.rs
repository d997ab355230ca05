//! # Kernel Boot Information

use crate::memory::{PAGE_SIZE, TOTAL_MEMORY_PTR};
use kernel_memory_addresses::PhysicalAddress;

/// Information the loader leaves behind for the memory subsystem.
///
/// The loader probes the RAM size (BIOS `E820`/`E801`/`88h`) before entering
/// protected mode and stores it as a single `u32` at [`TOTAL_MEMORY_PTR`].
#[repr(C)]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct BootInfo {
    /// Total installed RAM in bytes.
    pub total_memory: u32,
}

impl BootInfo {
    /// Physical location of the handoff record.
    pub const LOCATION: PhysicalAddress = TOTAL_MEMORY_PTR;

    #[must_use]
    pub const fn new(total_memory: u32) -> Self {
        Self { total_memory }
    }

    /// Installed RAM in whole frames; a trailing partial frame is ignored.
    #[must_use]
    pub const fn total_frames(&self) -> u32 {
        self.total_memory / PAGE_SIZE
    }
}
