use kernel_memory_addresses::VirtualAddress;
use kernel_vmem::MapError;

/// Recoverable exhaustion of a page-level request.
///
/// Whatever the failing call had taken is returned before the error is.
#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum AllocError {
    #[error("physical frame pool exhausted")]
    OutOfFrames,
    #[error("no run of {pages} free virtual pages")]
    OutOfVirtualSpace { pages: u32 },
    #[error("no frame left for the page table covering {va}")]
    OutOfPageTables { va: VirtualAddress },
}

impl From<MapError> for AllocError {
    fn from(value: MapError) -> Self {
        match value {
            MapError::OutOfPageTables { va } => Self::OutOfPageTables { va },
            // Mapping a reserved page never looks up an existing leaf.
            MapError::NotMapped { va } => panic!("{va} vanished while being mapped"),
        }
    }
}
