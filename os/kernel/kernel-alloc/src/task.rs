//! The per-task side of memory management.

use crate::heap::SizeClasses;
use crate::vspace::VirtualTracker;
use kernel_memory_addresses::VirtualAddress;
use kernel_vmem::address_space::RootPage;

/// The private address space of a user task: its page directory, the
/// tracker of its user half and its own heap descriptors.
///
/// Built by [`MemoryManager::create_user_space`](crate::MemoryManager::create_user_space)
/// and torn down by [`MemoryManager::destroy_user_space`](crate::MemoryManager::destroy_user_space).
#[derive(Debug)]
pub struct UserSpace<'a> {
    pub(crate) root: RootPage,
    /// Where the kernel reaches the directory page.
    pub(crate) directory: VirtualAddress,
    pub(crate) tracker: VirtualTracker<'a>,
    pub(crate) classes: SizeClasses,
}

impl<'a> UserSpace<'a> {
    /// Bytes of tracker storage [`create_user_space`](crate::MemoryManager::create_user_space) needs.
    pub const TRACKER_BYTES: usize = VirtualTracker::USER_STORAGE_BYTES;

    /// Physical frame of the page directory, the value loaded into `CR3`.
    #[inline]
    #[must_use]
    pub const fn root(&self) -> RootPage {
        self.root
    }

    #[inline]
    #[must_use]
    pub const fn directory(&self) -> VirtualAddress {
        self.directory
    }

    #[inline]
    #[must_use]
    pub const fn tracker(&self) -> &VirtualTracker<'a> {
        &self.tracker
    }

    #[inline]
    #[must_use]
    pub const fn classes(&self) -> &SizeClasses {
        &self.classes
    }
}

/// Access to the task the calling CPU is running.
///
/// Kernel threads have no private address space; `f` sees `None` for them.
pub trait CurrentTask {
    fn with_user_space<R>(&self, f: impl FnOnce(Option<&mut UserSpace<'_>>) -> R) -> R;
}

impl<C: CurrentTask> CurrentTask for &C {
    fn with_user_space<R>(&self, f: impl FnOnce(Option<&mut UserSpace<'_>>) -> R) -> R {
        (**self).with_user_space(f)
    }
}
