//! A simulated machine for the memory manager.

#![allow(dead_code)]

use kernel_alloc::heap::arena::ArenaHeader;
use kernel_alloc::{CurrentTask, MemoryManager, Platform, UserSpace, VirtualView};
use kernel_hosted::{RecordingTlb, SimulatedRam, SoftInterrupts, boot_image};
use kernel_info::layout::MemoryLayout;
use kernel_info::memory::PAGE_DIRECTORY_PHYS;
use kernel_memory_addresses::{PhysicalAddress, PhysicalPage, VirtualAddress};
use kernel_vmem::AddressSpace;
use std::cell::RefCell;
use std::sync::Arc;

thread_local! {
    static CURRENT: RefCell<Option<UserSpace<'static>>> = const { RefCell::new(None) };
}

/// Each test thread plays one CPU; the task it runs is thread-local.
#[derive(Debug, Default)]
pub struct ThreadTasks;

impl CurrentTask for ThreadTasks {
    fn with_user_space<R>(&self, f: impl FnOnce(Option<&mut UserSpace<'_>>) -> R) -> R {
        CURRENT.with_borrow_mut(|slot| f(slot.as_mut()))
    }
}

pub struct TestMachine {
    pub ram: SimulatedRam,
    pub tlb: RecordingTlb,
    pub irq: Arc<SoftInterrupts>,
    pub tasks: ThreadTasks,
}

impl TestMachine {
    pub fn new(layout: &MemoryLayout) -> Self {
        Self {
            ram: boot_image(layout),
            tlb: RecordingTlb::default(),
            irq: Arc::default(),
            tasks: ThreadTasks,
        }
    }

    pub fn with_pool_frames(kernel: u32, user: u32) -> Self {
        Self::new(&MemoryLayout::with_pool_frames(kernel, user).expect("layout"))
    }

    /// Bring the memory manager up the way the kernel does.
    pub fn boot(&self) -> MemoryManager<'_, &Self> {
        unsafe { MemoryManager::init(self) }.expect("boot layout")
    }

    /// The kernel directory, independent of the current task.
    pub fn kernel_space(&self) -> AddressSpace<'_, SimulatedRam> {
        AddressSpace::from_root(&self.ram, PhysicalPage::from_addr(PAGE_DIRECTORY_PHYS))
    }

    pub fn kernel_view(&self) -> VirtualView<'_, SimulatedRam> {
        VirtualView::new(self.kernel_space())
    }

    pub fn user_view(&self, space: &UserSpace<'_>) -> VirtualView<'_, SimulatedRam> {
        VirtualView::new(AddressSpace::from_root(&self.ram, space.root()))
    }

    /// Header of the kernel arena at `base`.
    pub fn kernel_arena(&self, base: VirtualAddress) -> ArenaHeader {
        ArenaHeader::load(&self.kernel_view(), base)
    }

    /// Physical address of `va` in the kernel directory.
    pub fn kernel_phys(&self, va: VirtualAddress) -> PhysicalAddress {
        self.kernel_space().translate(va).expect("mapped")
    }
}

impl Platform for TestMachine {
    type Mapper = SimulatedRam;
    type Tlb = RecordingTlb;
    type Irq = SoftInterrupts;
    type Tasks = ThreadTasks;

    fn mapper(&self) -> &SimulatedRam {
        &self.ram
    }

    fn tlb(&self) -> &RecordingTlb {
        &self.tlb
    }

    fn irq(&self) -> &SoftInterrupts {
        &self.irq
    }

    fn tasks(&self) -> &ThreadTasks {
        &self.tasks
    }
}

/// Tracker storage that outlives the task using it.
pub fn tracker_storage() -> &'static mut [u8] {
    Box::leak(vec![0_u8; UserSpace::TRACKER_BYTES].into_boxed_slice())
}

/// Create a user address space and make it the current task of this thread.
pub fn enter_new_task<P: Platform>(mm: &MemoryManager<'_, P>) {
    let space = mm.create_user_space(tracker_storage()).expect("user space");
    enter(space);
}

pub fn enter(space: UserSpace<'static>) {
    CURRENT.with_borrow_mut(|slot| {
        assert!(slot.is_none(), "a task is already running");
        *slot = Some(space);
    });
}

/// Switch this thread back to kernel context, returning the task it ran.
pub fn leave() -> UserSpace<'static> {
    CURRENT.with_borrow_mut(Option::take).expect("no task running")
}

/// Run `f` on the current task's address space.
pub fn with_current<R>(f: impl FnOnce(&UserSpace<'_>) -> R) -> R {
    CURRENT.with_borrow(|slot| f(slot.as_ref().expect("no task running")))
}
