//! The memory manager context object.

use crate::error::AllocError;
use crate::frame_pool::FramePool;
use crate::heap::{self, SizeClasses, SplitSection};
use crate::pages::{FrameSource, Pager};
use crate::platform::Platform;
use crate::task::{CurrentTask, UserSpace};
use crate::vspace::VirtualTracker;
use kernel_info::boot::BootInfo;
use kernel_info::layout::{BITMAP_STORAGE_LEN, BITMAP_STORAGE_PHYS, LayoutError, MemoryLayout};
use kernel_info::memory::{KERNEL_HEAP_START, KERNEL_PDE_FIRST, PAGE_DIRECTORY_PHYS};
use kernel_memory_addresses::{PhysicalAddress, PhysicalPage, Size4K, VirtualAddress};
use kernel_sync::{SpinLock, SpinMutex};
use kernel_vmem::{AddressSpace, FrameAlloc, MapError, PageEntryBits, PhysMapper};
use log::{debug, info};

/// Which physical pool a page-level request draws from.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Pool {
    Kernel,
    User,
}

/// Snapshot of the pools, for diagnostics.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq)]
pub struct MemoryStats {
    pub kernel_free_frames: u32,
    pub kernel_used_frames: u32,
    pub user_free_frames: u32,
    pub user_used_frames: u32,
    /// Pages reserved in the kernel heap window.
    pub kernel_reserved_pages: u32,
    /// Blocks on the kernel's size-class free lists.
    pub kernel_free_blocks: u32,
}

/// State behind the kernel pool lock.
struct KernelSide<'a> {
    frames: FramePool<'a>,
    vspace: VirtualTracker<'a>,
    classes: SizeClasses,
}

/// Page tables for user mappings, taken from the kernel pool one lock at a time.
struct KernelTables<'g, 'a>(&'g SpinMutex<KernelSide<'a>>);

impl FrameAlloc for KernelTables<'_, '_> {
    fn alloc_4k(&mut self) -> Option<PhysicalPage<Size4K>> {
        self.0.lock().frames.alloc_frame()
    }
}

/// Frames of a user request: data from the (locked) user pool, tables from
/// the kernel pool.
struct UserFrames<'g, 'a> {
    pool: &'g mut FramePool<'a>,
    kernel: &'g SpinMutex<KernelSide<'a>>,
}

impl FrameSource for UserFrames<'_, '_> {
    fn take(&mut self) -> Option<PhysicalPage<Size4K>> {
        self.pool.alloc_frame()
    }

    fn give_back(&mut self, page: PhysicalPage<Size4K>) {
        self.pool.free_frame(page);
    }

    fn owns(&self, page: PhysicalPage<Size4K>) -> bool {
        self.pool.contains(page.base())
    }

    fn install<M: PhysMapper>(
        &mut self,
        aspace: &AddressSpace<'_, M>,
        va: VirtualAddress,
        frame: PhysicalPage<Size4K>,
    ) -> Result<(), MapError> {
        let mut tables = KernelTables(self.kernel);
        aspace.map_one(&mut tables, va, frame.base(), PageEntryBits::new_user_rw())
    }
}

type KernelPager<'s, 'a, P> =
    Pager<'s, 'a, <P as Platform>::Mapper, <P as Platform>::Tlb, &'s mut FramePool<'a>>;

type UserPager<'s, 't, 'a, P> =
    Pager<'s, 't, <P as Platform>::Mapper, <P as Platform>::Tlb, UserFrames<'s, 'a>>;

/// Physical pools, the kernel heap window and the kernel heap, plus the
/// machine they run on.
///
/// Two coarse locks guard the state: one per physical pool. The kernel lock
/// also covers the kernel tracker and the kernel size classes. A user task's
/// tracker and size classes are only touched with the user lock held. When
/// both are needed the user lock is taken first.
pub struct MemoryManager<'a, P: Platform> {
    platform: P,
    layout: MemoryLayout,
    kernel: SpinMutex<KernelSide<'a>>,
    user: SpinMutex<FramePool<'a>>,
    split: SpinLock<()>,
}

impl<'a, P: Platform> MemoryManager<'a, P> {
    /// Bring up memory management from the loader's handoff: read the RAM
    /// size at `0xB00`, derive the layout and place the bitmaps at
    /// [`BITMAP_STORAGE_PHYS`].
    ///
    /// # Errors
    /// If the reported RAM size yields no usable layout.
    ///
    /// # Safety
    /// The bitmap storage region must be reachable through the platform's
    /// mapper for `'a` and used by nothing else. Call once.
    pub unsafe fn init(platform: P) -> Result<Self, LayoutError> {
        let total = unsafe { *platform.mapper().phys_to_mut::<u32>(BootInfo::LOCATION) };
        let layout = MemoryLayout::from_boot_info(&BootInfo::new(total))?;
        let storage = unsafe {
            platform
                .mapper()
                .phys_bytes_mut(BITMAP_STORAGE_PHYS, BITMAP_STORAGE_LEN as usize)
        };
        Ok(Self::new(platform, layout, storage))
    }

    /// Set up the pools of `layout` with their bitmaps in `storage`.
    ///
    /// # Panics
    /// If `storage` is shorter than [`MemoryLayout::bitmap_bytes`].
    pub fn new(platform: P, layout: MemoryLayout, storage: &'a mut [u8]) -> Self {
        assert!(
            storage.len() >= layout.bitmap_bytes() as usize,
            "bitmaps need {} bytes, storage has {}",
            layout.bitmap_bytes(),
            storage.len()
        );
        let kernel_bytes = MemoryLayout::bytes_for(layout.kernel_pool_frames) as usize;
        let user_bytes = MemoryLayout::bytes_for(layout.user_pool_frames) as usize;
        let (kernel_bits, rest) = storage.split_at_mut(kernel_bytes);
        let (user_bits, vspace_bits) = rest.split_at_mut(user_bytes);

        info!("memory: {:#x} bytes installed", layout.total_memory);
        info!(
            "kernel pool: {} frames at {}",
            layout.kernel_pool_frames, layout.kernel_pool_start
        );
        info!(
            "user pool: {} frames at {}",
            layout.user_pool_frames, layout.user_pool_start
        );
        info!(
            "kernel heap: {} pages at {}",
            layout.kernel_vspace_pages, KERNEL_HEAP_START
        );

        let kernel = KernelSide {
            frames: FramePool::new(layout.kernel_pool_start, layout.kernel_pool_frames, kernel_bits),
            vspace: VirtualTracker::kernel(layout.kernel_vspace_pages, vspace_bits),
            classes: SizeClasses::new(),
        };
        let user = FramePool::new(layout.user_pool_start, layout.user_pool_frames, user_bits);

        Self {
            platform,
            layout,
            kernel: SpinMutex::new(kernel),
            user: SpinMutex::new(user),
            split: SpinLock::new(()),
        }
    }

    #[inline]
    pub const fn layout(&self) -> &MemoryLayout {
        &self.layout
    }

    #[inline]
    pub const fn platform(&self) -> &P {
        &self.platform
    }

    fn kernel_space(&self) -> AddressSpace<'_, P::Mapper> {
        AddressSpace::from_root(self.platform.mapper(), PhysicalPage::from_addr(PAGE_DIRECTORY_PHYS))
    }

    fn with_kernel_pager<R>(
        &self,
        f: impl FnOnce(&mut KernelPager<'_, 'a, P>, &mut SizeClasses) -> R,
    ) -> R {
        let mut guard = self.kernel.lock();
        let KernelSide {
            frames,
            vspace,
            classes,
        } = &mut *guard;
        let mut pager = Pager::new(self.kernel_space(), self.platform.tlb(), vspace, frames);
        f(&mut pager, classes)
    }

    fn with_user_pager<R>(
        &self,
        space: &mut UserSpace<'_>,
        f: impl FnOnce(&mut UserPager<'_, '_, 'a, P>, &mut SizeClasses) -> R,
    ) -> R {
        let mut pool = self.user.lock();
        let UserSpace {
            root,
            tracker,
            classes,
            ..
        } = space;
        let frames = UserFrames {
            pool: &mut *pool,
            kernel: &self.kernel,
        };
        let aspace = AddressSpace::from_root(self.platform.mapper(), *root);
        let mut pager = Pager::new(aspace, self.platform.tlb(), tracker, frames);
        f(&mut pager, classes)
    }

    fn with_current_user<R>(&self, what: &str, f: impl FnOnce(&mut UserSpace<'_>) -> R) -> R {
        self.platform.tasks().with_user_space(|space| {
            let Some(space) = space else {
                panic!("{what} requested by a kernel thread");
            };
            f(space)
        })
    }

    /// Reserve `pages` contiguous virtual pages in the kernel window or the
    /// current task's window and back each with a frame from `pool`.
    ///
    /// The pages are not zeroed.
    ///
    /// # Errors
    /// On exhaustion; everything taken so far is given back.
    ///
    /// # Panics
    /// If `pages` is out of range, or user pages are requested by a kernel thread.
    pub fn alloc_pages(&self, pool: Pool, pages: u32) -> Result<VirtualAddress, AllocError> {
        match pool {
            Pool::Kernel => self.with_kernel_pager(|pager, _| pager.alloc(pages)),
            Pool::User => self.with_current_user("user pages", |space| {
                self.with_user_pager(space, |pager, _| pager.alloc(pages))
            }),
        }
    }

    /// Zeroed kernel pages.
    ///
    /// # Errors
    /// See [`alloc_pages`](Self::alloc_pages).
    pub fn alloc_kernel_pages(&self, pages: u32) -> Result<VirtualAddress, AllocError> {
        self.with_kernel_pager(|pager, _| pager.alloc_zeroed(pages))
    }

    /// Zeroed pages in the current task's user window.
    ///
    /// # Errors
    /// See [`alloc_pages`](Self::alloc_pages).
    ///
    /// # Panics
    /// If called by a kernel thread.
    pub fn alloc_user_pages(&self, pages: u32) -> Result<VirtualAddress, AllocError> {
        self.with_current_user("user pages", |space| {
            self.with_user_pager(space, |pager, _| pager.alloc_zeroed(pages))
        })
    }

    /// Back the page containing a caller-chosen `va` with a frame from `pool`.
    ///
    /// Kernel threads may only back kernel addresses, user tasks only
    /// addresses of their own window.
    ///
    /// # Errors
    /// If no frame (or page table) is left; the reservation is undone.
    ///
    /// # Panics
    /// On a pool/context mismatch, if `va` lies outside the window, or if
    /// it is already mapped.
    pub fn back_existing_address(
        &self,
        pool: Pool,
        va: VirtualAddress,
    ) -> Result<VirtualAddress, AllocError> {
        self.platform.tasks().with_user_space(|space| match (pool, space) {
            (Pool::Kernel, None) => self.with_kernel_pager(|pager, _| pager.back(va)),
            (Pool::User, Some(space)) => self.with_user_pager(space, |pager, _| pager.back(va)),
            (Pool::Kernel, Some(_)) => panic!("a user task may not back kernel address {va}"),
            (Pool::User, None) => panic!("a kernel thread may not back user address {va}"),
        })
    }

    /// Unmap `pages` pages at `va`, return their frames to `pool` and release
    /// the reservation.
    ///
    /// # Panics
    /// If `va` is not page-aligned, any page is unmapped, or a frame is
    /// bootstrap memory or belongs to the other pool.
    pub fn free_pages(&self, pool: Pool, va: VirtualAddress, pages: u32) {
        match pool {
            Pool::Kernel => self.with_kernel_pager(|pager, _| pager.free(va, pages)),
            Pool::User => self.with_current_user("freeing user pages", |space| {
                self.with_user_pager(space, |pager, _| pager.free(va, pages));
            }),
        }
    }

    /// Return one frame to the pool it lies in.
    ///
    /// # Panics
    /// If the frame is outside both pools or not allocated.
    pub fn free_frame(&self, page: PhysicalPage<Size4K>) {
        if page.base() >= self.layout.user_pool_start {
            self.user.lock().free_frame(page);
        } else {
            self.kernel.lock().frames.free_frame(page);
        }
    }

    /// Physical address `va` is mapped to in the current address space.
    pub fn translate(&self, va: VirtualAddress) -> Option<PhysicalAddress> {
        self.platform.tasks().with_user_space(|space| match space {
            Some(space) => AddressSpace::from_root(self.platform.mapper(), space.root).translate(va),
            None => self.kernel_space().translate(va),
        })
    }

    /// Allocate `size` bytes from the caller's heap: the kernel heap for
    /// kernel threads, the task's own heap for user tasks.
    ///
    /// Returns `None` for `size == 0`, for requests not smaller than the
    /// pool, and on exhaustion.
    pub fn sys_malloc(&self, size: u32) -> Option<VirtualAddress> {
        let split = SplitSection::new(&self.split, self.platform.irq());
        self.platform.tasks().with_user_space(|space| match space {
            None => {
                if size == 0 || size >= self.layout.kernel_pool_size() {
                    return None;
                }
                self.with_kernel_pager(|pager, classes| heap::malloc(pager, classes, &split, size))
            }
            Some(space) => {
                if size == 0 || size >= self.layout.user_pool_size() {
                    return None;
                }
                self.with_user_pager(space, |pager, classes| heap::malloc(pager, classes, &split, size))
            }
        })
    }

    /// Return memory obtained from [`sys_malloc`](Self::sys_malloc).
    ///
    /// # Panics
    /// On a null pointer, a kernel pointer below the kernel heap, a corrupt
    /// arena or a double free.
    pub fn sys_free(&self, ptr: VirtualAddress) {
        assert!(!ptr.is_null(), "sys_free of a null pointer");
        self.platform.tasks().with_user_space(|space| match space {
            None => {
                assert!(
                    ptr >= KERNEL_HEAP_START,
                    "kernel free of {ptr} below the kernel heap"
                );
                self.with_kernel_pager(|pager, classes| heap::free(pager, classes, ptr));
            }
            Some(space) => {
                self.with_user_pager(space, |pager, classes| heap::free(pager, classes, ptr));
            }
        });
    }

    /// Build a private address space for a new user task.
    ///
    /// The directory is a zeroed kernel page sharing the kernel half with
    /// the kernel directory, with its last slot pointing at itself. The
    /// task's tracker keeps its bits in `storage`.
    ///
    /// # Errors
    /// If no kernel page is left for the directory.
    ///
    /// # Panics
    /// If `storage` is shorter than [`UserSpace::TRACKER_BYTES`].
    pub fn create_user_space<'s>(&self, storage: &'s mut [u8]) -> Result<UserSpace<'s>, AllocError> {
        assert!(
            storage.len() >= UserSpace::TRACKER_BYTES,
            "user tracker needs {} bytes, storage has {}",
            UserSpace::TRACKER_BYTES,
            storage.len()
        );
        let directory = self.alloc_kernel_pages(1)?;
        let kernel = self.kernel_space();
        let Some(pa) = kernel.translate(directory) else {
            panic!("fresh directory page {directory} is not mapped");
        };
        let root = PhysicalPage::from_addr(pa);
        AddressSpace::from_root(self.platform.mapper(), root).share_kernel_half(&kernel);
        debug!("user space with directory {root} at {directory}");

        Ok(UserSpace {
            root,
            directory,
            tracker: VirtualTracker::user(storage),
            classes: SizeClasses::new(),
        })
    }

    /// Tear down a user address space: every frame mapped in its user half
    /// goes back to the user pool, its page tables and directory go back to
    /// the kernel pool.
    ///
    /// `space` must not be the address space the CPU is running on.
    pub fn destroy_user_space(&self, space: UserSpace<'_>) {
        let aspace = AddressSpace::from_root(self.platform.mapper(), space.root);
        let (mut frames, mut tables) = (0, 0);
        {
            let mut user = self.user.lock();
            for (_, frame) in aspace.leaves_below(KERNEL_PDE_FIRST) {
                user.free_frame(frame);
                frames += 1;
            }
            let mut kernel = self.kernel.lock();
            for table in aspace.tables_below(KERNEL_PDE_FIRST) {
                kernel.frames.free_frame(table);
                tables += 1;
            }
        }
        self.free_pages(Pool::Kernel, space.directory, 1);
        debug!(
            "user space {} destroyed: {frames} frames, {tables} tables",
            space.root
        );
    }

    #[must_use]
    pub fn stats(&self) -> MemoryStats {
        let user = self.user.lock();
        let kernel = self.kernel.lock();
        MemoryStats {
            kernel_free_frames: kernel.frames.free_frames(),
            kernel_used_frames: kernel.frames.used_frames(),
            user_free_frames: user.free_frames(),
            user_used_frames: user.used_frames(),
            kernel_reserved_pages: kernel.vspace.reserved_pages(),
            kernel_free_blocks: kernel.classes.free_blocks(),
        }
    }
}
