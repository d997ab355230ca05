//! Page-granular allocation.
//!
//! A request for `n` pages reserves `n` contiguous virtual pages from a
//! tracker, then backs each one with a frame of its own. Virtual contiguity
//! is guaranteed, physical contiguity is not.
//!
//! A request that runs dry part-way gives back every frame, mapping and
//! reservation it had already taken before reporting the error.

use crate::error::AllocError;
use crate::frame_pool::FramePool;
use crate::view::VirtualView;
use crate::vspace::VirtualTracker;
use kernel_info::memory::{MAX_PAGES_PER_REQUEST, MIN_FREEABLE_PHYS, PAGE_SIZE};
use kernel_memory_addresses::{PhysicalPage, Size4K, VirtualAddress};
use kernel_vmem::{AddressSpace, MapError, PageEntryBits, PhysMapper, TlbFlush};
use log::{trace, warn};

/// Where the data frames of a request come from, and where page tables for
/// their mappings are taken from.
pub(crate) trait FrameSource {
    fn take(&mut self) -> Option<PhysicalPage<Size4K>>;

    /// # Panics
    /// If `page` does not belong to this source.
    fn give_back(&mut self, page: PhysicalPage<Size4K>);

    fn owns(&self, page: PhysicalPage<Size4K>) -> bool;

    /// Map `va` to `frame` in `aspace`.
    fn install<M: PhysMapper>(
        &mut self,
        aspace: &AddressSpace<'_, M>,
        va: VirtualAddress,
        frame: PhysicalPage<Size4K>,
    ) -> Result<(), MapError>;
}

/// Kernel requests: data frames and page tables share one pool.
impl FrameSource for FramePool<'_> {
    fn take(&mut self) -> Option<PhysicalPage<Size4K>> {
        self.alloc_frame()
    }

    fn give_back(&mut self, page: PhysicalPage<Size4K>) {
        self.free_frame(page);
    }

    fn owns(&self, page: PhysicalPage<Size4K>) -> bool {
        self.contains(page.base())
    }

    fn install<M: PhysMapper>(
        &mut self,
        aspace: &AddressSpace<'_, M>,
        va: VirtualAddress,
        frame: PhysicalPage<Size4K>,
    ) -> Result<(), MapError> {
        aspace.map_one(self, va, frame.base(), PageEntryBits::new_user_rw())
    }
}

impl<F: FrameSource + ?Sized> FrameSource for &mut F {
    fn take(&mut self) -> Option<PhysicalPage<Size4K>> {
        (**self).take()
    }

    fn give_back(&mut self, page: PhysicalPage<Size4K>) {
        (**self).give_back(page);
    }

    fn owns(&self, page: PhysicalPage<Size4K>) -> bool {
        (**self).owns(page)
    }

    fn install<M: PhysMapper>(
        &mut self,
        aspace: &AddressSpace<'_, M>,
        va: VirtualAddress,
        frame: PhysicalPage<Size4K>,
    ) -> Result<(), MapError> {
        (**self).install(aspace, va, frame)
    }
}

/// One address space, its tracker and a frame source, borrowed for the
/// duration of a locked operation.
pub(crate) struct Pager<'s, 't, M: PhysMapper, T: TlbFlush, F: FrameSource> {
    aspace: AddressSpace<'s, M>,
    tlb: &'s T,
    tracker: &'s mut VirtualTracker<'t>,
    frames: F,
}

impl<'s, 't, M: PhysMapper, T: TlbFlush, F: FrameSource> Pager<'s, 't, M, T, F> {
    pub(crate) const fn new(
        aspace: AddressSpace<'s, M>,
        tlb: &'s T,
        tracker: &'s mut VirtualTracker<'t>,
        frames: F,
    ) -> Self {
        Self {
            aspace,
            tlb,
            tracker,
            frames,
        }
    }

    pub(crate) const fn view(&self) -> VirtualView<'s, M> {
        VirtualView::new(AddressSpace::from_root(
            self.aspace.mapper(),
            self.aspace.root_page(),
        ))
    }

    /// Reserve and back `pages` pages.
    ///
    /// # Panics
    /// If `pages` is zero or not below [`MAX_PAGES_PER_REQUEST`].
    pub(crate) fn alloc(&mut self, pages: u32) -> Result<VirtualAddress, AllocError> {
        assert!(
            pages > 0 && pages < MAX_PAGES_PER_REQUEST,
            "page count {pages} out of range"
        );
        let Some(start) = self.tracker.reserve(pages) else {
            warn!("no run of {pages} free pages above {}", self.tracker.base());
            return Err(AllocError::OutOfVirtualSpace { pages });
        };

        for done in 0..pages {
            if let Err(err) = self.back_page(start + done * PAGE_SIZE) {
                warn!("{pages}-page request at {start} failed after {done} pages: {err}");
                self.unmap(start, done);
                self.tracker.release(start, pages);
                return Err(err);
            }
        }

        trace!("{pages} pages at {start}");
        Ok(start)
    }

    /// [`alloc`](Self::alloc), then zero the pages.
    pub(crate) fn alloc_zeroed(&mut self, pages: u32) -> Result<VirtualAddress, AllocError> {
        let start = self.alloc(pages)?;
        self.view().fill(start, pages * PAGE_SIZE, 0);
        Ok(start)
    }

    /// Back the page containing the externally chosen `va`.
    ///
    /// # Panics
    /// If `va` is outside the tracker's window or already mapped.
    pub(crate) fn back(&mut self, va: VirtualAddress) -> Result<VirtualAddress, AllocError> {
        let page = va.page::<Size4K>().base();
        let fresh = self.tracker.mark(page);
        if let Err(err) = self.back_page(page) {
            warn!("cannot back {page}: {err}");
            if fresh {
                self.tracker.release(page, 1);
            }
            return Err(err);
        }
        Ok(page)
    }

    /// Unmap `pages` pages from `va`, return their frames and the reservation.
    ///
    /// # Panics
    /// If `va` is not page-aligned, a page is not mapped, or a frame is
    /// bootstrap memory or foreign to the frame source.
    pub(crate) fn free(&mut self, va: VirtualAddress, pages: u32) {
        assert!(va.is_aligned::<Size4K>(), "freeing unaligned {va}");
        assert!(pages > 0, "freeing zero pages at {va}");
        self.unmap(va, pages);
        self.tracker.release(va, pages);
        trace!("released {pages} pages at {va}");
    }

    fn back_page(&mut self, va: VirtualAddress) -> Result<(), AllocError> {
        let frame = self.frames.take().ok_or(AllocError::OutOfFrames)?;
        if let Err(err) = self.frames.install(&self.aspace, va, frame) {
            self.frames.give_back(frame);
            return Err(err.into());
        }
        Ok(())
    }

    fn unmap(&mut self, start: VirtualAddress, pages: u32) {
        for i in 0..pages {
            let va = start + i * PAGE_SIZE;
            let Some(pa) = self.aspace.translate(va) else {
                panic!("freeing unmapped page {va}");
            };
            assert!(
                pa.as_u32() >= MIN_FREEABLE_PHYS,
                "{va} maps bootstrap memory {pa}"
            );
            let frame = PhysicalPage::from_addr(pa);
            assert!(
                self.frames.owns(frame),
                "{va} maps {pa}, which belongs to the other pool"
            );
            self.frames.give_back(frame);
            if let Err(err) = self.aspace.remove_entry(self.tlb, va) {
                panic!("{err} while unmapping");
            }
        }
    }
}
