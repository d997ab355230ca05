//! # Address Space (two-level, directory-rooted)
//!
//! Typed helpers to build and manipulate a **single** virtual address space,
//! the tree rooted at one page directory.
//!
//! ## Highlights
//!
//! - [`AddressSpace::map_one`] installs one 4 KiB mapping, creating (and
//!   zero-filling) the page table on demand.
//! - [`AddressSpace::remove_entry`] clears the present bit of one PTE and
//!   invalidates the TLB entry; the table itself stays.
//! - [`AddressSpace::translate`] walks the tables to the physical address.
//! - [`AddressSpace::share_kernel_half`] seeds a fresh directory for a user task.
//!
//! ## Safety
//!
//! The provided [`PhysMapper`] must yield **writable** references to table frames.

use crate::page_table::pd::{L2Index, PageDirectory, PdEntry};
use crate::page_table::pt::{L1Index, PageTable, PtEntry};
use crate::page_table::split_indices;
use crate::recursive::install_self_reference;
use crate::{FrameAlloc, MapError, PageEntryBits, PhysMapper, TlbFlush};
use kernel_info::memory::{ENTRIES_PER_TABLE, KERNEL_PDE_FIRST, SELF_REF_PDE};
use kernel_memory_addresses::{PhysicalAddress, PhysicalPage, Size4K, VirtualAddress};
use log::trace;

/// Handle to a single, concrete address space.
pub struct AddressSpace<'m, M: PhysMapper> {
    root: PhysicalPage<Size4K>,
    mapper: &'m M,
}

/// The directory frame of an [`AddressSpace`].
pub type RootPage = PhysicalPage<Size4K>;

impl<'m, M: PhysMapper> AddressSpace<'m, M> {
    #[inline]
    pub const fn from_root(mapper: &'m M, root: RootPage) -> Self {
        Self { root, mapper }
    }

    #[inline]
    pub const fn root_page(&self) -> RootPage {
        self.root
    }

    #[inline]
    pub const fn mapper(&self) -> &'m M {
        self.mapper
    }

    #[inline]
    pub(crate) fn pd_mut(&self) -> &mut PageDirectory {
        unsafe { self.mapper.phys_to_mut::<PageDirectory>(self.root.base()) }
    }

    #[inline]
    pub(crate) fn pt_mut(&self, page: PhysicalPage<Size4K>) -> &mut PageTable {
        unsafe { self.mapper.phys_to_mut::<PageTable>(page.base()) }
    }

    /// Read the directory entry governing `va`.
    #[must_use]
    pub fn directory_entry(&self, va: VirtualAddress) -> PdEntry {
        self.pd_mut().get(L2Index::from(va))
    }

    /// Read the table entry governing `va`, if its table exists.
    #[must_use]
    pub fn table_entry(&self, va: VirtualAddress) -> Option<PtEntry> {
        let (i2, i1) = split_indices(va);
        let pt_page = self.pd_mut().get(i2).next_table()?;
        Some(self.pt_mut(pt_page).get(i1))
    }

    /// Physical address of the table entry governing `va`, if its table exists.
    ///
    /// This is the location the self-referential window resolves
    /// [`pte_address(va)`](crate::recursive::pte_address) to.
    #[must_use]
    pub fn table_entry_phys(&self, va: VirtualAddress) -> Option<PhysicalAddress> {
        let (i2, i1) = split_indices(va);
        let pt_page = self.pd_mut().get(i2).next_table()?;
        Some(pt_page.base() + i1.byte_offset())
    }

    /// Map the 4 KiB page at `va` to the frame at `pa`.
    ///
    /// If the governing directory entry is absent, one frame is taken from
    /// `alloc`, linked into the directory with `flags` and zero-filled before
    /// the leaf is written.
    ///
    /// # Errors
    /// [`MapError::OutOfPageTables`] if a table frame was needed but `alloc`
    /// is exhausted. Nothing was modified in that case.
    ///
    /// # Panics
    /// If `va` is already mapped. Overlapping mappings mean the virtual
    /// trackers and the page tables disagree, which is unrecoverable.
    pub fn map_one<A: FrameAlloc>(
        &self,
        alloc: &mut A,
        va: VirtualAddress,
        pa: PhysicalAddress,
        flags: PageEntryBits,
    ) -> Result<(), MapError> {
        debug_assert!(pa.is_aligned::<Size4K>(), "physical address not aligned");
        let (i2, i1) = split_indices(va);
        let pd = self.pd_mut();

        let pt_page = if let Some(page) = pd.get(i2).next_table() {
            page
        } else {
            let page = alloc.alloc_4k().ok_or(MapError::OutOfPageTables { va })?;
            pd.set(i2, PdEntry::make_next(page, flags));
            self.pt_mut(page).zero();
            trace!("new page table {page} for slot {}", i2.as_usize());
            page
        };

        let pt = self.pt_mut(pt_page);
        assert!(
            !pt.get(i1).is_present(),
            "mapping {va} overlaps the present entry {:?}",
            pt.get(i1)
        );
        pt.set(i1, PtEntry::make_4k(PhysicalPage::from_addr(pa), flags));
        trace!("mapped {va} -> {pa}");
        Ok(())
    }

    /// Clear the present bit of the leaf governing `va` and flush its TLB
    /// entry. Directory entry and table page stay in place.
    ///
    /// Returns the frame the entry pointed at.
    ///
    /// # Errors
    /// [`MapError::NotMapped`] if no present leaf governs `va`.
    pub fn remove_entry<T: TlbFlush>(
        &self,
        tlb: &T,
        va: VirtualAddress,
    ) -> Result<PhysicalPage<Size4K>, MapError> {
        let (i2, i1) = split_indices(va);
        let pt_page = self
            .pd_mut()
            .get(i2)
            .next_table()
            .ok_or(MapError::NotMapped { va })?;
        let pt = self.pt_mut(pt_page);
        let entry = pt.get(i1);
        let Some((frame, _)) = entry.page_4k() else {
            return Err(MapError::NotMapped { va });
        };
        pt.set(i1, entry.without_present());
        tlb.flush_page(va.page::<Size4K>().base());
        Ok(frame)
    }

    /// Translate `va` to the physical address it is mapped to: the leaf's
    /// frame plus the low 12 bits of `va`.
    #[must_use]
    pub fn translate(&self, va: VirtualAddress) -> Option<PhysicalAddress> {
        let (frame, _) = self.table_entry(va)?.page_4k()?;
        Some(frame.join(va.offset::<Size4K>()))
    }

    /// Prepare this (freshly allocated) directory for a user task: clear it,
    /// copy the kernel half from `kernel` and install the self-reference.
    ///
    /// Kernel slots must already point at preallocated tables; every address
    /// space then shares the same kernel page tables.
    pub fn share_kernel_half<K: PhysMapper>(&self, kernel: &AddressSpace<'_, K>) {
        let dst = self.pd_mut();
        dst.zero();
        let src = kernel.pd_mut();
        for slot in KERNEL_PDE_FIRST..SELF_REF_PDE {
            let i = L2Index::new(slot as u16);
            dst.set(i, src.get(i));
        }
        install_self_reference(dst, self.root);
    }

    /// Frames of all page tables linked below `limit` (exclusive directory slot).
    ///
    /// Used to return a task's private tables when its address space dies.
    pub fn tables_below(&self, limit: u32) -> impl Iterator<Item = PhysicalPage<Size4K>> + '_ {
        (0..limit).filter_map(move |slot| self.pd_mut().get(L2Index::new(slot as u16)).next_table())
    }

    /// Every present 4 KiB leaf below directory slot `limit`, as
    /// `(page base, frame)`.
    pub fn leaves_below(
        &self,
        limit: u32,
    ) -> impl Iterator<Item = (VirtualAddress, PhysicalPage<Size4K>)> + '_ {
        (0..limit).flat_map(move |slot| {
            let i2 = L2Index::new(slot as u16);
            let table = self.pd_mut().get(i2).next_table();
            table.into_iter().flat_map(move |pt_page| {
                (0..ENTRIES_PER_TABLE).filter_map(move |i| {
                    let i1 = L1Index::new(i as u16);
                    let (frame, _) = self.pt_mut(pt_page).get(i1).page_4k()?;
                    Some((VirtualAddress::new(i2.base().as_u32() | (i << 12)), frame))
                })
            })
        })
    }
}
