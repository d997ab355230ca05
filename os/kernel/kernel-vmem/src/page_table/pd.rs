//! # Page Directory (PD / L2)
//!
//! - [`L2Index`]: index type for VA bits `[31:22]`.
//! - [`PdEntry`]: a directory entry pointing to a page table. 4 MiB pages are
//!   not used, so `PS` is always clear.
//! - [`PageDirectory`]: a 4 KiB-aligned array of 1024 PDEs. Its last entry
//!   points back at the directory frame (see [`crate::recursive`]).

use crate::PageEntryBits;
use crate::page_table::ENTRIES;
use kernel_memory_addresses::{PhysicalPage, Size4K, VirtualAddress};

/// Index into the Page Directory (derived from VA bits `[31:22]`).
#[repr(transparent)]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct L2Index(u16);

/// A single Page Directory entry (PDE).
#[doc(alias = "PDE")]
#[repr(transparent)]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct PdEntry(PageEntryBits);

/// The Page Directory (L2): 1024 entries, 4 KiB-aligned.
#[doc(alias = "PD")]
#[repr(C, align(4096))]
pub struct PageDirectory {
    entries: [PdEntry; ENTRIES],
}

impl L2Index {
    /// Extract bits `[31:22]` of `va`.
    #[inline]
    #[must_use]
    pub const fn from(va: VirtualAddress) -> Self {
        Self::new((va.as_u32() >> 22) as u16)
    }

    #[inline]
    #[must_use]
    pub const fn new(v: u16) -> Self {
        debug_assert!((v as usize) < ENTRIES);
        Self(v)
    }

    #[inline]
    #[must_use]
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }

    /// Byte offset of the entry within the directory.
    #[inline]
    #[must_use]
    pub const fn byte_offset(self) -> u32 {
        self.0 as u32 * 4
    }

    /// First virtual address governed by this slot.
    #[inline]
    #[must_use]
    pub const fn base(self) -> VirtualAddress {
        VirtualAddress::new((self.0 as u32) << 22)
    }
}

impl PdEntry {
    #[inline]
    #[must_use]
    pub const fn zero() -> Self {
        Self(PageEntryBits::new())
    }

    #[inline]
    #[must_use]
    pub const fn is_present(self) -> bool {
        self.0.present()
    }

    #[inline]
    #[must_use]
    pub const fn flags(self) -> PageEntryBits {
        self.0
    }

    /// If present, the frame of the page table it points to.
    #[inline]
    #[must_use]
    pub const fn next_table(self) -> Option<PhysicalPage<Size4K>> {
        if self.is_present() {
            Some(PhysicalPage::from_addr(self.0.physical_address()))
        } else {
            None
        }
    }

    /// A present entry pointing at the table in `page`.
    #[inline]
    #[must_use]
    pub const fn make_next(page: PhysicalPage<Size4K>, mut flags: PageEntryBits) -> Self {
        flags.set_large_page(false);
        flags.set_present(true);
        flags.set_physical_address(page.base());
        Self(flags)
    }

    #[inline]
    #[must_use]
    pub fn raw(self) -> u32 {
        self.0.into()
    }

    #[inline]
    #[must_use]
    pub fn from_raw(v: u32) -> Self {
        Self(PageEntryBits::from(v))
    }
}

impl PageDirectory {
    #[inline]
    #[must_use]
    pub const fn zeroed() -> Self {
        Self {
            entries: [PdEntry::zero(); ENTRIES],
        }
    }

    #[inline]
    pub fn zero(&mut self) {
        self.entries.fill(PdEntry::zero());
    }

    #[inline]
    #[must_use]
    pub const fn get(&self, i: L2Index) -> PdEntry {
        self.entries[i.as_usize()]
    }

    #[inline]
    pub const fn set(&mut self, i: L2Index, e: PdEntry) {
        self.entries[i.as_usize()] = e;
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use kernel_memory_addresses::PhysicalAddress;

    #[test]
    fn pde_next_table() {
        let pt = PhysicalPage::<Size4K>::from_addr(PhysicalAddress::new(0x0010_1000));
        let e = PdEntry::make_next(pt, PageEntryBits::new_user_rw());
        assert_eq!(e.next_table(), Some(pt));
        assert_eq!(e.raw(), 0x0010_1007);
        assert_eq!(PdEntry::zero().next_table(), None);
    }

    #[test]
    fn index_from_va() {
        let i = L2Index::from(VirtualAddress::new(0xFFFF_F123));
        assert_eq!(i.as_usize(), 1023);
        assert_eq!(i.byte_offset(), 0xFFC);
        assert_eq!(L2Index::new(768).base().as_u32(), 0xC000_0000);
    }

    #[test]
    fn directory_is_one_frame() {
        assert_eq!(size_of::<PageDirectory>(), 4096);
    }
}
