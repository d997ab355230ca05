//! # Self-referential directory slot
//!
//! The last directory entry points at the directory frame itself. With that
//! loop in place the MMU exposes every paging structure of the active address
//! space at a fixed virtual location:
//!
//! ```text
//! 0xFFC0_0000 + pde_index * 0x1000   page table governing slot `pde_index`
//! 0xFFFF_F000                        the page directory
//! ```
//!
//! so the entries governing any `va` can be located from `va` alone.

use crate::page_table::pd::{L2Index, PageDirectory, PdEntry};
use crate::page_table::split_indices;
use crate::PageEntryBits;
use kernel_info::memory::SELF_REF_PDE;
use kernel_memory_addresses::{PhysicalPage, Size4K, VirtualAddress};

/// Directory slot holding the loop.
pub const SELF_REF_INDEX: L2Index = L2Index::new(SELF_REF_PDE as u16);

/// Virtual base of the window showing all page tables.
pub const TABLES_WINDOW: u32 = SELF_REF_PDE << 22;

/// Virtual address of the directory itself.
pub const DIRECTORY_WINDOW: u32 = TABLES_WINDOW | (SELF_REF_PDE << 12);

/// Virtual address of the directory entry governing `va`.
#[inline]
#[must_use]
pub const fn pde_address(va: VirtualAddress) -> VirtualAddress {
    let (i2, _) = split_indices(va);
    VirtualAddress::new(DIRECTORY_WINDOW + i2.byte_offset())
}

/// Virtual address of the table entry governing `va`.
///
/// Only dereferenceable once the governing directory entry is present.
#[inline]
#[must_use]
pub const fn pte_address(va: VirtualAddress) -> VirtualAddress {
    let (_, i1) = split_indices(va);
    let table = (va.as_u32() & 0xFFC0_0000) >> 10;
    VirtualAddress::new(TABLES_WINDOW + table + i1.byte_offset())
}

/// Virtual address at which the table governing `va` is visible.
#[inline]
#[must_use]
pub const fn table_window(va: VirtualAddress) -> VirtualAddress {
    VirtualAddress::new(pte_address(va).as_u32() & !0xFFF)
}

/// Point the last slot of `dir` (living in frame `root`) back at itself.
pub fn install_self_reference(dir: &mut PageDirectory, root: PhysicalPage<Size4K>) {
    dir.set(
        SELF_REF_INDEX,
        PdEntry::make_next(root, PageEntryBits::new_user_rw()),
    );
}
