//! # Virtual Memory Support
//!
//! 32-bit x86 paging helpers for the kernel's memory manager.
//!
//! ## What you get
//! - An [`address space`](address_space) rooted at one page directory.
//! - 32-bit page-table [`PageEntryBits`] shared by directory and table entries.
//! - 4 KiB-aligned [`PageDirectory`] and [`PageTable`] wrappers plus index helpers.
//! - The [`recursive`] self-referential slot arithmetic.
//! - A tiny allocator/mapper interface ([`FrameAlloc`], [`PhysMapper`], [`TlbFlush`]).
//!
//! ## Virtual Address → Physical Address Walk
//!
//! ```text
//! | 31‒22 | 21‒12 | 11‒0   |
//! |   PD  |   PT  | Offset |
//! ```
//!
//! The directory index selects one of 1024 PDEs, each pointing at a page
//! table of 1024 PTEs that map 4 KiB frames. One table spans 4 MiB of virtual
//! address space.
//!
//! | Level | Table | Entry | Description |
//! |:------|:------|:------|:------------|
//! | 1 | **PD** (Page Directory) | **PDE** | One per address space, loaded into `CR3`. |
//! | 2 | **PT** (Page Table) | **PTE** | Each entry maps a 4 KiB frame. |

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code, clippy::inline_always)]

pub mod address_space;
mod page_entry_bits;
pub mod page_table;
pub mod recursive;

pub use crate::address_space::AddressSpace;
pub use crate::page_entry_bits::PageEntryBits;
pub use crate::page_table::pd::{L2Index, PageDirectory, PdEntry};
pub use crate::page_table::pt::{L1Index, PageTable, PtEntry};
use kernel_memory_addresses::{PageSize, PhysicalAddress, PhysicalPage, Size4K, VirtualAddress};

/// Re-export constants as info module.
pub use kernel_info::memory as info;

/// Errors of page-table manipulation that the caller can recover from.
#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum MapError {
    #[error("no frame left for the page table covering {va}")]
    OutOfPageTables { va: VirtualAddress },
    #[error("{va} is not mapped")]
    NotMapped { va: VirtualAddress },
}

/// Minimal frame allocator used to obtain **physical** 4 KiB frames
/// for page tables.
///
/// Returns `None` on out-of-memory.
pub trait FrameAlloc {
    fn alloc_4k(&mut self) -> Option<PhysicalPage<Size4K>>;
}

/// Converts physical addresses to usable references in the current virtual
/// address space (identity map for low memory, a direct map, or a simulated
/// RAM buffer in hosted tests).
pub trait PhysMapper {
    /// Convert a *physical* address to a usable mutable reference.
    ///
    /// # Safety
    /// - `pa` must be mapped writable for `'a` and suitably aligned for `T`.
    /// - The bytes at `pa` must be a valid `T`; no other live reference may
    ///   alias them mutably.
    unsafe fn phys_to_mut<'a, T>(&self, pa: PhysicalAddress) -> &'a mut T;

    /// `len` bytes starting at `pa`.
    ///
    /// # Safety
    /// As [`phys_to_mut`](Self::phys_to_mut); in addition the whole range must
    /// be contiguous in the mapping.
    unsafe fn phys_bytes_mut<'a>(&self, pa: PhysicalAddress, len: usize) -> &'a mut [u8] {
        unsafe {
            let start: *mut u8 = self.phys_to_mut::<u8>(pa);
            core::slice::from_raw_parts_mut(start, len)
        }
    }

    /// Zero-fill the frame `page`.
    fn zero_frame(&self, page: PhysicalPage<Size4K>) {
        unsafe { self.phys_bytes_mut(page.base(), Size4K::SIZE as usize) }.fill(0);
    }
}

impl<M: PhysMapper> PhysMapper for &M {
    unsafe fn phys_to_mut<'a, T>(&self, pa: PhysicalAddress) -> &'a mut T {
        unsafe { (**self).phys_to_mut(pa) }
    }

    unsafe fn phys_bytes_mut<'a>(&self, pa: PhysicalAddress, len: usize) -> &'a mut [u8] {
        unsafe { (**self).phys_bytes_mut(pa, len) }
    }
}

/// Invalidates cached translations after a mapping changed.
pub trait TlbFlush {
    /// Drop the cached translation of the page containing `va`.
    fn flush_page(&self, va: VirtualAddress);
}

/// `invlpg` on the executing CPU.
#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
#[derive(Debug, Default, Copy, Clone)]
pub struct Invlpg;

#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
impl TlbFlush for Invlpg {
    #[inline]
    fn flush_page(&self, va: VirtualAddress) {
        unsafe {
            core::arch::asm!("invlpg [{}]", in(reg) va.as_usize(), options(nostack, preserves_flags));
        }
    }
}


/// Align `x` down to the nearest multiple of `a`.
///
/// ### Preconditions
/// - `a` must be **non-zero** and a **power of two**.
///
/// ### Examples
/// ```rust
/// # use kernel_vmem::align_down;
/// assert_eq!(align_down(0,      4096), 0);
/// assert_eq!(align_down(4095,   4096), 0);
/// assert_eq!(align_down(8191,   4096), 4096);
/// assert_eq!(align_down(0x12345,   16), 0x12340);
/// ```
#[inline(always)]
#[must_use]
pub const fn align_down(x: u32, a: u32) -> u32 {
    x & !(a - 1)
}

/// Align `x` up to the nearest multiple of `a`.
///
/// ### Preconditions
/// - `a` must be **non-zero** and a **power of two**.
/// - `x + (a - 1)` must **not overflow** `u32`.
///
/// ### Examples
/// ```rust
/// # use kernel_vmem::align_up;
/// assert_eq!(align_up(0,       4096), 0);
/// assert_eq!(align_up(1,       4096), 4096);
/// assert_eq!(align_up(4096,    4096), 4096);
/// assert_eq!(align_up(4097,    4096), 8192);
/// ```
#[inline(always)]
#[must_use]
pub const fn align_up(x: u32, a: u32) -> u32 {
    (x + a - 1) & !(a - 1)
}
