//! # Paging structures
//!
//! Both levels hold 1024 entries of 4 bytes, so a directory and a table each
//! fill one 4 KiB frame.

pub mod pd;
pub mod pt;

use crate::page_table::pd::L2Index;
use crate::page_table::pt::L1Index;
use kernel_memory_addresses::VirtualAddress;

/// Entries per directory or table.
pub const ENTRIES: usize = 1024;

/// Directory and table index of a virtual address.
#[inline]
#[must_use]
pub const fn split_indices(va: VirtualAddress) -> (L2Index, L1Index) {
    (L2Index::from(va), L1Index::from(va))
}
