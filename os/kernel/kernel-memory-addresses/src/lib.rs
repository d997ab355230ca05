//! # Virtual and Physical Memory Address Types
//!
//! Strongly typed wrappers for raw 32-bit memory addresses and page bases used
//! in paging and memory management code.
//!
//! ## Overview
//!
//! This crate defines a minimal set of types that prevent mixing virtual and
//! physical addresses at compile time while remaining zero-cost wrappers around
//! `u32` values.
//!
//! | Type | Meaning |
//! |------|---------|
//! | [`VirtualAddress`] / [`VirtualPage<S>`] | Virtual (page-table translated) memory. |
//! | [`PhysicalAddress`] / [`PhysicalPage<S>`] | Physical frames of RAM. |
//! | [`PageOffset<S>`] | The bits of an address below its page of size `S`. |
//!
//! ## Page Sizes
//!
//! - [`Size4K`]: 4 KiB pages, the only granularity the allocator hands out
//! - [`Size4M`]: the 4 MiB span covered by one page directory entry
//!
//! ## Typical Usage
//!
//! ```rust
//! # use kernel_memory_addresses::*;
//! let va = VirtualAddress::new(0xC010_1234);
//!
//! let (page, off) = va.split::<Size4K>();
//! assert_eq!(page.base().as_u32(), 0xC010_1000);
//! assert_eq!(off.as_u32(), 0x234);
//! assert_eq!(page.join(off), va);
//!
//! // The page directory slot is the 4 MiB page number.
//! assert_eq!(va.page::<Size4M>().number(), 768);
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]

mod address;
mod page_offset;
mod page_size;

pub use crate::address::{PhysicalAddress, PhysicalPage, VirtualAddress, VirtualPage};
pub use crate::page_offset::PageOffset;
pub use crate::page_size::{PageSize, Size4K, Size4M};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_and_join_roundtrip_4k() {
        let va = VirtualAddress::new(0x0804_8ABC);
        let (page, off) = va.split::<Size4K>();
        assert_eq!(page.base().as_u32(), 0x0804_8000);
        assert_eq!(off.as_u32(), 0xABC);
        assert_eq!(page.join(off), va);
    }

    #[test]
    fn directory_and_table_indices() {
        let va = VirtualAddress::new(0xC010_3000);
        assert_eq!(va.page::<Size4M>().number(), 0x300);
        assert_eq!(va.page::<Size4K>().number() & 0x3FF, 0x103);
    }

    #[test]
    fn alignment_checks() {
        assert!(PhysicalAddress::new(0x0020_0000).is_aligned::<Size4K>());
        assert!(!PhysicalAddress::new(0x0020_0004).is_aligned::<Size4K>());
        assert!(VirtualPage::<Size4K>::try_from(VirtualAddress::new(0x1001)).is_err());
        assert_eq!(
            PhysicalPage::<Size4K>::try_from(PhysicalAddress::new(0x3000))
                .map(PhysicalPage::base),
            Ok(PhysicalAddress::new(0x3000))
        );
    }

    #[test]
    fn checked_arithmetic() {
        let top = VirtualAddress::new(0xFFFF_F000);
        assert_eq!(top.checked_add(0x1000), None);
        assert_eq!(
            VirtualAddress::new(0xC010_2000).checked_offset_from(VirtualAddress::new(0xC010_0000)),
            Some(0x2000)
        );
        assert_eq!(
            VirtualAddress::new(0x1000).checked_offset_from(VirtualAddress::new(0x2000)),
            None
        );
    }

    #[test]
    fn formatting() {
        assert_eq!(format!("{:?}", VirtualAddress::new(0xC000_0000)), "VA(0xC0000000)");
        assert_eq!(format!("{:?}", PhysicalAddress::new(0xB00)), "PA(0x00000B00)");
        assert_eq!(format!("{}", Size4K), "4K");
        assert_eq!(format!("{}", PhysicalPage::<Size4K>::from_addr(PhysicalAddress::new(0x0020_0FFF))), "0x00200000/4K");
        assert_eq!(format!("{:?}", VirtualAddress::new(0x1234).offset::<Size4K>()), "+0x234/4K");
    }
}
