//! Virtual address-space trackers.
//!
//! A tracker knows which pages of a virtual window are reserved. The kernel
//! owns one for its heap window at [`KERNEL_HEAP_START`]; every user task owns
//! one starting at [`USER_VADDR_START`].

use core::fmt;
use kernel_bitmap::Bitmap;
use kernel_info::layout::USER_VSPACE_PAGES;
use kernel_info::memory::{KERNEL_HEAP_START, PAGE_SIZE, USER_STACK_TOP, USER_VADDR_START};
use kernel_memory_addresses::{Size4K, VirtualAddress};

/// Reservation state of a virtual window, one bit per page.
pub struct VirtualTracker<'a> {
    base: VirtualAddress,
    bitmap: Bitmap<'a>,
    /// Reservations must end at or below this address.
    ceiling: Option<VirtualAddress>,
}

impl<'a> VirtualTracker<'a> {
    /// Bytes of storage a user task's tracker needs.
    pub const USER_STORAGE_BYTES: usize = Bitmap::bytes_for(USER_VSPACE_PAGES as usize);

    /// A tracker spanning `pages` pages from `base`, all free.
    ///
    /// # Panics
    /// If `base` is not page-aligned or `storage` is too short.
    pub fn new(base: VirtualAddress, pages: u32, storage: &'a mut [u8]) -> Self {
        assert!(base.is_aligned::<Size4K>(), "tracker base {base} not page-aligned");
        Self {
            base,
            bitmap: Bitmap::new(storage, pages as usize),
            ceiling: None,
        }
    }

    /// The kernel heap window tracker.
    pub fn kernel(pages: u32, storage: &'a mut [u8]) -> Self {
        Self::new(KERNEL_HEAP_START, pages, storage)
    }

    /// A user task's tracker. The page below [`USER_STACK_TOP`] is left to
    /// the initial user stack.
    pub fn user(storage: &'a mut [u8]) -> Self {
        Self {
            ceiling: Some(VirtualAddress::new(USER_STACK_TOP - PAGE_SIZE)),
            ..Self::new(USER_VADDR_START, USER_VSPACE_PAGES, storage)
        }
    }

    #[inline]
    #[must_use]
    pub const fn base(&self) -> VirtualAddress {
        self.base
    }

    /// Number of pages in the window.
    #[inline]
    #[must_use]
    pub const fn pages(&self) -> u32 {
        self.bitmap.len() as u32
    }

    /// `true` if `va` lies inside the window.
    #[must_use]
    pub const fn contains(&self, va: VirtualAddress) -> bool {
        match va.checked_offset_from(self.base) {
            Some(offset) => offset / PAGE_SIZE < self.pages(),
            None => false,
        }
    }

    fn index_of(&self, va: VirtualAddress) -> usize {
        assert!(
            self.contains(va),
            "{va} is outside the tracked window starting at {}",
            self.base
        );
        ((va.as_u32() - self.base.as_u32()) / PAGE_SIZE) as usize
    }

    /// Reserve `pages` contiguous pages, first fit.
    ///
    /// # Panics
    /// If the run would reach past the ceiling of a user tracker.
    pub fn reserve(&mut self, pages: u32) -> Option<VirtualAddress> {
        let index = self.bitmap.scan(pages as usize)?;
        let start = self.base + index as u32 * PAGE_SIZE;
        if let Some(ceiling) = self.ceiling {
            let end = start.as_u32() + pages * PAGE_SIZE;
            assert!(
                end <= ceiling.as_u32(),
                "reservation {start}+{pages} pages reaches into the user stack page"
            );
        }
        self.bitmap.set_range(index, pages as usize);
        Some(start)
    }

    /// Release the run of `pages` pages starting at `va`.
    ///
    /// # Panics
    /// If any page of the run is outside the window or not reserved.
    pub fn release(&mut self, va: VirtualAddress, pages: u32) {
        let first = self.index_of(va);
        for index in first..first + pages as usize {
            assert!(
                self.bitmap.test(index),
                "releasing {} which is not reserved",
                self.base + index as u32 * PAGE_SIZE
            );
            self.bitmap.clear(index);
        }
    }

    /// Reserve the page containing an externally chosen `va`.
    ///
    /// Returns whether the page was free before.
    ///
    /// # Panics
    /// If `va` is outside the window.
    pub fn mark(&mut self, va: VirtualAddress) -> bool {
        let index = self.index_of(va);
        let was_free = !self.bitmap.test(index);
        self.bitmap.set(index);
        was_free
    }

    /// `true` if the page containing `va` is reserved.
    ///
    /// # Panics
    /// If `va` is outside the window.
    #[must_use]
    pub fn is_reserved(&self, va: VirtualAddress) -> bool {
        self.bitmap.test(self.index_of(va))
    }

    #[must_use]
    pub fn reserved_pages(&self) -> u32 {
        self.bitmap.count_set() as u32
    }
}

impl fmt::Debug for VirtualTracker<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VirtualTracker")
            .field("base", &self.base)
            .field("pages", &self.pages())
            .field("reserved", &self.reserved_pages())
            .finish_non_exhaustive()
    }
}
