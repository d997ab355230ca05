//! # Runtime memory layout
//!
//! The physical pools and the virtual tracker capacities depend on the amount
//! of installed RAM, so they are derived at boot from [`BootInfo`].
//!
//! ```text
//! 0x0000_0000 ┌──────────────────────────────┐
//!             │ low memory, bitmap storage   │
//! 0x0010_0000 ├──────────────────────────────┤
//!             │ page directory + 255 tables  │
//! 0x0020_0000 ├──────────────────────────────┤ kernel_pool_start
//!             │ kernel pool (half the rest)  │
//!             ├──────────────────────────────┤ user_pool_start
//!             │ user pool                    │
//! total       └──────────────────────────────┘
//! ```

use crate::boot::BootInfo;
use crate::memory::{
    KERNEL_HEAP_END, KERNEL_HEAP_START, PAGE_SIZE, RESERVED_PHYS_END, USER_STACK_TOP,
    USER_VADDR_START,
};
use kernel_memory_addresses::PhysicalAddress;

/// Physical start of the pool and tracker bitmaps.
pub const BITMAP_STORAGE_PHYS: PhysicalAddress = PhysicalAddress::new(0x0009_A000);

/// Bytes available for bitmaps. The kernel main thread's control block and
/// stack sit right above.
pub const BITMAP_STORAGE_LEN: u32 = 0x0009_E000 - 0x0009_A000;

/// Pages a user task's virtual tracker spans, from [`USER_VADDR_START`] to
/// [`USER_STACK_TOP`].
pub const USER_VSPACE_PAGES: u32 = (USER_STACK_TOP - USER_VADDR_START.as_u32()) / PAGE_SIZE;

/// Pages of the kernel heap window.
pub const KERNEL_HEAP_WINDOW_PAGES: u32 = (KERNEL_HEAP_END - KERNEL_HEAP_START.as_u32()) / PAGE_SIZE;

#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum LayoutError {
    #[error("{total:#x} bytes of RAM do not reach past the reserved region")]
    TooLittleMemory { total: u32 },
    #[error("bitmaps need {needed} bytes but only {available} are reserved")]
    BitmapStorageExceeded { needed: u32, available: u32 },
}

/// Pool and tracker geometry derived from the installed RAM.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct MemoryLayout {
    pub total_memory: u32,
    pub kernel_pool_start: PhysicalAddress,
    pub kernel_pool_frames: u32,
    pub user_pool_start: PhysicalAddress,
    pub user_pool_frames: u32,
    /// Pages the kernel virtual tracker can hand out.
    pub kernel_vspace_pages: u32,
}

impl MemoryLayout {
    /// Split the RAM above the reserved region in half: the kernel pool takes
    /// `floor(free / 2)` frames, the user pool the remainder.
    ///
    /// # Errors
    /// If there is no free frame at all, or the three bitmaps would not fit
    /// [`BITMAP_STORAGE_LEN`].
    pub const fn from_boot_info(info: &BootInfo) -> Result<Self, LayoutError> {
        let total = info.total_memory;
        if total < RESERVED_PHYS_END + 2 * PAGE_SIZE {
            return Err(LayoutError::TooLittleMemory { total });
        }

        let free_frames = (total - RESERVED_PHYS_END) / PAGE_SIZE;
        let kernel_frames = free_frames / 2;
        let user_frames = free_frames - kernel_frames;
        let kernel_vspace_pages = if kernel_frames < KERNEL_HEAP_WINDOW_PAGES {
            kernel_frames
        } else {
            KERNEL_HEAP_WINDOW_PAGES
        };

        let layout = Self {
            total_memory: total,
            kernel_pool_start: PhysicalAddress::new(RESERVED_PHYS_END),
            kernel_pool_frames: kernel_frames,
            user_pool_start: PhysicalAddress::new(RESERVED_PHYS_END + kernel_frames * PAGE_SIZE),
            user_pool_frames: user_frames,
            kernel_vspace_pages,
        };

        let needed = layout.bitmap_bytes();
        if needed > BITMAP_STORAGE_LEN {
            return Err(LayoutError::BitmapStorageExceeded {
                needed,
                available: BITMAP_STORAGE_LEN,
            });
        }

        Ok(layout)
    }

    /// A layout for a given RAM size.
    ///
    /// # Errors
    /// See [`MemoryLayout::from_boot_info`].
    pub const fn from_total_memory(total_memory: u32) -> Result<Self, LayoutError> {
        Self::from_boot_info(&BootInfo::new(total_memory))
    }

    /// Smallest machine whose kernel and user pools hold the given frame counts.
    ///
    /// The user pool gets at least as many frames as the kernel pool.
    ///
    /// # Errors
    /// See [`MemoryLayout::from_boot_info`].
    pub const fn with_pool_frames(kernel_frames: u32, user_frames: u32) -> Result<Self, LayoutError> {
        let user = if user_frames < kernel_frames {
            kernel_frames
        } else {
            user_frames
        };
        Self::from_total_memory(RESERVED_PHYS_END + (kernel_frames + user) * PAGE_SIZE)
    }

    /// Bytes of the kernel pool.
    #[must_use]
    pub const fn kernel_pool_size(&self) -> u32 {
        self.kernel_pool_frames * PAGE_SIZE
    }

    /// Bytes of the user pool.
    #[must_use]
    pub const fn user_pool_size(&self) -> u32 {
        self.user_pool_frames * PAGE_SIZE
    }

    /// Bitmap bytes needed to track the given number of bits.
    #[must_use]
    pub const fn bytes_for(bits: u32) -> u32 {
        bits.div_ceil(8)
    }

    /// Storage for the kernel pool, user pool and kernel virtual tracker, in that order.
    #[must_use]
    pub const fn bitmap_bytes(&self) -> u32 {
        Self::bytes_for(self.kernel_pool_frames)
            + Self::bytes_for(self.user_pool_frames)
            + Self::bytes_for(self.kernel_vspace_pages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thirty_two_mib_machine() {
        let layout = MemoryLayout::from_total_memory(32 * 1024 * 1024).expect("layout");
        // (32 MiB - 2 MiB) / 4 KiB = 7680 free frames
        assert_eq!(layout.kernel_pool_frames, 3840);
        assert_eq!(layout.user_pool_frames, 3840);
        assert_eq!(layout.kernel_pool_start.as_u32(), 0x0020_0000);
        assert_eq!(layout.user_pool_start.as_u32(), 0x0020_0000 + 3840 * 4096);
        assert_eq!(layout.kernel_vspace_pages, 3840);
        assert_eq!(layout.bitmap_bytes(), 3 * 480);
    }

    #[test]
    fn odd_frame_count_goes_to_user_pool() {
        let layout = MemoryLayout::from_total_memory(0x0020_0000 + 5 * 4096 + 100).expect("layout");
        assert_eq!(layout.kernel_pool_frames, 2);
        assert_eq!(layout.user_pool_frames, 3);
    }

    #[test]
    fn explicit_pool_sizes() {
        let layout = MemoryLayout::with_pool_frames(8, 8).expect("layout");
        assert_eq!(layout.kernel_pool_frames, 8);
        assert_eq!(layout.user_pool_frames, 8);
        assert_eq!(layout.total_memory, 0x0020_0000 + 16 * 4096);
    }

    #[test]
    fn rejects_tiny_machines() {
        assert_eq!(
            MemoryLayout::from_total_memory(0x0010_0000),
            Err(LayoutError::TooLittleMemory { total: 0x0010_0000 })
        );
    }

    #[test]
    fn rejects_layouts_without_bitmap_room() {
        let err = MemoryLayout::from_total_memory(u32::MAX).expect_err("too big");
        assert!(matches!(err, LayoutError::BitmapStorageExceeded { .. }));
    }

    #[test]
    fn user_tracker_span() {
        assert_eq!(USER_VSPACE_PAGES, (0xC000_0000 - 0x0804_8000) / 4096);
    }
}
