//! Physical frame pools.
//!
//! RAM above the bootstrap region is split into a kernel and a user pool at
//! boot. Each pool tracks its frames in a [`Bitmap`]: bit *i* set means the
//! frame at `start + i * PAGE_SIZE` is handed out.

use core::fmt;
use kernel_bitmap::Bitmap;
use kernel_info::memory::PAGE_SIZE;
use kernel_memory_addresses::{PhysicalAddress, PhysicalPage, Size4K};
use kernel_vmem::FrameAlloc;

/// A contiguous range of physical frames.
pub struct FramePool<'a> {
    start: PhysicalAddress,
    bitmap: Bitmap<'a>,
}

impl<'a> FramePool<'a> {
    /// A pool of `frames` frames starting at `start`, every frame free.
    ///
    /// # Panics
    /// If `start` is not page-aligned or `storage` cannot hold one bit per frame.
    pub fn new(start: PhysicalAddress, frames: u32, storage: &'a mut [u8]) -> Self {
        assert!(start.is_aligned::<Size4K>(), "pool start {start} not page-aligned");
        Self {
            start,
            bitmap: Bitmap::new(storage, frames as usize),
        }
    }

    #[inline]
    #[must_use]
    pub const fn start(&self) -> PhysicalAddress {
        self.start
    }

    /// Number of frames in the pool.
    #[inline]
    #[must_use]
    pub const fn frames(&self) -> u32 {
        self.bitmap.len() as u32
    }

    /// Capacity in bytes.
    #[inline]
    #[must_use]
    pub const fn size(&self) -> u32 {
        self.frames() * PAGE_SIZE
    }

    /// `true` if `pa` lies inside the pool.
    #[must_use]
    pub const fn contains(&self, pa: PhysicalAddress) -> bool {
        match pa.checked_offset_from(self.start) {
            Some(offset) => offset < self.size(),
            None => false,
        }
    }

    fn index_of(&self, page: PhysicalPage<Size4K>) -> usize {
        assert!(
            self.contains(page.base()),
            "{page} is outside the pool {}..{}",
            self.start,
            self.start + self.size()
        );
        (page.number() - self.start.page::<Size4K>().number()) as usize
    }

    /// Take the lowest free frame.
    pub fn alloc_frame(&mut self) -> Option<PhysicalPage<Size4K>> {
        let index = self.bitmap.scan(1)?;
        self.bitmap.set(index);
        Some(PhysicalPage::from_addr(self.start + index as u32 * PAGE_SIZE))
    }

    /// Return `page` to the pool.
    ///
    /// # Panics
    /// If `page` is outside the pool or was not handed out.
    pub fn free_frame(&mut self, page: PhysicalPage<Size4K>) {
        let index = self.index_of(page);
        assert!(self.bitmap.test(index), "{page} was never allocated from this pool");
        self.bitmap.clear(index);
    }

    /// `true` if `page` is currently handed out.
    ///
    /// # Panics
    /// If `page` is outside the pool.
    #[must_use]
    pub fn is_allocated(&self, page: PhysicalPage<Size4K>) -> bool {
        self.bitmap.test(self.index_of(page))
    }

    #[must_use]
    pub fn used_frames(&self) -> u32 {
        self.bitmap.count_set() as u32
    }

    #[must_use]
    pub fn free_frames(&self) -> u32 {
        self.bitmap.count_clear() as u32
    }
}

impl FrameAlloc for FramePool<'_> {
    fn alloc_4k(&mut self) -> Option<PhysicalPage<Size4K>> {
        self.alloc_frame()
    }
}

impl fmt::Debug for FramePool<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FramePool")
            .field("start", &self.start)
            .field("frames", &self.frames())
            .field("used", &self.used_frames())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(addr: u32) -> PhysicalPage<Size4K> {
        PhysicalPage::from_addr(PhysicalAddress::new(addr))
    }

    #[test]
    fn hands_out_frames_in_address_order() {
        let mut storage = [0u8; 1];
        let mut pool = FramePool::new(PhysicalAddress::new(0x0020_0000), 3, &mut storage);
        assert_eq!(pool.alloc_frame(), Some(page(0x0020_0000)));
        assert_eq!(pool.alloc_frame(), Some(page(0x0020_1000)));
        assert_eq!(pool.alloc_frame(), Some(page(0x0020_2000)));
        assert_eq!(pool.alloc_frame(), None);
        assert_eq!(pool.used_frames(), 3);
        assert_eq!(pool.free_frames(), 0);
    }

    #[test]
    fn freed_frame_is_reused_first() {
        let mut storage = [0u8; 1];
        let mut pool = FramePool::new(PhysicalAddress::new(0x0020_0000), 4, &mut storage);
        let a = pool.alloc_frame().unwrap();
        let b = pool.alloc_frame().unwrap();
        pool.free_frame(a);
        assert!(!pool.is_allocated(a));
        assert!(pool.is_allocated(b));
        assert_eq!(pool.alloc_frame(), Some(a));
    }

    #[test]
    fn containment() {
        let mut storage = [0u8; 1];
        let pool = FramePool::new(PhysicalAddress::new(0x0020_0000), 2, &mut storage);
        assert_eq!(pool.size(), 0x2000);
        assert!(pool.contains(PhysicalAddress::new(0x0020_1FFF)));
        assert!(!pool.contains(PhysicalAddress::new(0x0020_2000)));
        assert!(!pool.contains(PhysicalAddress::new(0x001F_F000)));
    }

    #[test]
    #[should_panic(expected = "never allocated")]
    fn double_free_panics() {
        let mut storage = [0u8; 1];
        let mut pool = FramePool::new(PhysicalAddress::new(0x0020_0000), 2, &mut storage);
        let a = pool.alloc_frame().unwrap();
        pool.free_frame(a);
        pool.free_frame(a);
    }

    #[test]
    #[should_panic(expected = "outside the pool")]
    fn foreign_frame_panics() {
        let mut storage = [0u8; 1];
        let mut pool = FramePool::new(PhysicalAddress::new(0x0020_0000), 2, &mut storage);
        pool.free_frame(page(0x0030_0000));
    }
}
