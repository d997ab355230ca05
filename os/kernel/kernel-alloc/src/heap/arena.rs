//! Arena pages.
//!
//! Every heap page starts with a 12-byte header:
//!
//! ```text
//! offset  0: class  (size-class index, u32::MAX for large arenas)
//! offset  4: count  (free blocks of a small arena, pages of a large one)
//! offset  8: large  (0 or 1)
//! offset 12: first block / payload
//! ```

use crate::view::VirtualView;
use kernel_info::memory::PAGE_SIZE;
use kernel_memory_addresses::{Size4K, VirtualAddress};
use kernel_vmem::PhysMapper;

pub const ARENA_HEADER_SIZE: u32 = 12;

const NO_CLASS: u32 = u32::MAX;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct ArenaHeader {
    pub class: Option<usize>,
    pub count: u32,
    pub large: bool,
}

impl ArenaHeader {
    /// Header of a fresh small arena with `free` blocks.
    #[must_use]
    pub const fn small(class: usize, free: u32) -> Self {
        Self {
            class: Some(class),
            count: free,
            large: false,
        }
    }

    /// Header of a large allocation spanning `pages` pages.
    #[must_use]
    pub const fn large(pages: u32) -> Self {
        Self {
            class: None,
            count: pages,
            large: true,
        }
    }

    #[must_use]
    pub fn to_words(self) -> [u32; 3] {
        let class = self.class.map_or(NO_CLASS, |c| c as u32);
        [class, self.count, u32::from(self.large)]
    }

    /// Decode a header.
    ///
    /// # Panics
    /// If the large flag is neither 0 nor 1.
    #[must_use]
    pub fn from_words(words: [u32; 3]) -> Self {
        let [class, count, large] = words;
        let large = match large {
            0 => false,
            1 => true,
            other => panic!("arena carries impossible large flag {other:#x}"),
        };
        Self {
            class: (class != NO_CLASS).then_some(class as usize),
            count,
            large,
        }
    }

    /// Read the header of the arena at `base`.
    pub fn load<M: PhysMapper>(view: &VirtualView<'_, M>, base: VirtualAddress) -> Self {
        Self::from_words([
            view.read_u32(base),
            view.read_u32(base + 4),
            view.read_u32(base + 8),
        ])
    }

    pub fn store<M: PhysMapper>(self, view: &VirtualView<'_, M>, base: VirtualAddress) {
        for (i, word) in self.to_words().into_iter().enumerate() {
            view.write_u32(base + 4 * i as u32, word);
        }
    }
}

/// Arena a block or payload pointer belongs to.
#[inline]
#[must_use]
pub const fn arena_of(ptr: VirtualAddress) -> VirtualAddress {
    ptr.page::<Size4K>().base()
}

/// Address of block `index` of an arena of `block_size` blocks.
#[inline]
#[must_use]
pub fn block_address(base: VirtualAddress, block_size: u32, index: u32) -> VirtualAddress {
    base + (ARENA_HEADER_SIZE + index * block_size)
}

/// Pages a large allocation of `size` bytes occupies, header included.
#[inline]
#[must_use]
pub const fn large_pages(size: u32) -> Option<u32> {
    match size.checked_add(ARENA_HEADER_SIZE) {
        Some(total) => Some(total.div_ceil(PAGE_SIZE)),
        None => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_words() {
        assert_eq!(ArenaHeader::small(2, 63).to_words(), [2, 63, 0]);
        assert_eq!(ArenaHeader::large(3).to_words(), [u32::MAX, 3, 1]);
        assert_eq!(ArenaHeader::from_words([u32::MAX, 1, 1]), ArenaHeader::large(1));
        assert_eq!(ArenaHeader::from_words([6, 3, 0]), ArenaHeader::small(6, 3));
    }

    #[test]
    #[should_panic(expected = "impossible large flag")]
    fn corrupt_flag_is_fatal() {
        let _ = ArenaHeader::from_words([0, 0, 2]);
    }

    #[test]
    fn geometry() {
        let base = VirtualAddress::new(0xC010_3000);
        assert_eq!(block_address(base, 64, 0).as_u32(), 0xC010_300C);
        assert_eq!(block_address(base, 64, 62).as_u32(), 0xC010_300C + 62 * 64);
        assert_eq!(arena_of(block_address(base, 64, 62)), base);
        assert_eq!(arena_of(base + ARENA_HEADER_SIZE), base);
    }

    #[test]
    fn large_page_counts() {
        assert_eq!(large_pages(1025), Some(1));
        assert_eq!(large_pages(2000), Some(1));
        assert_eq!(large_pages(4084), Some(1));
        assert_eq!(large_pages(4085), Some(2));
        assert_eq!(large_pages(u32::MAX), None);
    }
}
