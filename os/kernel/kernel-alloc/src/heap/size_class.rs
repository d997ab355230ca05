use crate::free_list::{FreeList, LINK_BYTES};
use crate::heap::arena::ARENA_HEADER_SIZE;
use core::ops::{Index, IndexMut};
use kernel_info::memory::PAGE_SIZE;

/// Number of small block sizes, 16 through 1024 bytes.
pub const SIZE_CLASS_COUNT: usize = 7;

/// Smallest block size.
pub const MIN_BLOCK_SIZE: u32 = 16;

/// Requests above this size skip the size classes and get whole pages.
pub const LARGE_THRESHOLD: u32 = MIN_BLOCK_SIZE << (SIZE_CLASS_COUNT - 1);

const _: () = {
    assert!(LARGE_THRESHOLD == 1024);
    assert!(MIN_BLOCK_SIZE >= LINK_BYTES);
};

/// One block size and the free blocks of that size.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct SizeClass {
    pub block_size: u32,
    /// Blocks one arena page is carved into.
    pub blocks_per_arena: u32,
    pub free: FreeList,
}

impl SizeClass {
    #[must_use]
    pub const fn new(block_size: u32) -> Self {
        Self {
            block_size,
            blocks_per_arena: (PAGE_SIZE - ARENA_HEADER_SIZE) / block_size,
            free: FreeList::new(),
        }
    }
}

/// The full descriptor set of one heap owner (the kernel or one user task).
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct SizeClasses([SizeClass; SIZE_CLASS_COUNT]);

impl SizeClasses {
    #[must_use]
    pub const fn new() -> Self {
        Self([
            SizeClass::new(16),
            SizeClass::new(32),
            SizeClass::new(64),
            SizeClass::new(128),
            SizeClass::new(256),
            SizeClass::new(512),
            SizeClass::new(1024),
        ])
    }

    /// Index of the first class whose blocks hold `size` bytes.
    #[must_use]
    pub fn lookup(&self, size: u32) -> Option<usize> {
        if size == 0 {
            return None;
        }
        self.0.iter().position(|class| size <= class.block_size)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SizeClass> {
        self.0.iter()
    }

    /// Blocks currently sitting on any free list.
    #[must_use]
    pub fn free_blocks(&self) -> u32 {
        self.0.iter().map(|class| class.free.len()).sum()
    }
}

impl Default for SizeClasses {
    fn default() -> Self {
        Self::new()
    }
}

impl Index<usize> for SizeClasses {
    type Output = SizeClass;

    fn index(&self, index: usize) -> &SizeClass {
        &self.0[index]
    }
}

impl IndexMut<usize> for SizeClasses {
    fn index_mut(&mut self, index: usize) -> &mut SizeClass {
        &mut self.0[index]
    }
}
