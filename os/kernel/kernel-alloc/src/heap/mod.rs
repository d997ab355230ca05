//! # Arena heap
//!
//! Byte-granular allocation on top of the page service.
//!
//! * Requests up to [`LARGE_THRESHOLD`] bytes are served from the first size
//!   class that fits. A class with an empty free list gets a fresh arena page,
//!   carved into blocks that all go onto the list.
//! * Larger requests get a run of whole pages with a large-arena header in
//!   front of the payload.
//!
//! ```text
//!  small arena (64-byte class)             large arena (3 pages)
//! +--------+-----+-----+-----+---+        +--------+-------------------------+
//! | header | blk | blk | ... |   |        | header | payload ...             |
//! +--------+-----+-----+-----+---+        +--------+-------------------------+
//! ^ page base (arena_of(block))           ^ page base       ^ returned pointer
//! ```
//!
//! Freeing a block returns it to its class. When every block of an arena is
//! free again, the blocks are unlinked and the page goes back to the page
//! service. Large arenas go back as a whole.

pub mod arena;
pub mod size_class;

use crate::free_list::FreeList;
use crate::pages::{FrameSource, Pager};
use crate::view::VirtualView;
use arena::{ARENA_HEADER_SIZE, ArenaHeader, arena_of, block_address, large_pages};
use kernel_info::memory::MAX_PAGES_PER_REQUEST;
use kernel_memory_addresses::VirtualAddress;
use kernel_sync::{InterruptControl, IrqGuard, SpinLock};
use kernel_vmem::{PhysMapper, TlbFlush};
use log::{debug, warn};
pub use size_class::{LARGE_THRESHOLD, SizeClass, SizeClasses};

/// Runs a closure with interrupts disabled and the split lock held, so that
/// carving an arena into blocks looks atomic to every other allocator call.
pub(crate) struct SplitSection<'a, I: InterruptControl> {
    lock: &'a SpinLock<()>,
    irq: &'a I,
}

impl<'a, I: InterruptControl> SplitSection<'a, I> {
    pub(crate) const fn new(lock: &'a SpinLock<()>, irq: &'a I) -> Self {
        Self { lock, irq }
    }

    fn run<R>(&self, f: impl FnOnce() -> R) -> R {
        let _irq = IrqGuard::new(self.irq);
        let _lock = self.lock.lock();
        f()
    }
}

/// Serve `size` bytes for the owner of `pager` and `classes`.
pub(crate) fn malloc<M, T, F, I>(
    pager: &mut Pager<'_, '_, M, T, F>,
    classes: &mut SizeClasses,
    split: &SplitSection<'_, I>,
    size: u32,
) -> Option<VirtualAddress>
where
    M: PhysMapper,
    T: TlbFlush,
    F: FrameSource,
    I: InterruptControl,
{
    if size > LARGE_THRESHOLD {
        return malloc_large(pager, size);
    }

    let index = classes.lookup(size)?;
    if classes[index].free.is_empty() {
        let base = match pager.alloc_zeroed(1) {
            Ok(base) => base,
            Err(err) => {
                warn!("no page for a new {}-byte arena: {err}", classes[index].block_size);
                return None;
            }
        };
        let view = pager.view();
        let class = &mut classes[index];
        ArenaHeader::small(index, class.blocks_per_arena).store(&view, base);
        split.run(|| {
            for i in 0..class.blocks_per_arena {
                class.free.append(&view, block_address(base, class.block_size, i));
            }
        });
        debug!("new {}-byte arena at {base}", class.block_size);
    }

    let view = pager.view();
    let class = &mut classes[index];
    let block = class.free.pop_front(&view)?;
    view.fill(block, class.block_size, 0);

    let arena = arena_of(block);
    let mut header = ArenaHeader::load(&view, arena);
    header.count -= 1;
    header.store(&view, arena);
    Some(block)
}

fn malloc_large<M, T, F>(pager: &mut Pager<'_, '_, M, T, F>, size: u32) -> Option<VirtualAddress>
where
    M: PhysMapper,
    T: TlbFlush,
    F: FrameSource,
{
    let pages = large_pages(size).filter(|&p| p < MAX_PAGES_PER_REQUEST)?;
    let base = match pager.alloc_zeroed(pages) {
        Ok(base) => base,
        Err(err) => {
            warn!("no room for {size} bytes: {err}");
            return None;
        }
    };
    ArenaHeader::large(pages).store(&pager.view(), base);
    debug!("large arena of {pages} pages at {base}");
    Some(base + ARENA_HEADER_SIZE)
}

/// Return the block or large payload at `ptr`.
///
/// # Panics
/// If the arena header is corrupt or the block is freed twice.
pub(crate) fn free<M, T, F>(
    pager: &mut Pager<'_, '_, M, T, F>,
    classes: &mut SizeClasses,
    ptr: VirtualAddress,
) where
    M: PhysMapper,
    T: TlbFlush,
    F: FrameSource,
{
    let view = pager.view();
    let arena = arena_of(ptr);
    let mut header = ArenaHeader::load(&view, arena);

    if header.large {
        assert!(header.class.is_none(), "large arena {arena} names a size class");
        pager.free(arena, header.count);
        debug!("large arena of {} pages at {arena} released", header.count);
        return;
    }

    let Some(index) = header.class else {
        panic!("small arena {arena} has no size class");
    };
    let class = &mut classes[index];
    assert!(
        header.count < class.blocks_per_arena,
        "double free of {ptr}: arena {arena} is already entirely free"
    );
    debug_assert!(!class.free.contains(&view, ptr), "double free of {ptr}");

    class.free.append(&view, ptr);
    header.count += 1;
    header.store(&view, arena);

    if header.count == class.blocks_per_arena {
        release_arena(&view, &mut class.free, arena, class.block_size, class.blocks_per_arena);
        pager.free(arena, 1);
        debug!("{}-byte arena at {arena} released", class.block_size);
    }
}

fn release_arena<M: PhysMapper>(
    view: &VirtualView<'_, M>,
    list: &mut FreeList,
    arena: VirtualAddress,
    block_size: u32,
    blocks: u32,
) {
    for i in 0..blocks {
        let block = block_address(arena, block_size, i);
        debug_assert!(list.contains(view, block), "{block} of a free arena is not on its list");
        list.remove(view, block);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kernel_hosted::SoftInterrupts;

    #[test]
    fn split_section_holds_the_lock_with_interrupts_masked() {
        let lock = SpinLock::new(());
        let irq = SoftInterrupts::default();
        let split = SplitSection::new(&lock, &irq);

        let inside = split.run(|| (lock.is_locked(), irq.enabled()));
        assert_eq!(inside, (true, false));
        assert!(!lock.is_locked());
        assert!(irq.enabled());
    }
}
