mod common;

use common::{TestMachine, enter_new_task, with_current};
use kernel_alloc::heap::arena::{ARENA_HEADER_SIZE, ArenaHeader, arena_of};
use kernel_info::memory::{KERNEL_HEAP_START, PAGE_SIZE, USER_VADDR_START};
use kernel_memory_addresses::VirtualAddress;
use kernel_sync::InterruptControl;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

#[test]
fn two_small_requests_share_one_arena() {
    let machine = TestMachine::with_pool_frames(16, 16);
    let mm = machine.boot();

    let a = mm.sys_malloc(40).expect("first");
    let b = mm.sys_malloc(40).expect("second");
    assert_eq!(a, KERNEL_HEAP_START + ARENA_HEADER_SIZE);
    assert_eq!(b, a + 64);
    assert_eq!(arena_of(a), arena_of(b));

    // (4096 - 12) / 64 = 63 blocks, two of them in use
    assert_eq!(machine.kernel_arena(arena_of(a)), ArenaHeader::small(2, 61));
    let stats = mm.stats();
    assert_eq!(stats.kernel_used_frames, 1);
    assert_eq!(stats.kernel_free_blocks, 61);
}

#[test]
fn blocks_are_zeroed_on_allocation() {
    let machine = TestMachine::with_pool_frames(16, 16);
    let mm = machine.boot();
    let view = machine.kernel_view();

    // The 1024-byte class holds three blocks per arena.
    let x = mm.sys_malloc(1000).expect("x");
    let _y = mm.sys_malloc(1000).expect("y");
    let _z = mm.sys_malloc(1000).expect("z");
    view.fill(x, 1024, 0xAB);
    mm.sys_free(x);

    assert_eq!(mm.sys_malloc(1000), Some(x));
    assert!((0..1024).step_by(4).all(|off| view.read_u32(x + off) == 0));
}

#[test]
fn size_boundary_between_small_and_large() {
    let machine = TestMachine::with_pool_frames(16, 16);
    let mm = machine.boot();

    let small = mm.sys_malloc(1024).expect("small");
    assert_eq!(machine.kernel_arena(arena_of(small)), ArenaHeader::small(6, 2));

    let large = mm.sys_malloc(1025).expect("large");
    assert_eq!(large.checked_offset_from(arena_of(large)), Some(ARENA_HEADER_SIZE));
    assert_eq!(machine.kernel_arena(arena_of(large)), ArenaHeader::large(1));
}

#[test]
fn large_allocation_frees_exactly_its_pages() {
    let machine = TestMachine::with_pool_frames(16, 16);
    let mm = machine.boot();

    for (size, pages) in [(2000, 1), (4084, 1), (4085, 2), (9000, 3)] {
        let before = mm.stats();
        let ptr = mm.sys_malloc(size).expect("large");
        assert_eq!(machine.kernel_arena(arena_of(ptr)), ArenaHeader::large(pages));
        assert_eq!(mm.stats().kernel_used_frames, before.kernel_used_frames + pages);

        mm.sys_free(ptr);
        assert_eq!(mm.stats(), before);
        assert_eq!(mm.translate(arena_of(ptr)), None);
    }
}

#[test]
fn arena_returns_its_page_once_every_block_is_free() {
    let machine = TestMachine::with_pool_frames(16, 16);
    let mm = machine.boot();

    let blocks: Vec<_> = (0..3).map(|_| mm.sys_malloc(700).expect("block")).collect();
    let arena = arena_of(blocks[0]);
    assert!(blocks.iter().all(|&b| arena_of(b) == arena));
    assert_eq!(mm.stats().kernel_used_frames, 1);

    mm.sys_free(blocks[2]);
    mm.sys_free(blocks[0]);
    assert_eq!(mm.stats().kernel_used_frames, 1);
    assert_eq!(machine.kernel_arena(arena).count, 2);

    mm.sys_free(blocks[1]);
    let stats = mm.stats();
    assert_eq!(stats.kernel_used_frames, 0);
    assert_eq!(stats.kernel_reserved_pages, 0);
    assert_eq!(stats.kernel_free_blocks, 0);
    assert_eq!(mm.translate(arena), None);

    // A fresh arena starts over at the same spot.
    assert_eq!(mm.sys_malloc(700), Some(blocks[0]));
}

#[test]
fn classes_keep_separate_arenas() {
    let machine = TestMachine::with_pool_frames(16, 16);
    let mm = machine.boot();

    let tiny = mm.sys_malloc(1).expect("tiny");
    let medium = mm.sys_malloc(200).expect("medium");
    assert_ne!(arena_of(tiny), arena_of(medium));
    assert_eq!(machine.kernel_arena(arena_of(tiny)).class, Some(0));
    assert_eq!(machine.kernel_arena(arena_of(medium)).class, Some(4));
    assert_eq!(mm.stats().kernel_free_blocks, 254 + 14);
}

#[test]
fn rejects_empty_and_oversized_requests() {
    let machine = TestMachine::with_pool_frames(16, 16);
    let mm = machine.boot();
    assert_eq!(mm.sys_malloc(0), None);
    assert_eq!(mm.sys_malloc(mm.layout().kernel_pool_size()), None);
    assert_eq!(mm.stats().kernel_used_frames, 0);
}

#[test]
fn exhaustion_yields_none() {
    let machine = TestMachine::with_pool_frames(2, 2);
    let mm = machine.boot();
    let big = mm.sys_malloc(5000).expect("two pages");
    assert_eq!(mm.sys_malloc(16), None);
    assert_eq!(mm.sys_malloc(5000), None);

    mm.sys_free(big);
    assert!(mm.sys_malloc(16).is_some());
}

#[test]
fn arena_split_runs_with_interrupts_disabled() {
    let machine = TestMachine::with_pool_frames(16, 16);
    let mm = machine.boot();

    mm.sys_malloc(16).expect("new arena");
    assert_eq!(machine.irq.disable_count(), 1);
    assert!(machine.irq.enabled());

    // Served from the existing arena, no split.
    mm.sys_malloc(16).expect("same arena");
    assert_eq!(machine.irq.disable_count(), 1);
}

#[test]
fn arena_blocks_are_linked_with_interrupts_disabled() {
    let machine = TestMachine::with_pool_frames(16, 16);
    let masked = Arc::new(AtomicUsize::new(0));
    {
        let irq = Arc::clone(&machine.irq);
        let masked = Arc::clone(&masked);
        machine.ram.watch(move |_| {
            if !irq.enabled() {
                masked.fetch_add(1, Ordering::SeqCst);
            }
        });
    }
    let mm = machine.boot();
    assert_eq!(masked.load(Ordering::SeqCst), 0);

    // 255 blocks of 16 bytes, each linked by at least one store.
    mm.sys_malloc(16).expect("new arena");
    let during_split = masked.load(Ordering::SeqCst);
    assert!(during_split >= 255, "only {during_split} accesses ran masked");

    mm.sys_malloc(16).expect("same arena");
    mm.sys_malloc(2000).expect("large arena");
    assert_eq!(masked.load(Ordering::SeqCst), during_split);
}

#[test]
fn arena_split_keeps_interrupts_disabled_if_they_were() {
    let machine = TestMachine::with_pool_frames(16, 16);
    let mm = machine.boot();
    machine.irq.set_enabled(false);

    mm.sys_malloc(32).expect("new arena");
    assert_eq!(machine.irq.disable_count(), 0);
    assert!(!machine.irq.enabled());
}

#[test]
fn user_tasks_have_their_own_heap() {
    let machine = TestMachine::with_pool_frames(16, 16);
    let mm = machine.boot();
    enter_new_task(&mm);
    let kernel_before = mm.stats().kernel_used_frames;

    let p = mm.sys_malloc(100).expect("user block");
    assert_eq!(p, USER_VADDR_START + ARENA_HEADER_SIZE);
    with_current(|space| {
        let header = ArenaHeader::load(&machine.user_view(space), arena_of(p));
        assert_eq!(header, ArenaHeader::small(3, 30));
        assert_eq!(space.classes().free_blocks(), 30);
    });
    let stats = mm.stats();
    assert_eq!(stats.user_used_frames, 1);
    assert_eq!(stats.kernel_free_blocks, 0);
    // plus the page table of the first user slot
    assert_eq!(stats.kernel_used_frames, kernel_before + 1);

    mm.sys_free(p);
    assert_eq!(mm.stats().user_used_frames, 0);
    with_current(|space| assert_eq!(space.classes().free_blocks(), 0));
}

#[test]
fn user_large_allocations_stay_below_the_kernel() {
    let machine = TestMachine::with_pool_frames(16, 16);
    let mm = machine.boot();
    enter_new_task(&mm);

    let p = mm.sys_malloc(3 * PAGE_SIZE).expect("large user block");
    assert!(p < VirtualAddress::new(0xC000_0000));
    assert_eq!(mm.stats().user_used_frames, 4);
    mm.sys_free(p);
    assert_eq!(mm.stats().user_used_frames, 0);
}

#[test]
#[should_panic(expected = "double free")]
fn double_free_is_detected() {
    let machine = TestMachine::with_pool_frames(16, 16);
    let mm = machine.boot();
    let x = mm.sys_malloc(1000).expect("x");
    let _y = mm.sys_malloc(1000).expect("y");
    mm.sys_free(x);
    mm.sys_free(x);
}

#[test]
#[should_panic(expected = "already entirely free")]
fn count_beyond_capacity_is_detected() {
    let machine = TestMachine::with_pool_frames(16, 16);
    let mm = machine.boot();
    let x = mm.sys_malloc(1000).expect("x");
    let count = machine.kernel_phys(arena_of(x) + 4);
    machine.ram.write_u32(count, 3);
    mm.sys_free(x);
}

#[test]
#[should_panic(expected = "impossible large flag")]
fn corrupt_large_flag_is_detected() {
    let machine = TestMachine::with_pool_frames(16, 16);
    let mm = machine.boot();
    let x = mm.sys_malloc(64).expect("x");
    let flag = machine.kernel_phys(arena_of(x) + 8);
    machine.ram.write_u32(flag, 7);
    mm.sys_free(x);
}

#[test]
#[should_panic(expected = "null pointer")]
fn freeing_null_is_fatal() {
    let machine = TestMachine::with_pool_frames(16, 16);
    let mm = machine.boot();
    mm.sys_free(VirtualAddress::new(0));
}

#[test]
#[should_panic(expected = "below the kernel heap")]
fn kernel_free_below_the_heap_is_fatal() {
    let machine = TestMachine::with_pool_frames(16, 16);
    let mm = machine.boot();
    mm.sys_free(VirtualAddress::new(0xC000_1000));
}
