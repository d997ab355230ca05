mod common;

use common::{TestMachine, enter, leave, tracker_storage, with_current};
use kernel_alloc::Pool;
use kernel_hosted::capture_logs;
use kernel_info::memory::{KERNEL_HEAP_START, KERNEL_PDE_FIRST, SELF_REF_PDE, USER_VADDR_START};
use kernel_memory_addresses::{PhysicalAddress, VirtualAddress};
use kernel_vmem::AddressSpace;
use kernel_vmem::recursive::{DIRECTORY_WINDOW, pde_address, pte_address};

const fn va(addr: u32) -> VirtualAddress {
    VirtualAddress::new(addr)
}

#[test]
fn directory_shares_the_kernel_half() {
    let machine = TestMachine::with_pool_frames(16, 16);
    let mm = machine.boot();
    let space = mm.create_user_space(tracker_storage()).expect("user space");

    assert_eq!(space.directory(), KERNEL_HEAP_START);
    assert_eq!(
        mm.translate(space.directory()),
        Some(space.root().base()),
        "directory page is reachable from the kernel"
    );

    let kernel = machine.kernel_space();
    let user = AddressSpace::from_root(&machine.ram, space.root());
    for slot in 0..KERNEL_PDE_FIRST {
        assert!(!user.directory_entry(va(slot << 22)).is_present(), "slot {slot}");
    }
    for slot in KERNEL_PDE_FIRST..SELF_REF_PDE {
        let at = va(slot << 22);
        assert_eq!(user.directory_entry(at), kernel.directory_entry(at), "slot {slot}");
    }
    assert_eq!(
        user.directory_entry(va(SELF_REF_PDE << 22)).next_table(),
        Some(space.root())
    );
}

#[test]
fn self_referential_addresses_reach_the_task_tables() {
    let machine = TestMachine::with_pool_frames(16, 16);
    let mm = machine.boot();
    let space = mm.create_user_space(tracker_storage()).expect("user space");
    let root = space.root().base();
    enter(space);

    let page = mm.alloc_user_pages(1).expect("user page");
    let user = with_current(|space| AddressSpace::from_root(&machine.ram, space.root()));

    assert_eq!(mm.translate(va(DIRECTORY_WINDOW)), Some(root));
    assert_eq!(mm.translate(pde_address(page)), Some(root + (page.as_u32() >> 22) * 4));
    assert_eq!(mm.translate(pte_address(page)), user.table_entry_phys(page));
}

#[test]
fn tasks_are_isolated() {
    let machine = TestMachine::with_pool_frames(16, 16);
    let mm = machine.boot();

    let mut pages = Vec::new();
    for _ in 0..2 {
        enter(mm.create_user_space(tracker_storage()).expect("user space"));
        let page = mm.alloc_user_pages(1).expect("user page");
        assert_eq!(page, USER_VADDR_START);
        pages.push(mm.translate(page).expect("mapped"));
        mm.destroy_user_space(leave());
    }
    // The second task reused the frame the first one gave back.
    assert_eq!(pages[0], pages[1]);

    let a = mm.create_user_space(tracker_storage()).expect("a");
    let b = mm.create_user_space(tracker_storage()).expect("b");
    assert_ne!(a.root(), b.root());
    enter(a);
    let pa = mm.translate(mm.alloc_user_pages(1).expect("a page")).expect("mapped");
    let a = leave();
    enter(b);
    let pb = mm.translate(mm.alloc_user_pages(1).expect("b page")).expect("mapped");
    assert_ne!(pa, pb);
    mm.destroy_user_space(leave());
    mm.destroy_user_space(a);
}

#[test]
fn destroy_returns_every_frame() {
    let sink = capture_logs();
    let machine = TestMachine::with_pool_frames(32, 32);
    let mm = machine.boot();
    let before = mm.stats();

    enter(mm.create_user_space(tracker_storage()).expect("user space"));
    mm.alloc_user_pages(3).expect("user pages");
    mm.back_existing_address(Pool::User, va(0x4000_0000)).expect("far page");
    mm.sys_malloc(100).expect("small block");
    mm.sys_malloc(6000).expect("large block");
    let during = mm.stats();
    // directory plus two page tables
    assert_eq!(during.kernel_used_frames, 3);
    assert_eq!(during.user_used_frames, 3 + 1 + 1 + 2);

    let space = leave();
    let root = space.root();
    mm.destroy_user_space(space);
    assert_eq!(mm.stats(), before);
    assert!(sink.contains(&format!("user space {root} destroyed: 7 frames, 2 tables")));
}

#[test]
fn user_pages_can_be_freed_individually() {
    let machine = TestMachine::with_pool_frames(16, 16);
    let mm = machine.boot();
    enter(mm.create_user_space(tracker_storage()).expect("user space"));

    let start = mm.alloc_user_pages(4).expect("user pages");
    mm.free_pages(Pool::User, start, 4);
    assert_eq!(mm.stats().user_used_frames, 0);
    with_current(|space| assert_eq!(space.tracker().reserved_pages(), 0));
    assert_eq!(mm.alloc_user_pages(1), Ok(start));
}

#[test]
fn create_fails_without_kernel_pages() {
    let machine = TestMachine::with_pool_frames(1, 1);
    let mm = machine.boot();
    let _only = mm.alloc_kernel_pages(1).expect("only kernel page");
    assert!(mm.create_user_space(tracker_storage()).is_err());
}

#[test]
#[should_panic(expected = "user tracker needs")]
fn create_checks_the_tracker_storage() {
    let machine = TestMachine::with_pool_frames(16, 16);
    let mm = machine.boot();
    let mut storage = [0_u8; 16];
    let _ = mm.create_user_space(&mut storage);
}

#[test]
fn kernel_pages_stay_visible_inside_a_task() {
    let machine = TestMachine::with_pool_frames(16, 16);
    let mm = machine.boot();
    let shared = mm.alloc_kernel_pages(1).expect("kernel page");
    let pa: PhysicalAddress = mm.translate(shared).expect("mapped");

    enter(mm.create_user_space(tracker_storage()).expect("user space"));
    assert_eq!(mm.translate(shared), Some(pa));
    // Kernel allocations made inside a task land in the shared tables.
    let late = mm.alloc_kernel_pages(1).expect("kernel page");
    let late_pa = mm.translate(late).expect("mapped");
    leave();
    assert_eq!(mm.translate(late), Some(late_pa));
}
