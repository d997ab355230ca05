//! # Memory Layout

use kernel_memory_addresses::{PhysicalAddress, VirtualAddress};

/// Size of one page (and one frame) in bytes.
pub const PAGE_SIZE: u32 = 4096;

/// Number of entries in a page directory or page table.
pub const ENTRIES_PER_TABLE: u32 = 1024;

/// End of conventional low memory (BIOS, VGA, loader). Never handed out.
pub const LOW_MEMORY_END: u32 = 0x0010_0000; // 1 MiB

/// Physical frame holding the kernel page directory, set up by the loader.
pub const PAGE_DIRECTORY_PHYS: PhysicalAddress = PhysicalAddress::new(LOW_MEMORY_END);

/// Page tables the loader places directly behind the directory.
///
/// Directory entries 0 and 768 share the first table, entries 769..=1022
/// get one table each.
pub const BOOTSTRAP_TABLE_FRAMES: u32 = 255;

/// First physical byte past the directory and the bootstrap tables.
pub const RESERVED_PHYS_END: u32 = LOW_MEMORY_END + (1 + BOOTSTRAP_TABLE_FRAMES) * PAGE_SIZE;

/// Lowest physical address a free operation may ever return to a pool.
///
/// Everything below belongs to low memory, the page directory or the first
/// page table.
pub const MIN_FREEABLE_PHYS: u32 = 0x0010_2000;

/// Start of the kernel half of every address space.
pub const KERNEL_VIRT_BASE: u32 = 0xC000_0000;

/// First directory slot of the kernel half.
pub const KERNEL_PDE_FIRST: u32 = KERNEL_VIRT_BASE >> 22;

/// Directory slot that maps the directory onto itself.
pub const SELF_REF_PDE: u32 = ENTRIES_PER_TABLE - 1;

/// Base of the kernel heap window; low 1 MiB alias skipped.
pub const KERNEL_HEAP_START: VirtualAddress = VirtualAddress::new(KERNEL_VIRT_BASE + LOW_MEMORY_END);

/// End (exclusive) of the kernel heap window. The last 4 MiB belong to the
/// self-referential mapping.
pub const KERNEL_HEAP_END: u32 = SELF_REF_PDE << 22;

/// Lowest address a user task can reserve heap pages at.
pub const USER_VADDR_START: VirtualAddress = VirtualAddress::new(0x0804_8000);

/// Top of the user stack; the page right below is claimed at task creation.
pub const USER_STACK_TOP: u32 = KERNEL_VIRT_BASE;

/// Where the loader stores the probed RAM size (a `u32`, in bytes).
pub const TOTAL_MEMORY_PTR: PhysicalAddress = PhysicalAddress::new(0xB00);

/// Upper bound of pages a single page-level request may ask for.
pub const MAX_PAGES_PER_REQUEST: u32 = 3840;

const _: () = {
    assert!(PAGE_SIZE.is_power_of_two());
    assert!(RESERVED_PHYS_END == 0x0020_0000);
    assert!(MIN_FREEABLE_PHYS == LOW_MEMORY_END + 2 * PAGE_SIZE);
    assert!(KERNEL_PDE_FIRST == 768);
    assert!(KERNEL_PDE_FIRST + BOOTSTRAP_TABLE_FRAMES == SELF_REF_PDE);
    assert!(USER_VADDR_START.as_u32() < USER_STACK_TOP - PAGE_SIZE);
    assert!(KERNEL_HEAP_START.as_u32() < KERNEL_HEAP_END);
};
