use crate::SimulatedRam;
use kernel_info::boot::BootInfo;
use kernel_info::layout::MemoryLayout;
use kernel_info::memory::{
    KERNEL_PDE_FIRST, LOW_MEMORY_END, PAGE_DIRECTORY_PHYS, PAGE_SIZE, SELF_REF_PDE,
};
use kernel_memory_addresses::{PhysicalAddress, PhysicalPage, Size4K};
use kernel_vmem::recursive::install_self_reference;
use kernel_vmem::{L1Index, L2Index, PageDirectory, PageEntryBits, PageTable, PdEntry, PhysMapper, PtEntry};

/// Frame of the bootstrap table serving directory slot `slot` (768..=1022).
///
/// Slots 0 and 768 share the first table behind the directory.
#[must_use]
pub const fn kernel_table_frame(slot: u32) -> PhysicalPage<Size4K> {
    debug_assert!(slot >= KERNEL_PDE_FIRST && slot < SELF_REF_PDE);
    let index = slot - KERNEL_PDE_FIRST;
    PhysicalPage::from_addr(PhysicalAddress::new(
        PAGE_DIRECTORY_PHYS.as_u32() + (1 + index) * PAGE_SIZE,
    ))
}

/// RAM in the state the loader hands over to the kernel:
///
/// * total RAM size stored at `0xB00`,
/// * page directory at `0x10_0000`, its last slot pointing at itself,
/// * the first table (slots 0 and 768) identity-mapping the low 1 MiB,
/// * empty tables for slots 769..=1022 directly behind it,
/// * everything else filled with garbage.
#[must_use]
pub fn boot_image(layout: &MemoryLayout) -> SimulatedRam {
    let ram = SimulatedRam::new(layout.total_memory);
    ram.write_u32(BootInfo::LOCATION, layout.total_memory);

    let flags = PageEntryBits::new_user_rw();
    let root = PhysicalPage::from_addr(PAGE_DIRECTORY_PHYS);
    let dir = unsafe { ram.phys_to_mut::<PageDirectory>(root.base()) };
    dir.zero();

    for slot in KERNEL_PDE_FIRST..SELF_REF_PDE {
        let frame = kernel_table_frame(slot);
        unsafe { ram.phys_to_mut::<PageTable>(frame.base()) }.zero();
        dir.set(L2Index::new(slot as u16), PdEntry::make_next(frame, flags));
    }

    let low = kernel_table_frame(KERNEL_PDE_FIRST);
    dir.set(L2Index::new(0), PdEntry::make_next(low, flags));
    let table = unsafe { ram.phys_to_mut::<PageTable>(low.base()) };
    for i in 0..LOW_MEMORY_END / PAGE_SIZE {
        let frame = PhysicalPage::from_addr(PhysicalAddress::new(i * PAGE_SIZE));
        table.set(L1Index::new(i as u16), PtEntry::make_4k(frame, flags));
    }

    install_self_reference(dir, root);
    ram
}

#[cfg(test)]
mod tests {
    use super::*;
    use kernel_memory_addresses::VirtualAddress;
    use kernel_vmem::AddressSpace;
    use kernel_vmem::recursive::pde_address;

    #[test]
    fn loader_state() {
        let layout = MemoryLayout::with_pool_frames(4, 4).unwrap();
        let ram = boot_image(&layout);
        assert_eq!(ram.read_u32(PhysicalAddress::new(0xB00)), layout.total_memory);

        let aspace = AddressSpace::from_root(&ram, PhysicalPage::from_addr(PAGE_DIRECTORY_PHYS));
        // kernel image alias: 0xC000_0000 + x and x both reach physical x
        assert_eq!(
            aspace.translate(VirtualAddress::new(0xC000_0B00)),
            Some(PhysicalAddress::new(0xB00))
        );
        assert_eq!(
            aspace.translate(VirtualAddress::new(0x0009_A000)),
            Some(PhysicalAddress::new(0x0009_A000))
        );
        // heap window is unmapped but its table exists
        assert_eq!(aspace.translate(VirtualAddress::new(0xC010_0000)), None);
        assert!(aspace.table_entry(VirtualAddress::new(0xFF80_0000)).is_some());
        assert_eq!(kernel_table_frame(1022).base().as_u32(), 0x001F_F000);
        // the directory is visible through its own slot
        assert_eq!(
            aspace.translate(pde_address(VirtualAddress::new(0xC010_0000))),
            Some(PhysicalAddress::new(0x0010_0000 + 768 * 4))
        );
    }
}
