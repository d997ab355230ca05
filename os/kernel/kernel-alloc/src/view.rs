//! Byte access to memory by *virtual* address.
//!
//! The heap keeps its bookkeeping (arena headers, free-list links) inside the
//! pages it manages. A [`VirtualView`] resolves each access through the owning
//! [`AddressSpace`] and touches the frame through the [`PhysMapper`], the same
//! way the MMU would.

use crate::free_list::LinkStore;
use kernel_info::memory::PAGE_SIZE;
use kernel_memory_addresses::{PhysicalAddress, Size4K, VirtualAddress};
use kernel_vmem::{AddressSpace, PhysMapper};

pub struct VirtualView<'m, M: PhysMapper> {
    aspace: AddressSpace<'m, M>,
}

impl<'m, M: PhysMapper> VirtualView<'m, M> {
    #[inline]
    pub const fn new(aspace: AddressSpace<'m, M>) -> Self {
        Self { aspace }
    }

    #[inline]
    pub const fn address_space(&self) -> &AddressSpace<'m, M> {
        &self.aspace
    }

    /// Physical address of `va`, for an access of `len` bytes that stays
    /// within one page.
    ///
    /// # Panics
    /// If `va` is not mapped or the access crosses a page boundary.
    fn resolve(&self, va: VirtualAddress, len: u32) -> PhysicalAddress {
        assert!(
            va.offset::<Size4K>().as_u32() + len <= PAGE_SIZE,
            "{len}-byte access at {va} crosses a page"
        );
        let Some(pa) = self.aspace.translate(va) else {
            panic!("access to unmapped {va}");
        };
        pa
    }

    #[must_use]
    pub fn read_u32(&self, va: VirtualAddress) -> u32 {
        let pa = self.resolve(va, 4);
        let bytes = unsafe { self.aspace.mapper().phys_bytes_mut(pa, 4) };
        u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
    }

    pub fn write_u32(&self, va: VirtualAddress, value: u32) {
        let pa = self.resolve(va, 4);
        unsafe { self.aspace.mapper().phys_bytes_mut(pa, 4) }.copy_from_slice(&value.to_le_bytes());
    }

    /// Set `len` bytes from `va` on to `byte`, page by page.
    pub fn fill(&self, va: VirtualAddress, len: u32, byte: u8) {
        let mut at = va;
        let mut left = len;
        while left > 0 {
            let chunk = (PAGE_SIZE - at.offset::<Size4K>().as_u32()).min(left);
            let pa = self.resolve(at, chunk);
            unsafe { self.aspace.mapper().phys_bytes_mut(pa, chunk as usize) }.fill(byte);
            left -= chunk;
            if left > 0 {
                at += chunk;
            }
        }
    }
}

impl<M: PhysMapper> LinkStore for VirtualView<'_, M> {
    fn load_link(&self, at: VirtualAddress) -> u32 {
        self.read_u32(at)
    }

    fn store_link(&self, at: VirtualAddress, value: u32) {
        self.write_u32(at, value);
    }
}
