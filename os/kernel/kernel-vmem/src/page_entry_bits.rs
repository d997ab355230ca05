use kernel_memory_addresses::PhysicalAddress;
use bitfield_struct::bitfield;

/// A single 32-bit x86 paging entry in raw bitfield form.
///
/// Page directory entries (PDE) and page table entries (PTE) share this
/// layout. Fields like `dirty` and `global` only mean something in a PTE.
///
/// ### Bit layout
///
/// | Bits   | Name / Mnemonic | Meaning |
/// |--------|-----------------|---------|
/// | 0      | `P`             | Present |
/// | 1      | `RW`            | Writable |
/// | 2      | `US`            | User-mode accessible |
/// | 3      | `PWT`           | Write-through caching |
/// | 4      | `PCD`           | Cache disable |
/// | 5      | `A`             | Accessed |
/// | 6      | `D`             | Dirty (PTE only) |
/// | 7      | `PS` / `PAT`    | 4 MiB page in a PDE (unused here), PAT in a PTE |
/// | 8      | `G`             | Global (PTE only) |
/// | 9–11   | AVL             | Free for OS use |
/// | 12–31  | frame           | Physical frame bits [31:12] |
///
/// ### Example
/// ```rust
/// # use kernel_memory_addresses::PhysicalAddress;
/// # use kernel_vmem::PageEntryBits;
/// let mut e = PageEntryBits::new_user_rw();
/// e.set_physical_address(PhysicalAddress::new(0x0020_3000));
/// assert!(e.present());
/// assert_eq!(u32::from(e), 0x0020_3007);
/// ```
#[bitfield(u32)]
#[derive(PartialEq, Eq)]
pub struct PageEntryBits {
    /// Present (P, bit 0).
    pub present: bool,

    /// Writable (RW, bit 1).
    pub writable: bool,

    /// User/Supervisor (US, bit 2).
    pub user_access: bool,

    /// Page Write-Through (PWT, bit 3).
    pub write_through: bool,

    /// Page Cache Disable (PCD, bit 4).
    pub cache_disabled: bool,

    /// Accessed (A, bit 5). Set by the CPU.
    pub accessed: bool,

    /// Dirty (D, bit 6), set by the CPU on the first write through a PTE.
    pub dirty: bool,

    /// Page Size in a PDE, PAT in a PTE (bit 7). Always clear in this kernel.
    pub large_page: bool,

    /// Global (G, bit 8).
    pub global: bool,

    /// OS-available (bits 9..=11).
    #[bits(3)]
    pub os_available: u8,

    /// Physical frame bits [31:12].
    #[bits(20)]
    frame_bits_31_12: u32,
}

impl PageEntryBits {
    /// Mask of every attribute bit below the frame address.
    pub const ATTRIBUTE_MASK: u32 = 0xFFF;

    #[inline]
    pub const fn set_physical_address(&mut self, phys: PhysicalAddress) {
        self.set_frame_bits_31_12(phys.as_u32() >> 12);
    }

    #[inline]
    #[must_use]
    pub const fn with_physical_address(mut self, phys: PhysicalAddress) -> Self {
        self.set_physical_address(phys);
        self
    }

    /// The frame address; attribute bits masked off.
    #[inline]
    #[must_use]
    pub const fn physical_address(&self) -> PhysicalAddress {
        PhysicalAddress::new(self.frame_bits_31_12() << 12)
    }

    /// Present, writable and reachable from ring 3.
    ///
    /// Every mapping the allocator installs, in the directory as well as in
    /// the tables, uses these attributes.
    #[inline]
    #[must_use]
    pub const fn new_user_rw() -> Self {
        Self::new()
            .with_present(true)
            .with_writable(true)
            .with_user_access(true)
    }
}
