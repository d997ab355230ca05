use core::fmt;
use core::hash::Hash;

mod sealed {
    pub trait Sealed {}
}

/// Marker for the two granularities of 32-bit paging.
pub trait PageSize:
    sealed::Sealed + Copy + Eq + Ord + Hash + fmt::Display + fmt::Debug
{
    /// Bytes per page (a power of two).
    const SIZE: u32;
    /// `log2(SIZE)`: bits of a virtual address below the page number.
    const SHIFT: u32;
    /// Short name used in formatting, e.g. `4K`.
    const NAME: &'static str;

    /// Mask selecting the offset bits.
    const MASK: u32 = Self::SIZE - 1;
}

macro_rules! page_size {
    ($(#[$doc:meta])* $name:ident, $shift:literal, $label:literal) => {
        $(#[$doc])*
        #[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
        pub struct $name;

        impl sealed::Sealed for $name {}

        impl PageSize for $name {
            const SIZE: u32 = 1 << $shift;
            const SHIFT: u32 = $shift;
            const NAME: &'static str = $label;
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(Self::NAME)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(Self::NAME)
            }
        }
    };
}

page_size!(
    /// A 4 KiB page: what a page-table entry maps and the allocators hand out.
    Size4K, 12, "4K"
);

page_size!(
    /// The 4 MiB span governed by one page-directory entry.
    ///
    /// The mapper never installs 4 MiB leaves; the size exists to name the
    /// directory slot of an address.
    Size4M, 22, "4M"
);

const _: () = {
    assert!(Size4K::SIZE == 4096);
    assert!(Size4M::SIZE == Size4K::SIZE * 1024);
};
