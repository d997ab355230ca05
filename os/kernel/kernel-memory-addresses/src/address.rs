use crate::{PageOffset, PageSize};
use core::fmt;
use core::marker::PhantomData;
use core::ops::{Add, AddAssign};

/// Defines an address type and its page type for one address space kind.
///
/// Both wrap a plain `u32`; the page keeps its low `S::SHIFT` bits zero.
macro_rules! address_kind {
    (
        $(#[$addr_doc:meta])*
        address $addr:ident, tag $tag:literal;
        $(#[$page_doc:meta])*
        page $page:ident;
    ) => {
        $(#[$addr_doc])*
        #[repr(transparent)]
        #[derive(Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
        pub struct $addr(u32);

        impl $addr {
            #[inline]
            #[must_use]
            pub const fn new(value: u32) -> Self {
                Self(value)
            }

            #[inline]
            #[must_use]
            pub const fn zero() -> Self {
                Self(0)
            }

            #[inline]
            #[must_use]
            pub const fn as_u32(self) -> u32 {
                self.0
            }

            #[inline]
            #[must_use]
            pub const fn as_usize(self) -> usize {
                self.0 as usize
            }

            #[inline]
            #[must_use]
            pub const fn is_null(self) -> bool {
                self.0 == 0
            }

            /// The page of size `S` containing this address.
            #[inline]
            #[must_use]
            pub const fn page<S: PageSize>(self) -> $page<S> {
                $page::from_addr(self)
            }

            #[inline]
            #[must_use]
            pub const fn offset<S: PageSize>(self) -> PageOffset<S> {
                PageOffset::of(self.0)
            }

            #[inline]
            #[must_use]
            pub const fn split<S: PageSize>(self) -> ($page<S>, PageOffset<S>) {
                (self.page::<S>(), self.offset::<S>())
            }

            #[inline]
            #[must_use]
            pub const fn is_aligned<S: PageSize>(self) -> bool {
                self.0 & S::MASK == 0
            }

            /// `None` if the sum leaves the 32-bit space.
            #[inline]
            #[must_use]
            pub const fn checked_add(self, rhs: u32) -> Option<Self> {
                match self.0.checked_add(rhs) {
                    Some(v) => Some(Self(v)),
                    None => None,
                }
            }

            /// Bytes from `base` up to this address; `None` below `base`.
            #[inline]
            #[must_use]
            pub const fn checked_offset_from(self, base: Self) -> Option<u32> {
                self.0.checked_sub(base.0)
            }
        }

        impl fmt::Debug for $addr {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($tag, "(0x{:08X})"), self.0)
            }
        }

        impl fmt::Display for $addr {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "0x{:08X}", self.0)
            }
        }

        impl From<u32> for $addr {
            #[inline]
            fn from(value: u32) -> Self {
                Self(value)
            }
        }

        impl Add<u32> for $addr {
            type Output = Self;

            #[inline]
            fn add(self, rhs: u32) -> Self {
                Self(self.0 + rhs)
            }
        }

        impl AddAssign<u32> for $addr {
            #[inline]
            fn add_assign(&mut self, rhs: u32) {
                self.0 += rhs;
            }
        }

        $(#[$page_doc])*
        #[repr(transparent)]
        #[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
        pub struct $page<S: PageSize> {
            base: u32,
            _size: PhantomData<S>,
        }

        impl<S: PageSize> $page<S> {
            /// The page containing `addr` (aligns down).
            #[inline]
            #[must_use]
            pub const fn from_addr(addr: $addr) -> Self {
                Self {
                    base: addr.0 & !S::MASK,
                    _size: PhantomData,
                }
            }

            #[inline]
            #[must_use]
            pub const fn base(self) -> $addr {
                $addr(self.base)
            }

            /// The address `off` bytes into this page.
            #[inline]
            #[must_use]
            pub const fn join(self, off: PageOffset<S>) -> $addr {
                $addr(self.base | off.as_u32())
            }

            /// `base >> S::SHIFT`.
            #[inline]
            #[must_use]
            pub const fn number(self) -> u32 {
                self.base >> S::SHIFT
            }
        }

        impl<S: PageSize> fmt::Display for $page<S> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "0x{:08X}/{}", self.base, S::NAME)
            }
        }

        impl<S: PageSize> fmt::Debug for $page<S> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($page), "<{}>(0x{:08X})"), S::NAME, self.base)
            }
        }

        /// Only page-aligned addresses convert.
        impl<S: PageSize> TryFrom<$addr> for $page<S> {
            type Error = $addr;

            #[inline]
            fn try_from(addr: $addr) -> Result<Self, $addr> {
                if addr.is_aligned::<S>() {
                    Ok(Self::from_addr(addr))
                } else {
                    Err(addr)
                }
            }
        }

        impl<S: PageSize> From<$page<S>> for $addr {
            #[inline]
            fn from(page: $page<S>) -> Self {
                page.base()
            }
        }
    };
}

address_kind! {
    /// An address the CPU issues with paging enabled.
    ///
    /// ```rust
    /// # use kernel_memory_addresses::*;
    /// let va = VirtualAddress::new(0xC010_0234);
    /// let (page, off) = va.split::<Size4K>();
    /// assert_eq!(page.base().as_u32(), 0xC010_0000);
    /// assert_eq!(off.as_u32(), 0x234);
    /// assert_eq!(page.join(off), va);
    /// ```
    address VirtualAddress, tag "VA";
    /// Base of a virtual page of size `S`.
    page VirtualPage;
}

address_kind! {
    /// An address on the memory bus: RAM frames and page tables.
    address PhysicalAddress, tag "PA";
    /// Base of a physical frame of size `S`.
    page PhysicalPage;
}
