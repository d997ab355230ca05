use crate::PageSize;
use core::fmt;
use core::marker::PhantomData;

/// Byte offset inside a page of size `S`, always below `S::SIZE`.
#[repr(transparent)]
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct PageOffset<S: PageSize> {
    value: u32,
    _size: PhantomData<S>,
}

impl<S: PageSize> PageOffset<S> {
    /// The offset bits of `value`.
    #[inline]
    #[must_use]
    pub const fn of(value: u32) -> Self {
        Self {
            value: value & S::MASK,
            _size: PhantomData,
        }
    }

    #[inline]
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.value
    }
}

impl<S: PageSize> fmt::Debug for PageOffset<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "+{:#X}/{}", self.value, S::NAME)
    }
}
