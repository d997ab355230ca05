//! # Bit-indexed capacity tracker
//!
//! A [`Bitmap`] tracks a fixed number of equally sized units (frames, virtual
//! pages) with one bit each: bit *i* set means unit *i* is taken. It does not
//! own its storage; the caller hands it a byte buffer at construction, which
//! lets the kernel place bitmaps in memory it carved out before any allocator
//! exists.
//!
//! Bits are numbered LSB-first within each byte.
//!
//! ```
//! use kernel_bitmap::Bitmap;
//!
//! let mut storage = [0xFFu8; 2];
//! let mut map = Bitmap::new(&mut storage, 12);
//! assert_eq!(map.count_set(), 0);
//!
//! let run = map.scan(3).unwrap();
//! map.set_range(run, 3);
//! assert_eq!(map.scan(1), Some(3));
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]

use core::fmt;

/// A view of `len` bits over a borrowed byte buffer.
pub struct Bitmap<'a> {
    bits: &'a mut [u8],
    len: usize,
}

impl<'a> Bitmap<'a> {
    /// Bytes needed to hold `bits` bits.
    #[inline]
    #[must_use]
    pub const fn bytes_for(bits: usize) -> usize {
        bits.div_ceil(8)
    }

    /// Take `storage`, clear it, and track `len` units in it.
    ///
    /// # Panics
    /// If `storage` is shorter than [`Bitmap::bytes_for(len)`](Bitmap::bytes_for).
    pub fn new(storage: &'a mut [u8], len: usize) -> Self {
        let bytes = Self::bytes_for(len);
        assert!(
            storage.len() >= bytes,
            "bitmap of {len} bits needs {bytes} bytes, got {}",
            storage.len()
        );
        let bits = &mut storage[..bytes];
        bits.fill(0);
        Self { bits, len }
    }

    /// Number of tracked units.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    const fn locate(index: usize) -> (usize, u8) {
        (index / 8, 1 << (index % 8))
    }

    #[inline]
    fn check(&self, index: usize) {
        assert!(index < self.len, "bit {index} outside bitmap of {} bits", self.len);
    }

    /// `true` if unit `index` is taken.
    ///
    /// # Panics
    /// If `index` is out of range.
    #[inline]
    #[must_use]
    pub fn test(&self, index: usize) -> bool {
        self.check(index);
        let (byte, mask) = Self::locate(index);
        self.bits[byte] & mask != 0
    }

    /// Mark unit `index` taken.
    ///
    /// # Panics
    /// If `index` is out of range.
    #[inline]
    pub fn set(&mut self, index: usize) {
        self.check(index);
        let (byte, mask) = Self::locate(index);
        self.bits[byte] |= mask;
    }

    /// Mark unit `index` free.
    ///
    /// # Panics
    /// If `index` is out of range.
    #[inline]
    pub fn clear(&mut self, index: usize) {
        self.check(index);
        let (byte, mask) = Self::locate(index);
        self.bits[byte] &= !mask;
    }

    /// Set `count` bits starting at `start`.
    ///
    /// # Panics
    /// If the run leaves the bitmap.
    pub fn set_range(&mut self, start: usize, count: usize) {
        for i in start..start + count {
            self.set(i);
        }
    }

    /// Clear `count` bits starting at `start`.
    ///
    /// # Panics
    /// If the run leaves the bitmap.
    pub fn clear_range(&mut self, start: usize, count: usize) {
        for i in start..start + count {
            self.clear(i);
        }
    }

    /// Index of the first run of `count` clear bits, first fit.
    ///
    /// Returns `None` for `count == 0` or if no such run exists. Does not
    /// modify the bitmap.
    #[must_use]
    pub fn scan(&self, count: usize) -> Option<usize> {
        if count == 0 || count > self.len {
            return None;
        }

        let mut run_start = 0;
        let mut run_len = 0;
        let mut index = 0;
        while index < self.len {
            // Whole taken bytes cannot start or extend a run.
            if index % 8 == 0 && self.bits[index / 8] == 0xFF {
                run_len = 0;
                index += 8;
                continue;
            }

            if self.test(index) {
                run_len = 0;
            } else {
                if run_len == 0 {
                    run_start = index;
                }
                run_len += 1;
                if run_len == count {
                    return Some(run_start);
                }
            }
            index += 1;
        }
        None
    }

    /// Number of taken units.
    #[must_use]
    pub fn count_set(&self) -> usize {
        let full = self.len / 8;
        let mut n: usize = self.bits[..full]
            .iter()
            .map(|b| b.count_ones() as usize)
            .sum();
        for i in full * 8..self.len {
            n += usize::from(self.test(i));
        }
        n
    }

    /// Number of free units.
    #[must_use]
    pub fn count_clear(&self) -> usize {
        self.len - self.count_set()
    }

    /// Indices of all taken units.
    pub fn iter_set(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.len).filter(|&i| self.test(i))
    }
}

impl fmt::Debug for Bitmap<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bitmap")
            .field("len", &self.len)
            .field("set", &self.count_set())
            .finish()
    }
}
