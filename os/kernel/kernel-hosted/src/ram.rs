use core::cell::UnsafeCell;
use kernel_memory_addresses::{PhysicalAddress, PhysicalPage, Size4K};
use kernel_vmem::PhysMapper;
use std::sync::OnceLock;

type Watcher = Box<dyn Fn(PhysicalAddress) + Send + Sync>;

#[repr(C, align(4096))]
struct Frame(UnsafeCell<[u8; 4096]>);

/// Physical memory of the simulated machine.
///
/// Physical address `pa` is byte `pa` of one contiguous, 4 KiB-aligned
/// buffer. Accessing past the end panics.
pub struct SimulatedRam {
    frames: Box<[Frame]>,
    watcher: OnceLock<Watcher>,
}

// Safety: callers of `phys_to_mut` promise exclusive access to the bytes they
// borrow; the memory manager serializes those accesses with its own locks.
unsafe impl Sync for SimulatedRam {}
unsafe impl Send for SimulatedRam {}

impl SimulatedRam {
    /// RAM of `bytes` bytes (rounded up to whole frames), filled with `0xCC`
    /// so that missing zero-fills show up.
    #[must_use]
    pub fn new(bytes: u32) -> Self {
        let frames = (bytes as usize).div_ceil(4096);
        Self {
            frames: (0..frames)
                .map(|_| Frame(UnsafeCell::new([0xCC; 4096])))
                .collect(),
            watcher: OnceLock::new(),
        }
    }

    #[must_use]
    pub fn size(&self) -> usize {
        self.frames.len() * 4096
    }

    fn base(&self) -> *mut u8 {
        self.frames.as_ptr().cast::<u8>().cast_mut()
    }

    fn check(&self, pa: PhysicalAddress, len: usize) {
        let end = pa.as_usize().checked_add(len);
        assert!(
            end.is_some_and(|end| end <= self.size()),
            "{pa:?}+{len:#x} outside simulated RAM of {:#x} bytes",
            self.size()
        );
    }

    /// Call `f` on every access made through [`PhysMapper`].
    ///
    /// # Panics
    /// If a watcher is already installed.
    pub fn watch(&self, f: impl Fn(PhysicalAddress) + Send + Sync + 'static) {
        assert!(self.watcher.set(Box::new(f)).is_ok(), "RAM is already watched");
    }

    fn accessed(&self, pa: PhysicalAddress) {
        if let Some(watcher) = self.watcher.get() {
            watcher(pa);
        }
    }

    /// Copy of the bytes at `pa`.
    #[must_use]
    pub fn read_bytes(&self, pa: PhysicalAddress, len: usize) -> Vec<u8> {
        self.check(pa, len);
        unsafe { core::slice::from_raw_parts(self.base().add(pa.as_usize()), len) }.to_vec()
    }

    #[must_use]
    pub fn read_u32(&self, pa: PhysicalAddress) -> u32 {
        let b = self.read_bytes(pa, 4);
        u32::from_le_bytes([b[0], b[1], b[2], b[3]])
    }

    pub fn write_u32(&self, pa: PhysicalAddress, value: u32) {
        self.write_bytes(pa, &value.to_le_bytes());
    }

    pub fn write_bytes(&self, pa: PhysicalAddress, bytes: &[u8]) {
        self.check(pa, bytes.len());
        unsafe {
            core::ptr::copy_nonoverlapping(bytes.as_ptr(), self.base().add(pa.as_usize()), bytes.len());
        }
    }

    /// `true` if every byte of the frame is zero.
    #[must_use]
    pub fn frame_is_zero(&self, page: PhysicalPage<Size4K>) -> bool {
        self.read_bytes(page.base(), 4096).iter().all(|&b| b == 0)
    }
}

impl PhysMapper for SimulatedRam {
    unsafe fn phys_to_mut<'a, T>(&self, pa: PhysicalAddress) -> &'a mut T {
        self.check(pa, size_of::<T>());
        self.accessed(pa);
        let ptr = unsafe { self.base().add(pa.as_usize()) };
        debug_assert!(ptr.cast::<T>().is_aligned(), "misaligned access at {pa:?}");
        unsafe { &mut *ptr.cast::<T>() }
    }

    unsafe fn phys_bytes_mut<'a>(&self, pa: PhysicalAddress, len: usize) -> &'a mut [u8] {
        self.check(pa, len);
        self.accessed(pa);
        unsafe { core::slice::from_raw_parts_mut(self.base().add(pa.as_usize()), len) }
    }
}
