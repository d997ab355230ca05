use core::fmt::{self, Write};

/// A byte-oriented, best-effort output channel.
pub trait DebugSink {
    fn write_bytes(&self, bytes: &[u8]);
}

impl<S: DebugSink + ?Sized> DebugSink for &S {
    fn write_bytes(&self, bytes: &[u8]) {
        (**self).write_bytes(bytes);
    }
}

/// `core::fmt::Write` adapter over a [`DebugSink`].
pub struct SinkWriter<S>(pub S);

impl<S: DebugSink> Write for SinkWriter<S> {
    #[inline]
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.0.write_bytes(s.as_bytes());
        Ok(())
    }
}

/// QEMU's debug console on I/O port `0x402`.
#[derive(Debug, Default, Copy, Clone)]
pub struct Debugcon;

impl Debugcon {
    /// The port number for QEMU's debug port.
    pub const PORT: u16 = 0x402;
}

#[cfg(all(feature = "enabled", any(target_arch = "x86", target_arch = "x86_64")))]
impl DebugSink for Debugcon {
    #[inline]
    fn write_bytes(&self, bytes: &[u8]) {
        for &b in bytes {
            unsafe {
                core::arch::asm!(
                    "out dx, al",
                    in("dx") Self::PORT,
                    in("al") b,
                    options(nomem, nostack, preserves_flags)
                );
            }
        }
    }
}

#[cfg(not(all(feature = "enabled", any(target_arch = "x86", target_arch = "x86_64"))))]
impl DebugSink for Debugcon {
    #[inline]
    fn write_bytes(&self, _bytes: &[u8]) {
        // no-op when the port is unavailable
    }
}
