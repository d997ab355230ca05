//! # QEMU Development and Debug Support
//!
//! Logging for a kernel running under QEMU. Output goes byte by byte to the
//! `debugcon` I/O port `0x402`, which QEMU forwards to the host:
//!
//! ```bash
//! qemu-system-i386 -kernel kernel.bin -debugcon stdio
//! ```
//!
//! ## Components
//!
//! * [`QemuLogger`]: a `log::Log` implementation formatting
//!   `[LEVEL] target: message` lines into any [`DebugSink`].
//! * [`Debugcon`]: the port `0x402` sink (a no-op with the `enabled` feature
//!   off or on non-x86 hosts).
//! * [`qemu_trace!`]: unformatted direct output that bypasses `log`.
//!
//! ```rust,no_run
//! use log::{LevelFilter, info};
//!
//! kernel_qemu::init_debugcon(LevelFilter::Debug).expect("logger initialization");
//! info!("memory subsystem up");
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

mod logger;
mod sink;

pub use logger::{QemuLogger, init_debugcon};
pub use sink::{DebugSink, Debugcon, SinkWriter};

#[doc(hidden)]
pub mod qemu_fmt {
    use crate::{Debugcon, SinkWriter};
    use core::fmt;

    #[doc(hidden)]
    #[inline]
    pub fn qemu_write(args: fmt::Arguments) {
        // Ignore errors; this is best-effort debug output.
        let _ = fmt::write(&mut SinkWriter(&Debugcon), args);
    }
}

#[macro_export]
macro_rules! qemu_trace {
    ($($arg:tt)*) => {{
        // No allocation: `format_args!` builds a lightweight `Arguments`.
        $crate::qemu_fmt::qemu_write(core::format_args!($($arg)*));
    }};
}
