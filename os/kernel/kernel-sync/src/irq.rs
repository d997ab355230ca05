//! Interrupt flag control.
//!
//! The allocator never touches `cli`/`sti` directly. It goes through an
//! [`InterruptControl`] so the same code runs on the CPU ([`Native`], x86 only)
//! and in a hosted model where the flag is a plain variable.

/// Query and change the interrupt-enable state of the executing CPU.
pub trait InterruptControl {
    /// `true` if maskable interrupts are currently delivered.
    fn enabled(&self) -> bool;

    /// Mask interrupts.
    fn disable(&self);

    /// Unmask interrupts.
    fn enable(&self);

    /// Disable interrupts and return a guard that restores the prior state.
    #[inline]
    fn guard(&self) -> IrqGuard<'_, Self>
    where
        Self: Sized,
    {
        IrqGuard::new(self)
    }
}

impl<I: InterruptControl> InterruptControl for &I {
    fn enabled(&self) -> bool {
        (**self).enabled()
    }

    fn disable(&self) {
        (**self).disable();
    }

    fn enable(&self) {
        (**self).enable();
    }
}

/// RAII guard that disables interrupts on creation and restores them on drop.
///
/// The guard snapshots the interrupt state. If interrupts were enabled it
/// disables them; on drop it re-enables them **only** if they were enabled
/// before, so nested guards compose.
///
/// ```
/// use core::cell::Cell;
/// use kernel_sync::{InterruptControl, IrqGuard};
///
/// struct Flag(Cell<bool>);
/// impl InterruptControl for Flag {
///     fn enabled(&self) -> bool { self.0.get() }
///     fn disable(&self) { self.0.set(false) }
///     fn enable(&self) { self.0.set(true) }
/// }
///
/// let cpu = Flag(Cell::new(true));
/// {
///     let _g = IrqGuard::new(&cpu);
///     assert!(!cpu.enabled());
/// }
/// assert!(cpu.enabled());
/// ```
pub struct IrqGuard<'a, I: InterruptControl> {
    irq: &'a I,
    /// Whether interrupts were enabled when the guard was created.
    were_enabled: bool,
}

impl<'a, I: InterruptControl> IrqGuard<'a, I> {
    #[inline]
    #[must_use]
    pub fn new(irq: &'a I) -> Self {
        let were_enabled = irq.enabled();
        if were_enabled {
            irq.disable();
        }
        Self { irq, were_enabled }
    }

    /// The state that will be restored on drop.
    #[inline]
    #[must_use]
    pub const fn were_enabled(&self) -> bool {
        self.were_enabled
    }
}

impl<I: InterruptControl> Drop for IrqGuard<'_, I> {
    fn drop(&mut self) {
        if self.were_enabled {
            self.irq.enable();
        }
    }
}

/// The executing CPU's `IF` flag, driven by `cli`/`sti`.
///
/// # Safety & Privilege
///
/// Only usable at ring 0. Executing `cli`/`sti` in user mode faults.
#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
#[derive(Debug, Default, Copy, Clone)]
pub struct Native;

#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
impl Native {
    /// Bit 9 of `EFLAGS`/`RFLAGS`.
    const IF: usize = 1 << 9;

    #[inline]
    #[must_use]
    pub fn flags() -> usize {
        let r: usize;
        #[cfg(target_arch = "x86")]
        unsafe {
            core::arch::asm!("pushfd; pop {}", out(reg) r, options(preserves_flags));
        }
        #[cfg(target_arch = "x86_64")]
        unsafe {
            core::arch::asm!("pushfq; pop {}", out(reg) r, options(preserves_flags));
        }
        r
    }
}

#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
impl InterruptControl for Native {
    #[inline]
    fn enabled(&self) -> bool {
        Self::flags() & Self::IF != 0
    }

    #[inline]
    fn disable(&self) {
        unsafe { core::arch::asm!("cli", options(nomem, nostack)) }
    }

    #[inline]
    fn enable(&self) {
        unsafe { core::arch::asm!("sti", options(nomem, nostack)) }
    }
}
