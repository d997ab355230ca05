use kernel_memory_addresses::VirtualAddress;
use kernel_sync::{InterruptControl, SpinMutex};
use kernel_vmem::TlbFlush;
use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

thread_local! {
    static FLAGS: RefCell<HashMap<usize, bool>> = RefCell::new(HashMap::new());
}

static NEXT_MACHINE: AtomicUsize = AtomicUsize::new(0);

/// An interrupt flag without a CPU behind it.
///
/// Every thread plays its own CPU and sees its own flag. A thread that has
/// not touched the flag yet starts in the state given to [`new`](Self::new).
#[derive(Debug)]
pub struct SoftInterrupts {
    machine: usize,
    initially_enabled: bool,
    disables: AtomicUsize,
}

impl SoftInterrupts {
    #[must_use]
    pub fn new(enabled: bool) -> Self {
        Self {
            machine: NEXT_MACHINE.fetch_add(1, Ordering::Relaxed),
            initially_enabled: enabled,
            disables: AtomicUsize::new(0),
        }
    }

    /// How often interrupts went from enabled to disabled, summed over all
    /// threads.
    #[must_use]
    pub fn disable_count(&self) -> usize {
        self.disables.load(Ordering::SeqCst)
    }

    /// Set the calling thread's flag.
    pub fn set_enabled(&self, enabled: bool) {
        FLAGS.with_borrow_mut(|flags| {
            flags.insert(self.machine, enabled);
        });
    }

    fn swap(&self, enabled: bool) -> bool {
        FLAGS.with_borrow_mut(|flags| {
            flags
                .insert(self.machine, enabled)
                .unwrap_or(self.initially_enabled)
        })
    }
}

impl Default for SoftInterrupts {
    fn default() -> Self {
        Self::new(true)
    }
}

impl InterruptControl for SoftInterrupts {
    fn enabled(&self) -> bool {
        FLAGS.with_borrow(|flags| {
            flags
                .get(&self.machine)
                .copied()
                .unwrap_or(self.initially_enabled)
        })
    }

    fn disable(&self) {
        if self.swap(false) {
            self.disables.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn enable(&self) {
        self.swap(true);
    }
}

/// A TLB that only remembers which pages were invalidated.
#[derive(Debug, Default)]
pub struct RecordingTlb {
    flushed: SpinMutex<Vec<VirtualAddress>>,
}

impl RecordingTlb {
    #[must_use]
    pub fn flushed(&self) -> Vec<VirtualAddress> {
        self.flushed.lock().clone()
    }

    pub fn clear(&self) {
        self.flushed.lock().clear();
    }
}

impl TlbFlush for RecordingTlb {
    fn flush_page(&self, va: VirtualAddress) {
        self.flushed.lock().push(va);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn each_thread_has_its_own_flag() {
        let irq = SoftInterrupts::default();
        irq.disable();
        assert!(!irq.enabled());

        thread::scope(|s| {
            s.spawn(|| {
                assert!(irq.enabled());
                irq.disable();
                irq.enable();
            });
        });

        assert!(!irq.enabled());
        assert_eq!(irq.disable_count(), 2);
    }

    #[test]
    fn machines_do_not_share_flags() {
        let a = SoftInterrupts::default();
        let b = SoftInterrupts::new(false);
        a.disable();
        assert!(!a.enabled());
        assert!(!b.enabled());
        b.enable();
        assert!(b.enabled());
        assert!(!a.enabled());
    }
}
