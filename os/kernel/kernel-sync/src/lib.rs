//! # Kernel synchronization primitives
//!
//! * [`SpinMutex`]: the coarse lock guarding one physical frame pool.
//! * [`SpinLock`]: a plain test-and-test-and-set lock for short sections.
//! * [`IrqGuard`] / [`InterruptControl`]: save, disable and restore the
//!   interrupt flag around a section.
//! * [`SyncOnceCell`]: set-once storage for global singletons such as the logger.
//!
//! None of the locks suspend; a contended acquire spins.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

pub mod irq;
mod mutex;
mod raw_spin;
mod spin_lock;
mod sync_once_cell;

pub use irq::{InterruptControl, IrqGuard};
pub use mutex::{Mutex, MutexGuard};
pub use raw_spin::RawSpin;
pub use spin_lock::{SpinLock, SpinLockGuard};
pub use sync_once_cell::SyncOnceCell;

pub type SpinMutex<T> = Mutex<T, RawSpin>;

impl<T> SpinMutex<T> {
    pub const fn new(value: T) -> Self {
        Self::from_raw(RawSpin::new(), value)
    }
}

impl<T: Default> Default for SpinMutex<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

pub trait RawLock {
    fn raw_lock(&self);
    fn raw_try_lock(&self) -> bool;
    fn raw_is_locked(&self) -> bool;
}

pub trait RawUnlock {
    /// # Safety
    /// The caller must currently hold the lock.
    unsafe fn raw_unlock(&self);
}
