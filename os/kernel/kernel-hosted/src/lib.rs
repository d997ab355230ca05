//! # Hosted machine model
//!
//! Lets the memory manager run inside ordinary `cargo test` processes:
//!
//! * [`SimulatedRam`] stands in for physical memory and implements
//!   [`PhysMapper`](kernel_vmem::PhysMapper).
//! * [`SoftInterrupts`] is an interrupt flag that is just a variable, one per thread.
//! * [`RecordingTlb`] remembers every `invlpg`.
//! * [`boot_image`] lays RAM out the way the real loader leaves it.
//! * [`capture_logs`] installs a `log` backend writing into a buffer.

mod cpu;
mod loader;
mod logs;
mod ram;

pub use cpu::{RecordingTlb, SoftInterrupts};
pub use loader::{boot_image, kernel_table_frame};
pub use logs::{CaptureSink, capture_logs};
pub use ram::SimulatedRam;
