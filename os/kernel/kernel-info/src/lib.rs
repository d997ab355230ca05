//! # Kernel Memory Configuration and Boot Interface
//!
//! This crate defines the memory layout constants and the boot handoff that
//! govern the kernel's memory subsystem. It is the single source for
//! addresses that the loader, the page-table code and the allocators must agree
//! on.
//!
//! ## Architecture
//!
//! ### Boot Information ([`boot`])
//! The loader probes the installed RAM and leaves its size at physical `0xB00`.
//! [`BootInfo`](boot::BootInfo) is the typed view of that record.
//!
//! ### Memory Layout ([`memory`])
//! Compile-time constants of the 32-bit address space:
//!
//! ```text
//! Virtual Address Space Layout (32-bit):
//!
//! 0x0000_0000 ┌─────────────────────────────────┐
//!             │          (unmapped)             │
//! 0x0804_8000 ├─────────────────────────────────┤ USER_VADDR_START
//!             │   User heap (per-task tracker)  │
//!             │                                 │
//! 0xBFFF_F000 ├─────────────────────────────────┤ initial user stack page
//! 0xC000_0000 ├─────────────────────────────────┤ KERNEL_VIRT_BASE / USER_STACK_TOP
//!             │  Low 1 MiB (kernel image, BIOS) │
//! 0xC010_0000 ├─────────────────────────────────┤ KERNEL_HEAP_START
//!             │         Kernel heap             │
//! 0xFFC0_0000 ├─────────────────────────────────┤ self-referential window
//!             │   Page tables (PDE 1023 → PD)   │
//! 0xFFFF_F000 ├─────────────────────────────────┤ the page directory itself
//! 0xFFFF_FFFF └─────────────────────────────────┘
//! ```
//!
//! ### Runtime Layout ([`layout`])
//! Pool boundaries and tracker capacities derived from the RAM size, see
//! [`MemoryLayout`](layout::MemoryLayout).
//!
//! ```rust
//! use kernel_info::boot::BootInfo;
//! use kernel_info::layout::MemoryLayout;
//!
//! let layout = MemoryLayout::from_boot_info(&BootInfo::new(32 * 1024 * 1024)).unwrap();
//! assert_eq!(layout.kernel_pool_start.as_u32(), 0x0020_0000);
//! assert_eq!(layout.kernel_pool_frames + layout.user_pool_frames, 7680);
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]
#![deny(unsafe_code)]

pub mod boot;
pub mod layout;
pub mod memory;
