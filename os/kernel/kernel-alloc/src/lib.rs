//! # Kernel Memory Allocation
//!
//! Physical frame pools, virtual address trackers, page-granular allocation
//! and the `sys_malloc`/`sys_free` heap of the kernel, built on the 32-bit
//! paging helpers of `kernel-vmem`.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                 Arena heap ([`heap`])               │
//! │    • Seven size classes, 16 to 1024 bytes           │
//! │    • Whole-page runs for larger requests            │
//! └─────────────────┬───────────────────────────────────┘
//!                   │ pages
//! ┌─────────────────▼───────────────────────────────────┐
//! │              Page allocation                        │
//! │    • Virtually contiguous, physically scattered     │
//! │    • All-or-nothing multi-page requests             │
//! └───────┬─────────────────┬─────────────────┬─────────┘
//!         │                 │                 │
//! ┌───────▼───────┐ ┌───────▼───────┐ ┌───────▼─────────┐
//! │ Frame pools   │ │ Virtual       │ │ Page tables     │
//! │ kernel + user │ │ trackers      │ │ (kernel-vmem)   │
//! └───────────────┘ └───────────────┘ └─────────────────┘
//! ```
//!
//! ## Core Components
//!
//! ### Frame Pools ([`frame_pool`])
//! Physical RAM above the bootstrap region is split in half. The lower half
//! feeds the kernel (including every page table), the upper half user tasks.
//! One bit per frame.
//!
//! ### Virtual Trackers ([`vspace`])
//! One bit per virtual page: one tracker for the kernel heap window at
//! `0xC010_0000`, one per user task starting at `0x0804_8000`.
//!
//! ### Heap ([`heap`])
//! Arena pages sliced into equal blocks; the free blocks of a class are
//! chained through links stored in the blocks themselves ([`free_list`]),
//! reached through a [`VirtualView`].
//!
//! ### Memory Manager ([`MemoryManager`])
//! The context object owning all of the above. It sits on a [`Platform`]
//! that supplies physical memory access, TLB invalidation, interrupt control
//! and the current task.
//!
//! ## Locking
//!
//! * One lock per physical pool. The kernel lock also covers the kernel
//!   tracker and the kernel size classes.
//! * User page tables come from the kernel pool, so user paths take the
//!   user lock, then the kernel lock. Kernel paths never take the user lock.
//! * Carving an arena into blocks runs with interrupts disabled under a
//!   dedicated split lock.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use kernel_alloc::{MemoryManager, Pool};
//!
//! let mm = unsafe { MemoryManager::init(platform) }?;
//! let pages = mm.alloc_kernel_pages(4)?;
//! let block = mm.sys_malloc(40).expect("heap");
//! mm.sys_free(block);
//! mm.free_pages(Pool::Kernel, pages, 4);
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]

mod error;
pub mod frame_pool;
pub mod free_list;
pub mod heap;
mod manager;
mod pages;
mod platform;
mod task;
pub mod view;
pub mod vspace;

pub use crate::error::AllocError;
pub use crate::frame_pool::FramePool;
pub use crate::free_list::{FreeList, LinkStore};
pub use crate::heap::SizeClasses;
pub use crate::manager::{MemoryManager, MemoryStats, Pool};
pub use crate::platform::Platform;
pub use crate::task::{CurrentTask, UserSpace};
pub use crate::view::VirtualView;
pub use crate::vspace::VirtualTracker;
