//! # Boundary-Tag Heap Allocator with a Size-Keyed BST Free Index
//!
//! This crate implements the core of a general-purpose dynamic storage
//! allocator over a single, externally-grown, contiguous byte region. It
//! manages no memory of its own: a [`RegionProvider`] supplies the raw bytes
//! (and can only ever grow the region), and [`Heap`] layers an implicit
//! doubly-linked block structure with boundary tags on top of it.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │                        Heap<R>                             │
//! │   allocate / free / resize / check_heap                    │
//! └───────────────┬─────────────────────────────┬──────────────┘
//!                 │                             │
//! ┌───────────────▼──────────────┐ ┌────────────▼────────────┐
//! │   Free-index tree (tree)     │ │   Coalescer (coalesce)  │
//! │  in-place BST keyed by size  │ │  four-case boundary-tag │
//! │  insert / remove / ceiling   │ │  merge on neighbors     │
//! └───────────────┬──────────────┘ └────────────┬────────────┘
//!                 │                             │
//! ┌───────────────▼─────────────────────────────▼──────────────┐
//! │                Block primitives (block, tag, raw)           │
//! │   header/footer boundary tags, physical neighbor walks      │
//! └───────────────────────────────────────────────────────────┘
//! ```
//!
//! The tree's node storage is intrusive: a free block's own payload bytes
//! hold its `left`/`right` links for as long as the block stays free. This
//! keeps the allocator's metadata footprint at zero bytes outside the
//! managed region itself.
//!
//! ## Non-goals
//!
//! Thread safety of the core allocator, returning memory to the OS, best-fit
//! across arenas or size classes, debugging instrumentation beyond
//! [`Heap::check_heap`], security hardening beyond what falls out naturally,
//! and fragmentation statistics reporting are all explicitly out of scope.
//! Callers that need synchronized access across cores can wrap a `Heap<R>`
//! in [`kernel_sync::SpinLock`] (see the `global-allocator` feature).
//!
//! ## Usage
//!
//! ```
//! use alloc_core::{Heap, RegionProvider, RegionError, Offset};
//! use core::ptr::NonNull;
//!
//! struct ArenaRegion {
//!     storage: Box<[u8]>,
//!     brk: u32,
//! }
//!
//! impl RegionProvider for ArenaRegion {
//!     fn init(&mut self) -> Result<Offset, RegionError> {
//!         self.brk = 0;
//!         Ok(Offset::new(0))
//!     }
//!
//!     fn sbrk(&mut self, increment_bytes: u32) -> Result<Offset, RegionError> {
//!         let old = self.brk;
//!         let new_brk = old
//!             .checked_add(increment_bytes)
//!             .filter(|&n| n as usize <= self.storage.len())
//!             .ok_or(RegionError::Exhausted)?;
//!         self.brk = new_brk;
//!         Ok(Offset::new(old))
//!     }
//!
//!     fn base_ptr(&self) -> NonNull<u8> {
//!         NonNull::new(self.storage.as_ptr().cast_mut()).expect("storage is never null")
//!     }
//! }
//!
//! let region = ArenaRegion { storage: vec![0u8; 1 << 20].into_boxed_slice(), brk: 0 };
//! let mut heap = Heap::init(region).expect("init succeeds");
//! let a = heap.allocate(24).expect("allocation succeeds");
//! heap.free(a);
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

mod block;
mod coalesce;
mod diagnostics;
mod heap;
mod offset;
mod raw;
mod region;
mod tag;
mod tree;

#[cfg(feature = "global-allocator")]
mod global;

#[cfg(test)]
pub(crate) mod test_support;

pub use diagnostics::{Diagnostics, LogDiagnostics, Severity};
pub use heap::{Heap, InitError};
pub use offset::Offset;
pub use region::{RegionError, RegionProvider};

#[cfg(feature = "global-allocator")]
pub use global::GlobalHeap;

pub(crate) use tag::{CHUNKSIZE, DWORD, MIN_BLOCK_SIZE, WORD};
