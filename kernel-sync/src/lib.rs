//! # Synchronization primitives
//!
//! A single spinlock type, used to wrap a non-reentrant data structure
//! (such as `alloc_core::Heap`) for sharing across a single-core, `no_std`
//! caller. The allocator core itself performs no synchronization of its
//! own; this crate exists for callers that need to embed it behind a lock.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

mod spin_lock;

pub use spin_lock::SpinLock;
