//! Test-only [`RegionProvider`] backed by a fixed, pre-reserved byte arena.
//!
//! Shared by the inline unit tests across `block`, `tree`, `coalesce`,
//! `heap` and `global`. Mirrors the classic `mem_sbrk` trace-harness trick:
//! the full capacity is reserved up front so the base pointer never moves,
//! and `sbrk` only tracks a logical high-water mark within it.

use core::ptr::NonNull;

use crate::raw::RawRegion;
use crate::region::{RegionError, RegionProvider};
use crate::Offset;

pub(crate) struct FixedRegion {
    storage: Box<[u8]>,
    brk: u32,
}

impl FixedRegion {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            storage: vec![0u8; capacity].into_boxed_slice(),
            brk: 0,
        }
    }

    /// A `RawRegion` view over this arena's base pointer, for tests that
    /// want to poke at boundary tags directly without going through
    /// `Heap::init`.
    pub(crate) fn raw(&self) -> RawRegion {
        // SAFETY: `storage` outlives every `RawRegion` derived from it within
        // a single test function, and is never reallocated.
        unsafe { RawRegion::new(self.base_ptr()) }
    }
}

impl RegionProvider for FixedRegion {
    fn init(&mut self) -> Result<Offset, RegionError> {
        self.brk = 0;
        Ok(Offset::new(0))
    }

    fn sbrk(&mut self, increment_bytes: u32) -> Result<Offset, RegionError> {
        let old = self.brk;
        let new_brk = old
            .checked_add(increment_bytes)
            .filter(|&n| (n as usize) <= self.storage.len())
            .ok_or(RegionError::Exhausted)?;
        self.brk = new_brk;
        Ok(Offset::new(old))
    }

    fn base_ptr(&self) -> NonNull<u8> {
        NonNull::new(self.storage.as_ptr().cast_mut()).expect("storage is never null")
    }
}
