//! Shared test-only `RegionProvider` for the integration suites.

use std::ptr::NonNull;

use alloc_core::{Offset, RegionError, RegionProvider};

/// A fixed-capacity arena backing a `Heap` for tests, mirroring the classic
/// `mem_sbrk` trace-harness trick: storage is reserved up front so the base
/// pointer never moves and `sbrk` only tracks a logical high-water mark.
pub struct FixedRegion {
    storage: Box<[u8]>,
    brk: u32,
}

impl FixedRegion {
    pub fn new(capacity: usize) -> Self {
        Self {
            storage: vec![0u8; capacity].into_boxed_slice(),
            brk: 0,
        }
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
