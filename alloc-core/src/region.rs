//! The region provider contract: an external collaborator that can only
//! grow a contiguous byte region, never reclaim it.

use core::ptr::NonNull;

use crate::Offset;

/// Failure returned by a [`RegionProvider`] when it cannot satisfy a growth
/// request (the underlying region is exhausted).
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RegionError {
    /// The provider cannot grow the region by the requested amount.
    #[error("region exhausted")]
    Exhausted,
}

/// An external source of monotonic byte-region growth.
///
/// Implementors own a contiguous, 8-byte-aligned byte buffer whose base
/// address is stable for the provider's entire lifetime (the allocator
/// caches it after [`init`](RegionProvider::init)); only its logical length
/// ever changes, and only by growing.
pub trait RegionProvider {
    /// Establishes the region's base; called exactly once before any other
    /// method.
    ///
    /// # Errors
    /// Returns [`RegionError::Exhausted`] if the provider cannot reserve
    /// even its initial extent.
    fn init(&mut self) -> Result<Offset, RegionError>;

    /// Grows the region by `increment_bytes`, returning the offset at which
    /// the new extent begins (the previous logical end of the region).
    ///
    /// # Errors
    /// Returns [`RegionError::Exhausted`] if the region cannot grow by the
    /// requested amount.
    fn sbrk(&mut self, increment_bytes: u32) -> Result<Offset, RegionError>;

    /// The region's stable base pointer, valid after [`init`](RegionProvider::init)
    /// has succeeded and for as long as the provider lives.
    fn base_ptr(&self) -> NonNull<u8>;
}
