//! Block primitives: reading/writing boundary tags and navigating physical
//! neighbors. Every operation here is O(1) pointer arithmetic over the
//! region; none of it validates alignment or bounds, per the teacher's
//! convention of encapsulating raw address arithmetic in a single reviewed
//! module and trusting callers elsewhere.

use crate::raw::RawRegion;
use crate::tag::{BlockTag, WORD};
use crate::Offset;

/// Offset of a block's header, given its payload offset.
#[inline]
pub(crate) const fn header_offset(payload: Offset) -> Offset {
    payload.sub(WORD)
}

/// Offset of a block's footer, given its payload offset and size.
#[inline]
pub(crate) const fn footer_offset(payload: Offset, size: u32) -> Offset {
    payload.add(size).sub(2 * WORD)
}

/// The block's total size (header + payload + footer) in bytes.
#[inline]
pub(crate) fn size_of(raw: RawRegion, payload: Offset) -> u32 {
    raw.read_tag(header_offset(payload)).size()
}

/// Whether the block is currently marked allocated.
#[inline]
pub(crate) fn is_allocated(raw: RawRegion, payload: Offset) -> bool {
    raw.read_tag(header_offset(payload)).allocated()
}

/// Writes matching header and footer tags for a block of the given size and
/// allocation state.
#[inline]
pub(crate) fn write_tags(raw: RawRegion, payload: Offset, size: u32, allocated: bool) {
    let tag = BlockTag::pack(size, allocated);
    raw.write_tag(header_offset(payload), tag);
    raw.write_tag(footer_offset(payload, size), tag);
}

/// The payload offset of the next physical block.
///
/// Valid even when the current block is the last real block before the
/// epilogue: the "next block" in that case is the epilogue's degenerate
/// zero-payload position, which every caller must check for via
/// `size_of(next) == 0` before treating it as a real block.
#[inline]
pub(crate) fn next_block(raw: RawRegion, payload: Offset) -> Offset {
    payload.add(size_of(raw, payload))
}

/// The payload offset of the previous physical block.
///
/// Valid even adjacent to the prologue: the prologue's boundary tag carries
/// size 8, so the arithmetic naturally lands back on the prologue's payload
/// offset without any special-casing.
#[inline]
pub(crate) fn prev_block(raw: RawRegion, payload: Offset) -> Offset {
    let prev_footer = header_offset(payload).sub(WORD);
    let prev_size = raw.read_tag(prev_footer).size();
    payload.sub(prev_size)
}
