//! The four-case boundary-tag coalescer: merges a newly freed block with
//! whichever of its physical neighbors are also free.
//!
//! Coalescing always happens *before* the resulting block is inserted into
//! the free-index tree: a neighbor being merged away must first be removed
//! from the tree, because its size (its tree key) is about to change.

use crate::block::{is_allocated, next_block, prev_block, size_of, write_tags};
use crate::raw::RawRegion;
use crate::tree;
use crate::Offset;

/// Merges `block` (already tagged free) with any free physical neighbors,
/// removing them from the tree rooted at `root` as needed.
///
/// Returns the payload offset of the (possibly merged) free block and the
/// tree root after neighbor removal. The returned block is free but not yet
/// tree-indexed; the caller decides when to insert it.
pub(crate) fn coalesce(raw: RawRegion, mut root: Offset, block: Offset) -> (Offset, Offset) {
    let prev = prev_block(raw, block);
    let next = next_block(raw, block);
    let prev_free = !is_allocated(raw, prev);
    let next_free = !is_allocated(raw, next);

    match (prev_free, next_free) {
        (false, false) => (block, root),
        (false, true) => {
            root = tree::remove(raw, root, next);
            let merged_size = size_of(raw, block) + size_of(raw, next);
            write_tags(raw, block, merged_size, false);
            (block, root)
        }
        (true, false) => {
            root = tree::remove(raw, root, prev);
            let merged_size = size_of(raw, prev) + size_of(raw, block);
            write_tags(raw, prev, merged_size, false);
            (prev, root)
        }
        (true, true) => {
            root = tree::remove(raw, root, prev);
            root = tree::remove(raw, root, next);
            let merged_size = size_of(raw, prev) + size_of(raw, block) + size_of(raw, next);
            write_tags(raw, prev, merged_size, false);
            (prev, root)
        }
    }
}
