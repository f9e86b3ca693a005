//! The allocator facade: `init`, `allocate`, `free`, `resize`, and
//! `check_heap`, wired together from the block primitives, coalescer, and
//! free-index tree.

use core::ptr::NonNull;

use crate::block::{
    footer_offset, header_offset, is_allocated, next_block, prev_block, size_of, write_tags,
};
use crate::coalesce::coalesce;
use crate::diagnostics::{Diagnostics, Severity};
use crate::raw::RawRegion;
use crate::region::{RegionError, RegionProvider};
use crate::tag::{BlockTag, CHUNKSIZE, DWORD, MIN_BLOCK_SIZE, OVERHEAD, WORD};
use crate::tree;
use crate::Offset;

/// Failure establishing a [`Heap`] over a fresh [`RegionProvider`].
#[derive(Debug, thiserror::Error)]
pub enum InitError {
    /// The region provider could not supply the initial prologue/epilogue
    /// and first free extent.
    #[error("region provider failed during heap init: {0}")]
    Region(#[from] RegionError),
}

/// A boundary-tag heap allocator over a region grown through `R`.
///
/// `Heap` performs no internal synchronization and is not reentrant: no
/// method may be called while another call on the same instance is in
/// progress (there is no concurrent access to guard against in a
/// single-threaded design). Callers needing shared access across cores
/// should wrap a `Heap<R>` in a lock (see the `global-allocator` feature).
pub struct Heap<R: RegionProvider> {
    provider: R,
    raw: RawRegion,
    /// Payload offset of the prologue sentinel; fixed for the heap's
    /// lifetime.
    prologue: Offset,
    /// Root of the free-index tree, or `Offset::NONE` when no free blocks
    /// are indexed.
    root: Offset,
}

impl<R: RegionProvider> Heap<R> {
    /// Establishes the heap's prologue/epilogue sentinels and an initial
    /// `CHUNKSIZE`-byte free extent over a freshly initialized region.
    ///
    /// # Errors
    /// Propagates [`RegionError`] if the provider cannot supply the initial
    /// bytes.
    pub fn init(mut provider: R) -> Result<Self, InitError> {
        provider.init()?;
        let base = provider.base_ptr();
        // SAFETY: `base` was just established by the provider and is
        // guaranteed stable for the provider's lifetime.
        let raw = unsafe { RawRegion::new(base) };

        let mut heap = Self {
            provider,
            raw,
            prologue: Offset::new(0),
            root: Offset::NONE,
        };

        // Reserve one padding word (keeps the prologue payload double-word
        // aligned), the prologue block (header + footer, size 8), and the
        // epilogue header (size 0).
        let region_start = heap.provider.sbrk(4 * WORD)?;
        let prologue_header = region_start.add(WORD);
        let prologue_payload = prologue_header.add(WORD);
        write_tags(heap.raw, prologue_payload, DWORD, true);
        let epilogue_header = prologue_payload.add(DWORD).sub(WORD);
        heap.raw
            .write_tag(epilogue_header, BlockTag::pack(0, true));
        heap.prologue = prologue_payload;

        let first_free = heap.extend_heap(CHUNKSIZE / WORD)?;
        heap.root = tree::insert(heap.raw, heap.root, first_free);

        Ok(heap)
    }

    /// Grows the region by at least `words` words (rounded up to an even
    /// word count for double-word alignment), folding the reclaimed
    /// epilogue slot into the new free block and stamping a fresh epilogue
    /// past it.
    ///
    /// Coalesces with the immediately preceding block if it was free (the
    /// following block is always the brand-new epilogue, so only the "was
    /// the previous block free" case of the four-case coalescer can ever
    /// fire here). The returned block is free but **not yet tree-indexed**;
    /// callers decide whether and when to insert it.
    fn extend_heap(&mut self, words: u32) -> Result<Offset, RegionError> {
        let words = if words % 2 != 0 { words + 1 } else { words };
        let size = words * WORD;

        let old_brk = self.provider.sbrk(size)?;
        let payload = old_brk;
        write_tags(self.raw, payload, size, false);

        let epilogue_header = header_offset(payload).add(size);
        self.raw.write_tag(epilogue_header, BlockTag::pack(0, true));

        let (merged, new_root) = coalesce(self.raw, self.root, payload);
        self.root = new_root;
        Ok(merged)
    }

    /// `max(16, round_up_to_8(requested_bytes + 8))`, per the allocator's
    /// sizing policy: one word each for header and footer, rounded to the
    /// double-word boundary every block size must satisfy.
    fn adjusted_size(requested_bytes: u32) -> u32 {
        let with_overhead = requested_bytes + OVERHEAD;
        let rounded = with_overhead.div_ceil(DWORD) * DWORD;
        core::cmp::max(MIN_BLOCK_SIZE, rounded)
    }

    /// Commits an allocation of `asize` bytes into free block `block`,
    /// splitting off a free remainder when it would be `>= MIN_BLOCK_SIZE`.
    ///
    /// When splitting, a placement heuristic chooses which end of `block`
    /// becomes the allocated chunk, aiming to leave the free remainder
    /// adjacent to the larger of `block`'s two physical neighbors. This is a
    /// best-effort fragmentation reducer, not a correctness requirement —
    /// any split choice is equally valid.
    fn place(&mut self, block: Offset, asize: u32) -> Offset {
        let block_size = size_of(self.raw, block);
        let remainder = block_size - asize;

        if remainder < MIN_BLOCK_SIZE {
            write_tags(self.raw, block, block_size, true);
            return block;
        }

        // Prologue reads as size 8, epilogue as size 0; both fall out of the
        // ordinary boundary-tag arithmetic with no special-casing needed.
        let prev_size = size_of(self.raw, prev_block(self.raw, block));
        let next_size = size_of(self.raw, next_block(self.raw, block));
        let avg = (prev_size + next_size) / 2;
        let larger_is_prev = prev_size >= next_size;
        let near_larger = asize > avg;
        let allocate_at_low_end = if near_larger {
            larger_is_prev
        } else {
            !larger_is_prev
        };

        if allocate_at_low_end {
            write_tags(self.raw, block, asize, true);
            let free_remainder = block.add(asize);
            write_tags(self.raw, free_remainder, remainder, false);
            self.root = tree::insert(self.raw, self.root, free_remainder);
            block
        } else {
            write_tags(self.raw, block, remainder, false);
            let allocated = block.add(remainder);
            write_tags(self.raw, allocated, asize, true);
            self.root = tree::insert(self.raw, self.root, block);
            allocated
        }
    }

    /// Allocates a block able to hold at least `requested_bytes`.
    ///
    /// Returns `None` if `requested_bytes == 0` or the region is exhausted.
    /// On exhaustion the heap's state is left exactly as it was before the
    /// call — no partial mutation ever occurs.
    #[must_use]
    pub fn allocate(&mut self, requested_bytes: u32) -> Option<NonNull<u8>> {
        if requested_bytes == 0 {
            return None;
        }
        let asize = Self::adjusted_size(requested_bytes);

        if !self.root.is_none() {
            let fit = tree::ceiling(self.raw, self.root, asize);
            if !fit.is_none() {
                self.root = tree::remove(self.raw, self.root, fit);
                let payload = self.place(fit, asize);
                return Some(self.raw.payload_ptr(payload));
            }
        }

        let grow = core::cmp::max(asize, CHUNKSIZE);
        let block = self.extend_heap(grow / WORD).ok()?;
        let payload = self.place(block, asize);
        Some(self.raw.payload_ptr(payload))
    }

    /// Frees a previously allocated payload, coalescing it with any free
    /// physical neighbors and re-indexing the result.
    ///
    /// # Safety
    /// Behavior is undefined if `payload` was not returned by a prior
    /// `allocate`/`resize` call on this same heap, or has already been
    /// freed. The allocator does not detect double-free or invalid
    /// pointers.
    pub fn free(&mut self, payload: NonNull<u8>) {
        // SAFETY: caller contract above.
        let off = unsafe { self.raw.offset_of(payload) };
        let size = size_of(self.raw, off);
        write_tags(self.raw, off, size, false);
        let (merged, new_root) = coalesce(self.raw, self.root, off);
        self.root = tree::insert(self.raw, new_root, merged);
    }

    /// Writes `asize` into `off` and, if at least `MIN_BLOCK_SIZE` bytes
    /// remain of `combined_size`, splits off and indexes a free remainder.
    /// Otherwise the whole `combined_size` span is kept allocated.
    fn split_after_grow(&mut self, off: Offset, asize: u32, combined_size: u32) -> Offset {
        let leftover = combined_size - asize;
        if leftover < MIN_BLOCK_SIZE {
            write_tags(self.raw, off, combined_size, true);
        } else {
            write_tags(self.raw, off, asize, true);
            let remainder = off.add(asize);
            write_tags(self.raw, remainder, leftover, false);
            self.root = tree::insert(self.raw, self.root, remainder);
        }
        off
    }

    /// Shrinks (or keeps) an allocation in place: `asize <= cur_size`
    /// always succeeds without growing the region. Any bytes freed by the
    /// shrink are coalesced forward in case the following block is free.
    fn shrink_or_keep(&mut self, off: Offset, asize: u32, cur_size: u32) -> Offset {
        let remainder = cur_size - asize;
        if remainder < MIN_BLOCK_SIZE {
            return off;
        }
        write_tags(self.raw, off, asize, true);
        let freed = off.add(asize);
        write_tags(self.raw, freed, remainder, false);
        let (merged, new_root) = coalesce(self.raw, self.root, freed);
        self.root = tree::insert(self.raw, new_root, merged);
        off
    }

    /// Allocate-copy-free fallback: used whenever in-place growth isn't
    /// possible. Copies `min(old payload size, new_bytes)` bytes; the copy
    /// happens before `old_payload` is freed so coalescing and tree
    /// re-indexing never disturb data still being read.
    fn resize_fallback(&mut self, old_payload: NonNull<u8>, new_bytes: u32) -> Option<NonNull<u8>> {
        // SAFETY: caller contract on `resize`.
        let old_off = unsafe { self.raw.offset_of(old_payload) };
        let old_payload_bytes = size_of(self.raw, old_off) - OVERHEAD;
        let new_payload = self.allocate(new_bytes)?;

        let copy_len = core::cmp::min(old_payload_bytes, new_bytes) as usize;
        // SAFETY: both pointers address live, non-overlapping blocks of at
        // least `copy_len` bytes (freshly allocated destination, still-valid
        // source).
        unsafe {
            core::ptr::copy_nonoverlapping(old_payload.as_ptr(), new_payload.as_ptr(), copy_len);
        }
        self.free(old_payload);
        Some(new_payload)
    }

    /// Resizes an allocation, attempting in-place growth before falling
    /// back to allocate-copy-free.
    ///
    /// If `payload` is `None`, behaves as [`allocate`](Self::allocate). If
    /// `size_bytes` is `0`, frees `payload` and returns `None` (the
    /// specification leaves this case to the implementer; freeing matches
    /// `realloc`'s most common convention and keeps the heap's invariants
    /// trivially satisfied).
    ///
    /// # Safety
    /// If `payload` is `Some`, it must have been returned by a prior
    /// `allocate`/`resize` call on this same heap and not yet freed.
    #[must_use]
    pub fn resize(&mut self, payload: Option<NonNull<u8>>, size_bytes: u32) -> Option<NonNull<u8>> {
        let Some(payload) = payload else {
            return self.allocate(size_bytes);
        };
        if size_bytes == 0 {
            self.free(payload);
            return None;
        }

        // SAFETY: caller contract above.
        let off = unsafe { self.raw.offset_of(payload) };
        let asize = core::cmp::max(MIN_BLOCK_SIZE, (size_bytes + OVERHEAD).div_ceil(DWORD) * DWORD);
        let cur_size = size_of(self.raw, off);

        if asize <= cur_size {
            let result = self.shrink_or_keep(off, asize, cur_size);
            return Some(self.raw.payload_ptr(result));
        }

        let next = next_block(self.raw, off);
        let next_size = size_of(self.raw, next);
        let next_is_epilogue = next_size == 0;
        let next_is_free = !is_allocated(self.raw, next);

        if next_is_epilogue {
            let needed = asize - cur_size;
            let grow = core::cmp::max(needed, CHUNKSIZE);
            let Ok(extended) = self.extend_heap(grow / WORD) else {
                return self.resize_fallback(payload, size_bytes);
            };
            let combined = cur_size + size_of(self.raw, extended);
            let result = self.split_after_grow(off, asize, combined);
            return Some(self.raw.payload_ptr(result));
        }

        if next_is_free && cur_size + next_size >= asize {
            self.root = tree::remove(self.raw, self.root, next);
            let combined = cur_size + next_size;
            let result = self.split_after_grow(off, asize, combined);
            return Some(self.raw.payload_ptr(result));
        }

        if next_is_free {
            let after_next = next_block(self.raw, next);
            if size_of(self.raw, after_next) == 0 {
                // Do not remove `next` from the tree here: `next` is the
                // new extent's physical predecessor, so `extend_heap`'s own
                // coalesce pass will find it free and remove+merge it
                // exactly once. Pre-removing it here would make that later
                // `tree::remove` target a block no longer in the tree.
                let needed = asize - (cur_size + next_size);
                let grow = core::cmp::max(needed, CHUNKSIZE);
                let Ok(extended) = self.extend_heap(grow / WORD) else {
                    return self.resize_fallback(payload, size_bytes);
                };
                // `extended`'s size already includes `next`'s bytes (folded
                // in by `extend_heap`'s coalesce), so it must not be added
                // again here.
                let combined = cur_size + size_of(self.raw, extended);
                let result = self.split_after_grow(off, asize, combined);
                return Some(self.raw.payload_ptr(result));
            }
        }

        self.resize_fallback(payload, size_bytes)
    }

    /// Walks the region from the prologue to the epilogue, reporting
    /// structural invariant violations through `diag` rather than
    /// repairing them. Returns whether every check passed.
    pub fn check_heap(&self, verbose: bool, diag: &mut impl Diagnostics) -> bool {
        let mut ok = true;

        let prologue_tag = self.raw.read_tag(header_offset(self.prologue));
        if prologue_tag.size() != DWORD || !prologue_tag.allocated() {
            diag.report(Severity::Error, "prologue block malformed");
            ok = false;
        }

        // The prologue itself is checked above and is exempt from the
        // MIN_BLOCK_SIZE assertion below (its size is 8); start the walk at
        // the first real block.
        let mut cur = next_block(self.raw, self.prologue);
        loop {
            let size = size_of(self.raw, cur);
            if size == 0 {
                break;
            }
            if size % DWORD != 0 || size < MIN_BLOCK_SIZE {
                diag.report(Severity::Error, "block size not a valid multiple of 8");
                ok = false;
            }

            let header = self.raw.read_tag(header_offset(cur));
            let footer = self.raw.read_tag(footer_offset(cur, size));
            if header.into_bits() != footer.into_bits() {
                diag.report(Severity::Error, "header and footer disagree");
                ok = false;
            }
            if verbose {
                diag.trace_block(cur, size, header.allocated());
            }

            let next = next_block(self.raw, cur);
            let next_size = size_of(self.raw, next);
            if !header.allocated() && next_size != 0 && !is_allocated(self.raw, next) {
                diag.report(Severity::Error, "two adjacent free blocks were not coalesced");
                ok = false;
            }

            cur = next;
        }

        let epilogue_tag = self.raw.read_tag(header_offset(cur));
        if epilogue_tag.size() != 0 || !epilogue_tag.allocated() {
            diag.report(Severity::Error, "epilogue block malformed");
            ok = false;
        }

        ok
    }
}
