//! An optional `GlobalAlloc` adapter over a [`Heap`], serialized with
//! `kernel-sync`'s [`SpinLock`].
//!
//! This is ambient plumbing, not part of the core's correctness surface: the
//! core `Heap<R>` stays unsynchronized and single-threaded per the Non-goals
//! in the crate's top-level docs. `GlobalHeap` just adds a lock *around* one,
//! the same two-file split the teacher uses for its own static heap
//! (`kernel-alloc::static_heap` providing the locked storage,
//! `kernel::allocator::kernel_allocator` providing the `GlobalAlloc` impl) —
//! collapsed here into a single module since there is only one lock to hold.

use core::alloc::{GlobalAlloc, Layout};
use core::ptr::{self, NonNull};

use kernel_sync::SpinLock;

use crate::heap::Heap;
use crate::region::RegionProvider;
use crate::tag::DWORD;

/// A [`Heap<R>`] behind a spinlock, suitable for installation as a
/// `#[global_allocator]` in a single-core `no_std` binary.
///
/// `GlobalHeap` is constructed empty (so it can live in a `static`) and must
/// be given a heap via [`GlobalHeap::set`] before any allocation is
/// attempted; allocations requested before `set` or with an alignment this
/// allocator cannot honor return null, exactly as `GlobalAlloc` permits for
/// OOM/unsatisfiable requests.
pub struct GlobalHeap<R: RegionProvider> {
    inner: SpinLock<Option<Heap<R>>>,
}

impl<R: RegionProvider> GlobalHeap<R> {
    /// Creates an uninitialized `GlobalHeap`. Suitable for a `static`
    /// binding; allocation requests made before [`set`](Self::set) return
    /// null.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            inner: SpinLock::new(None),
        }
    }

    /// Installs `heap` as the allocator's backing store.
    ///
    /// Replaces any previously installed heap. Callers are responsible for
    /// ensuring no allocation made against a previous heap outlives this
    /// call.
    pub fn set(&self, heap: Heap<R>) {
        self.inner.with_lock(|slot| *slot = Some(heap));
    }
}

impl<R: RegionProvider> Default for GlobalHeap<R> {
    fn default() -> Self {
        Self::new()
    }
}

// SAFETY: all access to the inner `Heap<R>` is serialized by `SpinLock`;
// `Heap<R>` itself requires no synchronization once a call is exclusive.
unsafe impl<R: RegionProvider + Send> Sync for GlobalHeap<R> {}

// SAFETY: `alloc`/`dealloc` take `&self` and serialize through the spinlock;
// every payload pointer handed out is double-word aligned and large enough
// for any `Layout` whose alignment is `<= DWORD`, which is all this
// allocator's block layout can ever guarantee.
unsafe impl<R: RegionProvider + Send> GlobalAlloc for GlobalHeap<R> {
    #[allow(clippy::cast_possible_truncation)]
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        if layout.align() as u32 > DWORD {
            return ptr::null_mut();
        }
        self.inner.with_lock(|slot| {
            slot.as_mut().map_or(ptr::null_mut(), |heap| {
                heap.allocate(layout.size() as u32)
                    .map_or(ptr::null_mut(), NonNull::as_ptr)
            })
        })
    }

    unsafe fn dealloc(&self, ptr: *mut u8, _layout: Layout) {
        let Some(ptr) = NonNull::new(ptr) else {
            return;
        };
        // `ptr` was returned by a prior call to this same `alloc`, per the
        // `GlobalAlloc` contract — `Heap::free`'s precondition.
        self.inner.with_lock(|slot| {
            if let Some(heap) = slot.as_mut() {
                heap.free(ptr);
            }
        });
    }

    #[allow(clippy::cast_possible_truncation)]
    unsafe fn realloc(&self, ptr: *mut u8, _layout: Layout, new_size: usize) -> *mut u8 {
        let Some(ptr) = NonNull::new(ptr) else {
            // SAFETY: delegating to this same `GlobalAlloc::alloc`.
            return unsafe { self.alloc(layout_with_size(new_size)) };
        };
        // `ptr` was returned by a prior call to this same `alloc`, per the
        // `GlobalAlloc` contract — `Heap::resize`'s precondition.
        self.inner.with_lock(|slot| {
            slot.as_mut().map_or(ptr::null_mut(), |heap| {
                heap.resize(Some(ptr), new_size as u32)
                    .map_or(ptr::null_mut(), NonNull::as_ptr)
            })
        })
    }
}

/// Builds a zero-align-sensitive `Layout` purely to route a null-pointer
/// `realloc` through [`GlobalHeap::alloc`]'s alignment check; the allocator's
/// own alignment is fixed, so only the size is meaningful here.
fn layout_with_size(size: usize) -> Layout {
    // SAFETY: `DWORD` is a power of two and `size` rounded up by the
    // allocator internally; an oversized align never occurs here.
    unsafe { Layout::from_size_align_unchecked(size, DWORD as usize) }
}
