//! The free-block index: an in-place, unbalanced binary search tree keyed by
//! block size. Node storage is intrusive — a free block's first two payload
//! words hold its `left`/`right` children as [`Offset`]s — so the tree costs
//! nothing outside the free blocks it indexes.
//!
//! Left-on-equal: a node's left subtree holds everything with size `<=` its
//! own, its right subtree everything strictly greater. Because sizes collide
//! often, every node inserted with a size equal to an existing node's walks
//! one step further left than that existing node, so same-size nodes form a
//! left-leaning chain. [`remove`] must walk that chain by address, not size
//! alone, to find the specific block being removed (see module-level note on
//! [`locate`]).
//!
//! All three operations are implemented iteratively: tree depth is bounded
//! only by the number of distinct free-block sizes ever seen, and recursion
//! here would tie the allocator's stack usage to an adversary-controlled
//! quantity.

use core::cmp::Ordering;

use crate::block::size_of;
use crate::raw::RawRegion;
use crate::tag::WORD;
use crate::Offset;

#[inline]
pub(crate) fn left(raw: RawRegion, node: Offset) -> Offset {
    Offset::new(raw.read_word(node))
}

#[inline]
fn set_left(raw: RawRegion, node: Offset, value: Offset) {
    raw.write_word(node, value.as_u32());
}

#[inline]
pub(crate) fn right(raw: RawRegion, node: Offset) -> Offset {
    Offset::new(raw.read_word(node.add(WORD)))
}

#[inline]
fn set_right(raw: RawRegion, node: Offset, value: Offset) {
    raw.write_word(node.add(WORD), value.as_u32());
}

/// Inserts `node` (a free block not currently in any tree) into the tree
/// rooted at `root`, returning the (possibly new) root.
///
/// `node`'s own left/right links are (re)initialized to `NONE` here, since a
/// block's tree-node view is only meaningful from the moment it is freed.
pub(crate) fn insert(raw: RawRegion, root: Offset, node: Offset) -> Offset {
    set_left(raw, node, Offset::NONE);
    set_right(raw, node, Offset::NONE);

    if root.is_none() {
        return node;
    }

    let node_size = size_of(raw, node);
    let mut cur = root;
    loop {
        let cur_size = size_of(raw, cur);
        if node_size <= cur_size {
            let l = left(raw, cur);
            if l.is_none() {
                set_left(raw, cur, node);
                break;
            }
            cur = l;
        } else {
            let r = right(raw, cur);
            if r.is_none() {
                set_right(raw, cur, node);
                break;
            }
            cur = r;
        }
    }
    root
}

/// Finds the smallest free block whose size is `>= requested_size`, without
/// removing it. Returns `Offset::NONE` if no such block exists.
pub(crate) fn ceiling(raw: RawRegion, root: Offset, requested_size: u32) -> Offset {
    let mut cur = root;
    let mut best = Offset::NONE;
    while !cur.is_none() {
        let cur_size = size_of(raw, cur);
        match cur_size.cmp(&requested_size) {
            Ordering::Equal => return cur,
            Ordering::Greater => {
                best = cur;
                cur = left(raw, cur);
            }
            Ordering::Less => cur = right(raw, cur),
        }
    }
    best
}

/// Finds `target`'s parent by a key-guided descent from `root`, following
/// the same left-on-equal rule as [`insert`] but disambiguating by address
/// once sizes tie (equal-size nodes form a left chain; we must walk down it
/// until the addresses match). Returns `Offset::NONE` if `target` is the
/// root itself.
///
/// # Preconditions
/// `target` must actually be reachable from `root` (the caller is removing
/// a block it knows is currently indexed).
fn locate(raw: RawRegion, root: Offset, target: Offset) -> Offset {
    let target_size = size_of(raw, target);
    let mut parent = Offset::NONE;
    let mut cur = root;
    while !cur.is_none() {
        if cur == target {
            return parent;
        }
        let cur_size = size_of(raw, cur);
        parent = cur;
        cur = match target_size.cmp(&cur_size) {
            Ordering::Less => left(raw, cur),
            Ordering::Greater => right(raw, cur),
            Ordering::Equal => left(raw, cur),
        };
    }
    debug_assert!(false, "remove target not found in tree");
    Offset::NONE
}

/// Detaches and returns the rightmost node of the subtree rooted at `node`
/// (the in-order predecessor of whatever it is being pulled out for),
/// together with the reduced subtree that remains in its place.
fn remove_rightmost(raw: RawRegion, node: Offset) -> (Offset, Offset) {
    let mut parent = Offset::NONE;
    let mut cur = node;
    loop {
        let r = right(raw, cur);
        if r.is_none() {
            break;
        }
        parent = cur;
        cur = r;
    }
    let cur_left = left(raw, cur);
    if parent.is_none() {
        (cur_left, cur)
    } else {
        set_right(raw, parent, cur_left);
        (node, cur)
    }
}

/// Removes `target` (a free block known to be indexed somewhere in the tree
/// rooted at `root`) and returns the (possibly new) root.
pub(crate) fn remove(raw: RawRegion, root: Offset, target: Offset) -> Offset {
    let parent = locate(raw, root, target);
    let target_left = left(raw, target);
    let target_right = right(raw, target);

    let replacement = if target_left.is_none() && target_right.is_none() {
        Offset::NONE
    } else if target_left.is_none() {
        target_right
    } else if target_right.is_none() {
        target_left
    } else {
        let (reduced_left, predecessor) = remove_rightmost(raw, target_left);
        set_left(raw, predecessor, reduced_left);
        set_right(raw, predecessor, target_right);
        predecessor
    };

    if parent.is_none() {
        replacement
    } else {
        if left(raw, parent) == target {
            set_left(raw, parent, replacement);
        } else {
            set_right(raw, parent, replacement);
        }
        root
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::write_tags;
    use crate::test_support::FixedRegion;

    fn block_at(raw: RawRegion, offset: u32, size: u32) -> Offset {
        let payload = Offset::new(offset);
        write_tags(raw, payload, size, false);
        payload
    }

    #[test]
    fn insert_and_ceiling_find_exact_fit() {
        let region = FixedRegion::new(4096);
        let raw = region.raw();
        let mut root = Offset::NONE;
        let mut offset = 64u32;
        for &size in &[64u32, 32, 128, 16, 96] {
            let node = block_at(raw, offset, size);
            root = insert(raw, root, node);
            offset += size;
        }

        let fit = ceiling(raw, root, 96);
        assert_eq!(size_of(raw, fit), 96);
    }

    #[test]
    fn ceiling_prefers_smallest_sufficient_block() {
        let region = FixedRegion::new(4096);
        let raw = region.raw();
        let mut root = Offset::NONE;
        let mut offset = 64u32;
        for &size in &[200u32, 48, 500, 64] {
            let node = block_at(raw, offset, size);
            root = insert(raw, root, node);
            offset += size;
        }

        let fit = ceiling(raw, root, 50);
        assert_eq!(size_of(raw, fit), 64);

        let fit = ceiling(raw, root, 1000);
        assert!(fit.is_none());
    }

    #[test]
    fn remove_leaf_detaches_cleanly() {
        let region = FixedRegion::new(4096);
        let raw = region.raw();
        let mut root = Offset::NONE;
        let mut offset = 64u32;
        let mut nodes = Vec::new();
        for &size in &[64u32, 32, 128] {
            let node = block_at(raw, offset, size);
            root = insert(raw, root, node);
            nodes.push(node);
            offset += size;
        }

        // 32 is a leaf (left child of 64)
        let leaf = nodes[1];
        root = remove(raw, root, leaf);
        assert!(ceiling(raw, root, 32).is_none() || size_of(raw, ceiling(raw, root, 32)) != 32);
    }

    #[test]
    fn remove_two_child_node_uses_predecessor() {
        let region = FixedRegion::new(8192);
        let raw = region.raw();
        let mut root = Offset::NONE;
        let mut offset = 64u32;
        let mut by_size = std::collections::BTreeMap::new();
        for &size in &[100u32, 50, 150, 25, 75, 125, 175] {
            let node = block_at(raw, offset, size);
            root = insert(raw, root, node);
            by_size.insert(size, node);
            offset += size;
        }

        let target = by_size[&100];
        root = remove(raw, root, target);

        // every remaining size should still be reachable via ceiling
        for &size in &[50u32, 150, 25, 75, 125, 175] {
            let found = ceiling(raw, root, size);
            assert!(!found.is_none(), "size {size} missing after removal");
        }
        assert_ne!(ceiling(raw, root, 100), target);
    }

    #[test]
    fn remove_root_with_one_child_promotes_it() {
        let region = FixedRegion::new(4096);
        let raw = region.raw();
        let mut root = Offset::NONE;
        let a = block_at(raw, 64, 100);
        root = insert(raw, root, a);
        let b = block_at(raw, 200, 50);
        root = insert(raw, root, b);

        root = remove(raw, root, a);
        assert_eq!(root, b);
    }

    #[test]
    fn equal_size_siblings_are_removed_by_address_not_key() {
        let region = FixedRegion::new(4096);
        let raw = region.raw();
        let mut root = Offset::NONE;
        let first = block_at(raw, 64, 64);
        let second = block_at(raw, 256, 64);
        let third = block_at(raw, 512, 64);
        root = insert(raw, root, first);
        root = insert(raw, root, second);
        root = insert(raw, root, third);

        // removing `second` specifically must not disturb `first`/`third`.
        root = remove(raw, root, second);
        let fit = ceiling(raw, root, 64);
        assert!(fit == first || fit == third);
        root = remove(raw, root, fit);
        let fit2 = ceiling(raw, root, 64);
        assert!(fit2 == first || fit2 == third);
        assert_ne!(fit, fit2);
    }
}
