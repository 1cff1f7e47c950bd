//! Subtree-locking min–max heap.
//!
//! Each slot carries its own mutex, so insertions and removals whose
//! percolation paths touch disjoint subtrees run in parallel. A single
//! structural mutex guards the aggregate state (`size` and the
//! bit-reversal cursors) and the act of selecting a slot; it is released
//! as soon as the selected slot is locked, before percolation begins.
//!
//! # The tag protocol
//!
//! Every slot has a tag: `EMPTY`, `AVAILABLE`, or a unique
//! insertion id (IID) while an insert is percolating through it. Swaps
//! move the tag together with the item, so a removal's percolate-down may
//! carry an in-flight insertion's item (and its IID) one or two levels up
//! — "stealing" its tentative slot. The insertion then finds its IID on
//! an ancestor and chases it upward until it can finish the reorder and
//! retire the tag to `AVAILABLE`.
//!
//! # Lock ordering
//!
//! The structural mutex, when held, precedes any node lock. Node locks
//! are acquired in increasing index order everywhere: percolate-up takes
//! grandparent, then parent, then node (gp < p < i); percolate-down takes
//! the node, then children, then grandchildren. The one place the
//! original protocol would acquire against the order — re-locking the
//! minimum slot while holding a claimed bottom slot during an at-capacity
//! insert — uses `try_lock` and rescans on failure, so no cycle can form.
//!
//! Insertions spread across disjoint root-to-leaf paths because bottom
//! slots are allocated in bit-reversed order; see `BitRevCursor` in the
//! index module.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{Mutex, MutexGuard};
use smallvec::SmallVec;

use super::index::{grandparent, is_max_level, parent, BitRevCursor};
use super::MinMaxHeap;
use crate::item::Item;

/// A slot tag: `EMPTY`, `AVAILABLE`, or an insertion id (any value ≥ 2).
///
/// IIDs are drawn from a monotonically increasing counter; the values 0
/// and 1 are reserved, and the counter restarts above them on wraparound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Tag(u64);

impl Tag {
    const EMPTY: Self = Self(0);
    const AVAILABLE: Self = Self(1);
    const FIRST_IID: u64 = 2;

    /// Returns true if this tag is an in-flight insertion's id.
    const fn is_insertion(self) -> bool {
        self.0 >= Self::FIRST_IID
    }
}

/// One heap slot: the item (when occupied) and its tag. The slot's mutex
/// lives outside, in the `nodes` array.
#[derive(Debug)]
struct Node {
    item: Option<Item>,
    tag: Tag,
}

impl Node {
    const fn vacant() -> Self {
        Self {
            item: None,
            tag: Tag::EMPTY,
        }
    }

    /// Score of the held item. Only called on slots whose tag is not
    /// `EMPTY`; the tag protocol guarantees such slots hold an item.
    fn score(&self) -> f32 {
        debug_assert!(self.item.is_some(), "scored a vacant node");
        self.item.as_ref().map_or(0.0, |item| item.score)
    }
}

/// Aggregate state guarded by the structural mutex.
#[derive(Debug)]
struct Shape {
    size: usize,
    cursor: BitRevCursor,
}

/// Min–max heap with per-node locks and tag-chasing percolation.
pub struct SubtreeHeap {
    capacity: usize,
    shape: Mutex<Shape>,
    /// `capacity + 2` slots: index 0 and `capacity + 1` are sentinels,
    /// items live in `1..=capacity`.
    nodes: Box<[Mutex<Node>]>,
    next_iid: AtomicU64,
}

impl SubtreeHeap {
    /// Creates an empty heap holding at most `capacity` items. All slot
    /// storage is allocated here and reused across [`clear`].
    ///
    /// [`clear`]: MinMaxHeap::clear
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is 0.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        assert!(capacity >= 1, "heap capacity must be at least 1");
        let nodes: Vec<Mutex<Node>> = (0..capacity + 2).map(|_| Mutex::new(Node::vacant())).collect();
        Self {
            capacity,
            shape: Mutex::new(Shape {
                size: 0,
                cursor: BitRevCursor::new(),
            }),
            nodes: nodes.into_boxed_slice(),
            next_iid: AtomicU64::new(Tag::FIRST_IID),
        }
    }

    /// The fixed maximum item count.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Allocates a fresh insertion id, skipping the reserved tag values
    /// on wraparound.
    fn allocate_iid(&self) -> Tag {
        let n = self.next_iid.fetch_add(1, Ordering::Relaxed);
        if n >= Tag::FIRST_IID {
            return Tag(n);
        }
        self.next_iid.store(Tag::FIRST_IID + 1, Ordering::Relaxed);
        Tag(Tag::FIRST_IID)
    }

    /// Locks and returns the minimum slot: 2 or 3 when both exist
    /// (whichever is smaller), else whichever is populated. `None` when
    /// the heap is empty. The structural lock must be held.
    fn lock_min(&self, shape: &Shape) -> Option<(usize, MutexGuard<'_, Node>)> {
        match shape.size {
            0 => None,
            1 => Some((1, self.nodes[1].lock())),
            2 => Some((2, self.nodes[2].lock())),
            _ => {
                let left = self.nodes[2].lock();
                let right = self.nodes[3].lock();
                if left.score() < right.score() {
                    Some((2, left))
                } else {
                    Some((3, right))
                }
            }
        }
    }

    /// Steps the eviction cursor until it lands on a usable slot: in
    /// range and tagged `AVAILABLE` (slots mid-insertion are skipped).
    /// Returns the slot locked. The structural lock must be held.
    fn claim_eviction_slot(&self, shape: &mut Shape) -> (usize, MutexGuard<'_, Node>) {
        loop {
            let candidate = shape.cursor.step_eviction(shape.size);
            if candidate > self.capacity {
                continue;
            }
            let guard = self.nodes[candidate].lock();
            if guard.tag == Tag::AVAILABLE {
                return (candidate, guard);
            }
        }
    }

    /// Insert when the heap already holds `capacity` items: evict the
    /// minimum (unless the incoming item scores no better), then reuse
    /// the freed bottom slot for the new item.
    fn insert_at_capacity(&self, mut shape: MutexGuard<'_, Shape>, item: Item) -> bool {
        let (mi, min_node) = match self.lock_min(&shape) {
            Some(found) => found,
            None => return false, // at capacity implies non-empty
        };
        if item.score <= min_node.score() {
            // Not better than the current worst: rejected, still success.
            return true;
        }
        drop(min_node);

        loop {
            let (bottom, mut bottom_node) = self.claim_eviction_slot(&mut shape);

            if bottom == mi {
                // The minimum slot itself came up as the replacement
                // bottom (tiny heaps): overwrite it in place.
                let iid = self.allocate_iid();
                bottom_node.item = Some(item);
                bottom_node.tag = iid;
                drop(bottom_node);
                drop(shape);
                self.percolate_up(bottom, iid);
                return true;
            }

            // mi < bottom, so locking mi now would run against the lock
            // order; try_lock and rescan instead of waiting.
            let Some(mut min_node) = self.nodes[mi].try_lock() else {
                continue;
            };

            let replacement = bottom_node.item.take();
            bottom_node.tag = Tag::EMPTY;
            drop(bottom_node);

            min_node.item = replacement;
            min_node.tag = Tag::AVAILABLE;
            self.percolate_down(mi, min_node);

            // The freed bottom slot takes the incoming item; the size is
            // unchanged, so the insert cursor stays put.
            let mut bottom_node = self.nodes[bottom].lock();
            let iid = self.allocate_iid();
            bottom_node.item = Some(item);
            bottom_node.tag = iid;
            drop(bottom_node);
            drop(shape);
            self.percolate_up(bottom, iid);
            return true;
        }
    }

    /// Percolate-up with tag chasing, entered with the slot at `start`
    /// tagged `iid`. Holds no locks between steps; each step acquires
    /// grandparent, parent, and node in increasing index order.
    fn percolate_up(&self, start: usize, iid: Tag) {
        let mut i = start;
        while i > 1 {
            let gp = grandparent(i);
            let p = parent(i);

            let gp_guard = if gp >= 1 {
                let guard = self.nodes[gp].lock();
                if guard.tag == iid {
                    // A remove carried our item up two levels.
                    i = gp;
                    continue;
                }
                if guard.tag.is_insertion() {
                    // Another insertion is mid-flight above us; let it
                    // finish and retry from the same position.
                    drop(guard);
                    std::hint::spin_loop();
                    continue;
                }
                Some(guard)
            } else {
                None
            };

            let p_guard = self.nodes[p].lock();
            if p_guard.tag == iid {
                // A remove carried our item up one level.
                i = p;
                continue;
            }
            if p_guard.tag.is_insertion() {
                // Another insertion is mid-flight at the parent. Wait
                // for it to move on; abandoning this position would
                // strand our own tag below.
                drop(p_guard);
                std::hint::spin_loop();
                continue;
            }

            let i_guard = self.nodes[i].lock();
            if i_guard.tag == iid {
                i = self.reorder_step(gp, gp_guard, p, p_guard, i, i_guard);
            } else if i_guard.tag == Tag::EMPTY {
                // A remove took our item all the way out of this slot and
                // placed it (untagged) at the root; nothing left to do.
                return;
            } else {
                // Displaced: our tag moved upward, chase it.
                i = p;
            }
        }

        if i == 1 {
            let mut root = self.nodes[1].lock();
            if root.tag == iid {
                root.tag = Tag::AVAILABLE;
            }
        }
    }

    /// One compare-and-swap step of percolate-up at `i`, whose tag is the
    /// caller's IID. Returns the next position to continue from, or 0
    /// when the item has settled (tag retired to `AVAILABLE`).
    #[allow(clippy::too_many_arguments)]
    fn reorder_step(
        &self,
        gp: usize,
        mut gp_guard: Option<MutexGuard<'_, Node>>,
        p: usize,
        mut p_guard: MutexGuard<'_, Node>,
        i: usize,
        mut i_guard: MutexGuard<'_, Node>,
    ) -> usize {
        let swap_with_parent = if is_max_level(i) {
            i_guard.score() < p_guard.score()
        } else {
            i_guard.score() > p_guard.score()
        };
        if swap_with_parent {
            std::mem::swap(&mut *i_guard, &mut *p_guard);
            return p;
        }

        if let Some(gp_guard) = gp_guard.as_mut() {
            let swap_with_grandparent = if is_max_level(i) {
                i_guard.score() > gp_guard.score()
            } else {
                i_guard.score() < gp_guard.score()
            };
            if swap_with_grandparent {
                std::mem::swap(&mut *i_guard, &mut **gp_guard);
                return gp;
            }
        }

        i_guard.tag = Tag::AVAILABLE;
        0
    }

    /// Concurrent percolate-down from `i`, entered with `i` locked.
    /// Locks all existing descendants-of-interest in increasing index
    /// order, ignores `EMPTY` slots, and keeps a grandchild winner's
    /// parent locked for the mandatory reorder. All locks are released on
    /// the way down.
    fn percolate_down<'a>(&'a self, mut i: usize, mut i_guard: MutexGuard<'a, Node>) {
        loop {
            let on_max = is_max_level(i);

            let mut candidates: SmallVec<[(usize, MutexGuard<'_, Node>); 6]> = SmallVec::new();
            for j in (2 * i..=2 * i + 1).chain(4 * i..=4 * i + 3) {
                if j <= self.capacity {
                    candidates.push((j, self.nodes[j].lock()));
                }
            }

            let mut best: Option<usize> = None;
            for pos in 0..candidates.len() {
                if candidates[pos].1.tag == Tag::EMPTY {
                    continue;
                }
                best = match best {
                    None => Some(pos),
                    Some(held) => {
                        let better = if on_max {
                            candidates[pos].1.score() > candidates[held].1.score()
                        } else {
                            candidates[pos].1.score() < candidates[held].1.score()
                        };
                        if better {
                            Some(pos)
                        } else {
                            Some(held)
                        }
                    }
                };
            }

            let Some(best) = best else {
                return; // no populated descendants
            };
            let m = candidates[best].0;
            let is_grandchild = m > 2 * i + 1;
            let pm = parent(m);

            // Release every candidate except the winner (and its parent,
            // when the winner is a grandchild).
            let mut m_guard = None;
            let mut pm_guard = None;
            for (j, guard) in candidates.drain(..) {
                if j == m {
                    m_guard = Some(guard);
                } else if is_grandchild && j == pm {
                    pm_guard = Some(guard);
                }
            }
            let mut m_guard = m_guard.expect("winner stays locked");

            let beats = if on_max {
                m_guard.score() > i_guard.score()
            } else {
                m_guard.score() < i_guard.score()
            };

            if !is_grandchild {
                if beats {
                    std::mem::swap(&mut *m_guard, &mut *i_guard);
                }
                return;
            }

            let mut pm_guard = pm_guard.expect("grandchild winner keeps its parent locked");
            if !beats {
                return;
            }
            std::mem::swap(&mut *m_guard, &mut *i_guard);
            let parent_violated = if on_max {
                m_guard.score() < pm_guard.score()
            } else {
                m_guard.score() > pm_guard.score()
            };
            if parent_violated {
                if pm_guard.tag.is_insertion() {
                    // An insertion is chasing its tag toward this slot.
                    // The tag must stay on the chase path (the ancestor
                    // chain of the insertion's origin), and the winner's
                    // sibling subtree is off that chain, so exchange the
                    // items only.
                    std::mem::swap(&mut m_guard.item, &mut pm_guard.item);
                } else {
                    std::mem::swap(&mut *m_guard, &mut *pm_guard);
                }
            }
            drop(pm_guard);
            drop(i_guard);
            i = m;
            i_guard = m_guard;
        }
    }
}

impl MinMaxHeap for SubtreeHeap {
    fn insert(&self, item: Item) -> bool {
        let mut shape = self.shape.lock();

        if shape.size >= self.capacity {
            return self.insert_at_capacity(shape, item);
        }

        shape.size += 1;
        let size = shape.size;
        let i = shape.cursor.advance(size, self.capacity);
        let mut node = self.nodes[i].lock();
        drop(shape);

        debug_assert_eq!(node.tag, Tag::EMPTY, "fresh bottom slot {i} not vacant");
        let iid = self.allocate_iid();
        node.item = Some(item);
        node.tag = iid;
        drop(node);

        self.percolate_up(i, iid);
        true
    }

    fn get_max(&self) -> Option<Item> {
        let shape = self.shape.lock();
        if shape.size == 0 {
            return None;
        }
        let root = self.nodes[1].lock();
        if root.tag == Tag::EMPTY {
            None
        } else {
            root.item.clone()
        }
    }

    fn get_min(&self) -> Option<Item> {
        let shape = self.shape.lock();
        let (_, min_node) = self.lock_min(&shape)?;
        min_node.item.clone()
    }

    fn remove_max(&self) -> Option<Item> {
        let mut shape = self.shape.lock();
        if shape.size == 0 {
            return None;
        }
        shape.size -= 1;
        let size = shape.size;
        let bottom = shape.cursor.retreat(size, self.capacity);
        let mut bottom_node = self.nodes[bottom].lock();
        drop(shape);

        let snapshot = bottom_node.item.take();
        bottom_node.tag = Tag::EMPTY;
        drop(bottom_node);

        let mut root = self.nodes[1].lock();
        if root.tag == Tag::EMPTY {
            // The bottom slot held the sole item.
            return snapshot;
        }
        let max = std::mem::replace(&mut root.item, snapshot);
        root.tag = Tag::AVAILABLE;
        self.percolate_down(1, root);
        max
    }

    fn remove_min(&self) -> Option<Item> {
        let mut shape = self.shape.lock();
        let (mi, mut min_node) = self.lock_min(&shape)?;
        shape.size -= 1;
        let size = shape.size;
        let bottom = shape.cursor.retreat(size, self.capacity);

        if bottom == mi {
            // One, two, or three items: the minimum is the bottom.
            drop(shape);
            let item = min_node.item.take();
            min_node.tag = Tag::EMPTY;
            return item;
        }

        // mi ∈ {2, 3} and bottom was allocated later, so mi < bottom and
        // this acquisition respects the lock order.
        let mut bottom_node = self.nodes[bottom].lock();
        drop(shape);

        let replacement = bottom_node.item.take();
        bottom_node.tag = Tag::EMPTY;
        drop(bottom_node);

        let min = std::mem::replace(&mut min_node.item, replacement);
        min_node.tag = Tag::AVAILABLE;
        self.percolate_down(mi, min_node);
        min
    }

    fn clear(&self) -> bool {
        let mut shape = self.shape.lock();
        shape.size = 0;
        shape.cursor.reset();
        for node in self.nodes.iter() {
            let mut guard = node.lock();
            guard.item = None;
            guard.tag = Tag::EMPTY;
        }
        true
    }

    fn len(&self) -> usize {
        self.shape.lock().size
    }

    fn is_empty(&self) -> bool {
        self.shape.lock().size == 0
    }

    fn is_full(&self) -> bool {
        self.shape.lock().size == self.capacity
    }
}

impl std::fmt::Debug for SubtreeHeap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let shape = self.shape.lock();
        f.debug_struct("SubtreeHeap")
            .field("capacity", &self.capacity)
            .field("len", &shape.size)
            .finish_non_exhaustive()
    }
}
