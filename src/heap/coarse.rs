//! Coarse-grained reader/writer min–max heap.
//!
//! The whole structure sits behind a single [`parking_lot::RwLock`].
//! Mutators (`insert`, `remove_max`, `remove_min`, `clear`) take the
//! exclusive side; readers (`get_max`, `get_min`, `len`, `is_empty`,
//! `is_full`) share the read side and observe a snapshot-consistent heap.
//!
//! Slots are addressed 1-based (slot `i` lives at `data[i - 1]`), which
//! keeps the parent/child arithmetic in the index module free of offset
//! adjustments.

use parking_lot::RwLock;

use super::index::{grandparent, is_max_level, parent};
use super::MinMaxHeap;
use crate::item::Item;

/// Min–max heap serialized under one read/write lock.
pub struct CoarseHeap {
    capacity: usize,
    state: RwLock<CoarseState>,
}

struct CoarseState {
    data: Vec<Item>,
}

impl CoarseHeap {
    /// Creates an empty heap holding at most `capacity` items.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is 0.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        assert!(capacity >= 1, "heap capacity must be at least 1");
        Self {
            capacity,
            state: RwLock::new(CoarseState {
                data: Vec::with_capacity(capacity),
            }),
        }
    }

    /// The fixed maximum item count.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl MinMaxHeap for CoarseHeap {
    fn insert(&self, item: Item) -> bool {
        let mut st = self.state.write();

        if st.data.len() >= self.capacity {
            let mi = st.index_of_min();
            if item.score <= st.item(mi).score {
                // Not better than the current worst: the filter rejects
                // the item, which still counts as success.
                return true;
            }
            // Evict the minimum to make room: overwrite its slot with the
            // tail element and restore order downward.
            let tail = st.data.pop().expect("heap at capacity is non-empty");
            if mi <= st.data.len() {
                st.data[mi - 1] = tail;
                st.percolate_down(mi);
            }
        }

        st.data.push(item);
        let bottom = st.data.len();
        st.percolate_up(bottom);
        true
    }

    fn get_max(&self) -> Option<Item> {
        let st = self.state.read();
        st.data.first().cloned()
    }

    fn get_min(&self) -> Option<Item> {
        let st = self.state.read();
        let mi = st.index_of_min();
        if mi == 0 {
            return None;
        }
        Some(st.item(mi).clone())
    }

    fn remove_max(&self) -> Option<Item> {
        let mut st = self.state.write();
        match st.data.len() {
            0 => None,
            1 => st.data.pop(),
            _ => {
                let tail = st.data.pop().expect("len checked above");
                let max = std::mem::replace(&mut st.data[0], tail);
                st.percolate_down(1);
                Some(max)
            }
        }
    }

    fn remove_min(&self) -> Option<Item> {
        let mut st = self.state.write();
        let mi = st.index_of_min();
        if mi == 0 {
            return None;
        }
        let tail = st.data.pop().expect("non-empty: min index found");
        if mi > st.data.len() {
            // The minimum was the tail element itself.
            return Some(tail);
        }
        let min = std::mem::replace(&mut st.data[mi - 1], tail);
        st.percolate_down(mi);
        Some(min)
    }

    fn clear(&self) -> bool {
        let mut st = self.state.write();
        st.data.clear();
        true
    }

    fn len(&self) -> usize {
        self.state.read().data.len()
    }

    fn is_empty(&self) -> bool {
        self.state.read().data.is_empty()
    }

    fn is_full(&self) -> bool {
        self.state.read().data.len() == self.capacity
    }
}

impl std::fmt::Debug for CoarseHeap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let st = self.state.read();
        f.debug_struct("CoarseHeap")
            .field("capacity", &self.capacity)
            .field("len", &st.data.len())
            .finish_non_exhaustive()
    }
}

impl CoarseState {
    fn item(&self, i: usize) -> &Item {
        &self.data[i - 1]
    }

    fn smaller(&self, a: usize, b: usize) -> bool {
        self.item(a).score < self.item(b).score
    }

    /// Swaps two slots, silently ignoring out-of-range indices so a
    /// bookkeeping bug cannot take the process down. Test builds assert.
    fn swap(&mut self, i: usize, j: usize) {
        let len = self.data.len();
        if i == 0 || j == 0 || i > len || j > len {
            debug_assert!(false, "swap out of range: {i} <-> {j} (len {len})");
            return;
        }
        self.data.swap(i - 1, j - 1);
    }

    /// Index of the current minimum: 2 or 3 when both exist (whichever is
    /// smaller), else whichever slot is populated, else 0 for an empty
    /// heap.
    fn index_of_min(&self) -> usize {
        match self.data.len() {
            0 => 0,
            1 => 1,
            2 => 2,
            _ => {
                if self.smaller(2, 3) {
                    2
                } else {
                    3
                }
            }
        }
    }

    fn percolate_up(&mut self, i: usize) {
        if i == 1 {
            return;
        }
        let p = parent(i);
        if is_max_level(i) {
            if self.smaller(i, p) {
                self.swap(i, p);
                self.percolate_up_grandparents(p, false);
            } else {
                self.percolate_up_grandparents(i, true);
            }
        } else if self.smaller(p, i) {
            self.swap(i, p);
            self.percolate_up_grandparents(p, true);
        } else {
            self.percolate_up_grandparents(i, false);
        }
    }

    /// Climbs grandparent links while the node beats them: upward on the
    /// max chain when `on_max`, downward on the min chain otherwise.
    fn percolate_up_grandparents(&mut self, mut i: usize, on_max: bool) {
        loop {
            let gp = grandparent(i);
            if gp == 0 {
                return;
            }
            let beats = if on_max {
                self.smaller(gp, i)
            } else {
                self.smaller(i, gp)
            };
            if !beats {
                return;
            }
            self.swap(i, gp);
            i = gp;
        }
    }

    fn percolate_down(&mut self, mut i: usize) {
        loop {
            let on_max = is_max_level(i);
            let m = self.extremal_child_or_grandchild(i, on_max);
            if m == 0 {
                return;
            }
            let beats = if on_max {
                self.smaller(i, m)
            } else {
                self.smaller(m, i)
            };
            if m > 2 * i + 1 {
                // m is a grandchild of i.
                if !beats {
                    return;
                }
                self.swap(m, i);
                let pm = parent(m);
                let parent_violated = if on_max {
                    self.smaller(m, pm)
                } else {
                    self.smaller(pm, m)
                };
                if parent_violated {
                    self.swap(m, pm);
                }
                i = m;
            } else {
                // m is a direct child: one swap restores order.
                if beats {
                    self.swap(m, i);
                }
                return;
            }
        }
    }

    /// The largest (`on_max`) or smallest descendant among the children
    /// and grandchildren of `i`, or 0 if `i` has no children.
    fn extremal_child_or_grandchild(&self, i: usize, on_max: bool) -> usize {
        let len = self.data.len();
        let mut best = 0;
        let children = (2 * i)..=(2 * i + 1);
        let grandchildren = (4 * i)..=(4 * i + 3);
        for j in children.chain(grandchildren) {
            if j > len {
                continue;
            }
            let better = best == 0
                || if on_max {
                    self.smaller(best, j)
                } else {
                    self.smaller(j, best)
                };
            if better {
                best = j;
            }
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn heap_from(capacity: usize, scores: &[f32]) -> CoarseHeap {
        let heap = CoarseHeap::new(capacity);
        for &s in scores {
            assert!(heap.insert(Item::from_score(s)));
        }
        heap
    }

    /// Checks the two-level min–max invariant over every occupied slot.
    fn assert_heap_invariant(heap: &CoarseHeap) {
        let st = heap.state.read();
        let len = st.data.len();
        for i in 1..=len {
            let descendants = ((2 * i)..=(2 * i + 1)).chain((4 * i)..=(4 * i + 3));
            for j in descendants {
                if j > len {
                    continue;
                }
                if is_max_level(i) {
                    assert!(
                        st.item(i).score >= st.item(j).score,
                        "max-level {i} < descendant {j}"
                    );
                } else {
                    assert!(
                        st.item(i).score <= st.item(j).score,
                        "min-level {i} > descendant {j}"
                    );
                }
            }
        }
    }

    #[test]
    fn empty_heap_reads() {
        let heap = CoarseHeap::new(4);
        assert!(heap.is_empty());
        assert!(!heap.is_full());
        assert_eq!(heap.len(), 0);
        assert_eq!(heap.get_max(), None);
        assert_eq!(heap.get_min(), None);
        assert_eq!(heap.remove_max(), None);
        assert_eq!(heap.remove_min(), None);
    }

    #[test]
    fn single_item_is_both_extrema() {
        let heap = heap_from(4, &[0.5]);
        assert_eq!(heap.get_max().unwrap().score, 0.5);
        assert_eq!(heap.get_min().unwrap().score, 0.5);
        assert_eq!(heap.len(), 1);
    }

    #[test]
    fn extrema_after_inserts() {
        let heap = heap_from(10, &[1.0, 2.0, 9.0, 4.0, 5.0, 3.0, 7.0, 8.0, 6.0]);
        assert_heap_invariant(&heap);
        assert_eq!(heap.get_max().unwrap().score, 9.0);
        assert_eq!(heap.get_min().unwrap().score, 1.0);
    }

    #[test]
    fn remove_max_drains_descending() {
        let heap = heap_from(10, &[1.0, 2.0, 9.0, 4.0, 5.0, 3.0, 7.0, 8.0, 6.0]);
        let mut drained = Vec::new();
        while let Some(item) = heap.remove_max() {
            assert_heap_invariant(&heap);
            drained.push(item.score);
        }
        assert_eq!(drained, vec![9.0, 8.0, 7.0, 6.0, 5.0, 4.0, 3.0, 2.0, 1.0]);
        assert!(heap.is_empty());
    }

    #[test]
    fn remove_min_drains_ascending() {
        let heap = heap_from(10, &[1.0, 2.0, 9.0, 4.0, 5.0, 3.0, 7.0, 8.0, 6.0]);
        let mut drained = Vec::new();
        while let Some(item) = heap.remove_min() {
            assert_heap_invariant(&heap);
            drained.push(item.score);
        }
        assert_eq!(drained, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0]);
    }

    #[test]
    fn at_capacity_evicts_minimum() {
        let heap = heap_from(8, &[1.0, 2.0, 9.0, 4.0, 5.0, 3.0, 7.0, 8.0, 6.0]);
        assert_eq!(heap.len(), 8);
        assert!(heap.is_full());
        assert_eq!(heap.get_max().unwrap().score, 9.0);
        assert_eq!(heap.get_min().unwrap().score, 2.0);
    }

    #[test]
    fn at_capacity_rejects_scores_not_above_minimum() {
        let heap = heap_from(2, &[1.0, 2.0]);
        // Equal to the current minimum: rejected, but still success.
        assert!(heap.insert(Item::from_score(1.0)));
        assert_eq!(heap.len(), 2);
        assert_eq!(heap.get_min().unwrap().score, 1.0);
        // Strictly above: admitted, minimum evicted.
        assert!(heap.insert(Item::from_score(1.5)));
        assert_eq!(heap.len(), 2);
        assert_eq!(heap.get_min().unwrap().score, 1.5);
    }

    #[test]
    fn capacity_one_keeps_the_best() {
        let heap = heap_from(1, &[1.0, 2.0]);
        assert_eq!(heap.len(), 1);
        assert_eq!(heap.get_max().unwrap().score, 2.0);
        assert_eq!(heap.get_min().unwrap().score, 2.0);
    }

    #[test]
    fn clear_empties_and_reuses() {
        let heap = heap_from(10, &[0.3, 0.7]);
        assert!(heap.clear());
        assert!(heap.is_empty());
        assert!(heap.insert(Item::from_score(0.1)));
        assert_eq!(heap.len(), 1);
    }

    #[test]
    fn payload_travels_with_score() {
        let heap = CoarseHeap::new(4);
        heap.insert(Item::new(0.9, b"high".to_vec()));
        heap.insert(Item::new(0.1, b"low".to_vec()));
        assert_eq!(heap.remove_max().unwrap().data, b"high");
        assert_eq!(heap.remove_min().unwrap().data, b"low");
    }

    proptest! {
        #[test]
        fn invariant_holds_after_random_inserts(
            scores in proptest::collection::vec(0.0f32..1.0, 0..64),
            capacity in 1usize..32,
        ) {
            let heap = CoarseHeap::new(capacity);
            for &s in &scores {
                heap.insert(Item::from_score(s));
                assert_heap_invariant(&heap);
                prop_assert!(heap.len() <= capacity);
            }
        }

        #[test]
        fn drain_is_sorted_and_retains_top_scores(
            scores in proptest::collection::vec(0.0f32..1.0, 1..64),
            capacity in 1usize..32,
        ) {
            let heap = CoarseHeap::new(capacity);
            for &s in &scores {
                heap.insert(Item::from_score(s));
            }

            let mut drained = Vec::new();
            while let Some(item) = heap.remove_max() {
                drained.push(item.score);
            }
            prop_assert_eq!(drained.len(), scores.len().min(capacity));
            for pair in drained.windows(2) {
                prop_assert!(pair[0] >= pair[1]);
            }

            // Every retained score is among the top-k of the input.
            let mut sorted = scores.clone();
            sorted.sort_by(|a, b| b.partial_cmp(a).unwrap());
            let threshold = sorted[drained.len() - 1];
            for &s in &drained {
                prop_assert!(s >= threshold);
            }
        }

        #[test]
        fn interleaved_ops_preserve_invariant(
            ops in proptest::collection::vec((0u8..4, 0.0f32..1.0), 0..128),
        ) {
            let heap = CoarseHeap::new(8);
            for (op, score) in ops {
                match op {
                    0 | 1 => {
                        heap.insert(Item::from_score(score));
                    }
                    2 => {
                        heap.remove_max();
                    }
                    _ => {
                        heap.remove_min();
                    }
                }
                assert_heap_invariant(&heap);
            }
        }
    }
}
