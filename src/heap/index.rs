//! Index arithmetic shared by both heap variants.
//!
//! The heaps store items in a 1-based array: `parent(i) = i / 2`,
//! `children(i) = {2i, 2i + 1}`, `grandparent(i) = i / 4`. Levels are
//! numbered from the root (level 0); even levels hold maxima, odd levels
//! hold minima.
//!
//! Also here is the bit-reversal cursor the subtree variant uses to spread
//! concurrent bottom-slot allocations across disjoint root-to-leaf paths.

/// Returns true if index `i` sits on a max level.
///
/// `level(i) = floor(log2 i)`; even levels are max levels. The most
/// significant set bit of `i` encodes the level directly, so no floating
/// point is involved.
#[must_use]
pub(crate) fn is_max_level(i: usize) -> bool {
    debug_assert!(i >= 1, "heap indices start at 1");
    i.ilog2() % 2 == 0
}

/// Parent of `i`, or 0 if `i` is the root.
#[must_use]
pub(crate) const fn parent(i: usize) -> usize {
    i / 2
}

/// Grandparent of `i`, or 0 if `i` has none.
#[must_use]
pub(crate) const fn grandparent(i: usize) -> usize {
    i / 4
}

/// Cursor producing bottom-slot indices in bit-reversed order.
///
/// Successive allocations within one depth band visit every index exactly
/// once, in an order that sends consecutive insertions down disjoint
/// root-to-leaf paths. Two cursors are maintained: `reversed` is the
/// insert cursor (advanced on insert, retreated on remove) and `reversed2`
/// is the eviction cursor used to find a replacement bottom slot when the
/// heap is at capacity. `high_bit` is the current top bit width; when
/// every bit in the band has been flipped to 1 the band widens (insert) or
/// narrows (remove) and the cycle restarts from the current size.
///
/// Generated indices can exceed the capacity for non-power-of-two
/// capacities; `advance`/`retreat` skip those internally, while
/// `step_eviction` leaves the skip to the caller (which also has to
/// inspect node tags).
#[derive(Debug, Clone)]
pub(crate) struct BitRevCursor {
    reversed: usize,
    reversed2: usize,
    high_bit: i32,
}

impl BitRevCursor {
    pub(crate) const fn new() -> Self {
        Self {
            reversed: 0,
            reversed2: 0,
            high_bit: -1,
        }
    }

    pub(crate) fn reset(&mut self) {
        *self = Self::new();
    }

    /// Advances the insert cursor and returns the slot for the newest
    /// item. `size` must already count the incoming item.
    pub(crate) fn advance(&mut self, size: usize, capacity: usize) -> usize {
        loop {
            let mut flipped_to_one = false;
            for bit in (0..self.high_bit).rev() {
                self.reversed ^= 1 << bit;
                if self.reversed & (1 << bit) != 0 {
                    flipped_to_one = true;
                    break;
                }
            }

            if !flipped_to_one {
                // All ones: the band is exhausted, widen and restart.
                self.reversed = size;
                self.reversed2 = size;
                self.high_bit += 1;
                return self.reversed;
            }

            if self.reversed <= capacity {
                return self.reversed;
            }
        }
    }

    /// Retreats the insert cursor and returns the slot holding the most
    /// recently allocated item. `size` must already exclude it.
    pub(crate) fn retreat(&mut self, size: usize, capacity: usize) -> usize {
        let bottom = self.reversed;
        loop {
            let mut flipped_to_zero = false;
            for bit in (0..self.high_bit).rev() {
                self.reversed ^= 1 << bit;
                if self.reversed & (1 << bit) == 0 {
                    flipped_to_zero = true;
                    break;
                }
            }

            if !flipped_to_zero {
                self.reversed = size;
                self.reversed2 = size;
                self.high_bit -= 1;
                break;
            }

            if self.reversed <= capacity {
                break;
            }
        }
        bottom
    }

    /// Advances the eviction cursor one step and returns the candidate
    /// index. The candidate may exceed the capacity or be tag-unavailable;
    /// the caller keeps stepping until it finds a usable slot.
    pub(crate) fn step_eviction(&mut self, size: usize) -> usize {
        let mut flipped_to_zero = false;
        for bit in (0..self.high_bit).rev() {
            self.reversed2 ^= 1 << bit;
            if self.reversed2 & (1 << bit) == 0 {
                flipped_to_zero = true;
                break;
            }
        }

        if !flipped_to_zero {
            // Wrap within the current band without changing its width.
            self.reversed2 = size;
        }
        self.reversed2
    }
}
