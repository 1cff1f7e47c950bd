//! The filter façade.
//!
//! [`Filter`] wraps either heap variant behind one error-translating
//! surface: preconditions (emptiness, valid construction parameters) are
//! checked here, heap outcomes are mapped onto [`crate::error::Error`]
//! kinds, and callers never see the heap types directly.

use crate::config::{FilterConfig, Variant};
use crate::error::{Error, Result};
use crate::heap::{CoarseHeap, MinMaxHeap, SubtreeHeap};
use crate::item::Item;

enum HeapVariant {
    Coarse(CoarseHeap),
    Subtree(SubtreeHeap),
}

/// A bounded concurrent min–max priority filter.
///
/// All methods take `&self` and are safe to call from many threads; wrap
/// the filter in an `Arc` to share it.
pub struct Filter {
    heap: HeapVariant,
    config: FilterConfig,
}

impl Filter {
    /// Builds a filter from its configuration.
    ///
    /// # Errors
    ///
    /// Returns an invalid-argument error when the capacity is below 1.
    pub fn new(config: FilterConfig) -> Result<Self> {
        config.validate()?;
        let heap = match config.variant {
            Variant::Coarse => HeapVariant::Coarse(CoarseHeap::new(config.capacity)),
            Variant::Subtree => HeapVariant::Subtree(SubtreeHeap::new(config.capacity)),
        };
        Ok(Self { heap, config })
    }

    /// The configuration the filter was built with.
    #[must_use]
    pub fn config(&self) -> &FilterConfig {
        &self.config
    }

    fn heap(&self) -> &dyn MinMaxHeap {
        match &self.heap {
            HeapVariant::Coarse(heap) => heap,
            HeapVariant::Subtree(heap) => heap,
        }
    }

    /// Admits an item. A full filter either evicts its current minimum
    /// (when the new score beats it) or silently rejects the item; both
    /// are success.
    ///
    /// # Errors
    ///
    /// Returns an internal error if the heap reports failure, which a
    /// correct build never does.
    pub fn insert(&self, item: Item) -> Result<()> {
        if self.heap().insert(item) {
            Ok(())
        } else {
            Err(Error::internal("filter failed to insert item"))
        }
    }

    /// Returns a copy of the highest-scored item.
    ///
    /// # Errors
    ///
    /// Returns an empty-filter error when the filter holds no items.
    pub fn get_max(&self) -> Result<Item> {
        if self.heap().is_empty() {
            return Err(Error::empty_filter());
        }
        self.heap()
            .get_max()
            .ok_or_else(|| Error::internal("filter failed to retrieve max item"))
    }

    /// Returns a copy of the lowest-scored item.
    ///
    /// # Errors
    ///
    /// Returns an empty-filter error when the filter holds no items.
    pub fn get_min(&self) -> Result<Item> {
        if self.heap().is_empty() {
            return Err(Error::empty_filter());
        }
        self.heap()
            .get_min()
            .ok_or_else(|| Error::internal("filter failed to retrieve min item"))
    }

    /// Removes and returns the highest-scored item.
    ///
    /// # Errors
    ///
    /// Returns an empty-filter error when the filter holds no items.
    pub fn remove_max(&self) -> Result<Item> {
        if self.heap().is_empty() {
            return Err(Error::empty_filter());
        }
        self.heap()
            .remove_max()
            .ok_or_else(|| Error::internal("filter failed to remove max item"))
    }

    /// Removes and returns the lowest-scored item.
    ///
    /// # Errors
    ///
    /// Returns an empty-filter error when the filter holds no items.
    pub fn remove_min(&self) -> Result<Item> {
        if self.heap().is_empty() {
            return Err(Error::empty_filter());
        }
        self.heap()
            .remove_min()
            .ok_or_else(|| Error::internal("filter failed to remove min item"))
    }

    /// Current number of items.
    #[must_use]
    pub fn size(&self) -> usize {
        self.heap().len()
    }

    /// Drops every contained item.
    ///
    /// # Errors
    ///
    /// Returns an internal error if the heap reports failure, which a
    /// correct build never does.
    pub fn clear(&self) -> Result<()> {
        if self.heap().clear() {
            Ok(())
        } else {
            Err(Error::internal("filter failed to clear"))
        }
    }
}

impl std::fmt::Debug for Filter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Filter")
            .field("variant", &self.config.variant)
            .field("capacity", &self.config.capacity)
            .finish_non_exhaustive()
    }
}
