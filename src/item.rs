//! The unit of data held by the filter.

use serde::{Deserialize, Serialize};

/// A scored record admitted into the filter.
///
/// The score is used solely for ordering; the payload is an opaque byte
/// string the filter carries but never inspects. Items are immutable once
/// inserted — the heaps relocate them between slots but do not mutate
/// their contents.
///
/// NaN scores are not supported; ordering with NaN present is unspecified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    /// Ranking score. Higher scores are more valuable.
    pub score: f32,
    /// Opaque payload, never interpreted.
    pub data: Vec<u8>,
}

impl Item {
    /// Creates an item from a score and payload.
    #[must_use]
    pub fn new(score: f32, data: Vec<u8>) -> Self {
        Self { score, data }
    }

    /// Creates an item carrying only a score and an empty payload.
    ///
    /// Convenient in tests and benchmarks where the payload is irrelevant.
    #[must_use]
    pub fn from_score(score: f32) -> Self {
        Self {
            score,
            data: Vec::new(),
        }
    }
}
