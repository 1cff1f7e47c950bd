//! streamsieve: a bounded concurrent min–max priority filter.
//!
//! The filter is an in-memory ordered container of fixed capacity that
//! admits scored items, rejects items less valuable than its current
//! worst, and exposes constant-time access to both the highest- and
//! lowest-scored items plus logarithmic insert/remove. It serves many
//! concurrent producers and consumers; the [`heap`] module provides two
//! locking strategies (one coarse reader/writer lock, or per-node locks
//! with tag-chasing percolation) selected by configuration.
//!
//! The [`service`] module wraps the filter in a TCP wire protocol and an
//! HTTP front-end proxy; the `streamsieve` binary wires those to a CLI.
//!
//! # Example
//!
//! ```
//! use streamsieve::{Filter, FilterConfig, Item};
//!
//! let filter = Filter::new(FilterConfig::with_capacity(2))?;
//! filter.insert(Item::from_score(0.9))?;
//! filter.insert(Item::from_score(0.4))?;
//! // Full: 0.7 beats the current minimum 0.4, which is evicted.
//! filter.insert(Item::from_score(0.7))?;
//! assert_eq!(filter.get_max()?.score, 0.9);
//! assert_eq!(filter.get_min()?.score, 0.7);
//! # Ok::<(), streamsieve::Error>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod filter;
pub mod heap;
pub mod item;
pub mod service;

pub use config::{FilterConfig, Variant};
pub use error::{Error, ErrorKind, Result};
pub use filter::Filter;
pub use heap::MinMaxHeap;
pub use item::Item;
