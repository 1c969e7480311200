//! Read service of the quorum datastore.
//!
//! - [`Reader`] — cache-first get/get_many/get_all, filtered scans,
//!   exists, count/min/max aggregates, and history metadata
//! - [`Filter`] — comparison + and/or/not predicate language for bulk
//!   queries
//!
//! The reader never mutates store state and never takes locks; its only
//! side effect is populating cache entries, which the cache's
//! monotonic-write rule makes safe under any interleaving with writers.

pub mod error;
pub mod filter;
pub mod service;

pub use error::{ReaderError, ReaderResult};
pub use filter::{compare_values, Filter, FilterOperator};
pub use service::{Reader, ReaderConfig};
