//! Position-tagged model cache for the quorum datastore.
//!
//! - [`ModelCache`] — concurrent key-value mirror of current model state
//! - [`CacheEntry`] — field table plus the position it was computed at
//! - [`rebuild`] — full replay from an event store, safe against live
//!   traffic
//!
//! The cache is an optimization, never an authority: every operation
//! degrades to "miss" or "no-op" rather than failing a request, and the
//! monotonic-write rule resolves all write races by position comparison
//! alone, with no locking imposed on callers.

pub mod cache;
pub mod entry;
pub mod rebuild;

pub use cache::{CacheConfig, ModelCache};
pub use entry::CacheEntry;
pub use rebuild::rebuild;
