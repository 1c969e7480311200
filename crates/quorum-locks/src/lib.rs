//! Advisory locking for the quorum writer.
//!
//! The [`LockManager`] serializes write requests that touch overlapping
//! models while letting unrelated writes run fully in parallel:
//! - [`LockScope`] — one model, or a whole collection for bulk work
//! - TTL expiry frees locks left behind by crashed holders
//! - Bounded-wait acquisition reports [`LockError::Busy`] instead of
//!   waiting indefinitely
//! - [`LockGuard`] releases on drop, on every exit path
//!
//! Locking here is an optimization, not the correctness guard: a stale
//! holder that survives expiry is stopped by the store's
//! expected-position check at commit time.

pub mod error;
pub mod manager;
pub mod scope;

pub use error::{LockError, LockResult};
pub use manager::{LockConfig, LockGuard, LockManager};
pub use scope::LockScope;
