//! Durable layer of the quorum datastore.
//!
//! This crate is the heart of quorum. It provides:
//! - The [`EventStore`] trait boundary: atomic multi-model commit with
//!   expected-position checks, history reads, and the current-state fold
//! - [`PositionSequencer`] / [`IdSequences`] — commit-scoped counters
//! - [`FoldState`] / [`fold`] — the deterministic event fold
//! - [`InMemoryEventStore`] — reference backend for tests and embedding
//!
//! # Design Rules
//!
//! 1. A batch commits at exactly one position or not at all; no partial
//!    writes are ever visible.
//! 2. Positions are assigned inside the commit transaction. An aborted
//!    commit never advances the sequence observably.
//! 3. Events are immutable and never purged; deletion is a logical mark
//!    so history replay and restore keep working.
//! 4. `current` is definitionally the fold of `get_events`; backends
//!    may materialize it but must never let the two diverge.
//! 5. The expected-position check at commit is the one true
//!    linearization point of the whole system.

pub mod error;
pub mod memory;
pub mod projection;
pub mod sequence;
pub mod traits;

pub use error::{PositionConflict, StoreError, StoreResult};
pub use memory::InMemoryEventStore;
pub use projection::{fold, FoldState, ModelState};
pub use sequence::{IdSequences, PositionSequencer};
pub use traits::{CommitMeta, EventStore, ExpectedPositions};
