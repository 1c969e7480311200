use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use quorum_types::{Event, Fqid, Position, PositionInfo, WriteBatch};

use crate::error::StoreResult;
use crate::projection::ModelState;

/// Caller-supplied expectations for the optimistic concurrency check:
/// the last position the caller observed for each fqid, or `None` for an
/// fqid that must not exist yet.
pub type ExpectedPositions = BTreeMap<Fqid, Option<Position>>;

/// Per-commit metadata persisted with the assigned position.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CommitMeta {
    pub user_id: i64,
    pub information: Value,
}

impl Default for CommitMeta {
    fn default() -> Self {
        Self {
            user_id: 0,
            information: Value::Null,
        }
    }
}

/// The durable layer: full write history keyed by fqid and position.
///
/// All implementations must satisfy these invariants:
/// - A batch commits atomically at exactly one new position, or not at
///   all. No partial writes are ever visible.
/// - Positions are strictly increasing and never reused; an aborted
///   commit does not advance them observably.
/// - Events are immutable once committed. Deletion marks a model as
///   logically absent but never purges its history (restore and audit
///   depend on retention).
/// - `current` equals the fold of `get_events` in (position, weight)
///   order, for any fqid at any time.
/// - The commit's expected-position check is the sole linearization
///   point; advisory locking above the store is an optimization only.
pub trait EventStore: Send + Sync {
    /// Atomically append a batch at a fresh position.
    ///
    /// For every fqid with an entry in `expected`, the store's current
    /// last position for that fqid must match, else the whole batch fails
    /// with `ConcurrencyConflict` naming every offending fqid. Fqids
    /// touched by the batch but absent from `expected` skip the check
    /// (structural rules still apply).
    fn commit(
        &self,
        batch: &WriteBatch,
        expected: &ExpectedPositions,
        meta: &CommitMeta,
    ) -> StoreResult<Position>;

    /// Ordered history of one fqid, restricted to events strictly after
    /// `since` when given. Used for cache rebuild and audit.
    fn get_events(&self, fqid: &Fqid, since: Option<Position>) -> StoreResult<Vec<Event>>;

    /// The model's current state: the fold of its history.
    fn current(&self, fqid: &Fqid) -> StoreResult<ModelState>;

    /// `true` if the model exists and is not deleted.
    fn exists(&self, fqid: &Fqid) -> StoreResult<bool> {
        Ok(self.current(fqid)?.is_present())
    }

    /// All fqids of one collection with any history, deleted included.
    fn collection_fqids(&self, collection: &str) -> StoreResult<Vec<Fqid>>;

    /// Every fqid with any history, across all collections.
    fn all_fqids(&self) -> StoreResult<Vec<Fqid>>;

    /// Metadata of every position that touched the fqid, in order.
    fn history_information(&self, fqid: &Fqid) -> StoreResult<Vec<PositionInfo>>;

    /// The highest committed position (0 for an empty store).
    fn max_position(&self) -> StoreResult<Position>;

    /// Reserve `amount` fresh ids for a collection. Reserved ids are
    /// never handed out again, used or not.
    fn reserve_ids(&self, collection: &str, amount: usize) -> StoreResult<Vec<i64>>;

    /// Drop all state including sequences. Test/dev tooling only.
    fn truncate(&self) -> StoreResult<()>;
}
