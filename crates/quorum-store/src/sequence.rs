//! Position and id sequences.
//!
//! Both sequences are owned by the store's state and only ever advanced
//! inside its write section, so assignment and durability are atomic: no
//! position is handed out without a committed batch, and an aborted
//! commit never advances the counter observably.

use std::collections::BTreeMap;

use quorum_types::Position;

/// Assigns a strictly increasing position to every committing batch.
///
/// `next_position` must be called exactly once per commit, under the same
/// write section that appends the batch. Callers serialize through the
/// store's transactional guarantees, never through this struct itself.
#[derive(Debug, Default)]
pub struct PositionSequencer {
    last: Position,
}

impl PositionSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next position. First call returns 1.
    pub fn next_position(&mut self) -> Position {
        self.last += 1;
        self.last
    }

    /// The highest position assigned so far (0 before the first commit).
    pub fn current(&self) -> Position {
        self.last
    }

    pub fn reset(&mut self) {
        self.last = 0;
    }
}

/// Per-collection id sequences backing `reserve_ids`.
///
/// Each collection counts from 1; reserving `n` ids returns the next `n`
/// free ids and advances the sequence past them. Ids are never handed out
/// twice, even if the reservation is never used.
#[derive(Debug, Default)]
pub struct IdSequences {
    next_free: BTreeMap<String, i64>,
}

impl IdSequences {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve `amount` ids for `collection`.
    pub fn reserve(&mut self, collection: &str, amount: usize) -> Vec<i64> {
        let next = self.next_free.entry(collection.to_string()).or_insert(1);
        let start = *next;
        *next += amount as i64;
        (start..start + amount as i64).collect()
    }

    /// Record that `id` is in use, so future reservations skip past it.
    /// Needed when clients create models with self-chosen ids.
    pub fn observe(&mut self, collection: &str, id: i64) {
        let next = self.next_free.entry(collection.to_string()).or_insert(1);
        if id >= *next {
            *next = id + 1;
        }
    }

    pub fn reset(&mut self) {
        self.next_free.clear();
    }
}
