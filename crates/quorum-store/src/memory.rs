//! In-memory event store for tests, local demos, and embedding.
//!
//! All state lives behind one `RwLock`; holding its write guard is the
//! commit transaction. A relational deployment would replace this with a
//! database transaction and a `SEQUENCE`, behind the same trait.

use std::collections::BTreeMap;
use std::sync::RwLock;

use chrono::Utc;
use tracing::debug;

use quorum_types::{validate_collection, Event, Fqid, Position, PositionInfo, WriteBatch};

use crate::error::{PositionConflict, StoreError, StoreResult};
use crate::projection::{FoldState, ModelState};
use crate::sequence::{IdSequences, PositionSequencer};
use crate::traits::{CommitMeta, EventStore, ExpectedPositions};

#[derive(Default)]
struct StoreState {
    sequencer: PositionSequencer,
    id_sequences: IdSequences,
    positions: BTreeMap<Position, PositionInfo>,
    events: BTreeMap<Fqid, Vec<Event>>,
    /// Materialized current state, maintained through the same fold that
    /// replay uses, so `current` and replay cannot diverge.
    models: BTreeMap<Fqid, FoldState>,
}

/// In-memory [`EventStore`] implementation.
pub struct InMemoryEventStore {
    inner: RwLock<StoreState>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(StoreState::default()),
        }
    }

    fn read(&self) -> StoreResult<std::sync::RwLockReadGuard<'_, StoreState>> {
        self.inner
            .read()
            .map_err(|_| StoreError::Unavailable("store lock poisoned".into()))
    }

    fn write(&self) -> StoreResult<std::sync::RwLockWriteGuard<'_, StoreState>> {
        self.inner
            .write()
            .map_err(|_| StoreError::Unavailable("store lock poisoned".into()))
    }

    /// Number of fqids with any history.
    pub fn model_count(&self) -> usize {
        self.inner.read().map(|s| s.models.len()).unwrap_or(0)
    }
}

impl Default for InMemoryEventStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InMemoryEventStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryEventStore")
            .field("model_count", &self.model_count())
            .finish()
    }
}

impl EventStore for InMemoryEventStore {
    fn commit(
        &self,
        batch: &WriteBatch,
        expected: &ExpectedPositions,
        meta: &CommitMeta,
    ) -> StoreResult<Position> {
        if batch.is_empty() {
            return Err(StoreError::EmptyBatch);
        }
        batch.validate()?;

        let mut guard = self.write()?;
        let state = &mut *guard;

        // Optimistic concurrency check first: collect every mismatch so
        // the caller learns all offending fqids at once.
        let mut conflicts = Vec::new();
        for (fqid, expected_position) in expected {
            let actual = state.models.get(fqid).map(FoldState::position);
            if actual != *expected_position {
                conflicts.push(PositionConflict {
                    fqid: fqid.clone(),
                    expected: *expected_position,
                    actual,
                });
            }
        }
        if !conflicts.is_empty() {
            return Err(StoreError::ConcurrencyConflict { conflicts });
        }

        // Fold the batch against a scratch copy of the touched models.
        // Any structural violation aborts here, before the sequencer or
        // any durable structure is touched.
        let provisional = state.sequencer.current() + 1;
        let mut scratch: BTreeMap<Fqid, FoldState> = BTreeMap::new();
        for event in &batch.events {
            let fold = scratch.entry(event.fqid.clone()).or_insert_with(|| {
                state
                    .models
                    .get(&event.fqid)
                    .cloned()
                    .unwrap_or_else(FoldState::absent)
            });
            fold.apply(&event.fqid, &event.payload, provisional)?;
        }

        // Point of no return: assign the position and install the batch.
        let position = state.sequencer.next_position();
        state.positions.insert(
            position,
            PositionInfo {
                position,
                timestamp: Utc::now(),
                user_id: meta.user_id,
                information: meta.information.clone(),
            },
        );
        for (weight, event) in batch.events.iter().enumerate() {
            state.events.entry(event.fqid.clone()).or_default().push(Event {
                fqid: event.fqid.clone(),
                payload: event.payload.clone(),
                position,
                weight: weight as u32,
            });
        }
        for (fqid, fold) in scratch {
            state
                .id_sequences
                .observe(fqid.collection(), fqid.id());
            state.models.insert(fqid, fold);
        }

        debug!(position, events = batch.len(), "batch committed");
        Ok(position)
    }

    fn get_events(&self, fqid: &Fqid, since: Option<Position>) -> StoreResult<Vec<Event>> {
        let state = self.read()?;
        let events = state.events.get(fqid).cloned().unwrap_or_default();
        match since {
            None => Ok(events),
            Some(since) => Ok(events
                .into_iter()
                .filter(|event| event.position > since)
                .collect()),
        }
    }

    fn current(&self, fqid: &Fqid) -> StoreResult<ModelState> {
        let state = self.read()?;
        Ok(state
            .models
            .get(fqid)
            .map(FoldState::to_model_state)
            .unwrap_or(ModelState::NotFound))
    }

    fn collection_fqids(&self, collection: &str) -> StoreResult<Vec<Fqid>> {
        validate_collection(collection)?;
        let state = self.read()?;
        Ok(state
            .models
            .keys()
            .filter(|fqid| fqid.collection() == collection)
            .cloned()
            .collect())
    }

    fn all_fqids(&self) -> StoreResult<Vec<Fqid>> {
        let state = self.read()?;
        Ok(state.models.keys().cloned().collect())
    }

    fn history_information(&self, fqid: &Fqid) -> StoreResult<Vec<PositionInfo>> {
        let state = self.read()?;
        let Some(events) = state.events.get(fqid) else {
            return Ok(Vec::new());
        };
        let mut infos = Vec::new();
        let mut last = None;
        for event in events {
            if last == Some(event.position) {
                continue;
            }
            last = Some(event.position);
            if let Some(info) = state.positions.get(&event.position) {
                infos.push(info.clone());
            }
        }
        Ok(infos)
    }

    fn max_position(&self) -> StoreResult<Position> {
        Ok(self.read()?.sequencer.current())
    }

    fn reserve_ids(&self, collection: &str, amount: usize) -> StoreResult<Vec<i64>> {
        validate_collection(collection)?;
        if amount == 0 {
            return Err(StoreError::InvalidAmount);
        }
        let mut state = self.write()?;
        Ok(state.id_sequences.reserve(collection, amount))
    }

    fn truncate(&self) -> StoreResult<()> {
        let mut state = self.write()?;
        state.sequencer.reset();
        state.id_sequences.reset();
        state.positions.clear();
        state.events.clear();
        state.models.clear();
        Ok(())
    }
}
