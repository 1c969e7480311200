//! The writer service.
//!
//! Every write request runs the same state machine:
//! receive → acquire locks → resolve expected positions → commit →
//! update cache → notify → release locks (guards drop on every exit
//! path, success or error).
//!
//! The store's expected-position check at commit is the authoritative
//! concurrency guard; the locks only serialize overlapping requests so
//! doomed commits don't waste work. A `ConcurrencyConflict` is surfaced
//! to the caller unchanged — never retried silently.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use uuid::Uuid;

use quorum_cache::ModelCache;
use quorum_locks::{LockConfig, LockManager, LockScope};
use quorum_store::{CommitMeta, EventStore, FoldState, ModelState};
use quorum_types::{Fqid, Position, WriteBatch, WriteEvent};

use crate::error::WriterResult;
use crate::notify::{ChangeNotifier, WriteNotification};
use crate::request::WriteRequest;

/// Tunables for the writer.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WriterConfig {
    pub locks: LockConfig,
    /// Capacity of the per-subscriber notification channel.
    pub channel_capacity: usize,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            locks: LockConfig::default(),
            channel_capacity: 1024,
        }
    }
}

/// Accepts write requests, validates them against expected positions,
/// commits through the event store, and keeps the cache and subscribers
/// in step.
pub struct Writer {
    store: Arc<dyn EventStore>,
    cache: Arc<ModelCache>,
    locks: LockManager,
    notifier: ChangeNotifier,
}

impl Writer {
    pub fn new(store: Arc<dyn EventStore>, cache: Arc<ModelCache>) -> Self {
        Self::with_config(store, cache, WriterConfig::default())
    }

    pub fn with_config(
        store: Arc<dyn EventStore>,
        cache: Arc<ModelCache>,
        config: WriterConfig,
    ) -> Self {
        Self {
            store,
            cache,
            locks: LockManager::new(config.locks),
            notifier: ChangeNotifier::new(config.channel_capacity),
        }
    }

    /// The lock manager, shared with bulk tooling that needs
    /// collection-level locks around multi-request operations.
    pub fn locks(&self) -> &LockManager {
        &self.locks
    }

    /// Subscribe to committed-write notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<WriteNotification> {
        self.notifier.subscribe()
    }

    /// Process one write request and return the committed position.
    pub fn write(&self, request: WriteRequest) -> WriterResult<Position> {
        let batch = WriteBatch::new(request.events);
        batch.validate()?;

        let fqids = batch.touched_fqids();
        let holder = Uuid::now_v7();
        let scopes: Vec<LockScope> = fqids.iter().cloned().map(LockScope::Model).collect();
        // Guards release on drop, covering every exit path below.
        let _guards = self.locks.acquire_all(scopes, holder)?;

        // Expected positions come from the request where the client
        // supplied them; the rest are read from current store state.
        // Under our locks that state cannot move before the commit, and
        // a stale holder racing us past an expired lock is still caught
        // by the store's check.
        let mut expected = request.expected_positions;
        for fqid in &fqids {
            if !expected.contains_key(fqid) {
                expected.insert(fqid.clone(), self.store.current(fqid)?.position());
            }
        }

        let meta = CommitMeta {
            user_id: request.user_id,
            information: request.information,
        };
        let position = self.store.commit(&batch, &expected, &meta)?;

        let modified = self.update_cache(&batch, position);
        self.notifier.publish(WriteNotification {
            position,
            user_id: meta.user_id,
            modified,
        });

        info!(position, models = fqids.len(), "write committed");
        Ok(position)
    }

    /// Reserve fresh ids for client-side model creation.
    pub fn reserve_ids(&self, collection: &str, amount: usize) -> WriterResult<Vec<i64>> {
        let ids = self.store.reserve_ids(collection, amount)?;
        debug!(collection, amount, "ids reserved");
        Ok(ids)
    }

    /// Drop all datastore state. Test/dev tooling only.
    pub fn truncate(&self) -> WriterResult<()> {
        self.store.truncate()?;
        self.cache.clear();
        info!("datastore truncated");
        Ok(())
    }

    /// Write-through cache maintenance after a successful commit.
    ///
    /// For each touched model the new table is computed by folding only
    /// the batch's events onto the cached value — no full replay. A model
    /// that was not cached stays uncached (no negative caching, and no
    /// risk of racing a not-yet-visible commit); deletions invalidate.
    /// Returns the modified-fields map for the notification.
    fn update_cache(
        &self,
        batch: &WriteBatch,
        position: Position,
    ) -> BTreeMap<Fqid, Vec<String>> {
        let mut grouped: BTreeMap<Fqid, Vec<&WriteEvent>> = BTreeMap::new();
        for event in &batch.events {
            grouped.entry(event.fqid.clone()).or_default().push(event);
        }

        let mut all_modified = BTreeMap::new();
        for (fqid, events) in grouped {
            let cached = self.cache.get(&fqid, None);
            let from_cache = cached.is_some();
            let mut fold = match cached {
                Some(entry) => FoldState::from_present(entry.fields, entry.position),
                // Not cached: replay pre-batch history once, so delete/
                // restore notifications can still name the model's fields.
                None => self.pre_batch_state(&fqid, position),
            };

            let mut modified = BTreeSet::new();
            let mut fold_failed = false;
            for event in events {
                match event.payload.modified_fields() {
                    Some(names) => modified.extend(names),
                    // Delete/restore touch the whole table.
                    None => modified.extend(fold.fields().keys().cloned()),
                }
                if let Err(err) = fold.apply(&fqid, &event.payload, position) {
                    // The commit itself folded cleanly, so this means the
                    // cached base was inconsistent. Drop the entry; the
                    // next read repairs it from the store.
                    warn!(%fqid, %err, "cache fold diverged, invalidating entry");
                    fold_failed = true;
                    break;
                }
            }

            if fold_failed {
                self.cache.invalidate(&fqid);
            } else {
                match fold.into_model_state() {
                    ModelState::Deleted { .. } => {
                        self.cache.invalidate(&fqid);
                    }
                    ModelState::Present { fields, position } if from_cache => {
                        self.cache.put(&fqid, fields, position);
                    }
                    // Present but previously uncached: left for
                    // read-through fill. NotFound cannot follow a commit.
                    _ => {}
                }
            }

            all_modified.insert(fqid, modified.into_iter().collect());
        }
        all_modified
    }

    /// Fold the model's history up to (excluding) `position`.
    fn pre_batch_state(&self, fqid: &Fqid, position: Position) -> FoldState {
        let mut fold = FoldState::absent();
        let Ok(events) = self.store.get_events(fqid, None) else {
            return FoldState::absent();
        };
        for event in events.iter().filter(|event| event.position < position) {
            if fold.apply(fqid, &event.payload, event.position).is_err() {
                return FoldState::absent();
            }
        }
        fold
    }
}

impl std::fmt::Debug for Writer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Writer")
            .field("locks", &self.locks)
            .field("notifier", &self.notifier)
            .finish()
    }
}
