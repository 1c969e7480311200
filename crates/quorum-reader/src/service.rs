//! The reader service.
//!
//! Stateless per request: every query consults the cache first and falls
//! back to the store on miss, filling the cache as a side effect. Reads
//! never acquire locks and never mutate store state; the cache's
//! monotonic-write rule is what keeps concurrent fills safe.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use quorum_cache::ModelCache;
use quorum_store::{EventStore, ModelState};
use quorum_types::{validate_collection, FieldTable, Fqid, PositionInfo};

use crate::error::ReaderResult;
use crate::filter::{compare_values, Filter};

/// Tunables for the reader.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReaderConfig {
    /// Populate the cache on single-model misses (read-through fill).
    pub fill_cache_on_read: bool,
    /// Populate per-model entries while scanning for bulk queries.
    /// A pure tunable; the monotonic-write rule makes either choice safe.
    pub fill_cache_on_filter: bool,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            fill_cache_on_read: true,
            fill_cache_on_filter: true,
        }
    }
}

/// Answers read queries against the store and cache. Never mutates
/// anything except cache entries.
pub struct Reader {
    store: Arc<dyn EventStore>,
    cache: Arc<ModelCache>,
    config: ReaderConfig,
}

impl Reader {
    pub fn new(store: Arc<dyn EventStore>, cache: Arc<ModelCache>) -> Self {
        Self::with_config(store, cache, ReaderConfig::default())
    }

    pub fn with_config(
        store: Arc<dyn EventStore>,
        cache: Arc<ModelCache>,
        config: ReaderConfig,
    ) -> Self {
        Self {
            store,
            cache,
            config,
        }
    }

    /// Current state of one model: cache lookup, store fallback, fill.
    pub fn get(&self, fqid: &Fqid) -> ReaderResult<ModelState> {
        if let Some(entry) = self.cache.get(fqid, None) {
            return Ok(ModelState::Present {
                fields: entry.fields,
                position: entry.position,
            });
        }

        let state = self.store.current(fqid)?;
        if self.config.fill_cache_on_read {
            if let ModelState::Present { fields, position } = &state {
                debug!(%fqid, position, "read-through cache fill");
                self.cache.put(fqid, fields.clone(), *position);
            }
        }
        Ok(state)
    }

    /// States of several models at once.
    pub fn get_many(&self, fqids: &[Fqid]) -> ReaderResult<BTreeMap<Fqid, ModelState>> {
        let mut result = BTreeMap::new();
        for fqid in fqids {
            result.insert(fqid.clone(), self.get(fqid)?);
        }
        Ok(result)
    }

    /// Every present model of a collection.
    pub fn get_all(&self, collection: &str) -> ReaderResult<BTreeMap<Fqid, FieldTable>> {
        self.scan(collection, None)
    }

    /// Present models of a collection matching a filter.
    ///
    /// Bulk queries consult the store directly — the cache is keyed by
    /// fqid, not by query shape — but may still populate per-model cache
    /// entries on the way through.
    pub fn filter(
        &self,
        collection: &str,
        filter: &Filter,
    ) -> ReaderResult<BTreeMap<Fqid, FieldTable>> {
        self.scan(collection, Some(filter))
    }

    /// `true` if the model exists and is not deleted.
    pub fn exists(&self, fqid: &Fqid) -> ReaderResult<bool> {
        Ok(self.get(fqid)?.is_present())
    }

    /// Number of present models in a collection matching the filter
    /// (all of them when no filter is given).
    pub fn count(&self, collection: &str, filter: Option<&Filter>) -> ReaderResult<usize> {
        Ok(self.scan(collection, filter)?.len())
    }

    /// Smallest value of `field` over matching models. Models without an
    /// orderable value for the field are skipped.
    pub fn min(
        &self,
        collection: &str,
        filter: Option<&Filter>,
        field: &str,
    ) -> ReaderResult<Option<Value>> {
        self.aggregate(collection, filter, field, std::cmp::Ordering::Less)
    }

    /// Largest value of `field` over matching models.
    pub fn max(
        &self,
        collection: &str,
        filter: Option<&Filter>,
        field: &str,
    ) -> ReaderResult<Option<Value>> {
        self.aggregate(collection, filter, field, std::cmp::Ordering::Greater)
    }

    /// Position metadata of every batch that touched the model.
    pub fn history_information(&self, fqid: &Fqid) -> ReaderResult<Vec<PositionInfo>> {
        Ok(self.store.history_information(fqid)?)
    }

    fn aggregate(
        &self,
        collection: &str,
        filter: Option<&Filter>,
        field: &str,
        keep_when: std::cmp::Ordering,
    ) -> ReaderResult<Option<Value>> {
        let models = self.scan(collection, filter)?;
        let mut best: Option<Value> = None;
        for fields in models.values() {
            let Some(candidate) = fields.get(field) else {
                continue;
            };
            match &best {
                None => {
                    // Only orderable values participate at all.
                    if matches!(candidate, Value::Number(_) | Value::String(_)) {
                        best = Some(candidate.clone());
                    }
                }
                Some(current) => {
                    if compare_values(candidate, current) == Some(keep_when) {
                        best = Some(candidate.clone());
                    }
                }
            }
        }
        Ok(best)
    }

    fn scan(
        &self,
        collection: &str,
        filter: Option<&Filter>,
    ) -> ReaderResult<BTreeMap<Fqid, FieldTable>> {
        validate_collection(collection)?;
        let mut result = BTreeMap::new();
        for fqid in self.store.collection_fqids(collection)? {
            let ModelState::Present { fields, position } = self.store.current(&fqid)? else {
                continue;
            };
            if filter.is_some_and(|filter| !filter.matches(&fields)) {
                continue;
            }
            if self.config.fill_cache_on_filter {
                self.cache.put(&fqid, fields.clone(), position);
            }
            result.insert(fqid, fields);
        }
        Ok(result)
    }
}

impl std::fmt::Debug for Reader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reader")
            .field("config", &self.config)
            .finish()
    }
}
