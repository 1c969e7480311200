//! The model cache.
//!
//! A fast mirror of the current value of every model, tagged with the
//! position at which it was last updated. Correctness under concurrent
//! readers and writers rests on one rule, enforced in [`ModelCache::put`]:
//! a write is applied only if its position is not older than the existing
//! entry's. With that, two racing read-through fills, a write-through
//! update, and a background rebuild can interleave arbitrarily and the
//! highest-position value always survives.
//!
//! Cache failures never propagate: a poisoned lock degrades every lookup
//! to a miss and every write to a no-op, which is always correct, only
//! slower. Only `Present` values are cached — deletions invalidate, and
//! misses are never negatively cached.

use std::collections::{HashMap, VecDeque};
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use quorum_types::{FieldTable, Fqid, Position};

use crate::entry::CacheEntry;

/// Tunables for the model cache.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Maximum number of entries before insertion-order eviction kicks
    /// in. Zero disables the bound.
    pub capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { capacity: 100_000 }
    }
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<Fqid, CacheEntry>,
    /// Insertion order, for capacity eviction. Invalidated fqids linger
    /// here and are skipped when popped.
    order: VecDeque<Fqid>,
}

/// Position-tagged key-value mirror of model state.
pub struct ModelCache {
    state: RwLock<CacheState>,
    config: CacheConfig,
}

impl ModelCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            state: RwLock::new(CacheState::default()),
            config,
        }
    }

    /// Look up a model, requiring the entry to be at least as fresh as
    /// `min_position` when given. A staler entry is a miss, never served.
    pub fn get(&self, fqid: &Fqid, min_position: Option<Position>) -> Option<CacheEntry> {
        let state = match self.state.read() {
            Ok(state) => state,
            Err(_) => {
                warn!("cache lock poisoned, treating lookup as miss");
                return None;
            }
        };
        let entry = state.entries.get(fqid)?;
        if min_position.is_some_and(|min| entry.position < min) {
            return None;
        }
        Some(entry.clone())
    }

    /// Insert or overwrite an entry, subject to the monotonic-write rule:
    /// an entry is only replaced by one with an equal or newer position.
    ///
    /// Returns `true` if the value was applied. A rejected put is not an
    /// error — it means a concurrent fill or commit already wrote
    /// something fresher — so it is logged and swallowed.
    pub fn put(&self, fqid: &Fqid, fields: FieldTable, position: Position) -> bool {
        let mut state = match self.state.write() {
            Ok(state) => state,
            Err(_) => {
                warn!("cache lock poisoned, dropping put");
                return false;
            }
        };

        if let Some(existing) = state.entries.get(fqid) {
            if existing.position > position {
                debug!(
                    %fqid,
                    existing = existing.position,
                    incoming = position,
                    "stale cache put ignored"
                );
                return false;
            }
        } else {
            state.order.push_back(fqid.clone());
        }
        state
            .entries
            .insert(fqid.clone(), CacheEntry::new(fields, position));

        if self.config.capacity > 0 {
            while state.entries.len() > self.config.capacity {
                let Some(victim) = state.order.pop_front() else {
                    break;
                };
                if state.entries.remove(&victim).is_some() {
                    debug!(fqid = %victim, "cache entry evicted");
                }
            }
        }
        true
    }

    /// Drop one entry. Returns `true` if it was cached.
    pub fn invalidate(&self, fqid: &Fqid) -> bool {
        match self.state.write() {
            Ok(mut state) => state.entries.remove(fqid).is_some(),
            Err(_) => {
                warn!("cache lock poisoned, skipping invalidation");
                false
            }
        }
    }

    /// Drop every entry of one collection. Returns how many were dropped.
    pub fn invalidate_collection(&self, collection: &str) -> usize {
        match self.state.write() {
            Ok(mut state) => {
                let before = state.entries.len();
                state
                    .entries
                    .retain(|fqid, _| fqid.collection() != collection);
                before - state.entries.len()
            }
            Err(_) => {
                warn!("cache lock poisoned, skipping invalidation");
                0
            }
        }
    }

    /// Drop everything.
    pub fn clear(&self) {
        if let Ok(mut state) = self.state.write() {
            state.entries.clear();
            state.order.clear();
        }
    }

    pub fn len(&self) -> usize {
        self.state.read().map(|state| state.entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of all cached fqids, for tests and diagnostics.
    pub fn cached_fqids(&self) -> Vec<Fqid> {
        match self.state.read() {
            Ok(state) => {
                let mut fqids: Vec<Fqid> = state.entries.keys().cloned().collect();
                fqids.sort();
                fqids
            }
            Err(_) => Vec::new(),
        }
    }
}

impl Default for ModelCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

impl std::fmt::Debug for ModelCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelCache")
            .field("len", &self.len())
            .field("capacity", &self.config.capacity)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::{json, Value};

    fn fqid(s: &str) -> Fqid {
        s.parse().unwrap()
    }

    fn fields(pairs: &[(&str, Value)]) -> FieldTable {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn unbounded() -> ModelCache {
        ModelCache::new(CacheConfig { capacity: 0 })
    }

    #[test]
    fn put_and_get() {
        let cache = unbounded();
        assert!(cache.get(&fqid("a/1"), None).is_none());

        cache.put(&fqid("a/1"), fields(&[("f", json!(1))]), 3);
        let entry = cache.get(&fqid("a/1"), None).unwrap();
        assert_eq!(entry.fields, fields(&[("f", json!(1))]));
        assert_eq!(entry.position, 3);
    }

    #[test]
    fn stale_entry_is_a_miss() {
        let cache = unbounded();
        cache.put(&fqid("a/1"), fields(&[("f", json!(1))]), 3);

        assert!(cache.get(&fqid("a/1"), Some(3)).is_some());
        assert!(cache.get(&fqid("a/1"), Some(4)).is_none());
        // The entry itself is kept; a fresher put can still supersede it.
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn monotonic_write_rule() {
        let cache = unbounded();
        assert!(cache.put(&fqid("a/1"), fields(&[("f", json!("new"))]), 5));
        // Older position loses regardless of arrival order.
        assert!(!cache.put(&fqid("a/1"), fields(&[("f", json!("old"))]), 4));

        let entry = cache.get(&fqid("a/1"), None).unwrap();
        assert_eq!(entry.fields, fields(&[("f", json!("new"))]));
        assert_eq!(entry.position, 5);
    }

    #[test]
    fn equal_position_overwrites() {
        let cache = unbounded();
        cache.put(&fqid("a/1"), fields(&[("f", json!(1))]), 5);
        assert!(cache.put(&fqid("a/1"), fields(&[("f", json!(2))]), 5));
        assert_eq!(
            cache.get(&fqid("a/1"), None).unwrap().fields,
            fields(&[("f", json!(2))])
        );
    }

    #[test]
    fn invalidate_single() {
        let cache = unbounded();
        cache.put(&fqid("a/1"), FieldTable::new(), 1);
        assert!(cache.invalidate(&fqid("a/1")));
        assert!(!cache.invalidate(&fqid("a/1")));
        assert!(cache.get(&fqid("a/1"), None).is_none());
    }

    #[test]
    fn invalidate_collection_is_scoped() {
        let cache = unbounded();
        cache.put(&fqid("a/1"), FieldTable::new(), 1);
        cache.put(&fqid("a/2"), FieldTable::new(), 1);
        cache.put(&fqid("b/1"), FieldTable::new(), 1);

        assert_eq!(cache.invalidate_collection("a"), 2);
        assert_eq!(cache.len(), 1);
        assert!(cache.get(&fqid("b/1"), None).is_some());
    }

    #[test]
    fn clear_empties_the_cache() {
        let cache = unbounded();
        cache.put(&fqid("a/1"), FieldTable::new(), 1);
        cache.put(&fqid("b/1"), FieldTable::new(), 2);
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn capacity_evicts_oldest_inserted() {
        let cache = ModelCache::new(CacheConfig { capacity: 2 });
        cache.put(&fqid("a/1"), FieldTable::new(), 1);
        cache.put(&fqid("a/2"), FieldTable::new(), 2);
        cache.put(&fqid("a/3"), FieldTable::new(), 3);

        assert_eq!(cache.len(), 2);
        assert!(cache.get(&fqid("a/1"), None).is_none());
        assert!(cache.get(&fqid("a/2"), None).is_some());
        assert!(cache.get(&fqid("a/3"), None).is_some());
    }

    #[test]
    fn eviction_skips_invalidated_entries() {
        let cache = ModelCache::new(CacheConfig { capacity: 2 });
        cache.put(&fqid("a/1"), FieldTable::new(), 1);
        cache.put(&fqid("a/2"), FieldTable::new(), 2);
        cache.invalidate(&fqid("a/1"));

        cache.put(&fqid("a/3"), FieldTable::new(), 3);
        cache.put(&fqid("a/4"), FieldTable::new(), 4);

        // a/1 was already gone; a/2 is the one evicted.
        assert_eq!(cache.cached_fqids(), vec![fqid("a/3"), fqid("a/4")]);
    }

    #[test]
    fn concurrent_puts_highest_position_wins() {
        use std::sync::Arc;
        use std::thread;

        let cache = Arc::new(unbounded());
        let mut handles = Vec::new();
        for position in 1..=16u64 {
            let cache = Arc::clone(&cache);
            handles.push(thread::spawn(move || {
                cache.put(
                    &fqid("a/1"),
                    fields(&[("p", json!(position))]),
                    position,
                );
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        let entry = cache.get(&fqid("a/1"), None).unwrap();
        assert_eq!(entry.position, 16);
        assert_eq!(entry.fields, fields(&[("p", json!(16))]));
    }

    // Property: after any sequence of puts, the cache holds the value of
    // the highest-position put (last wins among equals).
    proptest! {
        #[test]
        fn prop_highest_position_survives(
            positions in proptest::collection::vec(1u64..50, 1..30)
        ) {
            let cache = unbounded();
            for (index, position) in positions.iter().enumerate() {
                cache.put(
                    &fqid("a/1"),
                    fields(&[("index", json!(index))]),
                    *position,
                );
            }

            let max = *positions.iter().max().unwrap();
            let last_max_index = positions
                .iter()
                .enumerate()
                .filter(|(_, p)| **p == max)
                .map(|(i, _)| i)
                .last()
                .unwrap();

            let entry = cache.get(&fqid("a/1"), None).unwrap();
            prop_assert_eq!(entry.position, max);
            prop_assert_eq!(entry.fields, fields(&[("index", json!(last_max_index))]));
        }
    }
}
