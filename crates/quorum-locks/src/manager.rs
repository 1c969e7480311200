//! The lock manager.
//!
//! Locks are advisory but mandatory by convention: the writer must hold a
//! lock for every model in its batch before committing. They are not the
//! source of correctness — the store's expected-position check is — they
//! only keep doomed commits from wasting work. TTL expiry protects
//! against crashed holders; a stale holder that comes back and commits is
//! caught by the position check, never by the lock table.

use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use quorum_types::Fqid;

use crate::error::{LockError, LockResult};
use crate::scope::LockScope;

/// Tunables for lock acquisition.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LockConfig {
    /// How long a granted lock is binding before expiry frees it.
    pub ttl: Duration,
    /// Upper bound on how long `acquire` waits before reporting busy.
    pub acquire_timeout: Duration,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(30),
            acquire_timeout: Duration::from_secs(1),
        }
    }
}

#[derive(Clone, Debug)]
struct HeldLock {
    holder: Uuid,
    expires_at: Instant,
}

impl HeldLock {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at <= now
    }
}

#[derive(Default)]
struct LockTable {
    models: HashMap<Fqid, HeldLock>,
    collections: HashMap<String, HeldLock>,
}

impl LockTable {
    fn purge_expired(&mut self, now: Instant) {
        self.models.retain(|_, lock| !lock.is_expired(now));
        self.collections.retain(|_, lock| !lock.is_expired(now));
    }

    /// A scope is free for `holder` if every live conflicting lock is
    /// already held by that same holder (re-entrant per holder).
    fn is_free_for(&self, scope: &LockScope, holder: Uuid, now: Instant) -> bool {
        let blocking = |lock: &HeldLock| !lock.is_expired(now) && lock.holder != holder;
        match scope {
            LockScope::Model(fqid) => {
                !self.models.get(fqid).is_some_and(blocking)
                    && !self
                        .collections
                        .get(fqid.collection())
                        .is_some_and(blocking)
            }
            LockScope::Collection(collection) => {
                !self.collections.get(collection).is_some_and(blocking)
                    && !self
                        .models
                        .iter()
                        .any(|(fqid, lock)| fqid.collection() == collection && blocking(lock))
            }
        }
    }

    fn insert(&mut self, scope: &LockScope, lock: HeldLock) {
        match scope {
            LockScope::Model(fqid) => {
                self.models.insert(fqid.clone(), lock);
            }
            LockScope::Collection(collection) => {
                self.collections.insert(collection.clone(), lock);
            }
        }
    }

    /// Remove the lock if it is still owned by `holder`. Expired locks
    /// may have been reclaimed by someone else in the meantime; releasing
    /// a reclaimed scope must not free the new owner's lock.
    fn release(&mut self, scope: &LockScope, holder: Uuid) -> bool {
        match scope {
            LockScope::Model(fqid) => match self.models.get(fqid) {
                Some(lock) if lock.holder == holder => {
                    self.models.remove(fqid);
                    true
                }
                _ => false,
            },
            LockScope::Collection(collection) => match self.collections.get(collection) {
                Some(lock) if lock.holder == holder => {
                    self.collections.remove(collection);
                    true
                }
                _ => false,
            },
        }
    }
}

struct Inner {
    table: Mutex<LockTable>,
    freed: Condvar,
    config: LockConfig,
}

impl Inner {
    fn lock_table(&self) -> LockResult<MutexGuard<'_, LockTable>> {
        self.table
            .lock()
            .map_err(|_| LockError::Unavailable("lock table poisoned".into()))
    }
}

/// Grants short-lived per-model and per-collection locks to writers so
/// that overlapping write requests serialize while unrelated ones run in
/// parallel.
#[derive(Clone)]
pub struct LockManager {
    inner: Arc<Inner>,
}

impl LockManager {
    pub fn new(config: LockConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                table: Mutex::new(LockTable::default()),
                freed: Condvar::new(),
                config,
            }),
        }
    }

    pub fn config(&self) -> &LockConfig {
        &self.inner.config
    }

    /// Acquire one scope for `holder` with the configured TTL, waiting up
    /// to the configured timeout. Returns a guard that releases on drop
    /// (every exit path).
    pub fn acquire(&self, scope: LockScope, holder: Uuid) -> LockResult<LockGuard> {
        self.acquire_with_ttl(scope, holder, self.inner.config.ttl)
    }

    /// Acquire with an explicit TTL, for holders that know their work
    /// will outlive (or finish well within) the default.
    pub fn acquire_with_ttl(
        &self,
        scope: LockScope,
        holder: Uuid,
        ttl: Duration,
    ) -> LockResult<LockGuard> {
        let deadline = Instant::now() + self.inner.config.acquire_timeout;
        let mut table = self.inner.lock_table()?;

        loop {
            let now = Instant::now();
            table.purge_expired(now);

            if table.is_free_for(&scope, holder, now) {
                table.insert(
                    &scope,
                    HeldLock {
                        holder,
                        expires_at: now + ttl,
                    },
                );
                debug!(%scope, %holder, "lock acquired");
                return Ok(LockGuard {
                    inner: Arc::clone(&self.inner),
                    scope,
                    holder,
                });
            }

            if now >= deadline {
                debug!(%scope, %holder, "lock busy");
                return Err(LockError::Busy(scope));
            }

            // Wake on release, or re-check at the deadline at the latest.
            let (guard, _timeout) = self
                .inner
                .freed
                .wait_timeout(table, deadline - now)
                .map_err(|_| LockError::Unavailable("lock table poisoned".into()))?;
            table = guard;
        }
    }

    /// Acquire several scopes for one holder, all or nothing.
    ///
    /// Scopes are sorted into a canonical order first so concurrent
    /// multi-scope acquisitions cannot deadlock each other into timeouts.
    /// On any busy scope, already-acquired guards drop and release.
    pub fn acquire_all(
        &self,
        mut scopes: Vec<LockScope>,
        holder: Uuid,
    ) -> LockResult<Vec<LockGuard>> {
        scopes.sort_by_key(|scope| scope.to_string());
        scopes.dedup();
        let mut guards = Vec::with_capacity(scopes.len());
        for scope in scopes {
            guards.push(self.acquire(scope, holder)?);
        }
        Ok(guards)
    }

    /// Number of live (non-expired) locks.
    pub fn held_count(&self) -> usize {
        match self.inner.lock_table() {
            Ok(mut table) => {
                table.purge_expired(Instant::now());
                table.models.len() + table.collections.len()
            }
            Err(_) => 0,
        }
    }
}

impl Default for LockManager {
    fn default() -> Self {
        Self::new(LockConfig::default())
    }
}

impl std::fmt::Debug for LockManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockManager")
            .field("held_count", &self.held_count())
            .finish()
    }
}

/// A held lock. Dropping the guard releases the lock and wakes waiters.
pub struct LockGuard {
    inner: Arc<Inner>,
    scope: LockScope,
    holder: Uuid,
}

impl LockGuard {
    pub fn scope(&self) -> &LockScope {
        &self.scope
    }

    pub fn holder(&self) -> Uuid {
        self.holder
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        match self.inner.table.lock() {
            Ok(mut table) => {
                let released = table.release(&self.scope, self.holder);
                if !released {
                    // Expired and reclaimed while we held the guard; the
                    // commit-time position check covers this window.
                    warn!(scope = %self.scope, "lock was reclaimed before release");
                }
                self.inner.freed.notify_all();
            }
            Err(_) => warn!(scope = %self.scope, "lock table poisoned during release"),
        }
    }
}

impl std::fmt::Debug for LockGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockGuard")
            .field("scope", &self.scope)
            .field("holder", &self.holder)
            .finish()
    }
}
