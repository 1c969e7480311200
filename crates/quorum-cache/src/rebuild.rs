//! Full cache rebuild from the event store.

use tracing::info;

use quorum_store::{fold, EventStore, ModelState, StoreResult};

use crate::cache::ModelCache;

/// Rebuild the cache by replaying every model's full history and
/// repopulating via `put`.
///
/// Safe to run concurrently with live traffic: the monotonic-write rule
/// means a rebuild carrying an older snapshot can never clobber a fresher
/// value written by a concurrent commit. Running it twice in a row yields
/// identical cache contents. Returns the number of models replayed.
pub fn rebuild(cache: &ModelCache, store: &dyn EventStore) -> StoreResult<usize> {
    let fqids = store.all_fqids()?;
    let mut replayed = 0usize;

    for fqid in fqids {
        let events = store.get_events(&fqid, None)?;
        match fold(&fqid, &events)? {
            ModelState::Present { fields, position } => {
                cache.put(&fqid, fields, position);
                replayed += 1;
            }
            // Deleted models must not be served from cache; absence is
            // the correct cached state for them.
            ModelState::Deleted { .. } => {
                cache.invalidate(&fqid);
                replayed += 1;
            }
            ModelState::NotFound => {}
        }
    }

    info!(replayed, "cache rebuild complete");
    Ok(replayed)
}
