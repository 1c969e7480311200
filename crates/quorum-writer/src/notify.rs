//! Change notifications.
//!
//! After every successful commit the writer fans out a
//! [`WriteNotification`] to subscribers (autoupdate pipelines, secondary
//! indexers). Delivery is best-effort over a broadcast channel: a slow
//! subscriber lags and may miss messages, but the datastore itself never
//! blocks on it — correctness for late joiners comes from reading the
//! store, not from the stream.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

use quorum_types::{collectionfield, Fqid, Position};

/// What one committed batch changed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WriteNotification {
    pub position: Position,
    pub user_id: i64,
    /// Modified field names per touched model. Deletes and restores
    /// report every field of the model.
    pub modified: BTreeMap<Fqid, Vec<String>>,
}

impl WriteNotification {
    /// Rendered `collection/field` keys, deduplicated and sorted.
    pub fn modified_collectionfields(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .modified
            .iter()
            .flat_map(|(fqid, fields)| {
                fields
                    .iter()
                    .filter_map(|field| collectionfield(fqid, field).ok())
            })
            .collect();
        keys.sort();
        keys.dedup();
        keys
    }
}

/// Broadcast fan-out of write notifications.
pub struct ChangeNotifier {
    sender: broadcast::Sender<WriteNotification>,
}

impl ChangeNotifier {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Register a new subscriber. Messages published before subscription
    /// are not replayed.
    pub fn subscribe(&self) -> broadcast::Receiver<WriteNotification> {
        self.sender.subscribe()
    }

    /// Publish to all current subscribers. Having none is not an error.
    pub fn publish(&self, notification: WriteNotification) {
        let receivers = self.sender.receiver_count();
        if receivers > 0 {
            // Send only fails when every receiver is gone, a benign race
            // with the count above.
            let _ = self.sender.send(notification);
        } else {
            debug!("write notification dropped, no subscribers");
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl std::fmt::Debug for ChangeNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeNotifier")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}
