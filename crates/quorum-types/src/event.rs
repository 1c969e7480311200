//! Events: elementary changes to one model.
//!
//! A [`WriteEvent`] is a change as submitted by a client, before any
//! position exists. A committed [`Event`] is the same payload stamped with
//! the position of its batch and its weight (order) within that batch.
//! The ordered event sequence for an fqid, folded from creation, yields
//! its current field table.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::TypeError;
use crate::fields::{validate_field_name, FieldTable};
use crate::fqid::Fqid;
use crate::position::Position;

/// Discriminant of an event payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Create,
    Update,
    DeleteFields,
    ListUpdate,
    Delete,
    Restore,
    Noop,
}

/// Element-wise updates to array fields: `add` appends elements not
/// already present, `remove` drops elements that are.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ListUpdates {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub add: BTreeMap<String, Vec<Value>>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub remove: BTreeMap<String, Vec<Value>>,
}

impl ListUpdates {
    /// Field names touched by either side of the update.
    pub fn field_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.add.keys().chain(self.remove.keys()).cloned().collect();
        names.sort();
        names.dedup();
        names
    }

    pub fn is_empty(&self) -> bool {
        self.add.is_empty() && self.remove.is_empty()
    }
}

/// The change an event applies to its model.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventPayload {
    /// Bring a model into existence with the given fields.
    Create { fields: FieldTable },
    /// Overwrite fields; a JSON `null` value removes the key.
    Update { fields: FieldTable },
    /// Remove the named fields entirely.
    DeleteFields { fields: Vec<String> },
    /// Element-wise add/remove on array fields.
    ListUpdate { list_fields: ListUpdates },
    /// Mark the model as logically absent. History is retained.
    Delete,
    /// Re-activate a deleted model, continuing its history.
    Restore,
    /// No change; occupies a weight slot so audit history stays faithful.
    Noop,
}

impl EventPayload {
    pub fn kind(&self) -> EventKind {
        match self {
            EventPayload::Create { .. } => EventKind::Create,
            EventPayload::Update { .. } => EventKind::Update,
            EventPayload::DeleteFields { .. } => EventKind::DeleteFields,
            EventPayload::ListUpdate { .. } => EventKind::ListUpdate,
            EventPayload::Delete => EventKind::Delete,
            EventPayload::Restore => EventKind::Restore,
            EventPayload::Noop => EventKind::Noop,
        }
    }

    /// Field names this event modifies.
    ///
    /// `None` means "all fields of the model" (delete and restore touch
    /// the whole table); the caller resolves that against folded state.
    pub fn modified_fields(&self) -> Option<Vec<String>> {
        match self {
            EventPayload::Create { fields } | EventPayload::Update { fields } => {
                Some(fields.keys().cloned().collect())
            }
            EventPayload::DeleteFields { fields } => Some(fields.clone()),
            EventPayload::ListUpdate { list_fields } => Some(list_fields.field_names()),
            EventPayload::Delete | EventPayload::Restore => None,
            EventPayload::Noop => Some(Vec::new()),
        }
    }

    /// Check every field name the payload touches.
    pub fn validate(&self) -> Result<(), TypeError> {
        match self {
            EventPayload::Create { fields } | EventPayload::Update { fields } => {
                for name in fields.keys() {
                    validate_field_name(name)?;
                }
            }
            EventPayload::DeleteFields { fields } => {
                for name in fields {
                    validate_field_name(name)?;
                }
            }
            EventPayload::ListUpdate { list_fields } => {
                for name in list_fields.add.keys().chain(list_fields.remove.keys()) {
                    validate_field_name(name)?;
                }
            }
            EventPayload::Delete | EventPayload::Restore | EventPayload::Noop => {}
        }
        Ok(())
    }
}

/// An event as submitted by a client: no position assigned yet.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WriteEvent {
    pub fqid: Fqid,
    #[serde(flatten)]
    pub payload: EventPayload,
}

impl WriteEvent {
    pub fn new(fqid: Fqid, payload: EventPayload) -> Self {
        Self { fqid, payload }
    }

    pub fn validate(&self) -> Result<(), TypeError> {
        self.payload.validate()
    }
}

/// A committed event: payload plus the position of its batch and its
/// weight (0-based order) within that batch.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub fqid: Fqid,
    #[serde(flatten)]
    pub payload: EventPayload,
    pub position: Position,
    pub weight: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fqid(s: &str) -> Fqid {
        s.parse().unwrap()
    }

    fn fields(pairs: &[(&str, Value)]) -> FieldTable {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn payload_kinds() {
        assert_eq!(
            EventPayload::Create { fields: FieldTable::new() }.kind(),
            EventKind::Create
        );
        assert_eq!(EventPayload::Delete.kind(), EventKind::Delete);
        assert_eq!(EventPayload::Restore.kind(), EventKind::Restore);
        assert_eq!(EventPayload::Noop.kind(), EventKind::Noop);
    }

    #[test]
    fn serde_shape_is_tagged() {
        let event = WriteEvent::new(
            fqid("users/1"),
            EventPayload::Create {
                fields: fields(&[("name", json!("A"))]),
            },
        );
        let encoded = serde_json::to_value(&event).unwrap();
        assert_eq!(
            encoded,
            json!({"fqid": "users/1", "type": "create", "fields": {"name": "A"}})
        );
    }

    #[test]
    fn serde_roundtrip_list_update() {
        let mut add = BTreeMap::new();
        add.insert("tag_ids".to_string(), vec![json!(2), json!(3)]);
        let event = WriteEvent::new(
            fqid("topic/1"),
            EventPayload::ListUpdate {
                list_fields: ListUpdates { add, remove: BTreeMap::new() },
            },
        );
        let encoded = serde_json::to_string(&event).unwrap();
        let decoded: WriteEvent = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, event);
    }

    #[test]
    fn modified_fields_per_kind() {
        let update = EventPayload::Update {
            fields: fields(&[("b", json!(1)), ("a", json!(2))]),
        };
        assert_eq!(update.modified_fields(), Some(vec!["a".into(), "b".into()]));

        let delete_fields = EventPayload::DeleteFields {
            fields: vec!["x".into()],
        };
        assert_eq!(delete_fields.modified_fields(), Some(vec!["x".into()]));

        assert_eq!(EventPayload::Delete.modified_fields(), None);
        assert_eq!(EventPayload::Restore.modified_fields(), None);
        assert_eq!(EventPayload::Noop.modified_fields(), Some(vec![]));
    }

    #[test]
    fn list_update_field_names_deduped() {
        let mut add = BTreeMap::new();
        add.insert("f".to_string(), vec![json!(1)]);
        let mut remove = BTreeMap::new();
        remove.insert("f".to_string(), vec![json!(2)]);
        remove.insert("g".to_string(), vec![json!(3)]);
        let updates = ListUpdates { add, remove };
        assert_eq!(updates.field_names(), vec!["f".to_string(), "g".to_string()]);
    }

    #[test]
    fn validate_rejects_reserved_fields() {
        let payload = EventPayload::Update {
            fields: fields(&[("meta_position", json!(9))]),
        };
        assert!(payload.validate().is_err());

        let payload = EventPayload::DeleteFields {
            fields: vec!["meta_deleted".into()],
        };
        assert!(payload.validate().is_err());
    }

    #[test]
    fn validate_accepts_plain_payloads() {
        assert!(EventPayload::Delete.validate().is_ok());
        assert!(EventPayload::Noop.validate().is_ok());
        let payload = EventPayload::Create {
            fields: fields(&[("name", json!("A"))]),
        };
        assert!(payload.validate().is_ok());
    }
}
