//! The deterministic event fold.
//!
//! Replaying an fqid's events in (position, weight) order through
//! [`FoldState`] reconstructs its current field table. The same fold runs
//! in three places: inside `commit` to validate and materialize a batch,
//! inside `current` style reads, and in the writer's write-through cache
//! update. Keeping them on one code path is what makes the "replay equals
//! current" law hold by construction.

use serde_json::Value;

use quorum_types::{EventPayload, FieldTable, Fqid, Position};

use crate::error::{StoreError, StoreResult};

/// The externally visible state of one model.
#[derive(Clone, Debug, PartialEq)]
pub enum ModelState {
    /// The model exists; `position` is the last position that touched it.
    Present { fields: FieldTable, position: Position },
    /// The model is logically absent but its history remains. A restore
    /// event re-activates it.
    Deleted { position: Position },
    /// The fqid has no history at all.
    NotFound,
}

impl ModelState {
    pub fn is_present(&self) -> bool {
        matches!(self, ModelState::Present { .. })
    }

    pub fn is_deleted(&self) -> bool {
        matches!(self, ModelState::Deleted { .. })
    }

    /// The last position that touched this model, if it has history.
    pub fn position(&self) -> Option<Position> {
        match self {
            ModelState::Present { position, .. } | ModelState::Deleted { position } => {
                Some(*position)
            }
            ModelState::NotFound => None,
        }
    }

    /// The field table, if the model is present.
    pub fn fields(&self) -> Option<&FieldTable> {
        match self {
            ModelState::Present { fields, .. } => Some(fields),
            _ => None,
        }
    }
}

/// Mutable fold state for one model.
///
/// Starts at "no history" and consumes event payloads one at a time,
/// enforcing the structural rules (create requires absence, update
/// requires presence, restore requires deletion). Deletion keeps the
/// field table so a later restore resumes from the pre-delete state.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FoldState {
    fields: FieldTable,
    exists: bool,
    deleted: bool,
    position: Position,
}

impl FoldState {
    /// Fold state for an fqid with no history.
    pub fn absent() -> Self {
        Self::default()
    }

    /// Fold state resuming from a known present model, e.g. a cache entry.
    pub fn from_present(fields: FieldTable, position: Position) -> Self {
        Self {
            fields,
            exists: true,
            deleted: false,
            position,
        }
    }

    /// Apply one event payload at `position`.
    ///
    /// On error the state is unchanged and the caller must discard the
    /// whole batch (all-or-nothing commit).
    pub fn apply(
        &mut self,
        fqid: &Fqid,
        payload: &EventPayload,
        position: Position,
    ) -> StoreResult<()> {
        match payload {
            EventPayload::Create { fields } => {
                if self.exists {
                    return Err(StoreError::ModelExists(fqid.clone()));
                }
                self.fields = fields
                    .iter()
                    .filter(|(_, v)| !v.is_null())
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect();
                self.exists = true;
                self.deleted = false;
            }
            EventPayload::Update { fields } => {
                self.require_present(fqid)?;
                for (name, value) in fields {
                    if value.is_null() {
                        self.fields.remove(name);
                    } else {
                        self.fields.insert(name.clone(), value.clone());
                    }
                }
            }
            EventPayload::DeleteFields { fields } => {
                self.require_present(fqid)?;
                for name in fields {
                    self.fields.remove(name);
                }
            }
            EventPayload::ListUpdate { list_fields } => {
                self.require_present(fqid)?;
                for (name, elements) in &list_fields.add {
                    let list = self.list_field_mut(fqid, name)?;
                    for element in elements {
                        if !list.contains(element) {
                            list.push(element.clone());
                        }
                    }
                }
                for (name, elements) in &list_fields.remove {
                    let list = self.list_field_mut(fqid, name)?;
                    list.retain(|existing| !elements.contains(existing));
                }
            }
            EventPayload::Delete => {
                self.require_present(fqid)?;
                // Fields are kept for a later restore.
                self.deleted = true;
            }
            EventPayload::Restore => {
                if !self.exists || !self.deleted {
                    return Err(StoreError::ModelNotDeleted(fqid.clone()));
                }
                self.deleted = false;
            }
            EventPayload::Noop => {}
        }
        self.position = position;
        Ok(())
    }

    fn require_present(&self, fqid: &Fqid) -> StoreResult<()> {
        if !self.exists || self.deleted {
            return Err(StoreError::ModelDoesNotExist(fqid.clone()));
        }
        Ok(())
    }

    /// Mutable access to an array field, materializing an empty list for
    /// absent fields.
    fn list_field_mut(&mut self, fqid: &Fqid, name: &str) -> StoreResult<&mut Vec<Value>> {
        let entry = self
            .fields
            .entry(name.to_string())
            .or_insert_with(|| Value::Array(Vec::new()));
        match entry {
            Value::Array(list) => Ok(list),
            _ => Err(StoreError::NotAList {
                fqid: fqid.clone(),
                field: name.to_string(),
            }),
        }
    }

    /// The last position applied to this state.
    pub fn position(&self) -> Position {
        self.position
    }

    /// The working field table. Note that a deleted model keeps its
    /// fields here (restore depends on them); check the model state for
    /// visibility decisions.
    pub fn fields(&self) -> &FieldTable {
        &self.fields
    }

    pub fn into_model_state(self) -> ModelState {
        if !self.exists {
            ModelState::NotFound
        } else if self.deleted {
            ModelState::Deleted {
                position: self.position,
            }
        } else {
            ModelState::Present {
                fields: self.fields,
                position: self.position,
            }
        }
    }

    pub fn to_model_state(&self) -> ModelState {
        self.clone().into_model_state()
    }
}

/// Fold a full event history (already in position/weight order) into the
/// model's current state.
pub fn fold(fqid: &Fqid, events: &[quorum_types::Event]) -> StoreResult<ModelState> {
    let mut state = FoldState::absent();
    for event in events {
        state.apply(fqid, &event.payload, event.position)?;
    }
    Ok(state.into_model_state())
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use quorum_types::{Event, ListUpdates};
    use serde_json::json;

    fn fqid() -> Fqid {
        "a/1".parse().unwrap()
    }

    fn fields(pairs: &[(&str, Value)]) -> FieldTable {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn apply_all(payloads: &[EventPayload]) -> StoreResult<ModelState> {
        let mut state = FoldState::absent();
        for (index, payload) in payloads.iter().enumerate() {
            state.apply(&fqid(), payload, index as Position + 1)?;
        }
        Ok(state.into_model_state())
    }

    #[test]
    fn create_then_update_overwrites_and_removes() {
        let state = apply_all(&[
            EventPayload::Create {
                fields: fields(&[("f", json!(1))]),
            },
            EventPayload::Update {
                fields: fields(&[("f", json!(null)), ("another_field", json!({"test": "value"}))]),
            },
        ])
        .unwrap();

        assert_eq!(
            state,
            ModelState::Present {
                fields: fields(&[("another_field", json!({"test": "value"}))]),
                position: 2,
            }
        );
    }

    #[test]
    fn create_skips_null_values() {
        let state = apply_all(&[EventPayload::Create {
            fields: fields(&[("f", json!(1)), ("empty", json!(null))]),
        }])
        .unwrap();
        assert_eq!(
            state.fields().unwrap(),
            &fields(&[("f", json!(1))])
        );
    }

    #[test]
    fn create_on_existing_is_rejected() {
        let err = apply_all(&[
            EventPayload::Create { fields: FieldTable::new() },
            EventPayload::Create { fields: FieldTable::new() },
        ])
        .unwrap_err();
        assert!(matches!(err, StoreError::ModelExists(_)));
    }

    #[test]
    fn create_on_deleted_is_rejected() {
        // Identifiers are never reassigned, deleted or not.
        let err = apply_all(&[
            EventPayload::Create { fields: FieldTable::new() },
            EventPayload::Delete,
            EventPayload::Create { fields: FieldTable::new() },
        ])
        .unwrap_err();
        assert!(matches!(err, StoreError::ModelExists(_)));
    }

    #[test]
    fn update_missing_is_rejected() {
        let err = apply_all(&[EventPayload::Update { fields: FieldTable::new() }]).unwrap_err();
        assert!(matches!(err, StoreError::ModelDoesNotExist(_)));
    }

    #[test]
    fn update_after_delete_is_rejected() {
        let err = apply_all(&[
            EventPayload::Create {
                fields: fields(&[("f", json!(1))]),
            },
            EventPayload::Delete,
            EventPayload::Update {
                fields: fields(&[("f", json!(42))]),
            },
        ])
        .unwrap_err();
        assert!(matches!(err, StoreError::ModelDoesNotExist(_)));
    }

    #[test]
    fn delete_fields_removes_keys() {
        let state = apply_all(&[
            EventPayload::Create {
                fields: fields(&[("f", json!(1)), ("g", json!(2))]),
            },
            EventPayload::DeleteFields {
                fields: vec!["f".into(), "missing".into()],
            },
        ])
        .unwrap();
        assert_eq!(state.fields().unwrap(), &fields(&[("g", json!(2))]));
    }

    #[test]
    fn list_update_add_and_remove() {
        let mut add = BTreeMap::new();
        add.insert("f".to_string(), vec![json!(2), json!(1)]);
        let state = apply_all(&[
            EventPayload::Create {
                fields: fields(&[("f", json!([1]))]),
            },
            EventPayload::ListUpdate {
                list_fields: ListUpdates { add, remove: BTreeMap::new() },
            },
        ])
        .unwrap();
        // 1 was already present; only 2 is appended.
        assert_eq!(state.fields().unwrap(), &fields(&[("f", json!([1, 2]))]));

        let mut remove = BTreeMap::new();
        remove.insert("f".to_string(), vec![json!(1)]);
        let state = apply_all(&[
            EventPayload::Create {
                fields: fields(&[("f", json!([1, 2]))]),
            },
            EventPayload::ListUpdate {
                list_fields: ListUpdates { add: BTreeMap::new(), remove },
            },
        ])
        .unwrap();
        assert_eq!(state.fields().unwrap(), &fields(&[("f", json!([2]))]));
    }

    #[test]
    fn list_update_materializes_missing_field() {
        let mut add = BTreeMap::new();
        add.insert("g".to_string(), vec![json!(2)]);
        let state = apply_all(&[
            EventPayload::Create {
                fields: fields(&[("f", json!(1))]),
            },
            EventPayload::ListUpdate {
                list_fields: ListUpdates { add, remove: BTreeMap::new() },
            },
        ])
        .unwrap();
        assert_eq!(
            state.fields().unwrap(),
            &fields(&[("f", json!(1)), ("g", json!([2]))])
        );
    }

    #[test]
    fn list_update_on_non_list_is_rejected() {
        let mut add = BTreeMap::new();
        add.insert("f".to_string(), vec![json!(2)]);
        let err = apply_all(&[
            EventPayload::Create {
                fields: fields(&[("f", json!("scalar"))]),
            },
            EventPayload::ListUpdate {
                list_fields: ListUpdates { add, remove: BTreeMap::new() },
            },
        ])
        .unwrap_err();
        assert!(matches!(err, StoreError::NotAList { .. }));
    }

    #[test]
    fn delete_and_restore_resume_pre_delete_state() {
        let state = apply_all(&[
            EventPayload::Create {
                fields: fields(&[("f", json!(1))]),
            },
            EventPayload::Delete,
            EventPayload::Restore,
        ])
        .unwrap();
        assert_eq!(
            state,
            ModelState::Present {
                fields: fields(&[("f", json!(1))]),
                position: 3,
            }
        );
    }

    #[test]
    fn delete_keeps_fields_but_reports_deleted() {
        let state = apply_all(&[
            EventPayload::Create {
                fields: fields(&[("f", json!(1))]),
            },
            EventPayload::Delete,
        ])
        .unwrap();
        assert_eq!(state, ModelState::Deleted { position: 2 });
        assert!(state.is_deleted());
        assert!(state.fields().is_none());
    }

    #[test]
    fn restore_without_delete_is_rejected() {
        let err = apply_all(&[
            EventPayload::Create { fields: FieldTable::new() },
            EventPayload::Restore,
        ])
        .unwrap_err();
        assert!(matches!(err, StoreError::ModelNotDeleted(_)));

        let err = apply_all(&[EventPayload::Restore]).unwrap_err();
        assert!(matches!(err, StoreError::ModelNotDeleted(_)));
    }

    #[test]
    fn noop_is_identity_but_advances_position() {
        let state = apply_all(&[
            EventPayload::Create {
                fields: fields(&[("f", json!(1))]),
            },
            EventPayload::Noop,
        ])
        .unwrap();
        assert_eq!(
            state,
            ModelState::Present {
                fields: fields(&[("f", json!(1))]),
                position: 2,
            }
        );
    }

    #[test]
    fn fold_of_event_slice() {
        let events = vec![
            Event {
                fqid: fqid(),
                payload: EventPayload::Create {
                    fields: fields(&[("f", json!(1))]),
                },
                position: 1,
                weight: 0,
            },
            Event {
                fqid: fqid(),
                payload: EventPayload::Update {
                    fields: fields(&[("f", json!(2))]),
                },
                position: 2,
                weight: 0,
            },
        ];
        let state = fold(&fqid(), &events).unwrap();
        assert_eq!(
            state,
            ModelState::Present {
                fields: fields(&[("f", json!(2))]),
                position: 2,
            }
        );
    }

    #[test]
    fn fold_of_empty_history_is_not_found() {
        assert_eq!(fold(&fqid(), &[]).unwrap(), ModelState::NotFound);
    }
}
