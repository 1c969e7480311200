//! Write batches: the atomic unit of commit.

use serde::{Deserialize, Serialize};

use crate::error::TypeError;
use crate::event::WriteEvent;
use crate::fqid::Fqid;

/// A set of events submitted together. Either every event commits at one
/// position or none do.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WriteBatch {
    pub events: Vec<WriteEvent>,
}

impl WriteBatch {
    pub fn new(events: Vec<WriteEvent>) -> Self {
        Self { events }
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Distinct fqids touched by this batch, in first-occurrence order.
    pub fn touched_fqids(&self) -> Vec<Fqid> {
        let mut fqids = Vec::new();
        for event in &self.events {
            if !fqids.contains(&event.fqid) {
                fqids.push(event.fqid.clone());
            }
        }
        fqids
    }

    /// Validate every event payload in the batch.
    pub fn validate(&self) -> Result<(), TypeError> {
        for event in &self.events {
            event.validate()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventPayload;
    use crate::fields::FieldTable;
    use serde_json::json;

    fn create(fqid: &str) -> WriteEvent {
        WriteEvent::new(
            fqid.parse().unwrap(),
            EventPayload::Create { fields: FieldTable::new() },
        )
    }

    #[test]
    fn touched_fqids_deduplicates_in_order() {
        let batch = WriteBatch::new(vec![
            create("a/1"),
            create("b/1"),
            WriteEvent::new("a/1".parse().unwrap(), EventPayload::Delete),
        ]);
        let fqids: Vec<String> = batch.touched_fqids().iter().map(|f| f.to_string()).collect();
        assert_eq!(fqids, vec!["a/1", "b/1"]);
    }

    #[test]
    fn validate_surfaces_payload_errors() {
        let mut fields = FieldTable::new();
        fields.insert("meta_deleted".to_string(), json!(true));
        let batch = WriteBatch::new(vec![WriteEvent::new(
            "a/1".parse().unwrap(),
            EventPayload::Update { fields },
        )]);
        assert!(batch.validate().is_err());
    }

    #[test]
    fn empty_batch() {
        let batch = WriteBatch::default();
        assert!(batch.is_empty());
        assert_eq!(batch.len(), 0);
        assert!(batch.touched_fqids().is_empty());
    }
}
