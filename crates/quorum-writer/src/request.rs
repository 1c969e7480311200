//! Write requests.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use quorum_store::ExpectedPositions;
use quorum_types::{WriteBatch, WriteEvent};

/// A client write request: who writes, why, what changes, and which
/// positions the client last observed for the touched models.
///
/// `expected_positions` may be partial. Models the client does not name
/// get their expectation read from the current store state under the
/// writer's locks, so the commit still cannot lose a concurrent update.
/// Brand-new models must be named with an expectation of `None`
/// (import tooling included — it goes through this same contract).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WriteRequest {
    #[serde(default)]
    pub user_id: i64,
    #[serde(default)]
    pub information: Value,
    #[serde(default)]
    pub expected_positions: ExpectedPositions,
    pub events: Vec<WriteEvent>,
}

impl WriteRequest {
    pub fn new(user_id: i64, events: Vec<WriteEvent>) -> Self {
        Self {
            user_id,
            information: Value::Null,
            expected_positions: ExpectedPositions::new(),
            events,
        }
    }

    pub fn with_information(mut self, information: Value) -> Self {
        self.information = information;
        self
    }

    pub fn with_expected(
        mut self,
        fqid: quorum_types::Fqid,
        position: Option<quorum_types::Position>,
    ) -> Self {
        self.expected_positions.insert(fqid, position);
        self
    }

    pub fn batch(&self) -> WriteBatch {
        WriteBatch::new(self.events.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quorum_types::{EventPayload, FieldTable};
    use serde_json::json;

    #[test]
    fn serde_shape() {
        let json_request = json!({
            "user_id": 1,
            "information": {"action": "test"},
            "expected_positions": {"a/1": 4, "a/2": null},
            "events": [
                {"fqid": "a/1", "type": "update", "fields": {"f": 2}},
                {"fqid": "a/2", "type": "create", "fields": {}}
            ]
        });
        let request: WriteRequest = serde_json::from_value(json_request).unwrap();

        assert_eq!(request.user_id, 1);
        assert_eq!(request.events.len(), 2);
        let a1: quorum_types::Fqid = "a/1".parse().unwrap();
        let a2: quorum_types::Fqid = "a/2".parse().unwrap();
        assert_eq!(request.expected_positions[&a1], Some(4));
        assert_eq!(request.expected_positions[&a2], None);
    }

    #[test]
    fn builder_helpers() {
        let request = WriteRequest::new(
            7,
            vec![WriteEvent::new(
                "a/1".parse().unwrap(),
                EventPayload::Create { fields: FieldTable::new() },
            )],
        )
        .with_information(json!("import"))
        .with_expected("a/1".parse().unwrap(), None);

        assert_eq!(request.user_id, 7);
        assert_eq!(request.information, json!("import"));
        assert_eq!(request.batch().len(), 1);
    }
}
