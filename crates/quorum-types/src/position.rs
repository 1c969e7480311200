//! Positions: the global commit counter.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A position is a strictly increasing integer assigned at commit time.
/// Every committed write batch has exactly one; positions are never reused
/// and form a total order over all writes in the store.
pub type Position = u64;

/// Metadata persisted alongside each position: who wrote the batch, when,
/// and an arbitrary information blob supplied by the client.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PositionInfo {
    pub position: Position,
    pub timestamp: DateTime<Utc>,
    pub user_id: i64,
    pub information: Value,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn position_info_roundtrip() {
        let info = PositionInfo {
            position: 7,
            timestamp: Utc::now(),
            user_id: 1,
            information: json!({"reason": "import"}),
        };
        let encoded = serde_json::to_string(&info).unwrap();
        let decoded: PositionInfo = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, info);
    }
}
