use quorum_types::{FieldTable, Position};

/// One cached model: its field table and the position at which that
/// table was last known to be current.
#[derive(Clone, Debug, PartialEq)]
pub struct CacheEntry {
    pub fields: FieldTable,
    pub position: Position,
}

impl CacheEntry {
    pub fn new(fields: FieldTable, position: Position) -> Self {
        Self { fields, position }
    }
}
