//! Lock scopes.

use std::fmt;

use quorum_types::Fqid;

/// What a lock protects: one model, or a whole collection.
///
/// Collection locks exist for bulk operations; they conflict with every
/// model lock of that collection and vice versa, while locks on models of
/// different collections never interact.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum LockScope {
    Model(Fqid),
    Collection(String),
}

impl LockScope {
    /// `true` if two scopes may not be held by different holders at once.
    pub fn conflicts_with(&self, other: &LockScope) -> bool {
        match (self, other) {
            (LockScope::Model(a), LockScope::Model(b)) => a == b,
            (LockScope::Collection(a), LockScope::Collection(b)) => a == b,
            (LockScope::Model(fqid), LockScope::Collection(collection))
            | (LockScope::Collection(collection), LockScope::Model(fqid)) => {
                fqid.collection() == collection
            }
        }
    }
}

impl From<Fqid> for LockScope {
    fn from(fqid: Fqid) -> Self {
        LockScope::Model(fqid)
    }
}

impl fmt::Display for LockScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockScope::Model(fqid) => write!(f, "{fqid}"),
            LockScope::Collection(collection) => write!(f, "{collection}/*"),
        }
    }
}
