use quorum_types::{Fqid, Position, TypeError};

/// One failed expected-position check.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PositionConflict {
    pub fqid: Fqid,
    /// What the caller believed the model's last position to be.
    pub expected: Option<Position>,
    /// What the store actually holds. `None` means the model has no history.
    pub actual: Option<Position>,
}

/// Errors from the durable layer.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A commit was attempted with no events.
    #[error("write batch is empty")]
    EmptyBatch,

    /// The optimistic concurrency check failed. The whole batch was
    /// aborted; the caller must refetch and resubmit.
    #[error("expected position mismatch: {conflicts:?}")]
    ConcurrencyConflict { conflicts: Vec<PositionConflict> },

    /// Create event for an fqid that already has history.
    #[error("model already exists: {0}")]
    ModelExists(Fqid),

    /// Update/delete targeting an fqid that is absent or deleted.
    #[error("model does not exist: {0}")]
    ModelDoesNotExist(Fqid),

    /// Restore targeting an fqid that is not in the deleted state.
    #[error("model is not deleted: {0}")]
    ModelNotDeleted(Fqid),

    /// A list update hit a field whose current value is not an array.
    #[error("field is not a list: {fqid}/{field}")]
    NotAList { fqid: Fqid, field: String },

    /// Malformed input (bad fqid, reserved field, invalid collection...).
    #[error("invalid format: {0}")]
    InvalidFormat(#[from] TypeError),

    /// Id reservation with a zero amount.
    #[error("cannot reserve zero ids")]
    InvalidAmount,

    /// The durable backend is unreachable. Fatal for the in-flight
    /// request; no partial commit is ever persisted.
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// Recoverable errors may be retried by the caller after refetching;
    /// everything else is terminal for the request.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, StoreError::ConcurrencyConflict { .. })
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
