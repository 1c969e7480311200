use quorum_locks::LockError;
use quorum_store::StoreError;
use quorum_types::TypeError;

/// Errors from write operations.
#[derive(Debug, thiserror::Error)]
pub enum WriterError {
    /// A lock could not be acquired in time. Recoverable: retry with
    /// backoff.
    #[error("lock error: {0}")]
    Lock(#[from] LockError),

    /// Commit-path failure. `ConcurrencyConflict` is surfaced unchanged —
    /// no silent retry; the caller decides whether to recompute and
    /// resubmit with fresh expected positions.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Malformed request payload.
    #[error("invalid format: {0}")]
    InvalidFormat(#[from] TypeError),
}

impl WriterError {
    pub fn is_recoverable(&self) -> bool {
        match self {
            WriterError::Lock(err) => err.is_recoverable(),
            WriterError::Store(err) => err.is_recoverable(),
            WriterError::InvalidFormat(_) => false,
        }
    }
}

/// Result alias for write operations.
pub type WriterResult<T> = Result<T, WriterError>;
