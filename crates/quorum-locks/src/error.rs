use thiserror::Error;

use crate::scope::LockScope;

/// Errors from lock operations.
#[derive(Debug, Error)]
pub enum LockError {
    /// The lock could not be acquired within the configured wait bound.
    /// Recoverable: the caller retries with backoff.
    #[error("lock busy: {0}")]
    Busy(LockScope),

    /// The lock table is unusable (poisoned mutex).
    #[error("lock manager unavailable: {0}")]
    Unavailable(String),
}

impl LockError {
    pub fn is_recoverable(&self) -> bool {
        matches!(self, LockError::Busy(_))
    }
}

/// Result alias for lock operations.
pub type LockResult<T> = Result<T, LockError>;
