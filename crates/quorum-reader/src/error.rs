use quorum_store::StoreError;
use quorum_types::TypeError;

/// Errors from read operations.
#[derive(Debug, thiserror::Error)]
pub enum ReaderError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("invalid format: {0}")]
    InvalidFormat(#[from] TypeError),
}

/// Result alias for read operations.
pub type ReaderResult<T> = Result<T, ReaderError>;
