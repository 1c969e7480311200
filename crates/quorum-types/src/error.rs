use thiserror::Error;

/// Errors produced by type validation and parsing.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid fqid: {0}")]
    InvalidFqid(String),

    #[error("invalid collection name: {0}")]
    InvalidCollection(String),

    #[error("invalid field name: {0}")]
    InvalidField(String),

    #[error("field name is reserved: {0}")]
    ReservedField(String),

    #[error("{what} exceeds maximum length {max}: {actual}")]
    TooLong {
        what: &'static str,
        max: usize,
        actual: usize,
    },
}
