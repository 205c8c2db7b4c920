//! Errors raised by the job and build history store.

use thiserror::Error;

pub type StateResult<T> = Result<T, StateError>;

#[derive(Debug, Error)]
pub enum StateError {
    #[error("failed to open database: {0}")]
    Open(String),

    #[error("transaction error: {0}")]
    Transaction(String),

    #[error("table error: {0}")]
    Table(String),

    /// A redb read or write on an open table failed.
    #[error("storage error: {0}")]
    Storage(String),

    /// A stored value could not be converted to or from JSON.
    #[error("codec error: {0}")]
    Codec(String),

    #[error("invalid job name: {0:?}")]
    InvalidJobName(String),
}
