//! Storage error type
//!
//! Every Row Store and Transaction Executor operation reports failures
//! through [`StoreError`]. Domain-level outcomes (already following, not
//! liked, ...) live in the `social` module and wrap this type.

use thiserror::Error;

/// Errors raised by the row store and the transaction executor
#[derive(Error, Debug)]
pub enum StoreError {
    /// A referenced row does not exist
    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },

    /// An insert collided with a unique key
    #[error("unique constraint violated on {entity}: {key}")]
    UniqueViolation { entity: &'static str, key: String },

    /// An insert referenced a row that does not exist
    #[error("{entity} references missing {target}: {key}")]
    ForeignKey {
        entity: &'static str,
        target: &'static str,
        key: String,
    },

    /// The caller's cancellation token fired before the unit committed
    #[error("transaction cancelled")]
    Cancelled,

    /// Commit log I/O failure
    #[error("commit log error: {0}")]
    Io(#[from] std::io::Error),

    /// A stored or logged record could not be decoded
    #[error("corrupt record: {0}")]
    Corrupt(String),

    /// The unit failed and could not be rolled back either
    #[error("transaction error: {cause}, rollback error: {rollback}")]
    RollbackFailed {
        cause: Box<StoreError>,
        rollback: Box<StoreError>,
    },
}

impl StoreError {
    pub(crate) fn not_found(entity: &'static str, key: impl ToString) -> Self {
        StoreError::NotFound {
            entity,
            key: key.to_string(),
        }
    }

    pub(crate) fn unique(entity: &'static str, key: impl ToString) -> Self {
        StoreError::UniqueViolation {
            entity,
            key: key.to_string(),
        }
    }

    pub(crate) fn foreign_key(entity: &'static str, target: &'static str, key: impl ToString) -> Self {
        StoreError::ForeignKey {
            entity,
            target,
            key: key.to_string(),
        }
    }

    /// True when the row was missing
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }

    /// True when an insert lost against an existing unique key
    pub fn is_unique_violation(&self) -> bool {
        match self {
            StoreError::UniqueViolation { .. } => true,
            StoreError::RollbackFailed { cause, .. } => cause.is_unique_violation(),
            _ => false,
        }
    }
}

/// Result alias used throughout the store
pub type StoreResult<T> = Result<T, StoreError>;
