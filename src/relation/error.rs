//! Errors raised by relation operations

use super::types::{ColumnLabel, RelationId};
use thiserror::Error;

/// Errors that can occur during relation operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RelationError {
    #[error("Pair not found in {0}")]
    PairNotFound(RelationId),

    #[error("Key not found in {0}")]
    KeyNotFound(RelationId),

    #[error("Value not found in {0}")]
    ValueNotFound(RelationId),

    #[error("Object not found in any relation of column {0}")]
    ObjectNotFound(ColumnLabel),

    #[error("No path from column {from} to column {to}")]
    PathNotFound { from: ColumnLabel, to: ColumnLabel },

    #[error("Unknown column {0}")]
    UnknownColumn(ColumnLabel),

    #[error("Expected {expected} values, got {actual}")]
    ArityMismatch { expected: usize, actual: usize },

    #[error("Invalid schema: {0}")]
    InvalidSchema(String),
}

impl RelationError {
    /// True for the removal-of-something-absent family
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            RelationError::PairNotFound(_)
                | RelationError::KeyNotFound(_)
                | RelationError::ValueNotFound(_)
                | RelationError::ObjectNotFound(_)
        )
    }
}

pub type RelationResult<T> = Result<T, RelationError>;
