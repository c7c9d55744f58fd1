//! Schema error types

use thiserror::Error;

/// Result type for schema operations
pub type SchemaResult<T> = Result<T, SchemaError>;

/// Schema violations and invalid schema definitions.
///
/// Violations raised during a write abort the in-flight operation; there
/// is no partial rollback of index updates already applied.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SchemaError {
    #[error("Column does not exist: {0}")]
    UnknownColumn(String),

    #[error("Column '{column}' expects a numeric value, got '{value}'")]
    TypeMismatch { column: String, value: String },

    #[error("Record must cover every schema column (expected {expected} columns, got {got})")]
    MissingColumns { expected: usize, got: usize },

    #[error("'{0}' is a reserved column name")]
    ReservedColumn(String),

    #[error("Duplicate column: {0}")]
    DuplicateColumn(String),

    #[error("Invalid data type '{value}' for column '{column}'")]
    InvalidType { column: String, value: String },
}
