//! Query error types

use thiserror::Error;

use crate::backend::BackendError;
use crate::index::IndexError;
use crate::table::{RecordError, TableError};

/// Errors from query construction and execution
#[derive(Debug, Error)]
pub enum QueryError {
    /// A limit of zero is meaningless; omit the limit instead
    #[error("limit must be at least 1")]
    InvalidLimit,

    /// Filtering requires an index on the condition's column
    #[error("no index exists for column '{0}'")]
    NoIndex(String),

    /// A condition names a column the schema does not declare
    #[error("column '{0}' is not part of the table schema")]
    UnknownColumn(String),

    /// Range operators only apply to numeric columns
    #[error("operator '{operator}' is not supported on text column '{column}'")]
    UnsupportedOperator {
        column: String,
        operator: &'static str,
    },

    /// The order column is not part of the schema
    #[error("cannot order by unknown column '{0}'")]
    UnknownOrderColumn(String),

    #[error(transparent)]
    Table(#[from] TableError),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error(transparent)]
    Record(#[from] RecordError),

    #[error(transparent)]
    Backend(#[from] BackendError),
}

pub type QueryResult<T> = Result<T, QueryError>;
