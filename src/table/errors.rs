//! Table and record error types

use thiserror::Error;

use crate::backend::BackendError;
use crate::schema::SchemaError;

/// Errors while materializing a stored record
#[derive(Debug, Error)]
pub enum RecordError {
    /// An item's payload is not a valid record document
    #[error("failed to decode record '{id}': {reason}")]
    Decode { id: String, reason: String },

    #[error(transparent)]
    Backend(#[from] BackendError),
}

pub type RecordResult<T> = Result<T, RecordError>;

/// Errors from table provisioning and record mutations
#[derive(Debug, Error)]
pub enum TableError {
    /// The named table container does not exist
    #[error("table '{0}' does not exist")]
    NoSuchTable(String),

    /// The table exists but its metadata container is missing
    #[error("table '{0}' has no metadata container")]
    NoMetadata(String),

    /// No schema has been created for the table yet
    #[error("table '{0}' has no schema")]
    NoSchema(String),

    /// Creation requested for a table that already exists
    #[error("table '{0}' already exists")]
    AlreadyExists(String),

    /// A schema can only be created while the table holds no records
    #[error("table '{0}' is not empty")]
    NotEmpty(String),

    /// A schema can only be created while the metadata container is empty
    #[error("metadata container of table '{0}' is not empty")]
    MetadataNotEmpty(String),

    /// A record id that resolves to nothing
    #[error("record '{0}' not found")]
    RecordNotFound(String),

    /// A stored record holds no value for a schema column
    #[error("record '{record_id}' holds no value for column '{column}'")]
    MissingColumnValue { record_id: String, column: String },

    /// The stored schema attachment could not be decoded
    #[error("failed to decode schema for table '{table}': {reason}")]
    SchemaDecode { table: String, reason: String },

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Record(#[from] RecordError),

    #[error(transparent)]
    Index(#[from] crate::index::IndexError),

    #[error(transparent)]
    Backend(#[from] BackendError),
}

pub type TableResult<T> = Result<T, TableError>;
