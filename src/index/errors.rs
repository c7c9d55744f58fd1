//! Index subsystem error types

use thiserror::Error;

use crate::backend::BackendError;
use crate::schema::SchemaError;
use crate::table::RecordError;

/// Errors produced by shard storage, maintenance, and bulk builds
#[derive(Debug, Error)]
pub enum IndexError {
    /// A remove targeted a key/id pair the writable shard does not hold.
    /// This indicates index corruption or a caller bug, so it fails fast.
    #[error("index entry not found: key {key} record {record_id}")]
    EntryNotFound { key: String, record_id: String },

    /// A value's type does not match the index structure for its column
    #[error("key type mismatch: column '{column}' expects a {expected} key")]
    KeyTypeMismatch {
        column: String,
        expected: &'static str,
    },

    /// A shard attachment could not be decoded
    #[error("failed to decode shard '{shard}': {reason}")]
    ShardDecode { shard: String, reason: String },

    /// A shard could not be serialized
    #[error("failed to encode shard for column '{column}': {reason}")]
    ShardEncode { column: String, reason: String },

    /// Bulk build requested for a column that is already indexed
    #[error("index already exists for column '{0}'")]
    AlreadyExists(String),

    /// Bulk build requested for a column the schema does not declare
    #[error("column '{0}' is not part of the table schema")]
    UnknownColumn(String),

    /// A stored record lacks a value for the column being indexed
    #[error("record '{record_id}' holds no value for column '{column}'")]
    MissingValue { column: String, record_id: String },

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Record(#[from] RecordError),
}

pub type IndexResult<T> = Result<T, IndexError>;
