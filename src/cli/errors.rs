//! CLI error type

use thiserror::Error;

use crate::backend::BackendError;
use crate::config::ConfigError;
use crate::index::IndexError;
use crate::query::QueryError;
use crate::schema::SchemaError;
use crate::table::{RecordError, TableError};

/// Anything that can go wrong between argv and the backend
#[derive(Debug, Error)]
pub enum CliError {
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("invalid query: {0}")]
    InvalidQuery(String),

    #[error("runtime error: {0}")]
    Runtime(String),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Table(#[from] TableError),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error(transparent)]
    Query(#[from] QueryError),

    #[error(transparent)]
    Record(#[from] RecordError),

    #[error(transparent)]
    Backend(#[from] BackendError),
}

pub type CliResult<T> = Result<T, CliError>;
