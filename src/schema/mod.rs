//! Table schemas: declared column types and record validation

pub mod errors;
pub mod types;

pub use errors::{SchemaError, SchemaResult};
pub use types::{CellValue, ColumnType, TableSchema, RESERVED_ID_COLUMN, SCHEMA_ATTACHMENT};
