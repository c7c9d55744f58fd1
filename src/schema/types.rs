//! Schema type definitions
//!
//! Supported column types:
//! - numeric: 64-bit floating point (wire name "num")
//! - text: UTF-8 string (wire name "str")
//!
//! A table's schema is a single JSON object mapping column names to wire
//! type names, stored once as the `schema` attachment in the table's
//! metadata container and immutable thereafter.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::errors::{SchemaError, SchemaResult};

/// Column holding each record's backend-assigned identifier.
///
/// Disallowed in user schemas.
pub const RESERVED_ID_COLUMN: &str = "db_id";

/// Attachment filename holding a table's schema inside its metadata container
pub const SCHEMA_ATTACHMENT: &str = "schema";

/// Declared column types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnType {
    /// 64-bit floating point, indexed by an ordered-key tree
    #[serde(rename = "num")]
    Numeric,
    /// UTF-8 string, indexed by a hash index
    #[serde(rename = "str")]
    Text,
}

impl ColumnType {
    /// Returns the type name for error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            ColumnType::Numeric => "numeric",
            ColumnType::Text => "text",
        }
    }

    /// Parses a user-facing type name (case-insensitive).
    ///
    /// Accepts both the wire names and the long forms.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "num" | "numeric" => Some(ColumnType::Numeric),
            "str" | "text" => Some(ColumnType::Text),
            _ => None,
        }
    }
}

/// A single typed cell value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    /// Numeric value
    Numeric(f64),
    /// Text value
    Text(String),
}

impl CellValue {
    /// Returns the numeric value, if this cell is numeric
    pub fn as_numeric(&self) -> Option<f64> {
        match self {
            CellValue::Numeric(n) => Some(*n),
            CellValue::Text(_) => None,
        }
    }

    /// Returns the text value, if this cell is text
    pub fn as_text(&self) -> Option<&str> {
        match self {
            CellValue::Numeric(_) => None,
            CellValue::Text(s) => Some(s),
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Numeric(n) => write!(f, "{}", n),
            CellValue::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<f64> for CellValue {
    fn from(v: f64) -> Self {
        CellValue::Numeric(v)
    }
}

impl From<&str> for CellValue {
    fn from(v: &str) -> Self {
        CellValue::Text(v.to_string())
    }
}

impl From<String> for CellValue {
    fn from(v: String) -> Self {
        CellValue::Text(v)
    }
}

/// Mapping from column name to declared type.
///
/// Created once per table while the table is still empty; immutable
/// afterwards. Columns are kept in name order so the serialized form is
/// deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    #[serde(flatten)]
    columns: BTreeMap<String, ColumnType>,
}

impl TableSchema {
    /// Creates an empty schema
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a column definition.
    ///
    /// Rejects the reserved identifier column, empty names, and duplicates.
    pub fn define(&mut self, column: &str, column_type: ColumnType) -> SchemaResult<()> {
        if column == RESERVED_ID_COLUMN {
            return Err(SchemaError::ReservedColumn(column.to_string()));
        }
        if column.is_empty() {
            return Err(SchemaError::InvalidType {
                column: column.to_string(),
                value: column_type.type_name().to_string(),
            });
        }
        if self.columns.contains_key(column) {
            return Err(SchemaError::DuplicateColumn(column.to_string()));
        }
        self.columns.insert(column.to_string(), column_type);
        Ok(())
    }

    /// Returns the declared type of a column
    pub fn column_type(&self, column: &str) -> Option<ColumnType> {
        self.columns.get(column).copied()
    }

    /// Iterates over (column, type) pairs in name order
    pub fn columns(&self) -> impl Iterator<Item = (&String, &ColumnType)> {
        self.columns.iter()
    }

    /// Number of declared columns
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// True when no columns are declared
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Validates raw column/value pairs against this schema and coerces
    /// them into typed cells.
    ///
    /// Hard failures: unknown column, non-numeric value for a numeric
    /// column, and a pair count that does not cover the whole schema.
    pub fn validate_record(
        &self,
        values: &BTreeMap<String, String>,
    ) -> SchemaResult<BTreeMap<String, CellValue>> {
        let mut typed = BTreeMap::new();
        for (column, raw) in values {
            let column_type = self
                .column_type(column)
                .ok_or_else(|| SchemaError::UnknownColumn(column.clone()))?;
            let cell = match column_type {
                ColumnType::Numeric => {
                    let number: f64 =
                        raw.parse().map_err(|_| SchemaError::TypeMismatch {
                            column: column.clone(),
                            value: raw.clone(),
                        })?;
                    CellValue::Numeric(number)
                }
                ColumnType::Text => CellValue::Text(raw.clone()),
            };
            typed.insert(column.clone(), cell);
        }
        if typed.len() != self.len() {
            return Err(SchemaError::MissingColumns {
                expected: self.len(),
                got: typed.len(),
            });
        }
        Ok(typed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn users_schema() -> TableSchema {
        let mut schema = TableSchema::new();
        schema.define("age", ColumnType::Numeric).unwrap();
        schema.define("name", ColumnType::Text).unwrap();
        schema
    }

    #[test]
    fn test_define_rejects_reserved_column() {
        let mut schema = TableSchema::new();
        let err = schema.define(RESERVED_ID_COLUMN, ColumnType::Text).unwrap_err();
        assert_eq!(err, SchemaError::ReservedColumn(RESERVED_ID_COLUMN.to_string()));
    }

    #[test]
    fn test_define_rejects_duplicates() {
        let mut schema = TableSchema::new();
        schema.define("age", ColumnType::Numeric).unwrap();
        let err = schema.define("age", ColumnType::Text).unwrap_err();
        assert_eq!(err, SchemaError::DuplicateColumn("age".to_string()));
    }

    #[test]
    fn test_wire_format_round_trip() {
        let schema = users_schema();
        let json = serde_json::to_string(&schema).unwrap();
        assert_eq!(json, r#"{"age":"num","name":"str"}"#);

        let parsed: TableSchema = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, schema);
    }

    #[test]
    fn test_type_parse_accepts_both_spellings() {
        assert_eq!(ColumnType::parse("num"), Some(ColumnType::Numeric));
        assert_eq!(ColumnType::parse("NUMERIC"), Some(ColumnType::Numeric));
        assert_eq!(ColumnType::parse("str"), Some(ColumnType::Text));
        assert_eq!(ColumnType::parse("text"), Some(ColumnType::Text));
        assert_eq!(ColumnType::parse("bool"), None);
    }

    #[test]
    fn test_validate_record_coerces_types() {
        let schema = users_schema();
        let mut values = BTreeMap::new();
        values.insert("age".to_string(), "30".to_string());
        values.insert("name".to_string(), "alice".to_string());

        let typed = schema.validate_record(&values).unwrap();
        assert_eq!(typed["age"], CellValue::Numeric(30.0));
        assert_eq!(typed["name"], CellValue::Text("alice".to_string()));
    }

    #[test]
    fn test_validate_record_rejects_bad_number() {
        let schema = users_schema();
        let mut values = BTreeMap::new();
        values.insert("age".to_string(), "thirty".to_string());
        values.insert("name".to_string(), "alice".to_string());

        let err = schema.validate_record(&values).unwrap_err();
        assert!(matches!(err, SchemaError::TypeMismatch { .. }));
    }

    #[test]
    fn test_validate_record_rejects_unknown_column() {
        let schema = users_schema();
        let mut values = BTreeMap::new();
        values.insert("age".to_string(), "30".to_string());
        values.insert("height".to_string(), "180".to_string());

        let err = schema.validate_record(&values).unwrap_err();
        assert_eq!(err, SchemaError::UnknownColumn("height".to_string()));
    }

    #[test]
    fn test_validate_record_requires_all_columns() {
        let schema = users_schema();
        let mut values = BTreeMap::new();
        values.insert("age".to_string(), "30".to_string());

        let err = schema.validate_record(&values).unwrap_err();
        assert_eq!(err, SchemaError::MissingColumns { expected: 2, got: 1 });
    }

    #[test]
    fn test_cell_value_untagged_json() {
        let n: CellValue = serde_json::from_str("30.5").unwrap();
        assert_eq!(n, CellValue::Numeric(30.5));
        let s: CellValue = serde_json::from_str(r#""alice""#).unwrap();
        assert_eq!(s, CellValue::Text("alice".to_string()));
    }
}
