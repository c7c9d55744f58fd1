//! Record storage format
//!
//! A record is a flat JSON object mapping column names to cell values.
//! Small records live inline in an item's content; anything over the
//! inline ceiling is uploaded as an attachment named `record`. The
//! backend-assigned item id doubles as the record id and is surfaced to
//! callers under the reserved `db_id` column, never stored in the
//! payload itself.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::backend::{BlobStore, Item};
use crate::schema::{CellValue, RESERVED_ID_COLUMN};

use super::errors::{RecordError, RecordResult};

/// Largest payload stored inline in an item's content, in bytes
pub const INLINE_SIZE_LIMIT: usize = 1950;

/// Attachment filename for records too large to inline
pub const RECORD_ATTACHMENT_NAME: &str = "record";

/// A materialized record: typed cells plus the backend id
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub id: String,
    pub values: BTreeMap<String, CellValue>,
}

impl Record {
    /// The cell stored under `column`, if any
    pub fn value(&self, column: &str) -> Option<&CellValue> {
        self.values.get(column)
    }

    /// JSON object for output: the cells plus the id under `db_id`
    pub fn to_output_json(&self) -> RecordResult<Value> {
        let mut object = match serde_json::to_value(&self.values) {
            Ok(Value::Object(map)) => map,
            Ok(_) => serde_json::Map::new(),
            Err(e) => {
                return Err(RecordError::Decode {
                    id: self.id.clone(),
                    reason: e.to_string(),
                })
            }
        };
        object.insert(
            RESERVED_ID_COLUMN.to_string(),
            Value::String(self.id.clone()),
        );
        Ok(Value::Object(object))
    }
}

/// Serializes typed cells to the stored payload
pub fn encode_payload(values: &BTreeMap<String, CellValue>) -> RecordResult<String> {
    serde_json::to_string(values).map_err(|e| RecordError::Decode {
        id: String::new(),
        reason: e.to_string(),
    })
}

/// True when a payload fits in an item's inline content
pub fn fits_inline(payload: &str) -> bool {
    payload.len() <= INLINE_SIZE_LIMIT
}

/// Materializes a record from an already-listed item.
///
/// Items carrying a `record` attachment are fetched from the attachment
/// URL; everything else parses the inline content.
pub async fn decode_item<S: BlobStore>(store: &S, item: &Item) -> RecordResult<Record> {
    let payload = match item
        .attachments
        .iter()
        .find(|a| a.filename == RECORD_ATTACHMENT_NAME)
    {
        Some(attachment) => {
            let bytes = store.get_attachment(&attachment.url).await?;
            String::from_utf8(bytes).map_err(|e| RecordError::Decode {
                id: item.id.clone(),
                reason: e.to_string(),
            })?
        }
        None => item.content.clone(),
    };
    let values: BTreeMap<String, CellValue> =
        serde_json::from_str(&payload).map_err(|e| RecordError::Decode {
            id: item.id.clone(),
            reason: e.to_string(),
        })?;
    Ok(Record {
        id: item.id.clone(),
        values,
    })
}

/// Fetches and materializes a record by id
pub async fn fetch_record<S: BlobStore>(
    store: &S,
    container: &str,
    record_id: &str,
) -> RecordResult<Record> {
    let item = store.get_item(container, record_id).await?;
    decode_item(store, &item).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryStore;

    fn cells() -> BTreeMap<String, CellValue> {
        let mut values = BTreeMap::new();
        values.insert("age".to_string(), CellValue::Numeric(30.0));
        values.insert("name".to_string(), CellValue::Text("alice".to_string()));
        values
    }

    #[test]
    fn test_payload_shape() {
        let payload = encode_payload(&cells()).unwrap();
        assert_eq!(payload, r#"{"age":30.0,"name":"alice"}"#);
        assert!(fits_inline(&payload));
    }

    #[test]
    fn test_output_includes_db_id() {
        let record = Record {
            id: "itm-1".to_string(),
            values: cells(),
        };
        let out = record.to_output_json().unwrap();
        assert_eq!(out["db_id"], "itm-1");
        assert_eq!(out["age"], 30.0);
        assert_eq!(out["name"], "alice");
    }

    #[tokio::test]
    async fn test_decode_inline_item() {
        let store = MemoryStore::new();
        let container = store.create_container("users").await.unwrap();
        let payload = encode_payload(&cells()).unwrap();
        let item = store.create_item(&container.id, &payload).await.unwrap();

        let record = decode_item(&store, &item).await.unwrap();
        assert_eq!(record.id, item.id);
        assert_eq!(record.values, cells());
    }

    #[tokio::test]
    async fn test_decode_attachment_item() {
        let store = MemoryStore::new();
        let container = store.create_container("users").await.unwrap();
        let payload = encode_payload(&cells()).unwrap();
        let item = store
            .create_attachment_item(&container.id, RECORD_ATTACHMENT_NAME, payload.into_bytes())
            .await
            .unwrap();

        let record = fetch_record(&store, &container.id, &item.id).await.unwrap();
        assert_eq!(record.value("age"), Some(&CellValue::Numeric(30.0)));
    }

    #[tokio::test]
    async fn test_decode_garbage_reports_the_item() {
        let store = MemoryStore::new();
        let container = store.create_container("users").await.unwrap();
        let item = store.create_item(&container.id, "not json").await.unwrap();

        let err = decode_item(&store, &item).await.unwrap_err();
        assert!(matches!(err, RecordError::Decode { .. }));
    }

    #[test]
    fn test_inline_ceiling() {
        let small = "x".repeat(INLINE_SIZE_LIMIT);
        let big = "x".repeat(INLINE_SIZE_LIMIT + 1);
        assert!(fits_inline(&small));
        assert!(!fits_inline(&big));
    }
}
