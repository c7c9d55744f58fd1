//! Shard storage for secondary indexes
//!
//! An index is a set of shards stored as attachments in the table's
//! metadata container, one attachment per shard, named
//! `<column>_idx_<n>` with numbers contiguous from 0. The writable shard
//! is the first one whose attachment size sits below the size ceiling;
//! sealed shards are only read.
//!
//! Numeric columns shard an ordered-key tree, text columns a hash map.
//! Which structure a shard holds is decided by the schema's declared
//! column type, never inferred from the payload.

use std::collections::HashMap;

use serde_json::Value;

use crate::backend::{list_all_items, BlobStore, Item};
use crate::index::rbtree::{RbTree, RecordId};
use crate::observability::Logger;
use crate::schema::{CellValue, ColumnType};

use super::errors::{IndexError, IndexResult};

/// Hard attachment size ceiling imposed by the backend
pub const SHARD_SIZE_LIMIT: usize = 25_690_000;

/// Slack kept below the ceiling so a serialized shard never brushes it
pub const SHARD_SAFETY_MARGIN: usize = 100;

/// Text keys are truncated to this many characters before indexing
pub const TEXT_KEY_LIMIT: usize = 1000;

/// Builds the attachment filename for a column's shard
pub fn shard_filename(column: &str, number: u32) -> String {
    format!("{}_idx_{}", column, number)
}

/// Splits a shard filename back into column and shard number.
///
/// Matches from the right so column names may themselves contain
/// underscores.
pub fn parse_shard_filename(filename: &str) -> Option<(&str, u32)> {
    let at = filename.rfind("_idx_")?;
    let column = &filename[..at];
    let number = filename[at + "_idx_".len()..].parse().ok()?;
    if column.is_empty() {
        return None;
    }
    Some((column, number))
}

fn truncate_text_key(key: &str) -> String {
    key.chars().take(TEXT_KEY_LIMIT).collect()
}

/// One shard's index structure, shaped by the column's declared type
#[derive(Debug, Clone)]
pub enum IndexData {
    /// Ordered-key tree for numeric columns
    Numeric(RbTree),
    /// Hash map for text columns (no order queries)
    Text(HashMap<String, Vec<RecordId>>),
}

impl IndexData {
    /// Empty structure for the given column type
    pub fn empty(column_type: ColumnType) -> Self {
        match column_type {
            ColumnType::Numeric => IndexData::Numeric(RbTree::new()),
            ColumnType::Text => IndexData::Text(HashMap::new()),
        }
    }

    /// Number of distinct keys held
    pub fn key_count(&self) -> usize {
        match self {
            IndexData::Numeric(tree) => tree.key_count(),
            IndexData::Text(map) => map.len(),
        }
    }

    /// Inserts a record id under the cell's key.
    ///
    /// Text keys are truncated to their first [`TEXT_KEY_LIMIT`]
    /// characters.
    pub fn insert(&mut self, column: &str, value: &CellValue, record_id: RecordId) -> IndexResult<()> {
        match (self, value) {
            (IndexData::Numeric(tree), CellValue::Numeric(key)) => {
                tree.insert(*key, record_id);
                Ok(())
            }
            (IndexData::Text(map), CellValue::Text(key)) => {
                map.entry(truncate_text_key(key)).or_default().push(record_id);
                Ok(())
            }
            (IndexData::Numeric(_), _) => Err(IndexError::KeyTypeMismatch {
                column: column.to_string(),
                expected: "numeric",
            }),
            (IndexData::Text(_), _) => Err(IndexError::KeyTypeMismatch {
                column: column.to_string(),
                expected: "text",
            }),
        }
    }

    /// Removes a record id from under the cell's key.
    ///
    /// An absent key or id is a hard error: the write path keeps shards
    /// exact, so a miss means the index and table disagree.
    pub fn remove(&mut self, column: &str, value: &CellValue, record_id: &str) -> IndexResult<()> {
        let removed = match (&mut *self, value) {
            (IndexData::Numeric(tree), CellValue::Numeric(key)) => {
                tree.remove_record(*key, record_id)
            }
            (IndexData::Text(map), CellValue::Text(key)) => {
                let key = truncate_text_key(key);
                match map.get_mut(&key) {
                    Some(ids) if ids.iter().any(|id| id == record_id) => {
                        ids.retain(|id| id != record_id);
                        if ids.is_empty() {
                            map.remove(&key);
                        }
                        true
                    }
                    _ => false,
                }
            }
            (IndexData::Numeric(_), _) => {
                return Err(IndexError::KeyTypeMismatch {
                    column: column.to_string(),
                    expected: "numeric",
                })
            }
            (IndexData::Text(_), _) => {
                return Err(IndexError::KeyTypeMismatch {
                    column: column.to_string(),
                    expected: "text",
                })
            }
        };
        if removed {
            Ok(())
        } else {
            Err(IndexError::EntryNotFound {
                key: value.to_string(),
                record_id: record_id.to_string(),
            })
        }
    }

    /// Record ids whose key equals the cell exactly
    pub fn find_equal(&self, value: &CellValue) -> Vec<RecordId> {
        match (self, value) {
            (IndexData::Numeric(tree), CellValue::Numeric(key)) => {
                tree.find(*key).map(|ids| ids.to_vec()).unwrap_or_default()
            }
            (IndexData::Text(map), CellValue::Text(key)) => {
                map.get(&truncate_text_key(key)).cloned().unwrap_or_default()
            }
            _ => Vec::new(),
        }
    }

    /// Record ids whose key lies strictly between the bounds.
    ///
    /// Only numeric structures hold an order; text shards contribute
    /// nothing to range queries.
    pub fn find_range(&self, lower: f64, upper: f64) -> Vec<RecordId> {
        match self {
            IndexData::Numeric(tree) => tree.range_scan(lower, upper),
            IndexData::Text(_) => Vec::new(),
        }
    }

    /// Serializes the structure to its shard payload
    pub fn to_bytes(&self, column: &str) -> IndexResult<Vec<u8>> {
        let value = match self {
            IndexData::Numeric(tree) => tree.to_json(),
            IndexData::Text(map) => {
                serde_json::to_value(map).map_err(|e| IndexError::ShardEncode {
                    column: column.to_string(),
                    reason: e.to_string(),
                })?
            }
        };
        serde_json::to_vec(&value).map_err(|e| IndexError::ShardEncode {
            column: column.to_string(),
            reason: e.to_string(),
        })
    }

    /// Decodes a shard payload as the given column type
    pub fn from_bytes(column_type: ColumnType, shard: &str, bytes: &[u8]) -> IndexResult<Self> {
        let decode_err = |reason: String| IndexError::ShardDecode {
            shard: shard.to_string(),
            reason,
        };
        let value: Value = serde_json::from_slice(bytes).map_err(|e| decode_err(e.to_string()))?;
        match column_type {
            ColumnType::Numeric => {
                let tree = RbTree::from_json(&value).map_err(|e| decode_err(e.to_string()))?;
                Ok(IndexData::Numeric(tree))
            }
            ColumnType::Text => {
                let map = serde_json::from_value(value).map_err(|e| decode_err(e.to_string()))?;
                Ok(IndexData::Text(map))
            }
        }
    }
}

/// Locator for one stored shard
#[derive(Debug, Clone)]
pub struct ShardRef {
    /// Backend id of the item carrying the shard attachment
    pub item_id: String,
    /// Attachment filename, `<column>_idx_<n>`
    pub filename: String,
    /// Shard number parsed from the filename
    pub number: u32,
    /// Attachment size in bytes as reported by the backend
    pub size: u64,
    /// Attachment download URL
    pub url: String,
}

/// Where the next persist of a column's writable structure lands
#[derive(Debug, Clone)]
pub struct WritableShard {
    /// The shard being replaced, when one is still under the ceiling
    pub current: Option<ShardRef>,
    /// Shard number to write
    pub number: u32,
}

/// Shard persistence over a table's metadata container
#[derive(Debug)]
pub struct ShardStore<'a, S: BlobStore> {
    store: &'a S,
    meta_container: String,
    size_limit: usize,
}

impl<'a, S: BlobStore> ShardStore<'a, S> {
    pub fn new(store: &'a S, meta_container: &str) -> Self {
        Self {
            store,
            meta_container: meta_container.to_string(),
            size_limit: SHARD_SIZE_LIMIT,
        }
    }

    /// Overrides the size ceiling. Tests use tiny limits to force
    /// rollover without megabytes of fixture data.
    pub fn with_size_limit(mut self, size_limit: usize) -> Self {
        self.size_limit = size_limit;
        self
    }

    /// Largest payload a writable shard may reach
    pub fn writable_ceiling(&self) -> usize {
        self.size_limit.saturating_sub(SHARD_SAFETY_MARGIN)
    }

    /// Every shard of a column, ordered by shard number
    pub async fn shards_for(&self, column: &str) -> IndexResult<Vec<ShardRef>> {
        let items = list_all_items(self.store, &self.meta_container).await?;
        Ok(shards_from_items(&items, column))
    }

    /// True when at least one shard exists for the column
    pub async fn has_index(&self, column: &str) -> IndexResult<bool> {
        Ok(!self.shards_for(column).await?.is_empty())
    }

    /// Decodes one shard's structure
    pub async fn load(&self, shard: &ShardRef, column_type: ColumnType) -> IndexResult<IndexData> {
        let bytes = self.store.get_attachment(&shard.url).await?;
        IndexData::from_bytes(column_type, &shard.filename, &bytes)
    }

    /// Loads the writable shard of a column: the first shard under the
    /// ceiling, decoded, plus where the next persist should land.
    ///
    /// When the column has no shards yet this yields an empty structure
    /// destined for shard 0, so the first insert through the write path
    /// creates the index implicitly. When every shard is sealed, a fresh
    /// structure destined for `max + 1` is returned.
    pub async fn load_writable(
        &self,
        column: &str,
        column_type: ColumnType,
    ) -> IndexResult<(IndexData, WritableShard)> {
        let shards = self.shards_for(column).await?;
        let ceiling = self.writable_ceiling() as u64;
        let writable = shards.iter().find(|shard| shard.size < ceiling);
        match writable {
            Some(shard) => {
                let data = self.load(shard, column_type).await?;
                let target = WritableShard {
                    number: shard.number,
                    current: Some(shard.clone()),
                };
                Ok((data, target))
            }
            None => {
                let number = shards.last().map(|shard| shard.number + 1).unwrap_or(0);
                Ok((
                    IndexData::empty(column_type),
                    WritableShard {
                        current: None,
                        number,
                    },
                ))
            }
        }
    }

    /// Uploads a shard, replacing the previous fragment when one exists.
    ///
    /// The new attachment goes up first; the old item is deleted only
    /// after the upload succeeds. A crash in between leaves a duplicate
    /// shard number behind rather than losing entries.
    pub async fn persist(
        &self,
        column: &str,
        data: &IndexData,
        target: &WritableShard,
    ) -> IndexResult<ShardRef> {
        let filename = shard_filename(column, target.number);
        let bytes = data.to_bytes(column)?;
        let size = bytes.len();
        let item = self
            .store
            .create_attachment_item(&self.meta_container, &filename, bytes)
            .await?;
        if let Some(old) = &target.current {
            self.store
                .delete_item(&self.meta_container, &old.item_id)
                .await?;
        }
        Logger::info(
            "INDEX_SHARD_PERSISTED",
            &[
                ("shard", filename.as_str()),
                ("bytes", &size.to_string()),
                ("keys", &data.key_count().to_string()),
            ],
        );
        shard_ref_for(&item, column).ok_or_else(|| IndexError::ShardDecode {
            shard: filename,
            reason: "uploaded item carries no shard attachment".to_string(),
        })
    }

    /// Loads every shard of a column, ordered by number
    pub async fn enumerate_all(
        &self,
        column: &str,
        column_type: ColumnType,
    ) -> IndexResult<Vec<(ShardRef, IndexData)>> {
        let shards = self.shards_for(column).await?;
        let mut loaded = Vec::with_capacity(shards.len());
        for shard in shards {
            let data = self.load(&shard, column_type).await?;
            loaded.push((shard, data));
        }
        Ok(loaded)
    }
}

/// Picks a column's shards out of an already-listed metadata container,
/// ordered by shard number. Query execution lists the container once and
/// reuses the result across conditions.
pub fn shards_from_items(items: &[Item], column: &str) -> Vec<ShardRef> {
    let mut shards: Vec<ShardRef> = items
        .iter()
        .filter_map(|item| shard_ref_for(item, column))
        .collect();
    shards.sort_by_key(|shard| shard.number);
    shards
}

fn shard_ref_for(item: &Item, column: &str) -> Option<ShardRef> {
    let attachment = item.attachment()?;
    let (owner, number) = parse_shard_filename(&attachment.filename)?;
    if owner != column {
        return None;
    }
    Some(ShardRef {
        item_id: item.id.clone(),
        filename: attachment.filename.clone(),
        number,
        size: attachment.size,
        url: attachment.url.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryStore;

    #[test]
    fn test_shard_filename_round_trip() {
        assert_eq!(shard_filename("age", 0), "age_idx_0");
        assert_eq!(parse_shard_filename("age_idx_0"), Some(("age", 0)));
        assert_eq!(parse_shard_filename("age_idx_12"), Some(("age", 12)));
    }

    #[test]
    fn test_parse_tolerates_underscored_columns() {
        assert_eq!(
            parse_shard_filename("first_name_idx_3"),
            Some(("first_name", 3))
        );
        // A column may even end in "_idx"
        assert_eq!(parse_shard_filename("my_idx_idx_1"), Some(("my_idx", 1)));
    }

    #[test]
    fn test_parse_rejects_foreign_filenames() {
        assert_eq!(parse_shard_filename("schema"), None);
        assert_eq!(parse_shard_filename("age_idx_"), None);
        assert_eq!(parse_shard_filename("age_idx_x"), None);
        assert_eq!(parse_shard_filename("_idx_0"), None);
    }

    #[test]
    fn test_text_keys_truncate_at_limit() {
        let mut data = IndexData::empty(ColumnType::Text);
        let long: String = "a".repeat(1500);
        let truncated: String = "a".repeat(1000);

        data.insert("name", &CellValue::Text(long.clone()), "r1".to_string())
            .unwrap();
        // The truncated spelling reaches the same bucket
        assert_eq!(data.find_equal(&CellValue::Text(truncated)), vec!["r1"]);
        assert_eq!(data.find_equal(&CellValue::Text(long)), vec!["r1"]);
    }

    #[test]
    fn test_remove_missing_entry_is_an_error() {
        let mut data = IndexData::empty(ColumnType::Numeric);
        data.insert("age", &CellValue::Numeric(30.0), "r1".to_string())
            .unwrap();

        let err = data
            .remove("age", &CellValue::Numeric(30.0), "r2")
            .unwrap_err();
        assert!(matches!(err, IndexError::EntryNotFound { .. }));
    }

    #[test]
    fn test_type_mismatch_is_rejected() {
        let mut data = IndexData::empty(ColumnType::Numeric);
        let err = data
            .insert("age", &CellValue::Text("x".to_string()), "r1".to_string())
            .unwrap_err();
        assert!(matches!(err, IndexError::KeyTypeMismatch { .. }));
    }

    #[test]
    fn test_text_shard_round_trip() {
        let mut data = IndexData::empty(ColumnType::Text);
        data.insert("name", &CellValue::Text("alice".to_string()), "r1".to_string())
            .unwrap();
        data.insert("name", &CellValue::Text("alice".to_string()), "r2".to_string())
            .unwrap();

        let bytes = data.to_bytes("name").unwrap();
        let restored = IndexData::from_bytes(ColumnType::Text, "name_idx_0", &bytes).unwrap();
        assert_eq!(
            restored.find_equal(&CellValue::Text("alice".to_string())),
            vec!["r1", "r2"]
        );
    }

    #[tokio::test]
    async fn test_load_writable_starts_at_shard_zero() {
        let store = MemoryStore::new();
        let meta = store.create_container("users_idx").await.unwrap();
        let shards = ShardStore::new(&store, &meta.id);

        let (data, target) = shards
            .load_writable("age", ColumnType::Numeric)
            .await
            .unwrap();
        assert_eq!(data.key_count(), 0);
        assert_eq!(target.number, 0);
        assert!(target.current.is_none());
    }

    #[tokio::test]
    async fn test_persist_replaces_previous_fragment() {
        let store = MemoryStore::new();
        let meta = store.create_container("users_idx").await.unwrap();
        let shards = ShardStore::new(&store, &meta.id);

        let (mut data, target) = shards
            .load_writable("age", ColumnType::Numeric)
            .await
            .unwrap();
        data.insert("age", &CellValue::Numeric(30.0), "r1".to_string())
            .unwrap();
        shards.persist("age", &data, &target).await.unwrap();

        let (mut data, target) = shards
            .load_writable("age", ColumnType::Numeric)
            .await
            .unwrap();
        assert_eq!(target.number, 0);
        data.insert("age", &CellValue::Numeric(31.0), "r2".to_string())
            .unwrap();
        shards.persist("age", &data, &target).await.unwrap();

        // Still exactly one shard item in the container
        assert_eq!(store.item_count(&meta.id), 1);
        let all = shards
            .enumerate_all("age", ColumnType::Numeric)
            .await
            .unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].1.key_count(), 2);
    }

    #[tokio::test]
    async fn test_sealed_shards_push_writes_to_a_new_number() {
        let store = MemoryStore::new();
        let meta = store.create_container("users_idx").await.unwrap();
        // Ceiling of zero: every persisted shard is immediately sealed
        let shards = ShardStore::new(&store, &meta.id).with_size_limit(SHARD_SAFETY_MARGIN);

        let mut data = IndexData::empty(ColumnType::Numeric);
        data.insert("age", &CellValue::Numeric(30.0), "r1".to_string())
            .unwrap();
        shards
            .persist(
                "age",
                &data,
                &WritableShard {
                    current: None,
                    number: 0,
                },
            )
            .await
            .unwrap();

        let (data, target) = shards
            .load_writable("age", ColumnType::Numeric)
            .await
            .unwrap();
        assert_eq!(data.key_count(), 0);
        assert_eq!(target.number, 1);
        assert!(target.current.is_none());
    }

    #[tokio::test]
    async fn test_shards_for_ignores_other_columns() {
        let store = MemoryStore::new();
        let meta = store.create_container("users_idx").await.unwrap();
        let shards = ShardStore::new(&store, &meta.id);

        let data = IndexData::empty(ColumnType::Numeric);
        shards
            .persist(
                "age",
                &data,
                &WritableShard {
                    current: None,
                    number: 0,
                },
            )
            .await
            .unwrap();

        assert!(shards.has_index("age").await.unwrap());
        assert!(!shards.has_index("name").await.unwrap());
        assert!(shards.shards_for("name").await.unwrap().is_empty());
    }
}
