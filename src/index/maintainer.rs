//! Incremental index maintenance on the write path
//!
//! Every record mutation translates into one operation per indexed
//! column, applied strictly in sequence: load the column's writable
//! shard, mutate the structure, persist it back. The writable shard is
//! the only shard the write path ever touches; sealed shards change only
//! through bulk rebuilds.

use crate::backend::BlobStore;
use crate::schema::{CellValue, ColumnType};

use super::errors::IndexResult;
use super::shard::ShardStore;

/// A single index mutation for one column
#[derive(Debug, Clone)]
pub enum IndexOp {
    /// A new record's value entered the table
    Insert { key: CellValue, id: String },
    /// A record left the table
    Remove { key: CellValue, id: String },
    /// A record's value changed; the record id may have changed with it
    /// when the record's storage form moved between inline and attachment
    Replace {
        old_key: CellValue,
        old_id: String,
        new_key: CellValue,
        new_id: String,
    },
}

/// Applies [`IndexOp`]s to a table's shard set
#[derive(Debug)]
pub struct IndexMaintainer<'a, S: BlobStore> {
    shards: ShardStore<'a, S>,
}

impl<'a, S: BlobStore> IndexMaintainer<'a, S> {
    pub fn new(store: &'a S, meta_container: &str) -> Self {
        Self {
            shards: ShardStore::new(store, meta_container),
        }
    }

    #[cfg(test)]
    fn with_size_limit(mut self, size_limit: usize) -> Self {
        self.shards = self.shards.with_size_limit(size_limit);
        self
    }

    /// Loads the writable shard for `column`, applies the operation, and
    /// persists the result.
    ///
    /// When no shard exists yet, an insert lands in a fresh shard 0 (the
    /// index comes into being implicitly). A remove whose key/id pair is
    /// missing from the writable shard fails fast.
    pub async fn apply(
        &self,
        column: &str,
        column_type: ColumnType,
        op: &IndexOp,
    ) -> IndexResult<()> {
        let (mut data, target) = self.shards.load_writable(column, column_type).await?;
        match op {
            IndexOp::Insert { key, id } => {
                data.insert(column, key, id.clone())?;
            }
            IndexOp::Remove { key, id } => {
                data.remove(column, key, id)?;
            }
            IndexOp::Replace {
                old_key,
                old_id,
                new_key,
                new_id,
            } => {
                data.remove(column, old_key, old_id)?;
                data.insert(column, new_key, new_id.clone())?;
            }
        }
        self.shards.persist(column, &data, &target).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryStore;
    use crate::index::errors::IndexError;
    use crate::index::shard::SHARD_SAFETY_MARGIN;

    async fn meta_container(store: &MemoryStore) -> String {
        store.create_container("users_idx").await.unwrap().id
    }

    #[tokio::test]
    async fn test_first_insert_creates_shard_zero() {
        let store = MemoryStore::new();
        let meta = meta_container(&store).await;
        let maintainer = IndexMaintainer::new(&store, &meta);

        maintainer
            .apply(
                "age",
                ColumnType::Numeric,
                &IndexOp::Insert {
                    key: CellValue::Numeric(30.0),
                    id: "r1".to_string(),
                },
            )
            .await
            .unwrap();

        let shards = ShardStore::new(&store, &meta);
        let all = shards
            .enumerate_all("age", ColumnType::Numeric)
            .await
            .unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].0.number, 0);
        assert_eq!(
            all[0].1.find_equal(&CellValue::Numeric(30.0)),
            vec!["r1"]
        );
    }

    #[tokio::test]
    async fn test_insert_then_remove_leaves_empty_shard() {
        let store = MemoryStore::new();
        let meta = meta_container(&store).await;
        let maintainer = IndexMaintainer::new(&store, &meta);

        maintainer
            .apply(
                "age",
                ColumnType::Numeric,
                &IndexOp::Insert {
                    key: CellValue::Numeric(30.0),
                    id: "r1".to_string(),
                },
            )
            .await
            .unwrap();
        maintainer
            .apply(
                "age",
                ColumnType::Numeric,
                &IndexOp::Remove {
                    key: CellValue::Numeric(30.0),
                    id: "r1".to_string(),
                },
            )
            .await
            .unwrap();

        let shards = ShardStore::new(&store, &meta);
        let all = shards
            .enumerate_all("age", ColumnType::Numeric)
            .await
            .unwrap();
        // Shard 0 survives, holding nothing
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].1.key_count(), 0);
    }

    #[tokio::test]
    async fn test_remove_of_absent_entry_fails_fast() {
        let store = MemoryStore::new();
        let meta = meta_container(&store).await;
        let maintainer = IndexMaintainer::new(&store, &meta);

        let err = maintainer
            .apply(
                "age",
                ColumnType::Numeric,
                &IndexOp::Remove {
                    key: CellValue::Numeric(99.0),
                    id: "ghost".to_string(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, IndexError::EntryNotFound { .. }));
    }

    #[tokio::test]
    async fn test_replace_swaps_key_and_id() {
        let store = MemoryStore::new();
        let meta = meta_container(&store).await;
        let maintainer = IndexMaintainer::new(&store, &meta);

        maintainer
            .apply(
                "age",
                ColumnType::Numeric,
                &IndexOp::Insert {
                    key: CellValue::Numeric(30.0),
                    id: "r1".to_string(),
                },
            )
            .await
            .unwrap();
        maintainer
            .apply(
                "age",
                ColumnType::Numeric,
                &IndexOp::Replace {
                    old_key: CellValue::Numeric(30.0),
                    old_id: "r1".to_string(),
                    new_key: CellValue::Numeric(31.0),
                    new_id: "r2".to_string(),
                },
            )
            .await
            .unwrap();

        let shards = ShardStore::new(&store, &meta);
        let all = shards
            .enumerate_all("age", ColumnType::Numeric)
            .await
            .unwrap();
        assert!(all[0].1.find_equal(&CellValue::Numeric(30.0)).is_empty());
        assert_eq!(all[0].1.find_equal(&CellValue::Numeric(31.0)), vec!["r2"]);
    }

    #[tokio::test]
    async fn test_sealed_shard_rolls_writes_forward() {
        let store = MemoryStore::new();
        let meta = meta_container(&store).await;
        // Ceiling of zero seals every shard the moment it is persisted
        let maintainer =
            IndexMaintainer::new(&store, &meta).with_size_limit(SHARD_SAFETY_MARGIN);

        for (i, id) in ["r1", "r2", "r3"].iter().enumerate() {
            maintainer
                .apply(
                    "age",
                    ColumnType::Numeric,
                    &IndexOp::Insert {
                        key: CellValue::Numeric(i as f64),
                        id: id.to_string(),
                    },
                )
                .await
                .unwrap();
        }

        let shards = ShardStore::new(&store, &meta);
        let all = shards
            .enumerate_all("age", ColumnType::Numeric)
            .await
            .unwrap();
        // One shard per insert, numbered contiguously
        assert_eq!(all.len(), 3);
        let numbers: Vec<u32> = all.iter().map(|(shard, _)| shard.number).collect();
        assert_eq!(numbers, vec![0, 1, 2]);
    }
}
