//! Bulk index construction
//!
//! Creating the first index for a column scans the whole table and
//! builds shards incrementally: whenever the serialized structure would
//! cross the size ceiling, the entry that tipped it over is pulled back
//! out, the sealed shard is flushed, and a fresh structure starts with
//! that entry. The final structure is always flushed, so shard 0 exists
//! even for an empty table.

use crate::backend::{list_all_items, BlobStore};
use crate::observability::Logger;
use crate::schema::TableSchema;
use crate::table::record::decode_item;

use super::errors::{IndexError, IndexResult};
use super::shard::{IndexData, ShardStore, WritableShard, SHARD_SIZE_LIMIT};

/// Builds a column's first index from the table's existing records
#[derive(Debug)]
pub struct IndexBuilder<'a, S: BlobStore> {
    store: &'a S,
    table_container: String,
    meta_container: String,
    size_limit: usize,
}

impl<'a, S: BlobStore> IndexBuilder<'a, S> {
    pub fn new(store: &'a S, table_container: &str, meta_container: &str) -> Self {
        Self {
            store,
            table_container: table_container.to_string(),
            meta_container: meta_container.to_string(),
            size_limit: SHARD_SIZE_LIMIT,
        }
    }

    /// Overrides the shard size ceiling (tests force rollover with it)
    pub fn with_shard_limit(mut self, size_limit: usize) -> Self {
        self.size_limit = size_limit;
        self
    }

    /// Scans the table and writes the column's shard set.
    ///
    /// Fails when the column already has shards or is not part of the
    /// schema. Returns the number of shards written.
    pub async fn build(&self, column: &str, schema: &TableSchema) -> IndexResult<u32> {
        let column_type = schema
            .column_type(column)
            .ok_or_else(|| IndexError::UnknownColumn(column.to_string()))?;

        let shards =
            ShardStore::new(self.store, &self.meta_container).with_size_limit(self.size_limit);
        if shards.has_index(column).await? {
            return Err(IndexError::AlreadyExists(column.to_string()));
        }
        let ceiling = shards.writable_ceiling();

        let items = list_all_items(self.store, &self.table_container).await?;
        let mut data = IndexData::empty(column_type);
        let mut number: u32 = 0;
        let mut entries: usize = 0;

        for item in &items {
            let record = decode_item(self.store, item).await?;
            let value = record
                .value(column)
                .ok_or_else(|| IndexError::MissingValue {
                    column: column.to_string(),
                    record_id: record.id.clone(),
                })?
                .clone();
            data.insert(column, &value, record.id.clone())?;
            entries += 1;

            if data.to_bytes(column)?.len() > ceiling {
                // Pull the entry back out, seal what fits, start over
                // with the entry in a fresh structure
                data.remove(column, &value, &record.id)?;
                self.flush(&shards, column, &data, number).await?;
                number += 1;
                data = IndexData::empty(column_type);
                data.insert(column, &value, record.id.clone())?;
            }
        }

        // The final flush always happens, so an index exists even when
        // the table held no records
        self.flush(&shards, column, &data, number).await?;

        Logger::info(
            "INDEX_BUILT",
            &[
                ("column", column),
                ("records", &entries.to_string()),
                ("shards", &(number + 1).to_string()),
            ],
        );
        Ok(number + 1)
    }

    async fn flush(
        &self,
        shards: &ShardStore<'a, S>,
        column: &str,
        data: &IndexData,
        number: u32,
    ) -> IndexResult<()> {
        let target = WritableShard {
            current: None,
            number,
        };
        shards.persist(column, data, &target).await?;
        Ok(())
    }
}
