//! Table client: provisioning and record mutations
//!
//! A table is a pair of containers in the remote store: `<name>` holds
//! the records, `<name>_idx` holds the schema attachment and the index
//! shards. Every mutation validates against the schema first, writes the
//! record, then applies one index operation per column, strictly in
//! sequence.

use std::collections::BTreeMap;

use crate::backend::{list_all_items, BackendError, BlobStore};
use crate::index::{IndexBuilder, IndexMaintainer, IndexOp};
use crate::observability::Logger;
use crate::query::{Query, QueryExecutor, QueryResult};
use crate::schema::{TableSchema, SCHEMA_ATTACHMENT};

use super::errors::{TableError, TableResult};
use super::record::{decode_item, encode_payload, fits_inline, Record, RECORD_ATTACHMENT_NAME};

/// Suffix pairing a table container with its metadata container
pub const META_SUFFIX: &str = "_idx";

/// Resolved container ids for one table
#[derive(Debug, Clone)]
pub struct TableHandle {
    pub table_id: String,
    pub meta_id: String,
}

/// Client over one backend store
#[derive(Debug)]
pub struct DbClient<S: BlobStore> {
    store: S,
}

impl<S: BlobStore> DbClient<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// The underlying store (tests inspect it directly)
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Resolves a table name to its container pair.
    ///
    /// Both containers must exist before any record or index operation.
    pub async fn resolve_handle(&self, table: &str) -> TableResult<TableHandle> {
        let containers = self.store.list_containers().await?;
        let table_id = containers
            .iter()
            .find(|c| c.name == table)
            .map(|c| c.id.clone())
            .ok_or_else(|| TableError::NoSuchTable(table.to_string()))?;
        let meta_name = format!("{}{}", table, META_SUFFIX);
        let meta_id = containers
            .iter()
            .find(|c| c.name == meta_name)
            .map(|c| c.id.clone())
            .ok_or_else(|| TableError::NoMetadata(table.to_string()))?;
        Ok(TableHandle { table_id, meta_id })
    }

    /// Resolves a table and loads its schema
    pub async fn resolve(&self, table: &str) -> TableResult<(TableHandle, TableSchema)> {
        let handle = self.resolve_handle(table).await?;
        let schema = self.load_schema(table, &handle).await?;
        Ok((handle, schema))
    }

    async fn load_schema(&self, table: &str, handle: &TableHandle) -> TableResult<TableSchema> {
        let items = list_all_items(&self.store, &handle.meta_id).await?;
        let attachment = items
            .iter()
            .filter_map(|item| item.attachment())
            .find(|a| a.filename == SCHEMA_ATTACHMENT)
            .ok_or_else(|| TableError::NoSchema(table.to_string()))?;
        let bytes = self.store.get_attachment(&attachment.url).await?;
        serde_json::from_slice(&bytes).map_err(|e| TableError::SchemaDecode {
            table: table.to_string(),
            reason: e.to_string(),
        })
    }

    // --- provisioning ---

    /// Creates the table's container pair.
    ///
    /// Fails when either container already exists.
    pub async fn create_table(&self, table: &str) -> TableResult<()> {
        let containers = self.store.list_containers().await?;
        let meta_name = format!("{}{}", table, META_SUFFIX);
        if containers
            .iter()
            .any(|c| c.name == table || c.name == meta_name)
        {
            return Err(TableError::AlreadyExists(table.to_string()));
        }
        self.store.create_container(table).await?;
        self.store.create_container(&meta_name).await?;
        Logger::info("TABLE_CREATED", &[("table", table)]);
        Ok(())
    }

    /// Stores the table's schema.
    ///
    /// Allowed exactly once, and only while both the table and its
    /// metadata container are still empty.
    pub async fn create_schema(&self, table: &str, schema: &TableSchema) -> TableResult<()> {
        let handle = self.resolve_handle(table).await?;
        let table_items = self.store.list_items(&handle.table_id, 1, None).await?;
        if !table_items.is_empty() {
            return Err(TableError::NotEmpty(table.to_string()));
        }
        let meta_items = self.store.list_items(&handle.meta_id, 1, None).await?;
        if !meta_items.is_empty() {
            return Err(TableError::MetadataNotEmpty(table.to_string()));
        }
        let bytes = serde_json::to_vec(schema).map_err(|e| TableError::SchemaDecode {
            table: table.to_string(),
            reason: e.to_string(),
        })?;
        self.store
            .create_attachment_item(&handle.meta_id, SCHEMA_ATTACHMENT, bytes)
            .await?;
        Logger::info(
            "SCHEMA_CREATED",
            &[("table", table), ("columns", &schema.len().to_string())],
        );
        Ok(())
    }

    /// Loads the table's schema
    pub async fn get_schema(&self, table: &str) -> TableResult<TableSchema> {
        let handle = self.resolve_handle(table).await?;
        self.load_schema(table, &handle).await
    }

    /// Builds the first index for a column from the table's existing
    /// records. Returns the number of shards written.
    pub async fn create_index(&self, table: &str, column: &str) -> TableResult<u32> {
        let (handle, schema) = self.resolve(table).await?;
        let shards = IndexBuilder::new(&self.store, &handle.table_id, &handle.meta_id)
            .build(column, &schema)
            .await?;
        Ok(shards)
    }

    // --- record mutations ---

    /// Validates and inserts a record, then updates every column's index
    pub async fn insert(
        &self,
        table: &str,
        values: &BTreeMap<String, String>,
    ) -> TableResult<Record> {
        let (handle, schema) = self.resolve(table).await?;
        let typed = schema.validate_record(values)?;
        let payload = encode_payload(&typed)?;

        let item = if fits_inline(&payload) {
            self.store.create_item(&handle.table_id, &payload).await?
        } else {
            self.store
                .create_attachment_item(
                    &handle.table_id,
                    RECORD_ATTACHMENT_NAME,
                    payload.into_bytes(),
                )
                .await?
        };

        let maintainer = IndexMaintainer::new(&self.store, &handle.meta_id);
        for (column, column_type) in schema.columns() {
            let key = typed[column].clone();
            maintainer
                .apply(
                    column,
                    *column_type,
                    &IndexOp::Insert {
                        key,
                        id: item.id.clone(),
                    },
                )
                .await?;
        }

        Ok(Record {
            id: item.id,
            values: typed,
        })
    }

    /// Rewrites a record with new values, then replaces every column's
    /// index entry.
    ///
    /// An inline record staying inline is patched in place and keeps its
    /// id. Any transition involving an attachment writes a new item
    /// first and deletes the old one after, so the id changes.
    pub async fn update(
        &self,
        table: &str,
        record_id: &str,
        values: &BTreeMap<String, String>,
    ) -> TableResult<Record> {
        let (handle, schema) = self.resolve(table).await?;
        let item = self
            .store
            .get_item(&handle.table_id, record_id)
            .await
            .map_err(|e| not_found(e, record_id))?;
        let old = decode_item(&self.store, &item).await?;

        let typed = schema.validate_record(values)?;
        let payload = encode_payload(&typed)?;

        let old_inline = !item
            .attachments
            .iter()
            .any(|a| a.filename == RECORD_ATTACHMENT_NAME);
        let new_id = if old_inline && fits_inline(&payload) {
            self.store
                .patch_item(&handle.table_id, record_id, &payload)
                .await?;
            record_id.to_string()
        } else {
            let new_item = if fits_inline(&payload) {
                self.store.create_item(&handle.table_id, &payload).await?
            } else {
                self.store
                    .create_attachment_item(
                        &handle.table_id,
                        RECORD_ATTACHMENT_NAME,
                        payload.into_bytes(),
                    )
                    .await?
            };
            self.store
                .delete_item(&handle.table_id, record_id)
                .await?;
            new_item.id
        };

        let maintainer = IndexMaintainer::new(&self.store, &handle.meta_id);
        for (column, column_type) in schema.columns() {
            let old_key = old
                .value(column)
                .cloned()
                .ok_or_else(|| TableError::MissingColumnValue {
                    record_id: record_id.to_string(),
                    column: column.clone(),
                })?;
            let new_key = typed[column].clone();
            maintainer
                .apply(
                    column,
                    *column_type,
                    &IndexOp::Replace {
                        old_key,
                        old_id: record_id.to_string(),
                        new_key,
                        new_id: new_id.clone(),
                    },
                )
                .await?;
        }

        Ok(Record {
            id: new_id,
            values: typed,
        })
    }

    /// Deletes a record and removes it from every column's index
    pub async fn delete(&self, table: &str, record_id: &str) -> TableResult<()> {
        let (handle, schema) = self.resolve(table).await?;
        let item = self
            .store
            .get_item(&handle.table_id, record_id)
            .await
            .map_err(|e| not_found(e, record_id))?;
        let record = decode_item(&self.store, &item).await?;

        self.store.delete_item(&handle.table_id, record_id).await?;

        let maintainer = IndexMaintainer::new(&self.store, &handle.meta_id);
        for (column, column_type) in schema.columns() {
            let key = record
                .value(column)
                .cloned()
                .ok_or_else(|| TableError::MissingColumnValue {
                    record_id: record_id.to_string(),
                    column: column.clone(),
                })?;
            maintainer
                .apply(
                    column,
                    *column_type,
                    &IndexOp::Remove {
                        key,
                        id: record_id.to_string(),
                    },
                )
                .await?;
        }
        Ok(())
    }

    /// Runs a query against the table
    pub async fn read(&self, query: &Query) -> QueryResult<Vec<Record>> {
        let (handle, schema) = self.resolve(query.table()).await?;
        QueryExecutor::new(&self.store, &handle.table_id, &handle.meta_id, &schema)
            .execute(query)
            .await
    }
}

fn not_found(e: BackendError, record_id: &str) -> TableError {
    match e {
        BackendError::ItemNotFound(_) => TableError::RecordNotFound(record_id.to_string()),
        other => TableError::Backend(other),
    }
}
