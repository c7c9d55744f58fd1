//! Query execution
//!
//! A query without conditions pages through the table container
//! directly. A query with conditions resolves every condition against
//! the column's index shards first and only then fetches the surviving
//! records, so the table is never scanned when an index can answer.
//!
//! Per condition, candidate ids accumulate across ALL shards of the
//! column; decoded shards are cached for the duration of the query so
//! two conditions on the same column decode each shard once. A condition
//! whose aggregate candidate set is empty short-circuits the whole query
//! to the empty result. The limit is applied before any record is
//! fetched; fetches run in small concurrent batches.

use std::collections::HashMap;

use futures_util::future::join_all;

use crate::backend::{list_all_items, list_items_limited, BlobStore};
use crate::index::shard::{shards_from_items, IndexData, ShardRef};
use crate::schema::{ColumnType, TableSchema};
use crate::table::record::{decode_item, fetch_record, Record};

use super::builder::{Condition, Predicate, Query};
use super::errors::{QueryError, QueryResult};
use super::sorter::sort_records;

/// Records fetched concurrently per batch
const FETCH_BATCH: usize = 5;

/// Executes queries against one table's containers
#[derive(Debug)]
pub struct QueryExecutor<'a, S: BlobStore> {
    store: &'a S,
    table_container: &'a str,
    meta_container: &'a str,
    schema: &'a TableSchema,
}

impl<'a, S: BlobStore> QueryExecutor<'a, S> {
    pub fn new(
        store: &'a S,
        table_container: &'a str,
        meta_container: &'a str,
        schema: &'a TableSchema,
    ) -> Self {
        Self {
            store,
            table_container,
            meta_container,
            schema,
        }
    }

    /// Runs the query to completion
    pub async fn execute(&self, query: &Query) -> QueryResult<Vec<Record>> {
        if let Some(order) = query.order() {
            if self.schema.column_type(order.column()).is_none() {
                return Err(QueryError::UnknownOrderColumn(order.column().to_string()));
            }
        }

        let mut records = if query.conditions().is_empty() {
            self.scan(query.limit()).await?
        } else {
            let ids = self.resolve_conditions(query).await?;
            self.fetch_records(&ids).await?
        };

        if let Some(order) = query.order() {
            let column_type = self
                .schema
                .column_type(order.column())
                .unwrap_or(ColumnType::Text);
            sort_records(&mut records, order.column(), column_type, order.direction());
        }
        Ok(records)
    }

    /// Unconditioned read: page through the table, newest first
    async fn scan(&self, limit: usize) -> QueryResult<Vec<Record>> {
        let items = if limit > 0 {
            list_items_limited(self.store, self.table_container, limit).await?
        } else {
            list_all_items(self.store, self.table_container).await?
        };
        let mut records = Vec::with_capacity(items.len());
        for item in &items {
            records.push(decode_item(self.store, item).await?);
        }
        Ok(records)
    }

    /// Resolves every condition to a candidate id list and intersects
    /// them. Returns the surviving ids, already truncated to the limit.
    async fn resolve_conditions(&self, query: &Query) -> QueryResult<Vec<String>> {
        // One metadata listing serves every condition
        let meta_items = list_all_items(self.store, self.meta_container).await?;
        let mut shard_cache: HashMap<String, IndexData> = HashMap::new();

        let mut candidate_lists: Vec<Vec<String>> = Vec::with_capacity(query.conditions().len());
        for condition in query.conditions() {
            let column_type = self
                .schema
                .column_type(condition.column())
                .ok_or_else(|| QueryError::UnknownColumn(condition.column().to_string()))?;
            let shards = shards_from_items(&meta_items, condition.column());
            if shards.is_empty() {
                return Err(QueryError::NoIndex(condition.column().to_string()));
            }

            let mut candidates = Vec::new();
            for shard in &shards {
                let data = self.shard_data(&mut shard_cache, shard, column_type).await?;
                candidates.extend(probe(data, condition, column_type)?);
            }
            if candidates.is_empty() {
                // One empty condition empties the conjunction
                return Ok(Vec::new());
            }
            candidate_lists.push(candidates);
        }

        let mut ids = intersect(candidate_lists);
        if query.limit() > 0 {
            ids.truncate(query.limit());
        }
        Ok(ids)
    }

    async fn shard_data<'c>(
        &self,
        cache: &'c mut HashMap<String, IndexData>,
        shard: &ShardRef,
        column_type: ColumnType,
    ) -> QueryResult<&'c IndexData> {
        if !cache.contains_key(&shard.filename) {
            let bytes = self.store.get_attachment(&shard.url).await?;
            let data = IndexData::from_bytes(column_type, &shard.filename, &bytes)?;
            cache.insert(shard.filename.clone(), data);
        }
        // Just inserted above when absent
        Ok(&cache[&shard.filename])
    }

    /// Materializes records by id, in batches of [`FETCH_BATCH`]
    async fn fetch_records(&self, ids: &[String]) -> QueryResult<Vec<Record>> {
        let mut records = Vec::with_capacity(ids.len());
        for batch in ids.chunks(FETCH_BATCH) {
            let fetched = join_all(
                batch
                    .iter()
                    .map(|id| fetch_record(self.store, self.table_container, id)),
            )
            .await;
            for result in fetched {
                records.push(result?);
            }
        }
        Ok(records)
    }
}

/// Probes one shard's structure with one condition
fn probe(
    data: &IndexData,
    condition: &Condition,
    column_type: ColumnType,
) -> QueryResult<Vec<String>> {
    let range_on_text = || QueryError::UnsupportedOperator {
        column: condition.column().to_string(),
        operator: condition.predicate().operator(),
    };
    match condition.predicate() {
        Predicate::Equals(value) => Ok(data.find_equal(value)),
        Predicate::GreaterThan(bound) => {
            if column_type != ColumnType::Numeric {
                return Err(range_on_text());
            }
            Ok(data.find_range(*bound, f64::INFINITY))
        }
        Predicate::LessThan(bound) => {
            if column_type != ColumnType::Numeric {
                return Err(range_on_text());
            }
            Ok(data.find_range(f64::NEG_INFINITY, *bound))
        }
        Predicate::In(values) => {
            let mut ids = Vec::new();
            for value in values {
                ids.extend(data.find_equal(value));
            }
            Ok(ids)
        }
    }
}

/// Intersects candidate lists: an id survives iff it appears in every
/// list. The smallest list is probed so its order (and any duplicates)
/// carries through to the result.
fn intersect(mut lists: Vec<Vec<String>>) -> Vec<String> {
    if lists.len() == 1 {
        return lists.pop().unwrap_or_default();
    }
    let smallest = lists
        .iter()
        .enumerate()
        .min_by_key(|(_, list)| list.len())
        .map(|(i, _)| i)
        .unwrap_or(0);
    let probe = lists.swap_remove(smallest);
    probe
        .into_iter()
        .filter(|id| lists.iter().all(|list| list.contains(id)))
        .collect()
}
