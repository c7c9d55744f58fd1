//! The blob/item store seam and its pagination helpers

use super::errors::BackendResult;
use super::types::{ContainerInfo, Item};

/// Largest page the backend serves per listing call
pub const PAGE_SIZE: u8 = 100;

/// The remote blob/item store as seen by the core.
///
/// Listing is newest-first; full scans page backwards using the last
/// item's id as the cursor. Implementations are responsible for their
/// own rate limiting and retry behavior.
#[allow(async_fn_in_trait)]
pub trait BlobStore {
    /// Lists every container in the configured space
    async fn list_containers(&self) -> BackendResult<Vec<ContainerInfo>>;

    /// Creates a new container
    async fn create_container(&self, name: &str) -> BackendResult<ContainerInfo>;

    /// Lists up to `limit` items, newest first, optionally starting
    /// strictly after the item identified by `before`
    async fn list_items(
        &self,
        container: &str,
        limit: u8,
        before: Option<&str>,
    ) -> BackendResult<Vec<Item>>;

    /// Creates an item with inline content
    async fn create_item(&self, container: &str, content: &str) -> BackendResult<Item>;

    /// Creates an item carrying a named attachment
    async fn create_attachment_item(
        &self,
        container: &str,
        filename: &str,
        bytes: Vec<u8>,
    ) -> BackendResult<Item>;

    /// Fetches a single item by id
    async fn get_item(&self, container: &str, item: &str) -> BackendResult<Item>;

    /// Replaces an item's inline content in place (the id is preserved)
    async fn patch_item(&self, container: &str, item: &str, content: &str) -> BackendResult<Item>;

    /// Deletes an item
    async fn delete_item(&self, container: &str, item: &str) -> BackendResult<()>;

    /// Downloads an attachment's raw bytes
    async fn get_attachment(&self, url: &str) -> BackendResult<Vec<u8>>;
}

/// Pages through every item of a container, newest first.
///
/// Stops when a page comes back shorter than requested.
pub async fn list_all_items<S: BlobStore>(store: &S, container: &str) -> BackendResult<Vec<Item>> {
    let mut results = store.list_items(container, PAGE_SIZE, None).await?;
    if results.len() < PAGE_SIZE as usize {
        return Ok(results);
    }
    while let Some(cursor) = results.last().map(|item| item.id.clone()) {
        let page = store.list_items(container, PAGE_SIZE, Some(&cursor)).await?;
        let short_page = page.len() < PAGE_SIZE as usize;
        results.extend(page);
        if short_page {
            break;
        }
    }
    Ok(results)
}

/// Pages through a container until `limit` items are collected (or the
/// container is exhausted), newest first.
pub async fn list_items_limited<S: BlobStore>(
    store: &S,
    container: &str,
    limit: usize,
) -> BackendResult<Vec<Item>> {
    let mut results: Vec<Item> = Vec::new();
    let mut cursor: Option<String> = None;
    while results.len() < limit {
        let want = (limit - results.len()).min(PAGE_SIZE as usize) as u8;
        let page = store.list_items(container, want, cursor.as_deref()).await?;
        let short_page = page.len() < want as usize;
        results.extend(page);
        if short_page {
            break;
        }
        cursor = results.last().map(|item| item.id.clone());
    }
    results.truncate(limit);
    Ok(results)
}
