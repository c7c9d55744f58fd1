//! In-memory implementation of the blob/item store
//!
//! Backs the integration tests and local experiments. Mirrors the
//! remote store's observable behavior: newest-first listing, cursor
//! pagination, opaque monotonically ordered item ids, and size metadata
//! on attachments.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use super::errors::{BackendError, BackendResult};
use super::store::BlobStore;
use super::types::{AttachmentInfo, ContainerInfo, Item};

#[derive(Debug, Default)]
struct MemoryInner {
    containers: Vec<ContainerInfo>,
    /// Items per container, oldest first
    items: HashMap<String, Vec<Item>>,
    attachments: HashMap<String, Vec<u8>>,
    next_id: u64,
}

impl MemoryInner {
    fn mint_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        // Zero-padded so lexicographic order matches creation order
        format!("{}-{:012}", prefix, self.next_id)
    }

    fn container_items(&self, container: &str) -> BackendResult<&Vec<Item>> {
        self.items
            .get(container)
            .ok_or_else(|| BackendError::ContainerNotFound(container.to_string()))
    }

    fn container_items_mut(&mut self, container: &str) -> BackendResult<&mut Vec<Item>> {
        self.items
            .get_mut(container)
            .ok_or_else(|| BackendError::ContainerNotFound(container.to_string()))
    }
}

/// Blob store held entirely in process memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryInner>,
}

impl MemoryStore {
    /// Creates an empty store
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Number of items currently held by a container (test helper)
    pub fn item_count(&self, container: &str) -> usize {
        self.lock()
            .items
            .get(container)
            .map(|items| items.len())
            .unwrap_or(0)
    }
}

impl BlobStore for MemoryStore {
    async fn list_containers(&self) -> BackendResult<Vec<ContainerInfo>> {
        Ok(self.lock().containers.clone())
    }

    async fn create_container(&self, name: &str) -> BackendResult<ContainerInfo> {
        let mut inner = self.lock();
        let id = inner.mint_id("ctr");
        let info = ContainerInfo {
            id: id.clone(),
            name: name.to_string(),
        };
        inner.containers.push(info.clone());
        inner.items.insert(id, Vec::new());
        Ok(info)
    }

    async fn list_items(
        &self,
        container: &str,
        limit: u8,
        before: Option<&str>,
    ) -> BackendResult<Vec<Item>> {
        let inner = self.lock();
        let items = inner.container_items(container)?;
        let newest_first = items.iter().rev();
        let page: Vec<Item> = match before {
            Some(cursor) => newest_first
                .skip_while(|item| item.id.as_str() != cursor)
                .skip(1)
                .take(limit as usize)
                .cloned()
                .collect(),
            None => newest_first.take(limit as usize).cloned().collect(),
        };
        Ok(page)
    }

    async fn create_item(&self, container: &str, content: &str) -> BackendResult<Item> {
        let mut inner = self.lock();
        let id = inner.mint_id("itm");
        let item = Item {
            id,
            content: content.to_string(),
            attachments: Vec::new(),
        };
        inner.container_items_mut(container)?.push(item.clone());
        Ok(item)
    }

    async fn create_attachment_item(
        &self,
        container: &str,
        filename: &str,
        bytes: Vec<u8>,
    ) -> BackendResult<Item> {
        let mut inner = self.lock();
        let id = inner.mint_id("itm");
        let url = format!("memory://{}/{}/{}", container, id, filename);
        let item = Item {
            id,
            content: String::new(),
            attachments: vec![AttachmentInfo {
                filename: filename.to_string(),
                size: bytes.len() as u64,
                url: url.clone(),
            }],
        };
        inner.attachments.insert(url, bytes);
        inner.container_items_mut(container)?.push(item.clone());
        Ok(item)
    }

    async fn get_item(&self, container: &str, item: &str) -> BackendResult<Item> {
        let inner = self.lock();
        inner
            .container_items(container)?
            .iter()
            .find(|candidate| candidate.id == item)
            .cloned()
            .ok_or_else(|| BackendError::ItemNotFound(item.to_string()))
    }

    async fn patch_item(&self, container: &str, item: &str, content: &str) -> BackendResult<Item> {
        let mut inner = self.lock();
        let stored = inner
            .container_items_mut(container)?
            .iter_mut()
            .find(|candidate| candidate.id == item)
            .ok_or_else(|| BackendError::ItemNotFound(item.to_string()))?;
        stored.content = content.to_string();
        Ok(stored.clone())
    }

    async fn delete_item(&self, container: &str, item: &str) -> BackendResult<()> {
        let mut inner = self.lock();
        let items = inner.container_items_mut(container)?;
        let position = items
            .iter()
            .position(|candidate| candidate.id == item)
            .ok_or_else(|| BackendError::ItemNotFound(item.to_string()))?;
        items.remove(position);
        Ok(())
    }

    async fn get_attachment(&self, url: &str) -> BackendResult<Vec<u8>> {
        self.lock()
            .attachments
            .get(url)
            .cloned()
            .ok_or_else(|| BackendError::AttachmentNotFound(url.to_string()))
    }
}
