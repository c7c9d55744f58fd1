//! Backend gateway: the remote blob/item store and its rate limiter
//!
//! Every durable byte of a table lives in the remote store: records as
//! items in the table container, schema and index shards as attachments
//! in the metadata container. All remote calls go through a shared
//! [`RateLimiter`] so the backend's global quota is respected across the
//! whole process.

pub mod errors;
pub mod http;
pub mod memory;
pub mod rate_limit;
pub mod store;
pub mod types;

pub use errors::{BackendError, BackendResult};
pub use http::HttpStore;
pub use memory::MemoryStore;
pub use rate_limit::RateLimiter;
pub use store::{list_all_items, list_items_limited, BlobStore, PAGE_SIZE};
pub use types::{AttachmentInfo, ContainerId, ContainerInfo, Item, ItemId, QuotaHeaders};
