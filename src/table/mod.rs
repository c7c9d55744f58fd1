//! Tables: record storage, provisioning, and the client surface

pub mod client;
pub mod errors;
pub mod record;

pub use client::{DbClient, TableHandle, META_SUFFIX};
pub use errors::{RecordError, RecordResult, TableError, TableResult};
pub use record::{
    decode_item, fetch_record, Record, INLINE_SIZE_LIMIT, RECORD_ATTACHMENT_NAME,
};
