//! Secondary indexes: tree/hash structures, shard storage, incremental
//! maintenance, and bulk construction

pub mod builder;
pub mod errors;
pub mod maintainer;
pub mod rbtree;
pub mod shard;

pub use builder::IndexBuilder;
pub use errors::{IndexError, IndexResult};
pub use maintainer::{IndexMaintainer, IndexOp};
pub use rbtree::{RbTree, RecordId};
pub use shard::{
    shards_from_items, IndexData, ShardRef, ShardStore, WritableShard, SHARD_SAFETY_MARGIN,
    SHARD_SIZE_LIMIT, TEXT_KEY_LIMIT,
};
