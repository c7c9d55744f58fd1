//! Wire types for the remote blob/item store

use serde::{Deserialize, Serialize};

/// Backend-assigned container identifier (opaque)
pub type ContainerId = String;

/// Backend-assigned item identifier.
///
/// Opaque and monotonically ordered for pagination, but not guaranteed
/// to be numerically comparable.
pub type ItemId = String;

/// A named container of items (a table or its metadata container)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerInfo {
    pub id: ContainerId,
    pub name: String,
}

/// A size-capped binary attachment carried by an item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentInfo {
    pub filename: String,
    pub size: u64,
    pub url: String,
}

/// One stored item: inline content and/or an attachment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub attachments: Vec<AttachmentInfo>,
}

impl Item {
    /// Returns the first attachment, if any
    pub fn attachment(&self) -> Option<&AttachmentInfo> {
        self.attachments.first()
    }
}

/// Quota information extracted from every backend response
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct QuotaHeaders {
    /// Calls left in the current window (`x-ratelimit-remaining`)
    pub remaining: Option<u64>,
    /// Unix time at which the window resets (`x-ratelimit-reset`)
    pub reset_unix: Option<f64>,
    /// Backend-requested delay in seconds before retrying
    pub retry_after: Option<f64>,
}
