//! Backend gateway error types

use thiserror::Error;

/// Result type for backend operations
pub type BackendResult<T> = Result<T, BackendError>;

/// Errors surfaced by the remote blob/item store.
///
/// Throttling is normally absorbed by the bounded retry loop in the
/// gateway and never reaches callers; `RetriesExhausted` is the escape
/// hatch when the backend keeps throttling past the retry budget.
#[derive(Debug, Clone, Error)]
pub enum BackendError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Backend returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Failed to decode backend response: {0}")]
    Decode(String),

    #[error("Backend kept throttling; gave up after {0} attempts")]
    RetriesExhausted(usize),

    #[error("Container not found: {0}")]
    ContainerNotFound(String),

    #[error("Item not found: {0}")]
    ItemNotFound(String),

    #[error("Attachment not found: {0}")]
    AttachmentNotFound(String),
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        BackendError::Transport(err.to_string())
    }
}
