use thiserror::Error;

use super::source::FetchError;
use crate::state::StateError;

/// Errors that end a sync run.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("Storage failure: {0}")]
    Storage(#[from] StateError),

    #[error("Sync cancelled before the listing was exhausted")]
    Cancelled,
}

impl SyncError {
    /// Whether running the sync again without intervention may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Fetch(e) => e.is_retryable(),
            SyncError::Storage(_) | SyncError::Cancelled => false,
        }
    }
}
