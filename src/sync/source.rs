//! The remote side of a sync: a paginated, token-continued listing.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use super::record::RawVideo;

/// Largest page the platform will serve in one listing call.
pub const MAX_PAGE_SIZE: u32 = 50;

/// One page of a remote listing.
#[derive(Debug, Clone, Default)]
pub struct Page {
    pub items: Vec<RawVideo>,
    /// Continuation token for the next page. `None` means the listing is
    /// exhausted; this is the only end-of-listing signal.
    pub next_page_token: Option<String>,
}

/// Typed fetch errors enabling retry classification.
///
/// `is_retryable()` separates revoked or expired authorization, which needs a
/// human to re-authenticate, from failures that a later run may get past.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("Authorization expired or revoked: {0}")]
    AuthExpired(String),

    #[error("Transient fetch failure: {0}")]
    Transient(String),

    #[error("Malformed page: {0}")]
    MalformedPage(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl FetchError {
    /// Whether running the sync again without intervention may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Transient(_) | FetchError::MalformedPage(_) => true,
            FetchError::AuthExpired(_) | FetchError::InvalidRequest(_) => false,
        }
    }
}

/// A paginated remote listing of liked videos.
#[async_trait]
pub trait PageSource: Send + Sync {
    /// Fetch one page.
    ///
    /// `page_token` is `None` for the first page. When `after` is set, only
    /// items strictly newer than it are returned. `page_size` must be in
    /// `1..=MAX_PAGE_SIZE`.
    async fn fetch_page(
        &self,
        page_token: Option<&str>,
        after: Option<DateTime<Utc>>,
        page_size: u32,
    ) -> Result<Page, FetchError>;
}

/// Reject page sizes outside what the platform serves.
pub fn check_page_size(page_size: u32) -> Result<(), FetchError> {
    if page_size == 0 || page_size > MAX_PAGE_SIZE {
        return Err(FetchError::InvalidRequest(format!(
            "page size {page_size} is outside 1..={MAX_PAGE_SIZE}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_expired_not_retryable() {
        assert!(!FetchError::AuthExpired("invalid_grant".into()).is_retryable());
    }

    #[test]
    fn test_invalid_request_not_retryable() {
        assert!(!FetchError::InvalidRequest("x".into()).is_retryable());
    }

    #[test]
    fn test_transient_retryable() {
        assert!(FetchError::Transient("HTTP 503".into()).is_retryable());
    }

    #[test]
    fn test_malformed_page_retryable() {
        assert!(FetchError::MalformedPage("missing id".into()).is_retryable());
    }

    #[test]
    fn test_check_page_size_bounds() {
        assert!(check_page_size(1).is_ok());
        assert!(check_page_size(MAX_PAGE_SIZE).is_ok());
        assert!(matches!(
            check_page_size(0),
            Err(FetchError::InvalidRequest(_))
        ));
        assert!(matches!(
            check_page_size(MAX_PAGE_SIZE + 1),
            Err(FetchError::InvalidRequest(_))
        ));
    }
}
