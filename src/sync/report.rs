//! Summary of a sync run.

use std::fmt;

use chrono::{DateTime, Utc};

use super::error::SyncError;
use super::source::FetchError;
use crate::state::{MediaRecord, SyncRunStats};

/// Number of oldest stored records included in a report.
pub const OLDEST_IN_REPORT: usize = 5;

/// Terminal state of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// The listing was exhausted (or the page limit reached) and the cursor
    /// was advanced.
    Done,
    /// The run stopped on an error; the cursor was left untouched.
    Failed,
}

/// Classification of the error that ended a failed run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    AuthExpired,
    Transient,
    MalformedPage,
    InvalidRequest,
    Storage,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorInfo {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&SyncError> for ErrorInfo {
    fn from(err: &SyncError) -> Self {
        let kind = match err {
            SyncError::Fetch(FetchError::AuthExpired(_)) => ErrorKind::AuthExpired,
            SyncError::Fetch(FetchError::Transient(_)) => ErrorKind::Transient,
            SyncError::Fetch(FetchError::MalformedPage(_)) => ErrorKind::MalformedPage,
            SyncError::Fetch(FetchError::InvalidRequest(_)) => ErrorKind::InvalidRequest,
            SyncError::Storage(_) => ErrorKind::Storage,
            SyncError::Cancelled => ErrorKind::Cancelled,
        };
        Self {
            kind,
            message: err.to_string(),
        }
    }
}

/// Read-only summary of a completed or failed run.
///
/// On failure the counters tell how much was durably stored before the
/// error; every stored record stays in the database.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Wall-clock time the run started; becomes the cursor on success.
    pub started_at: DateTime<Utc>,
    pub pages_fetched: u64,
    pub records_fetched: u64,
    pub records_stored: u64,
    /// Up to [`OLDEST_IN_REPORT`] stored records, oldest first.
    pub oldest_stored: Vec<MediaRecord>,
    pub status: RunStatus,
    pub error: Option<ErrorInfo>,
    /// Token the run stopped at. Set when a page limit ended the run before
    /// the listing was exhausted.
    pub next_page_token: Option<String>,
}

impl RunReport {
    pub fn is_done(&self) -> bool {
        self.status == RunStatus::Done
    }

    /// Whether running the sync again without intervention may succeed.
    pub fn is_retryable(&self) -> bool {
        match &self.error {
            None => false,
            Some(info) => matches!(
                info.kind,
                ErrorKind::Transient | ErrorKind::MalformedPage
            ),
        }
    }

    pub fn is_auth_expired(&self) -> bool {
        self.error
            .as_ref()
            .is_some_and(|info| info.kind == ErrorKind::AuthExpired)
    }

    /// Row written to the sync run history.
    pub fn stats(&self) -> SyncRunStats {
        SyncRunStats {
            pages_fetched: self.pages_fetched,
            records_fetched: self.records_fetched,
            records_stored: self.records_stored,
            succeeded: self.is_done(),
            error: self.error.as_ref().map(|e| e.message.clone()),
        }
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            RunStatus::Done => write!(f, "sync done")?,
            RunStatus::Failed => write!(f, "sync failed")?,
        }
        write!(
            f,
            ": {} pages, {} fetched, {} stored",
            self.pages_fetched, self.records_fetched, self.records_stored
        )?;
        if let Some(error) = &self.error {
            write!(f, " ({})", error.message)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::StateError;

    fn report(status: RunStatus, error: Option<ErrorInfo>) -> RunReport {
        RunReport {
            started_at: Utc::now(),
            pages_fetched: 2,
            records_fetched: 62,
            records_stored: 60,
            oldest_stored: Vec::new(),
            status,
            error,
            next_page_token: None,
        }
    }

    #[test]
    fn test_error_info_kinds() {
        let cases = [
            (
                SyncError::Fetch(FetchError::AuthExpired("x".into())),
                ErrorKind::AuthExpired,
            ),
            (
                SyncError::Fetch(FetchError::Transient("x".into())),
                ErrorKind::Transient,
            ),
            (
                SyncError::Fetch(FetchError::MalformedPage("x".into())),
                ErrorKind::MalformedPage,
            ),
            (
                SyncError::Storage(StateError::Query("disk I/O error".into())),
                ErrorKind::Storage,
            ),
            (SyncError::Cancelled, ErrorKind::Cancelled),
        ];
        for (err, kind) in cases {
            assert_eq!(ErrorInfo::from(&err).kind, kind);
        }
    }

    #[test]
    fn test_retryable_only_for_transient_kinds() {
        let transient = ErrorInfo {
            kind: ErrorKind::Transient,
            message: "503".into(),
        };
        let auth = ErrorInfo {
            kind: ErrorKind::AuthExpired,
            message: "invalid_grant".into(),
        };
        assert!(report(RunStatus::Failed, Some(transient)).is_retryable());
        assert!(!report(RunStatus::Failed, Some(auth.clone())).is_retryable());
        assert!(report(RunStatus::Failed, Some(auth)).is_auth_expired());
        assert!(!report(RunStatus::Done, None).is_retryable());
    }

    #[test]
    fn test_stats_carry_counters_and_error() {
        let failed = report(
            RunStatus::Failed,
            Some(ErrorInfo {
                kind: ErrorKind::Storage,
                message: "database is locked".into(),
            }),
        );
        let stats = failed.stats();
        assert!(!stats.succeeded);
        assert_eq!(stats.pages_fetched, 2);
        assert_eq!(stats.records_fetched, 62);
        assert_eq!(stats.records_stored, 60);
        assert_eq!(stats.error.as_deref(), Some("database is locked"));
    }

    #[test]
    fn test_display_mentions_counts_and_error() {
        let done = report(RunStatus::Done, None).to_string();
        assert_eq!(done, "sync done: 2 pages, 62 fetched, 60 stored");

        let failed = report(
            RunStatus::Failed,
            Some(ErrorInfo {
                kind: ErrorKind::Transient,
                message: "HTTP 500".into(),
            }),
        )
        .to_string();
        assert!(failed.starts_with("sync failed"));
        assert!(failed.ends_with("(HTTP 500)"));
    }
}
