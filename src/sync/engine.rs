//! Sync engine: walks the remote listing page by page, upserting every
//! record into the store, and advances the resumption cursor only when the
//! walk finished cleanly.
//!
//! A run goes `Init -> Paging -> Done | Failed`. Pages are strictly
//! sequential because each continuation token is only known once the
//! previous page has been read. Cancellation is checked between pages,
//! never inside one.

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use super::error::SyncError;
use super::report::{ErrorInfo, RunReport, RunStatus, OLDEST_IN_REPORT};
use super::source::{check_page_size, PageSource, MAX_PAGE_SIZE};
use crate::state::{LikeStore, MediaRecord};

/// Subset of application config consumed by the sync engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncConfig {
    pub(crate) page_size: u32,
    /// Stop after this many pages; 0 means no limit.
    pub(crate) max_pages: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            page_size: MAX_PAGE_SIZE,
            max_pages: 0,
        }
    }
}

impl SyncConfig {
    /// Build a config, rejecting page sizes the platform would not serve.
    pub fn new(page_size: u32, max_pages: u32) -> anyhow::Result<Self> {
        check_page_size(page_size)?;
        Ok(Self {
            page_size,
            max_pages,
        })
    }

    fn page_limit_reached(&self, pages_fetched: u64) -> bool {
        self.max_pages > 0 && pages_fetched >= u64::from(self.max_pages)
    }
}

/// Counters accumulated while paging.
#[derive(Debug, Default)]
struct Progress {
    pages_fetched: u64,
    records_fetched: u64,
    records_stored: u64,
    next_page_token: Option<String>,
}

pub struct SyncEngine<'a> {
    source: &'a dyn PageSource,
    store: &'a dyn LikeStore,
    config: SyncConfig,
    shutdown_token: CancellationToken,
}

impl<'a> SyncEngine<'a> {
    pub fn new(
        source: &'a dyn PageSource,
        store: &'a dyn LikeStore,
        config: SyncConfig,
        shutdown_token: CancellationToken,
    ) -> Self {
        Self {
            source,
            store,
            config,
            shutdown_token,
        }
    }

    /// Run one sync to completion or failure.
    ///
    /// Never returns an error directly: failures end the run in
    /// [`RunStatus::Failed`] with the cause attached to the report, and
    /// everything upserted before the failure stays stored.
    pub async fn run(&self) -> RunReport {
        let started_at = Utc::now();
        let mut progress = Progress::default();

        let (run_id, outcome) = match self.store.start_sync_run(started_at).await {
            Ok(run_id) => (
                Some(run_id),
                self.sync_pages(started_at, &mut progress).await,
            ),
            Err(e) => (None, Err(SyncError::from(e))),
        };

        let (status, error) = match outcome {
            Ok(()) => {
                tracing::info!(
                    pages = progress.pages_fetched,
                    stored = progress.records_stored,
                    "Sync complete, cursor advanced to {}",
                    started_at
                );
                (RunStatus::Done, None)
            }
            Err(e) => {
                tracing::error!(
                    pages = progress.pages_fetched,
                    stored = progress.records_stored,
                    retryable = e.is_retryable(),
                    "Sync failed, cursor left unchanged: {}",
                    e
                );
                (RunStatus::Failed, Some(ErrorInfo::from(&e)))
            }
        };

        let oldest_stored = match self.store.query_oldest(OLDEST_IN_REPORT).await {
            Ok(records) => records,
            Err(e) => {
                tracing::warn!("Failed to load oldest stored videos: {}", e);
                Vec::new()
            }
        };

        let report = RunReport {
            started_at,
            pages_fetched: progress.pages_fetched,
            records_fetched: progress.records_fetched,
            records_stored: progress.records_stored,
            oldest_stored,
            status,
            error,
            next_page_token: progress.next_page_token,
        };

        if let Some(run_id) = run_id {
            if let Err(e) = self.store.complete_sync_run(run_id, &report.stats()).await {
                tracing::warn!(run_id, "Failed to record sync run: {}", e);
            }
        }

        report
    }

    async fn sync_pages(
        &self,
        started_at: DateTime<Utc>,
        progress: &mut Progress,
    ) -> Result<(), SyncError> {
        let after = self.store.get_cursor().await?;
        match after {
            Some(cursor) => tracing::info!("Last sync at {}, fetching newer likes", cursor),
            None => tracing::info!("First sync, fetching all liked videos"),
        }

        let mut page_token: Option<String> = None;
        loop {
            if self.shutdown_token.is_cancelled() {
                progress.next_page_token = page_token;
                return Err(SyncError::Cancelled);
            }

            let page = self
                .source
                .fetch_page(page_token.as_deref(), after, self.config.page_size)
                .await?;
            let page_len = page.items.len();
            progress.pages_fetched += 1;
            progress.records_fetched += page_len as u64;

            for raw in page.items {
                let record = MediaRecord::try_from(raw)?;
                self.store.upsert(&record).await?;
                progress.records_stored += 1;
            }
            tracing::debug!(
                page = progress.pages_fetched,
                records = page_len,
                "Stored page"
            );

            page_token = page.next_page_token;
            if page_token.is_none() {
                break;
            }
            if self.config.page_limit_reached(progress.pages_fetched) {
                tracing::info!(
                    max_pages = self.config.max_pages,
                    "Page limit reached, stopping before the listing is exhausted"
                );
                break;
            }
        }

        self.store.set_cursor(started_at).await?;
        progress.next_page_token = page_token;
        Ok(())
    }
}
