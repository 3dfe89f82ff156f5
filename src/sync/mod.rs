//! Incremental sync of the liked-video listing into the local store.

pub mod engine;
pub mod error;
pub mod record;
pub mod report;
pub mod source;

pub use engine::{SyncConfig, SyncEngine};
pub use error::SyncError;
pub use report::{ErrorKind, RunReport, RunStatus};
pub use source::{FetchError, Page, PageSource, MAX_PAGE_SIZE};
