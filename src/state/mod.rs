//! Persistent store for synced likes.
//!
//! This module provides the SQLite-backed store the sync engine writes to:
//! - One row per liked video, keyed by video id (idempotent upsert)
//! - A single-row resumption cursor in the `metadata` table
//! - A history of sync runs for status reporting

pub mod db;
pub mod error;
pub mod schema;
pub mod types;

pub use db::{LikeStore, SqliteLikeStore};
pub use error::StateError;
pub use types::{MediaRecord, StoreSummary, SyncRunStats};
