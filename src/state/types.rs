//! Types for the local like store.

use chrono::{DateTime, Utc};

/// Base URL that a video id is appended to for its canonical watch page.
const WATCH_URL_PREFIX: &str = "https://www.youtube.com/watch?v=";

/// Separator used to flatten `tags` into a single column.
pub const TAG_SEPARATOR: &str = ",";

/// A liked video as stored locally.
///
/// `id` is the identity key: storing a record with an existing id replaces
/// every other field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaRecord {
    /// Video id, globally unique on the platform.
    pub id: String,
    pub title: String,
    pub description: String,
    pub channel_title: String,
    pub thumbnail_url: String,
    pub tags: Vec<String>,
    /// Opaque platform category id.
    pub category_id: String,
    /// Source-defined duration string (ISO 8601 on YouTube), passed through.
    pub duration: String,
    /// Publication time of the video; ordering key for reports.
    pub published_at: DateTime<Utc>,
}

impl MediaRecord {
    /// The canonical watch URL, derived from `id`.
    pub fn canonical_url(&self) -> String {
        canonical_url(&self.id)
    }

    /// Tags flattened into their stored form.
    pub fn joined_tags(&self) -> String {
        self.tags.join(TAG_SEPARATOR)
    }
}

/// Build the canonical watch URL for a video id.
pub fn canonical_url(id: &str) -> String {
    format!("{WATCH_URL_PREFIX}{id}")
}

/// Split a stored tag column back into tags. An empty column means no tags.
pub fn split_tags(stored: &str) -> Vec<String> {
    if stored.is_empty() {
        return Vec::new();
    }
    stored.split(TAG_SEPARATOR).map(str::to_string).collect()
}

/// Statistics recorded for a single sync run.
#[derive(Debug, Clone, Default)]
pub struct SyncRunStats {
    pub pages_fetched: u64,
    pub records_fetched: u64,
    pub records_stored: u64,
    /// Whether the run finished and advanced the cursor.
    pub succeeded: bool,
    pub error: Option<String>,
}

/// The most recent entry of the sync run history.
#[derive(Debug, Clone)]
pub struct LastRun {
    pub started_at: DateTime<Utc>,
    /// Absent while a run is in progress or if the process died mid-run.
    pub completed_at: Option<DateTime<Utc>>,
    pub status: Option<String>,
    pub pages_fetched: u64,
    pub records_fetched: u64,
    pub records_stored: u64,
    pub error: Option<String>,
}

/// Summary of the current store state.
#[derive(Debug, Clone)]
pub struct StoreSummary {
    pub total_records: u64,
    pub cursor: Option<DateTime<Utc>>,
    pub last_run: Option<LastRun>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, tags: &[&str]) -> MediaRecord {
        MediaRecord {
            id: id.to_string(),
            title: String::new(),
            description: String::new(),
            channel_title: String::new(),
            thumbnail_url: String::new(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            category_id: String::new(),
            duration: String::new(),
            published_at: DateTime::UNIX_EPOCH,
        }
    }

    #[test]
    fn test_canonical_url_derived_from_id() {
        assert_eq!(
            record("dQw4w9WgXcQ", &[]).canonical_url(),
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ"
        );
    }

    #[test]
    fn test_joined_tags() {
        assert_eq!(record("a", &["rust", "music"]).joined_tags(), "rust,music");
        assert_eq!(record("a", &[]).joined_tags(), "");
    }

    #[test]
    fn test_split_tags_empty_column() {
        assert!(split_tags("").is_empty());
    }

    #[test]
    fn test_split_tags_preserves_order() {
        assert_eq!(split_tags("b,a,c"), vec!["b", "a", "c"]);
    }
}
