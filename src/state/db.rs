//! Like store trait and SQLite implementation.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use fs4::fs_std::FileExt;
use rusqlite::{Connection, OptionalExtension};

use super::error::StateError;
use super::schema;
use super::types::{split_tags, LastRun, MediaRecord, StoreSummary, SyncRunStats};

/// Metadata key holding the resumption cursor.
const CURSOR_KEY: &str = "last_update_time";

const RECORD_COLUMNS: &str = "id, title, description, published_at, channel_title, thumbnail_url, tags, category_id, duration";

/// Trait for store operations used by the sync engine.
///
/// This trait is object-safe and can be used as `&dyn LikeStore` or
/// `Arc<dyn LikeStore>`.
#[async_trait]
pub trait LikeStore: Send + Sync {
    /// Read the resumption cursor. `None` means the store was never synced.
    async fn get_cursor(&self) -> Result<Option<DateTime<Utc>>, StateError>;

    /// Overwrite the resumption cursor in a single statement.
    async fn set_cursor(&self, at: DateTime<Utc>) -> Result<(), StateError>;

    /// Insert a record, or replace every field of the row with the same id.
    async fn upsert(&self, record: &MediaRecord) -> Result<(), StateError>;

    /// The `limit` records with the oldest `published_at`, oldest first.
    async fn query_oldest(&self, limit: usize) -> Result<Vec<MediaRecord>, StateError>;

    /// Number of stored records.
    async fn count(&self) -> Result<u64, StateError>;

    /// Start a new sync run and return its ID.
    async fn start_sync_run(&self, started_at: DateTime<Utc>) -> Result<i64, StateError>;

    /// Complete a sync run with statistics.
    async fn complete_sync_run(&self, run_id: i64, stats: &SyncRunStats)
        -> Result<(), StateError>;

    /// Get a summary of the store state.
    async fn get_summary(&self) -> Result<StoreSummary, StateError>;
}

/// SQLite implementation of the like store.
pub struct SqliteLikeStore {
    /// Wrapped in Mutex because rusqlite::Connection is not Sync.
    conn: Mutex<Connection>,
    /// Path to the database file (for error messages).
    path: PathBuf,
    /// Exclusive advisory lock held for the lifetime of the store so two
    /// runs never race on the cursor. Released when the File is dropped.
    _lock_file: Option<File>,
}

impl std::fmt::Debug for SqliteLikeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteLikeStore")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

/// Path of the lock file guarding a database file.
pub fn lock_path(db_path: &Path) -> PathBuf {
    let mut name = db_path.as_os_str().to_owned();
    name.push(".lock");
    PathBuf::from(name)
}

impl SqliteLikeStore {
    /// Open or create a database at the given path, taking its exclusive lock.
    pub async fn open(path: &Path) -> Result<Self, StateError> {
        let path = path.to_path_buf();
        let path_clone = path.clone();

        let (conn, lock_file) = tokio::task::spawn_blocking(move || {
            let lock_path = lock_path(&path_clone);
            let lock_file = File::create(&lock_path).map_err(|e| StateError::LockFile {
                path: lock_path.clone(),
                source: e,
            })?;
            lock_file
                .try_lock_exclusive()
                .map_err(|_| StateError::Locked(lock_path.clone()))?;

            let conn = Connection::open(&path_clone).map_err(|e| StateError::Open {
                path: path_clone.clone(),
                source: e,
            })?;

            // WAL keeps readers (e.g. `status`) from seeing torn writes
            conn.pragma_update(None, "journal_mode", "WAL")
                .map_err(StateError::Migration)?;
            conn.pragma_update(None, "synchronous", "NORMAL")
                .map_err(StateError::Migration)?;

            schema::migrate(&conn)?;

            Ok::<_, StateError>((conn, lock_file))
        })
        .await??;

        Ok(Self {
            conn: Mutex::new(conn),
            path,
            _lock_file: Some(lock_file),
        })
    }

    /// Open an in-memory database (for testing).
    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self, StateError> {
        let conn = Connection::open_in_memory().map_err(|e| StateError::Open {
            path: PathBuf::from(":memory:"),
            source: e,
        })?;
        schema::migrate(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            path: PathBuf::from(":memory:"),
            _lock_file: None,
        })
    }

    /// Get the path to the database file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_conn(&self) -> Result<std::sync::MutexGuard<'_, Connection>, StateError> {
        self.conn
            .lock()
            .map_err(|e| StateError::Query(e.to_string()))
    }
}

#[async_trait]
impl LikeStore for SqliteLikeStore {
    async fn get_cursor(&self) -> Result<Option<DateTime<Utc>>, StateError> {
        let conn = self.lock_conn()?;

        let value: Option<String> = conn
            .query_row(
                "SELECT value FROM metadata WHERE key = ?1",
                [CURSOR_KEY],
                |row| row.get(0),
            )
            .optional()
            .map_err(StateError::query)?;

        value
            .map(|v| {
                DateTime::parse_from_rfc3339(&v)
                    .map(|dt| dt.with_timezone(&Utc))
                    .map_err(|_| StateError::CorruptCursor(v))
            })
            .transpose()
    }

    async fn set_cursor(&self, at: DateTime<Utc>) -> Result<(), StateError> {
        let conn = self.lock_conn()?;

        conn.execute(
            "INSERT INTO metadata (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            rusqlite::params![CURSOR_KEY, at.to_rfc3339_opts(SecondsFormat::AutoSi, true)],
        )
        .map_err(StateError::query)?;

        Ok(())
    }

    async fn upsert(&self, record: &MediaRecord) -> Result<(), StateError> {
        let synced_at = Utc::now().timestamp();

        let conn = self.lock_conn()?;

        let mut stmt = conn
            .prepare_cached(
                r#"
                INSERT INTO liked_videos (id, title, description, published_at, channel_title, thumbnail_url, tags, category_id, video_url, duration, synced_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                ON CONFLICT(id) DO UPDATE SET
                    title = excluded.title,
                    description = excluded.description,
                    published_at = excluded.published_at,
                    channel_title = excluded.channel_title,
                    thumbnail_url = excluded.thumbnail_url,
                    tags = excluded.tags,
                    category_id = excluded.category_id,
                    video_url = excluded.video_url,
                    duration = excluded.duration,
                    synced_at = excluded.synced_at
                "#,
            )
            .map_err(StateError::query)?;

        stmt.execute(rusqlite::params![
            &record.id,
            &record.title,
            &record.description,
            record.published_at.timestamp_millis(),
            &record.channel_title,
            &record.thumbnail_url,
            record.joined_tags(),
            &record.category_id,
            record.canonical_url(),
            &record.duration,
            synced_at,
        ])
        .map_err(StateError::query)?;

        Ok(())
    }

    async fn query_oldest(&self, limit: usize) -> Result<Vec<MediaRecord>, StateError> {
        let conn = self.lock_conn()?;

        let mut stmt = conn
            .prepare_cached(&format!(
                "SELECT {RECORD_COLUMNS} FROM liked_videos ORDER BY published_at ASC, id ASC LIMIT ?1"
            ))
            .map_err(StateError::query)?;

        let records = stmt
            .query_map([limit as i64], row_to_media_record)
            .map_err(StateError::query)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(StateError::query)?;

        Ok(records)
    }

    async fn count(&self) -> Result<u64, StateError> {
        let conn = self.lock_conn()?;
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM liked_videos", [], |row| row.get(0))
            .map_err(StateError::query)?;
        Ok(count as u64)
    }

    async fn start_sync_run(&self, started_at: DateTime<Utc>) -> Result<i64, StateError> {
        let conn = self.lock_conn()?;

        conn.execute(
            "INSERT INTO sync_runs (started_at) VALUES (?1)",
            [started_at.timestamp()],
        )
        .map_err(StateError::query)?;

        Ok(conn.last_insert_rowid())
    }

    async fn complete_sync_run(
        &self,
        run_id: i64,
        stats: &SyncRunStats,
    ) -> Result<(), StateError> {
        let completed_at = Utc::now().timestamp();
        let status = if stats.succeeded { "done" } else { "failed" };

        let conn = self.lock_conn()?;

        conn.execute(
            "UPDATE sync_runs SET completed_at = ?1, pages_fetched = ?2, records_fetched = ?3, records_stored = ?4, status = ?5, error = ?6 WHERE id = ?7",
            rusqlite::params![
                completed_at,
                stats.pages_fetched as i64,
                stats.records_fetched as i64,
                stats.records_stored as i64,
                status,
                stats.error,
                run_id
            ],
        )
        .map_err(StateError::query)?;

        Ok(())
    }

    async fn get_summary(&self) -> Result<StoreSummary, StateError> {
        let total_records = self.count().await?;
        let cursor = self.get_cursor().await?;

        let conn = self.lock_conn()?;
        let last_run = conn
            .query_row(
                "SELECT started_at, completed_at, status, pages_fetched, records_fetched, records_stored, error FROM sync_runs ORDER BY id DESC LIMIT 1",
                [],
                |row| {
                    let started_at: i64 = row.get(0)?;
                    let completed_at: Option<i64> = row.get(1)?;
                    Ok(LastRun {
                        started_at: from_timestamp(started_at),
                        completed_at: completed_at.map(from_timestamp),
                        status: row.get(2)?,
                        pages_fetched: row.get::<_, i64>(3)? as u64,
                        records_fetched: row.get::<_, i64>(4)? as u64,
                        records_stored: row.get::<_, i64>(5)? as u64,
                        error: row.get(6)?,
                    })
                },
            )
            .optional()
            .map_err(StateError::query)?;

        Ok(StoreSummary {
            total_records,
            cursor,
            last_run,
        })
    }
}

fn from_timestamp(ts: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(ts, 0)
        .single()
        .unwrap_or(DateTime::UNIX_EPOCH)
}

/// Convert a `liked_videos` row (selected with `RECORD_COLUMNS`) to a record.
fn row_to_media_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<MediaRecord> {
    let published_at_ms: i64 = row.get(3)?;
    let tags: String = row.get(6)?;

    Ok(MediaRecord {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        published_at: Utc
            .timestamp_millis_opt(published_at_ms)
            .single()
            .unwrap_or(DateTime::UNIX_EPOCH),
        channel_title: row.get(4)?,
        thumbnail_url: row.get(5)?,
        tags: split_tags(&tags),
        category_id: row.get(7)?,
        duration: row.get(8)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn test_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir()
            .join("likesync")
            .join("state_db_tests")
            .join(name);
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn video(id: &str, published_at: &str) -> MediaRecord {
        MediaRecord {
            id: id.to_string(),
            title: format!("Title {id}"),
            description: String::new(),
            channel_title: "Channel".to_string(),
            thumbnail_url: format!("https://i.ytimg.com/vi/{id}/mqdefault.jpg"),
            tags: vec!["one".to_string(), "two".to_string()],
            category_id: "10".to_string(),
            duration: "PT3M33S".to_string(),
            published_at: DateTime::parse_from_rfc3339(published_at)
                .unwrap()
                .with_timezone(&Utc),
        }
    }

    #[tokio::test]
    async fn test_open_creates_db_and_lock() {
        let dir = test_dir("open_creates");
        let path = dir.join("likes.db");
        let store = SqliteLikeStore::open(&path).await.unwrap();
        assert!(path.exists());
        assert!(lock_path(&path).exists());
        assert_eq!(store.path(), path);
    }

    #[tokio::test]
    async fn test_second_open_is_locked_out() {
        let dir = test_dir("locked_out");
        let path = dir.join("likes.db");
        let _first = SqliteLikeStore::open(&path).await.unwrap();
        let second = SqliteLikeStore::open(&path).await;
        assert!(matches!(second, Err(StateError::Locked(_))));
    }

    #[tokio::test]
    async fn test_lock_released_on_drop() {
        let dir = test_dir("lock_release");
        let path = dir.join("likes.db");
        {
            let _store = SqliteLikeStore::open(&path).await.unwrap();
        }
        SqliteLikeStore::open(&path).await.unwrap();
    }

    #[tokio::test]
    async fn test_cursor_absent_on_fresh_store() {
        let store = SqliteLikeStore::open_in_memory().unwrap();
        assert_eq!(store.get_cursor().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_cursor_round_trip_keeps_precision() {
        let store = SqliteLikeStore::open_in_memory().unwrap();
        let now = Utc::now();
        store.set_cursor(now).await.unwrap();
        assert_eq!(store.get_cursor().await.unwrap(), Some(now));
    }

    #[tokio::test]
    async fn test_cursor_is_single_row() {
        let store = SqliteLikeStore::open_in_memory().unwrap();
        let first = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let second = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        store.set_cursor(first).await.unwrap();
        store.set_cursor(second).await.unwrap();

        assert_eq!(store.get_cursor().await.unwrap(), Some(second));
        let rows: i64 = store
            .lock_conn()
            .unwrap()
            .query_row("SELECT COUNT(*) FROM metadata", [], |row| row.get(0))
            .unwrap();
        assert_eq!(rows, 1);
    }

    #[tokio::test]
    async fn test_corrupt_cursor_is_reported() {
        let store = SqliteLikeStore::open_in_memory().unwrap();
        store
            .lock_conn()
            .unwrap()
            .execute(
                "INSERT INTO metadata (key, value) VALUES ('last_update_time', 'yesterday')",
                [],
            )
            .unwrap();
        assert!(matches!(
            store.get_cursor().await,
            Err(StateError::CorruptCursor(v)) if v == "yesterday"
        ));
    }

    #[tokio::test]
    async fn test_upsert_is_idempotent() {
        let store = SqliteLikeStore::open_in_memory().unwrap();
        let page = vec![
            video("a", "2020-01-01T00:00:00Z"),
            video("b", "2021-01-01T00:00:00Z"),
        ];

        for record in &page {
            store.upsert(record).await.unwrap();
        }
        let once = store.query_oldest(10).await.unwrap();

        for record in &page {
            store.upsert(record).await.unwrap();
        }
        let twice = store.query_oldest(10).await.unwrap();

        assert_eq!(store.count().await.unwrap(), 2);
        assert_eq!(once, twice);
        assert_eq!(twice, page);
    }

    #[tokio::test]
    async fn test_upsert_last_write_wins() {
        let store = SqliteLikeStore::open_in_memory().unwrap();
        store
            .upsert(&video("a", "2020-01-01T00:00:00Z"))
            .await
            .unwrap();

        let mut updated = video("a", "2020-01-02T00:00:00Z");
        updated.title = "Renamed".to_string();
        updated.tags.clear();
        updated.description = "now with a description".to_string();
        store.upsert(&updated).await.unwrap();

        let stored = store.query_oldest(10).await.unwrap();
        assert_eq!(stored, vec![updated]);
    }

    #[tokio::test]
    async fn test_upsert_stores_canonical_url() {
        let store = SqliteLikeStore::open_in_memory().unwrap();
        store
            .upsert(&video("xyz", "2020-01-01T00:00:00Z"))
            .await
            .unwrap();
        let url: String = store
            .lock_conn()
            .unwrap()
            .query_row(
                "SELECT video_url FROM liked_videos WHERE id = 'xyz'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(url, "https://www.youtube.com/watch?v=xyz");
    }

    #[tokio::test]
    async fn test_query_oldest_orders_and_limits() {
        let store = SqliteLikeStore::open_in_memory().unwrap();
        for (id, at) in [
            ("mid", "2015-05-05T00:00:00Z"),
            ("new", "2023-03-03T00:00:00Z"),
            ("old", "2008-08-08T00:00:00Z"),
        ] {
            store.upsert(&video(id, at)).await.unwrap();
        }

        let oldest: Vec<String> = store
            .query_oldest(2)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(oldest, vec!["old", "mid"]);
    }

    #[tokio::test]
    async fn test_sync_run_lifecycle() {
        let store = SqliteLikeStore::open_in_memory().unwrap();

        let run_id = store.start_sync_run(Utc::now()).await.unwrap();
        assert!(run_id > 0);

        let summary = store.get_summary().await.unwrap();
        let last = summary.last_run.unwrap();
        assert!(last.completed_at.is_none());

        let stats = SyncRunStats {
            pages_fetched: 3,
            records_fetched: 120,
            records_stored: 110,
            succeeded: false,
            error: Some("Transient fetch failure: HTTP 503".to_string()),
        };
        store.complete_sync_run(run_id, &stats).await.unwrap();

        let last = store.get_summary().await.unwrap().last_run.unwrap();
        assert!(last.completed_at.is_some());
        assert_eq!(last.status.as_deref(), Some("failed"));
        assert_eq!(last.pages_fetched, 3);
        assert_eq!(last.records_fetched, 120);
        assert_eq!(last.records_stored, 110);
        assert_eq!(last.error, stats.error);
    }

    #[tokio::test]
    async fn test_summary_on_fresh_store() {
        let store = SqliteLikeStore::open_in_memory().unwrap();
        let summary = store.get_summary().await.unwrap();
        assert_eq!(summary.total_records, 0);
        assert!(summary.cursor.is_none());
        assert!(summary.last_run.is_none());
    }
}
