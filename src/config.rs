use std::path::{Path, PathBuf};

use crate::cli::SyncArgs;
use crate::retry::RetryConfig;
use crate::state::db::lock_path;
use crate::sync::{SyncConfig, MAX_PAGE_SIZE};

pub const DEFAULT_DATA_DIR: &str = "~/.likesync";
pub const DEFAULT_DB_FILE: &str = "liked_videos.db";
pub const DEFAULT_TOKEN_FILE: &str = "token.json";
pub const DEFAULT_PAGE_SIZE: u32 = MAX_PAGE_SIZE;
pub const DEFAULT_MAX_PAGES: u32 = 0;
pub const DEFAULT_MAX_RETRIES: u32 = 2;
pub const DEFAULT_RETRY_DELAY_SECS: u64 = 5;
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// Upper bound on the backoff between retried runs.
const MAX_RETRY_DELAY_SECS: u64 = 60;

/// Resolved configuration for a `sync` run.
#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: PathBuf,
    pub token_file: PathBuf,
    pub sync: SyncConfig,
    pub retry: RetryConfig,
    pub http_timeout_secs: u64,
}

impl Config {
    pub fn from_cli(data_dir: &str, args: SyncArgs) -> anyhow::Result<Self> {
        let sync = SyncConfig::new(args.page_size, args.max_pages)?;
        if args.timeout == 0 {
            anyhow::bail!("--timeout must be at least 1 second");
        }
        Ok(Self {
            db_path: db_path(data_dir, args.db.as_deref()),
            token_file: token_path(data_dir, args.token_file.as_deref()),
            sync,
            retry: RetryConfig {
                max_retries: args.max_retries,
                base_delay_secs: args.retry_delay,
                max_delay_secs: MAX_RETRY_DELAY_SECS,
            },
            http_timeout_secs: args.timeout,
        })
    }
}

pub(crate) fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

fn in_data_dir(data_dir: &str, file_name: &str) -> PathBuf {
    expand_tilde(data_dir).join(file_name)
}

/// Database location: an explicit path wins over the data directory.
pub fn db_path(data_dir: &str, explicit: Option<&str>) -> PathBuf {
    explicit
        .map(expand_tilde)
        .unwrap_or_else(|| in_data_dir(data_dir, DEFAULT_DB_FILE))
}

pub fn token_path(data_dir: &str, explicit: Option<&str>) -> PathBuf {
    explicit
        .map(expand_tilde)
        .unwrap_or_else(|| in_data_dir(data_dir, DEFAULT_TOKEN_FILE))
}

/// SQLite sidecar files that belong to the database at `db_path`.
pub fn db_sidecars(db_path: &Path) -> [PathBuf; 3] {
    let with_suffix = |suffix: &str| {
        let mut name = db_path.as_os_str().to_owned();
        name.push(suffix);
        PathBuf::from(name)
    };
    [with_suffix("-wal"), with_suffix("-shm"), lock_path(db_path)]
}
