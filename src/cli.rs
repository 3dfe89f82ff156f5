use clap::{Args, Parser, Subcommand};

use crate::config::{
    DEFAULT_DATA_DIR, DEFAULT_HTTP_TIMEOUT_SECS, DEFAULT_MAX_PAGES, DEFAULT_MAX_RETRIES,
    DEFAULT_PAGE_SIZE, DEFAULT_RETRY_DELAY_SECS,
};
use crate::types::LogLevel;
use crate::youtube::auth::DEFAULT_REDIRECT_URI;

#[derive(Parser, Debug)]
#[command(
    name = "likesync",
    version,
    about = "Incrementally sync your YouTube liked videos into a local SQLite database"
)]
pub struct Cli {
    /// Log level
    #[arg(long, value_enum, default_value = "info", global = true)]
    pub log_level: LogLevel,

    /// Directory holding the database and the OAuth token file
    #[arg(long, default_value = DEFAULT_DATA_DIR, env = "LIKESYNC_DATA_DIR", global = true)]
    pub data_dir: String,

    #[command(subcommand)]
    pub command: Option<Command>,
}

impl Cli {
    /// The subcommand to run; a bare `likesync` syncs.
    pub fn effective_command(&self) -> Command {
        self.command
            .clone()
            .unwrap_or_else(|| Command::Sync(SyncArgs::default()))
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Fetch likes added since the last successful sync
    Sync(SyncArgs),
    /// Show what is stored locally
    Status(StatusArgs),
    /// Delete the local database, forcing a full resync next time
    ResetState(ResetStateArgs),
    /// Authorize access to your YouTube account and save a token file
    Auth(AuthArgs),
}

#[derive(Args, Debug, Clone)]
pub struct SyncArgs {
    /// Database path (default: <data-dir>/liked_videos.db)
    #[arg(long)]
    pub db: Option<String>,

    /// OAuth token file (default: <data-dir>/token.json)
    #[arg(long)]
    pub token_file: Option<String>,

    /// Records requested per page (1-50)
    #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
    pub page_size: u32,

    /// Stop after this many pages; 0 means no limit
    #[arg(long, default_value_t = DEFAULT_MAX_PAGES)]
    pub max_pages: u32,

    /// Retries of a run that failed on a transient error
    #[arg(long, default_value_t = DEFAULT_MAX_RETRIES)]
    pub max_retries: u32,

    /// Base delay in seconds between retries
    #[arg(long, default_value_t = DEFAULT_RETRY_DELAY_SECS)]
    pub retry_delay: u64,

    /// HTTP request timeout in seconds
    #[arg(long, default_value_t = DEFAULT_HTTP_TIMEOUT_SECS)]
    pub timeout: u64,
}

impl Default for SyncArgs {
    fn default() -> Self {
        Self {
            db: None,
            token_file: None,
            page_size: DEFAULT_PAGE_SIZE,
            max_pages: DEFAULT_MAX_PAGES,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay: DEFAULT_RETRY_DELAY_SECS,
            timeout: DEFAULT_HTTP_TIMEOUT_SECS,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct StatusArgs {
    /// Database path (default: <data-dir>/liked_videos.db)
    #[arg(long)]
    pub db: Option<String>,

    /// Number of oldest liked videos to list
    #[arg(long, default_value_t = 5)]
    pub oldest: usize,
}

#[derive(Args, Debug, Clone)]
pub struct ResetStateArgs {
    /// Database path (default: <data-dir>/liked_videos.db)
    #[arg(long)]
    pub db: Option<String>,

    /// Skip the confirmation prompt
    #[arg(short = 'y', long)]
    pub yes: bool,
}

#[derive(Args, Debug, Clone)]
pub struct AuthArgs {
    /// OAuth client ID of your Google Cloud project
    #[arg(long, env = "LIKESYNC_CLIENT_ID")]
    pub client_id: String,

    /// OAuth client secret.
    /// WARNING: passing via --client-secret is visible in process listings.
    /// Prefer the LIKESYNC_CLIENT_SECRET environment variable instead.
    #[arg(long, env = "LIKESYNC_CLIENT_SECRET")]
    pub client_secret: String,

    /// Redirect URI registered for the OAuth client
    #[arg(long, default_value = DEFAULT_REDIRECT_URI)]
    pub redirect_uri: String,

    /// Where to write the token file (default: <data-dir>/token.json)
    #[arg(long)]
    pub token_file: Option<String>,
}
