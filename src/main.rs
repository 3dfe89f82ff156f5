//! likesync: keep a local SQLite copy of your YouTube liked videos.
//!
//! Each `sync` walks the liked-videos listing newest first, upserting every
//! video, and stops at the first like older than the previous successful
//! sync. The cursor only moves forward when a run finishes cleanly, so an
//! interrupted or failed run is simply redone next time.

#![warn(clippy::all)]

mod cli;
mod config;
pub mod retry;
mod shutdown;
mod state;
mod sync;
mod types;
mod youtube;

use std::io::Write as _;
use std::path::Path;

use anyhow::Context as _;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::Command;
use retry::RetryAction;
use state::{LikeStore, MediaRecord, SqliteLikeStore};
use sync::{RunReport, SyncEngine};
use youtube::{Authenticator, TokenFile, YouTubeLikes};

/// Run the sync command. Returns whether the run finished cleanly.
async fn run_sync(data_dir: &str, args: cli::SyncArgs) -> anyhow::Result<bool> {
    let config = config::Config::from_cli(data_dir, args)?;
    tracing::debug!(?config, "Starting likesync");

    if let Some(parent) = config.db_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let store = SqliteLikeStore::open(&config.db_path).await?;
    tracing::info!("Using database at {}", store.path().display());

    let credentials = TokenFile::load(&config.token_file).await?;
    let client = youtube::build_client(config.http_timeout_secs)?;
    let source = YouTubeLikes::new(client.clone(), Authenticator::new(client, credentials));

    let shutdown_token = shutdown::install_signal_handler()?;
    let engine = SyncEngine::new(&source, &store, config.sync, shutdown_token.clone());
    let engine = &engine;

    // A failed run leaves the cursor alone, so retrying the whole run only
    // refetches what the failed attempt already stored.
    let outcome = retry::retry_with_backoff(
        &config.retry,
        |report: &RunReport| {
            if report.is_retryable() {
                RetryAction::Retry
            } else {
                RetryAction::Abort
            }
        },
        &shutdown_token,
        || async move {
            let report = engine.run().await;
            if report.is_done() {
                Ok(report)
            } else {
                Err(report)
            }
        },
    )
    .await;
    let report = match outcome {
        Ok(report) | Err(report) => report,
    };

    print_report(&report);
    if report.is_auth_expired() {
        eprintln!();
        eprintln!("YouTube authorization expired or was revoked.");
        eprintln!("Run `likesync auth` to authorize again, then rerun the sync.");
    }
    Ok(report.is_done())
}

fn print_report(report: &RunReport) {
    println!("{}", report);
    if let Some(token) = &report.next_page_token {
        println!("Stopped at the page limit; more likes remain (next page token {token}).");
    }
    if !report.oldest_stored.is_empty() {
        println!();
        println!("Oldest liked videos:");
        print_videos(&report.oldest_stored);
    }
}

fn print_videos(records: &[MediaRecord]) {
    for record in records {
        println!("{}", format_video(record));
    }
}

fn format_video(record: &MediaRecord) -> String {
    format!(
        "  {}  {} [{}]\n              {}",
        record.published_at.format("%Y-%m-%d"),
        record.title,
        record.channel_title,
        record.canonical_url()
    )
}

/// Run the status command.
async fn run_status(data_dir: &str, args: cli::StatusArgs) -> anyhow::Result<()> {
    let db_path = config::db_path(data_dir, args.db.as_deref());

    if !db_path.exists() {
        println!("No database found at {}", db_path.display());
        println!("Run a sync first to create the database.");
        return Ok(());
    }

    let store = SqliteLikeStore::open(&db_path).await?;
    let summary = store.get_summary().await?;

    println!("Database: {}", db_path.display());
    println!();
    println!("Liked videos: {}", summary.total_records);
    match &summary.cursor {
        Some(cursor) => println!(
            "Synced up to: {}",
            cursor.format("%Y-%m-%d %H:%M:%S UTC")
        ),
        None => println!("Synced up to: never (next sync fetches everything)"),
    }

    if let Some(run) = &summary.last_run {
        println!();
        println!(
            "Last run started:   {}",
            run.started_at.format("%Y-%m-%d %H:%M:%S UTC")
        );
        match &run.completed_at {
            Some(completed) => println!(
                "Last run completed: {} ({})",
                completed.format("%Y-%m-%d %H:%M:%S UTC"),
                run.status.as_deref().unwrap_or("unknown")
            ),
            None => println!("Last run completed: no (interrupted or still running)"),
        }
        println!(
            "  Pages: {}  Fetched: {}  Stored: {}",
            run.pages_fetched, run.records_fetched, run.records_stored
        );
        if let Some(error) = &run.error {
            println!("  Error: {}", error);
        }
    }

    if args.oldest > 0 {
        let oldest = store.query_oldest(args.oldest).await?;
        if !oldest.is_empty() {
            println!();
            println!("Oldest liked videos:");
            print_videos(&oldest);
        }
    }

    Ok(())
}

/// Run the reset-state command.
async fn run_reset_state(data_dir: &str, args: cli::ResetStateArgs) -> anyhow::Result<()> {
    let db_path = config::db_path(data_dir, args.db.as_deref());

    if !db_path.exists() {
        println!("No database found at {}", db_path.display());
        return Ok(());
    }

    if !args.yes {
        println!("This will delete the database at:");
        println!("  {}", db_path.display());
        println!("The next sync will fetch every liked video again.");
        println!();
        print!("Are you sure? [y/N] ");
        std::io::stdout().flush()?;

        let mut input = String::new();
        std::io::stdin().read_line(&mut input)?;
        if !input.trim().eq_ignore_ascii_case("y") {
            println!("Cancelled.");
            return Ok(());
        }
    }

    // Refuses while a sync holds the lock.
    drop(SqliteLikeStore::open(&db_path).await?);

    std::fs::remove_file(&db_path)
        .with_context(|| format!("Failed to delete {}", db_path.display()))?;
    for sidecar in config::db_sidecars(&db_path) {
        let _ = std::fs::remove_file(&sidecar);
    }
    println!("Database deleted.");

    Ok(())
}

/// Run the auth command: consent URL, pasted redirect, token exchange.
async fn run_auth(data_dir: &str, args: cli::AuthArgs) -> anyhow::Result<()> {
    let token_path = config::token_path(data_dir, args.token_file.as_deref());
    let url = youtube::auth::authorization_url(&args.client_id, &args.redirect_uri)
        .context("Invalid redirect URI")?;

    println!("Open this URL in your browser and allow access to your YouTube account:");
    println!();
    println!("  {}", url);
    println!();
    println!(
        "Your browser is then sent to {} (the page may fail to load).",
        args.redirect_uri
    );
    println!("Paste the full address from the browser bar, or just the code:");
    print!("> ");
    std::io::stdout().flush()?;

    let mut input = String::new();
    std::io::stdin().read_line(&mut input)?;
    let code = youtube::auth::extract_code(&input)
        .context("No authorization code found in the pasted text")?;

    let client = youtube::build_client(config::DEFAULT_HTTP_TIMEOUT_SECS)?;
    let credentials = youtube::auth::exchange_code(
        &client,
        &args.client_id,
        &args.client_secret,
        &args.redirect_uri,
        &code,
    )
    .await?;
    save_credentials(&credentials, &token_path).await?;
    Ok(())
}

async fn save_credentials(credentials: &TokenFile, path: &Path) -> anyhow::Result<()> {
    credentials
        .save(path)
        .await
        .with_context(|| format!("Failed to write token file {}", path.display()))?;
    tracing::info!("Authorization saved");
    println!("Saved credentials to {}", path.display());
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(cli.log_level.as_filter())),
        )
        .init();

    match cli.effective_command() {
        Command::Sync(args) => {
            if !run_sync(&cli.data_dir, args).await? {
                std::process::exit(1);
            }
            Ok(())
        }
        Command::Status(args) => run_status(&cli.data_dir, args).await,
        Command::ResetState(args) => run_reset_state(&cli.data_dir, args).await,
        Command::Auth(args) => run_auth(&cli.data_dir, args).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_format_video() {
        let record = MediaRecord {
            id: "dQw4w9WgXcQ".to_string(),
            title: "Never Gonna Give You Up".to_string(),
            description: String::new(),
            channel_title: "Rick Astley".to_string(),
            thumbnail_url: String::new(),
            tags: Vec::new(),
            category_id: "10".to_string(),
            duration: "PT3M33S".to_string(),
            published_at: Utc.with_ymd_and_hms(2009, 10, 25, 6, 57, 33).unwrap(),
        };
        let line = format_video(&record);
        assert!(line.starts_with("  2009-10-25  Never Gonna Give You Up [Rick Astley]"));
        assert!(line.ends_with("https://www.youtube.com/watch?v=dQw4w9WgXcQ"));
    }
}
