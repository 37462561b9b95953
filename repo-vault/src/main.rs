//! repo-vault - Main entry point
//!
//! Stores files in a GitHub repository: upload, download, list, delete,
//! and whole-directory backup/restore.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use repo_vault::transfer::progress::{format_bytes, format_duration, TransferProgress};
use repo_vault::transfer::report::TransferReport;
use repo_vault::{utils, Config, FileTransfer, GitHubStore};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Repository used as storage (overrides config)
    #[arg(short, long, global = true)]
    repo: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Find or create the storage repository
    Init,

    /// Upload a single file
    Upload {
        local: PathBuf,
        remote: String,
        /// Commit message
        #[arg(short, long)]
        message: Option<String>,
    },

    /// Download a single file
    Download { remote: String, local: PathBuf },

    /// List the direct children of a remote path
    List {
        #[arg(default_value = "")]
        path: String,
    },

    /// Delete a single remote file
    Delete { remote: String },

    /// Upload a directory tree
    Backup {
        dir: PathBuf,
        /// Remote directory (default: <backup_dir>/backup_<timestamp>)
        remote: Option<String>,
    },

    /// Download a remote directory tree
    Restore { remote: String, dest: PathBuf },

    /// List backups under the backup directory
    Backups { base: Option<String> },

    /// Show repository information
    Info,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration
    let mut config = Config::load(args.config.as_deref())?;
    if let Some(repo) = &args.repo {
        config.storage.repository = repo.clone();
    }

    // Initialize logging
    let log_level = args.log_level.as_deref().unwrap_or(&config.log.level);
    utils::logger::init(log_level)?;

    tracing::info!("Starting repo-vault v{}", env!("CARGO_PKG_VERSION"));

    tokio::select! {
        result = run(&args, &config) => result,
        _ = utils::shutdown::wait_for_signal() => {
            bail!("Interrupted by user")
        }
    }
}

async fn run(args: &Args, config: &Config) -> Result<()> {
    let store = GitHubStore::from_config(config)?;
    let mut transfer = FileTransfer::new(store);

    let bar = progress_bar();
    let tracks_progress = matches!(args.command, Command::Backup { .. } | Command::Restore { .. });
    if tracks_progress && !args.json {
        let bar = bar.clone();
        transfer = transfer.with_progress(Arc::new(move |p: &TransferProgress| {
            bar.set_length(p.total_files as u64);
            bar.set_position(p.files_processed as u64);
            bar.set_message(p.current_file.clone().unwrap_or_default());
        }));
    }

    let repository = &config.storage.repository;
    transfer
        .bind_container(repository)
        .await
        .with_context(|| format!("Failed to initialize repository '{}'", repository))?;

    match &args.command {
        Command::Init | Command::Info => {
            let container = transfer
                .container_info()
                .context("Repository not initialized")?;
            if args.json {
                println!("{}", serde_json::to_string_pretty(container)?);
            } else {
                println!("Name:        {}", container.full_name);
                println!("URL:         {}", container.url);
                println!("Description: {}", container.description.as_deref().unwrap_or("-"));
                println!("Private:     {}", container.private);
                if let Some(created) = container.created_at {
                    println!("Created:     {}", created.to_rfc3339());
                }
                if let Some(updated) = container.updated_at {
                    println!("Updated:     {}", updated.to_rfc3339());
                }
                println!("Size:        {} KB", container.size);
            }
        }

        Command::Upload { local, remote, message } => {
            let outcome = transfer.upload_file(local, remote, message.as_deref()).await?;
            if args.json {
                println!(
                    "{}",
                    serde_json::json!({ "path": remote, "outcome": outcome })
                );
            } else {
                println!("{}", outcome.describe(remote));
            }
        }

        Command::Download { remote, local } => {
            let bytes = transfer.download_file(remote, local).await?;
            if args.json {
                println!(
                    "{}",
                    serde_json::json!({ "path": local, "bytes": bytes })
                );
            } else {
                println!("File downloaded: {} ({})", local.display(), format_bytes(bytes));
            }
        }

        Command::List { path } => {
            let files = transfer.list_files(path).await;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&files)?);
            } else if files.is_empty() {
                println!("No files found");
            } else {
                for file in &files {
                    println!("{:<9} {:>12}  {}", file.kind, format_bytes(file.size), file.path);
                }
            }
        }

        Command::Delete { remote } => {
            transfer.delete_file(remote).await?;
            println!("{}", deleted_message(remote, args.json));
        }

        Command::Backup { dir, remote } => {
            let remote = remote.clone().unwrap_or_else(|| {
                format!(
                    "{}/backup_{}",
                    config.storage.backup_dir,
                    chrono::Utc::now().format("%Y%m%d_%H%M%S")
                )
            });
            let started = Instant::now();
            let report = transfer.backup_directory(dir, &remote).await;
            bar.finish_and_clear();
            finish_report(&report, args.json, started)?;
        }

        Command::Restore { remote, dest } => {
            let started = Instant::now();
            let report = transfer.restore_backup(remote, dest).await;
            bar.finish_and_clear();
            finish_report(&report, args.json, started)?;
        }

        Command::Backups { base } => {
            let base = base.as_deref().unwrap_or(&config.storage.backup_dir);
            let backups = transfer.list_backups(base).await;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&backups)?);
            } else if backups.is_empty() {
                println!("No backups found under {}", base);
            } else {
                for backup in &backups {
                    println!("{}  ({})", backup.name, backup.path);
                }
            }
        }
    }

    Ok(())
}

fn progress_bar() -> ProgressBar {
    let style = ProgressStyle::with_template("{spinner} [{bar:40}] {pos}/{len} files {wide_msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ");
    let bar = ProgressBar::new(0);
    bar.set_style(style);
    bar
}

fn deleted_message(remote: &str, json: bool) -> String {
    if json {
        serde_json::json!({ "path": remote, "deleted": true }).to_string()
    } else {
        format!("File deleted: {}", remote)
    }
}

/// Print a backup/restore report; a failed run becomes a non-zero exit.
fn finish_report(report: &TransferReport, json: bool, started: Instant) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        println!("{}", report.message);
        println!("  {} -> {}", report.source, report.destination);
        println!(
            "  Size: {}, time: {}",
            format_bytes(report.total_bytes),
            format_duration(started.elapsed().as_secs())
        );
        for item in report.failures() {
            println!(
                "  failed: {}: {}",
                item.relative_path,
                item.error.as_deref().unwrap_or("unknown error")
            );
        }
    }

    if !report.success {
        bail!("{}", report.message);
    }
    Ok(())
}
