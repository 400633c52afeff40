//! easybackup
//!
//! Takes a full xtrabackup once a day and incremental backups on every
//! later run of the same day, into `<root>/YYYY-MM-DD/{base,inc/NN}`.

// easybackup/src/main.rs
mod backup;
mod config;
mod errors;
mod lock;
mod utils;

use anyhow::{Context, Result};
use backup::{BackupOutcome, RunOutcome, XtraBackup};
use chrono::Local;
use clap::Parser;
use config::AppConfig;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};

#[derive(Debug, Parser)]
#[command(name = "easybackup", version, about = "Daily full and incremental xtrabackup runs")]
struct Cli {
    /// Backup root directory. Must exist. Defaults to <tmp>/mysql.
    backup_dir: Option<PathBuf>,

    /// Exit successfully instead of failing when another run holds the lock.
    #[arg(long)]
    silent_lock: bool,

    /// Optional JSON configuration file.
    #[arg(short, long, env = "EASYBACKUP_CONFIG")]
    config: Option<PathBuf>,

    /// Log filter used when RUST_LOG is not set.
    #[arg(long, default_value = "info")]
    log_level: String,
}

/// Main entry point for the backup tool
fn main() -> ExitCode {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    if let Err(e) = utils::logger::init(&cli.log_level) {
        eprintln!("❌ Failed to initialize logging: {:?}", e);
        return ExitCode::FAILURE;
    }

    match run_app(cli) {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            error!("❌ Error: {:?}", e);
            ExitCode::FAILURE
        }
    }
}

fn run_app(cli: Cli) -> Result<RunOutcome> {
    let mut app_config = match &cli.config {
        Some(path) => AppConfig::load_from_json(path)
            .with_context(|| format!("Failed to load application configuration from {}", path.display()))?,
        None => AppConfig::default(),
    };
    app_config.backup_dir = cli.backup_dir;
    app_config.silent_lock = cli.silent_lock;

    let executor = XtraBackup::new(app_config.executor.clone());
    let today = Local::now().date_naive();

    let outcome = backup::run_backup_flow(&app_config, &executor, today)
        .context("Backup run failed")?;

    match &outcome {
        RunOutcome::Disabled | RunOutcome::Locked => {}
        RunOutcome::Completed(BackupOutcome::Full { target, pruned }) => {
            info!("✅ Full backup completed: {}", target.display());
            if let Some(dir) = pruned {
                info!("Pruned {}", dir.display());
            }
        }
        RunOutcome::Completed(BackupOutcome::Incremental { index, target, .. }) => {
            info!("✅ Incremental backup #{} completed: {}", index, target.display());
        }
    }
    Ok(outcome)
}
