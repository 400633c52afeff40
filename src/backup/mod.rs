mod logic;
pub(crate) mod executor;
pub(crate) mod layout;
pub(crate) mod permissions;
#[cfg(test)]
mod fake;

use anyhow::Result;
use chrono::NaiveDate;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::config::AppConfig;
use crate::errors::AppError;
use crate::lock::ProcessLock;

pub use executor::{BackupExecutor, XtraBackup};
pub use logic::{BackupOutcome, Orchestrator};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The disabled sentinel file exists.
    Disabled,
    /// Another run holds the lock and silent locking is on.
    Locked,
    Completed(BackupOutcome),
}

/// Public entry point for one scheduled run: kill switch, lock, backup root,
/// then the full-or-incremental decision for `today`.
pub fn run_backup_flow<E: BackupExecutor + ?Sized>(
    config: &AppConfig,
    executor: &E,
    today: NaiveDate,
) -> Result<RunOutcome> {
    if config.disabled_file.exists() {
        info!(
            "easybackup is manually disabled ({} exists).",
            config.disabled_file.display()
        );
        return Ok(RunOutcome::Disabled);
    }

    let lock = match ProcessLock::acquire(&config.lock_file) {
        Ok(lock) => lock,
        Err(AppError::AlreadyLocked(path)) if config.silent_lock => {
            info!("Another run holds {}, nothing to do.", path.display());
            return Ok(RunOutcome::Locked);
        }
        Err(e) => return Err(e.into()),
    };
    debug!("Holding run lock {}", lock.path().display());

    let result = resolve_backup_root(config).map_err(anyhow::Error::from).and_then(|root| {
        info!("🛠 Using backup root: {}", root.display());
        Orchestrator::new(&root, executor, config.completion_marker.as_deref()).run(today)
    });

    let released = lock.release();
    let outcome = result?;
    released?;
    Ok(RunOutcome::Completed(outcome))
}

/// A root given on the command line must already exist; the default root is
/// created when missing. Either way it must be a readable directory.
pub fn resolve_backup_root(config: &AppConfig) -> Result<PathBuf, AppError> {
    let dir = match &config.backup_dir {
        Some(dir) => dir,
        None => {
            let dir = &config.default_backup_dir;
            if !dir.exists() {
                fs::create_dir_all(dir).map_err(|e| root_error(dir, e))?;
                info!("📂 Created backup root {}", dir.display());
            }
            dir
        }
    };

    let metadata = fs::metadata(dir).map_err(|e| root_error(dir, e))?;
    if !metadata.is_dir() {
        return Err(root_error(dir, io::Error::other("not a directory")));
    }
    fs::read_dir(dir).map_err(|e| root_error(dir, e))?;
    Ok(dir.clone())
}

fn root_error(path: &Path, source: io::Error) -> AppError {
    AppError::BackupRoot {
        path: path.to_path_buf(),
        source,
    }
}
