// easybackup/src/backup/logic.rs
use anyhow::{Context, Result};
use chrono::NaiveDate;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::executor::{BackupExecutor, BackupRequest};
use super::layout::{self, DayLayout};
use super::permissions;
use crate::errors::AppError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackupOutcome {
    Full {
        target: PathBuf,
        /// Yesterday's directory, if it was removed.
        pruned: Option<PathBuf>,
    },
    Incremental {
        index: u32,
        target: PathBuf,
        parent: PathBuf,
    },
}

/// Decides between a full and an incremental backup for one day and runs it.
pub struct Orchestrator<'a, E: BackupExecutor + ?Sized> {
    root: &'a Path,
    executor: &'a E,
    completion_marker: Option<&'a str>,
}

impl<'a, E: BackupExecutor + ?Sized> Orchestrator<'a, E> {
    pub fn new(root: &'a Path, executor: &'a E, completion_marker: Option<&'a str>) -> Self {
        Orchestrator {
            root,
            executor,
            completion_marker,
        }
    }

    pub fn run(&self, today: NaiveDate) -> Result<BackupOutcome> {
        let layout = DayLayout::for_date(self.root, today);
        ensure_dir(&layout.day_dir)?;

        if layout::is_finished(&layout.base_dir, self.completion_marker) {
            self.incremental_backup(&layout)
        } else {
            self.full_backup(&layout, today)
        }
    }

    fn full_backup(&self, layout: &DayLayout, today: NaiveDate) -> Result<BackupOutcome> {
        let target = &layout.base_dir;
        if target.exists() {
            warn!(
                "⚠️ {} exists but is not a finished backup, removing it",
                target.display()
            );
            fs::remove_dir_all(target)
                .with_context(|| format!("Failed to remove partial backup {}", target.display()))?;
        }

        info!("📦 Taking full backup into {}", target.display());
        self.run_executor(BackupRequest {
            target,
            incremental_basedir: None,
        })?;

        let changed = permissions::normalize_tree(target)
            .with_context(|| format!("Failed to fix permissions under {}", target.display()))?;
        info!("✓ Permissions normalized ({} entries updated)", changed);

        let pruned = self.prune_previous_day(today);
        info!("✅ Full backup finished at {}", target.display());
        Ok(BackupOutcome::Full {
            target: target.clone(),
            pruned,
        })
    }

    fn incremental_backup(&self, layout: &DayLayout) -> Result<BackupOutcome> {
        ensure_dir(&layout.inc_dir)?;

        let mut chain = layout::scan_entries(&layout.inc_dir)
            .with_context(|| format!("Failed to read incremental chain in {}", layout.inc_dir.display()))?;

        if let Some(latest) = chain.last() {
            if !layout::is_finished(&latest.path, self.completion_marker) {
                warn!(
                    "⚠️ {} is not a finished backup, removing it",
                    latest.path.display()
                );
                fs::remove_dir_all(&latest.path).with_context(|| {
                    format!("Failed to remove partial backup {}", latest.path.display())
                })?;
                chain.pop();
            }
        }

        // Earlier entries are parents of later ones; one missing its marker
        // means the chain cannot be trusted.
        if let Some(unfinished) = chain
            .iter()
            .find(|entry| !layout::is_finished(&entry.path, self.completion_marker))
        {
            return Err(AppError::UnfinishedEntry {
                path: unfinished.path.clone(),
            }
            .into());
        }

        let plan = layout.plan_increment(&chain);
        info!(
            "📦 Taking incremental backup #{} into {} (parent: {})",
            plan.index,
            plan.target.display(),
            plan.parent.display()
        );
        self.run_executor(BackupRequest {
            target: &plan.target,
            incremental_basedir: Some(&plan.parent),
        })?;

        info!("✅ Incremental backup finished at {}", plan.target.display());
        Ok(BackupOutcome::Incremental {
            index: plan.index,
            target: plan.target,
            parent: plan.parent,
        })
    }

    fn run_executor(&self, request: BackupRequest<'_>) -> Result<()> {
        if let Err(e) = self.executor.execute(&request) {
            remove_partial(request.target);
            return Err(e.context(format!("Backup into {} failed", request.target.display())));
        }
        Ok(())
    }

    fn prune_previous_day(&self, today: NaiveDate) -> Option<PathBuf> {
        let yesterday = layout::previous_day(today)?;
        let day_dir = self.root.join(layout::day_dir_name(yesterday));
        if !day_dir.exists() {
            return None;
        }
        match fs::remove_dir_all(&day_dir) {
            Ok(()) => {
                info!("🗑 Removed previous day's backups at {}", day_dir.display());
                Some(day_dir)
            }
            Err(e) => {
                warn!("Failed to remove {}: {}", day_dir.display(), e);
                None
            }
        }
    }
}

fn ensure_dir(path: &Path) -> Result<()> {
    if !path.is_dir() {
        fs::create_dir(path)
            .with_context(|| format!("Failed to create directory {}", path.display()))?;
    }
    Ok(())
}

// Best effort: the run is already failing.
fn remove_partial(target: &Path) {
    if !target.exists() {
        return;
    }
    match fs::remove_dir_all(target) {
        Ok(()) => info!("🧹 Removed partial backup at {}", target.display()),
        Err(e) => warn!("Failed to remove partial backup {}: {}", target.display(), e),
    }
}
