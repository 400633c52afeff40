// easybackup/src/backup/layout.rs
//! Paths of the date-partitioned backup tree.
//!
//! ```text
//! <root>/YYYY-MM-DD/base
//! <root>/YYYY-MM-DD/inc/01, 02, ...
//! ```

use chrono::{Days, NaiveDate};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::errors::{AppError, Result};

pub const BASE_DIR_NAME: &str = "base";
pub const INC_DIR_NAME: &str = "inc";
const DAY_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayLayout {
    pub day_dir: PathBuf,
    pub base_dir: PathBuf,
    pub inc_dir: PathBuf,
}

impl DayLayout {
    pub fn for_date(root: &Path, date: NaiveDate) -> Self {
        let day_dir = root.join(day_dir_name(date));
        DayLayout {
            base_dir: day_dir.join(BASE_DIR_NAME),
            inc_dir: day_dir.join(INC_DIR_NAME),
            day_dir,
        }
    }

    pub fn entry_dir(&self, index: u32) -> PathBuf {
        self.inc_dir.join(entry_name(index))
    }

    /// Where the next incremental goes: one past the end of `chain`,
    /// based on the last entry, or on `base` when the chain is empty.
    pub fn plan_increment(&self, chain: &[ChainEntry]) -> IncrementPlan {
        let index = chain.len() as u32 + 1;
        let parent = chain
            .last()
            .map(|entry| entry.path.clone())
            .unwrap_or_else(|| self.base_dir.clone());
        IncrementPlan {
            index,
            target: self.entry_dir(index),
            parent,
        }
    }
}

/// An existing incremental artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainEntry {
    pub index: u32,
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncrementPlan {
    pub index: u32,
    pub target: PathBuf,
    pub parent: PathBuf,
}

pub fn day_dir_name(date: NaiveDate) -> String {
    date.format(DAY_FORMAT).to_string()
}

pub fn previous_day(date: NaiveDate) -> Option<NaiveDate> {
    date.checked_sub_days(Days::new(1))
}

/// Incremental entries are zero-padded to two digits.
pub fn entry_name(index: u32) -> String {
    format!("{:02}", index)
}

/// Accepts padded and unpadded names; `0` and non-digits are not entries.
pub fn parse_entry_name(name: &str) -> Option<u32> {
    if name.is_empty() || !name.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    name.parse::<u32>().ok().filter(|&index| index > 0)
}

/// Reads the entries under `inc_dir`, sorted numerically, and checks that
/// they form the dense sequence `1..=n`.
pub fn scan_entries(inc_dir: &Path) -> Result<Vec<ChainEntry>> {
    let mut chain = Vec::new();
    for entry in fs::read_dir(inc_dir)? {
        let entry = entry?;
        let name = entry.file_name();
        match name.to_str().and_then(parse_entry_name) {
            Some(index) => chain.push(ChainEntry {
                index,
                path: entry.path(),
            }),
            None => warn!(
                "Ignoring unexpected entry {} in {}",
                name.to_string_lossy(),
                inc_dir.display()
            ),
        }
    }
    chain.sort_unstable_by_key(|entry| entry.index);

    for (position, entry) in chain.iter().enumerate() {
        let expected = position as u32 + 1;
        if entry.index != expected {
            return Err(AppError::BrokenChain {
                dir: inc_dir.to_path_buf(),
                expected,
                found: entry.index,
            });
        }
    }
    Ok(chain)
}

/// An artifact is finished when its directory exists and, if a marker is
/// configured, the marker file is inside it.
pub fn is_finished(dir: &Path, completion_marker: Option<&str>) -> bool {
    if !dir.is_dir() {
        return false;
    }
    match completion_marker {
        Some(marker) => dir.join(marker).exists(),
        None => true,
    }
}
