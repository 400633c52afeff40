use std::path::PathBuf;
use std::process::ExitStatus;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Backup root {} is not usable: {source}", .path.display())]
    BackupRoot {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Another run already holds the lock at {}", .0.display())]
    AlreadyLocked(PathBuf),

    #[error("Lock file {} is not usable: {source}", .path.display())]
    LockFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Incremental chain in {} is broken: expected entry {expected}, found {found}", .dir.display())]
    BrokenChain {
        dir: PathBuf,
        expected: u32,
        found: u32,
    },

    #[error("Incremental backup {} is not finished but later entries depend on it", .path.display())]
    UnfinishedEntry { path: PathBuf },

    #[error("{program} exited with {status}")]
    ExecutorFailed { program: String, status: ExitStatus },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AppError>;
