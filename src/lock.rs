//! Process-wide run lock.
//!
//! Uses `flock(LOCK_EX | LOCK_NB)` on a well-known file. The lock belongs to
//! the open file description, so it is dropped by the kernel if the process
//! dies, and `Drop` releases it on every other exit path.

use nix::errno::Errno;
use nix::fcntl::{Flock, FlockArg};
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::errors::{AppError, Result};

pub struct ProcessLock {
    file: Option<Flock<File>>,
    path: PathBuf,
}

impl fmt::Debug for ProcessLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessLock")
            .field("path", &self.path)
            .field("held", &self.file.is_some())
            .finish()
    }
}

impl ProcessLock {
    /// Takes the lock without waiting. Contention is `AppError::AlreadyLocked`.
    pub fn acquire(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map_err(|source| AppError::LockFile {
                path: path.to_path_buf(),
                source,
            })?;

        let locked = match Flock::lock(file, FlockArg::LockExclusiveNonblock) {
            Ok(locked) => locked,
            Err((_, errno)) if errno == Errno::EWOULDBLOCK => {
                return Err(AppError::AlreadyLocked(path.to_path_buf()));
            }
            Err((_, errno)) => {
                return Err(AppError::LockFile {
                    path: path.to_path_buf(),
                    source: errno.into(),
                });
            }
        };

        write_pid(&locked).map_err(|source| AppError::LockFile {
            path: path.to_path_buf(),
            source,
        })?;

        debug!("🔒 Acquired run lock at {}", path.display());
        Ok(ProcessLock {
            file: Some(locked),
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn release(mut self) -> Result<()> {
        self.unlock()
    }

    fn unlock(&mut self) -> Result<()> {
        let Some(locked) = self.file.take() else {
            return Ok(());
        };
        match locked.unlock() {
            Ok(_) => {
                debug!("🔓 Released run lock at {}", self.path.display());
                Ok(())
            }
            Err((_, errno)) => Err(AppError::LockFile {
                path: self.path.clone(),
                source: errno.into(),
            }),
        }
    }
}

impl Drop for ProcessLock {
    fn drop(&mut self) {
        if let Err(e) = self.unlock() {
            warn!("Failed to release run lock: {}", e);
        }
    }
}

// Informational only; the flock is what excludes other runs.
fn write_pid(file: &File) -> std::io::Result<()> {
    let mut handle = file;
    file.set_len(0)?;
    writeln!(handle, "{}", std::process::id())?;
    handle.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_second_acquire_reports_already_locked() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("easybackup.pid");

        let first = ProcessLock::acquire(&path)?;
        let second = ProcessLock::acquire(&path);
        assert!(matches!(second, Err(AppError::AlreadyLocked(p)) if p == path));

        first.release()?;
        Ok(())
    }

    #[test]
    fn test_lock_is_reusable_after_release() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("easybackup.pid");

        ProcessLock::acquire(&path)?.release()?;
        let again = ProcessLock::acquire(&path)?;
        assert_eq!(again.path(), path.as_path());
        Ok(())
    }

    #[test]
    fn test_drop_releases_lock() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("easybackup.pid");

        {
            let _guard = ProcessLock::acquire(&path)?;
        }
        ProcessLock::acquire(&path)?;
        Ok(())
    }

    #[test]
    fn test_holder_pid_is_written() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("easybackup.pid");

        let _guard = ProcessLock::acquire(&path)?;
        let content = fs::read_to_string(&path)?;
        assert_eq!(content.trim(), std::process::id().to_string());
        Ok(())
    }

    #[test]
    fn test_missing_parent_is_a_lock_file_error() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("no-such-dir").join("easybackup.pid");

        let result = ProcessLock::acquire(&path);
        assert!(matches!(result, Err(AppError::LockFile { .. })));
        Ok(())
    }
}
