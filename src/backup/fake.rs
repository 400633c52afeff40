// Test double for the external backup utility.
use anyhow::Result;
use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};

use super::executor::{BackupExecutor, BackupRequest};

pub type Call = (PathBuf, Option<PathBuf>);

/// Records every request. On success it creates the target and the
/// completion marker; on failure it leaves a half-written target behind.
pub struct FakeExecutor {
    marker: Option<&'static str>,
    fail: bool,
    private_modes: bool,
    calls: RefCell<Vec<Call>>,
}

impl FakeExecutor {
    pub fn succeeding(marker: Option<&'static str>) -> Self {
        FakeExecutor {
            marker,
            fail: false,
            private_modes: false,
            calls: RefCell::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        FakeExecutor {
            marker: None,
            fail: true,
            private_modes: false,
            calls: RefCell::new(Vec::new()),
        }
    }

    /// Writes files as 0600 and directories as 0700, like a backup taken
    /// as root with a strict umask.
    pub fn with_private_modes(mut self) -> Self {
        self.private_modes = true;
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }
}

impl BackupExecutor for FakeExecutor {
    fn execute(&self, request: &BackupRequest<'_>) -> Result<()> {
        self.calls.borrow_mut().push((
            request.target.to_path_buf(),
            request.incremental_basedir.map(|p| p.to_path_buf()),
        ));

        fs::create_dir_all(request.target)?;
        fs::write(request.target.join("ibdata1"), b"pages")?;
        if self.fail {
            anyhow::bail!("simulated xtrabackup failure");
        }
        if let Some(marker) = self.marker {
            fs::write(request.target.join(marker), b"backup_type = full-backuped\n")?;
        }
        if self.private_modes {
            restrict(request.target)?;
        }
        Ok(())
    }
}

#[cfg(unix)]
fn restrict(target: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let schema = target.join("mysql");
    fs::create_dir_all(&schema)?;
    fs::write(schema.join("user.ibd"), b"pages")?;
    for entry in fs::read_dir(target)?.chain(fs::read_dir(&schema)?) {
        let path = entry?.path();
        let mode = if path.is_dir() { 0o700 } else { 0o600 };
        fs::set_permissions(&path, fs::Permissions::from_mode(mode))?;
    }
    fs::set_permissions(target, fs::Permissions::from_mode(0o700))?;
    Ok(())
}

#[cfg(not(unix))]
fn restrict(_target: &Path) -> Result<()> {
    Ok(())
}
