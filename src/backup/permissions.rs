// easybackup/src/backup/permissions.rs
use anyhow::{Context, Result};
#[cfg(unix)]
use std::fs;
use std::path::Path;
use walkdir::WalkDir;

#[cfg(unix)]
const READ_ALL: u32 = 0o444;
#[cfg(unix)]
const TRAVERSE_ALL: u32 = 0o111;

/// Makes every file under `root` world-readable and every directory
/// world-traversable, so jobs running as another user can read the backup.
/// Symlinks are left alone.
#[cfg(unix)]
pub fn normalize_tree(root: &Path) -> Result<usize> {
    use std::os::unix::fs::PermissionsExt;

    let mut changed = 0;
    for entry in WalkDir::new(root).follow_links(false) {
        let entry = entry.with_context(|| format!("Failed to walk directory: {}", root.display()))?;
        let file_type = entry.file_type();
        if file_type.is_symlink() {
            continue;
        }

        let path = entry.path();
        let metadata = entry
            .metadata()
            .with_context(|| format!("Failed to read metadata of {}", path.display()))?;
        let mode = metadata.permissions().mode();
        let wanted = if file_type.is_dir() {
            mode | READ_ALL | TRAVERSE_ALL
        } else {
            mode | READ_ALL
        };

        if wanted != mode {
            fs::set_permissions(path, fs::Permissions::from_mode(wanted))
                .with_context(|| format!("Failed to set permissions on {}", path.display()))?;
            changed += 1;
        }
    }
    Ok(changed)
}

#[cfg(not(unix))]
pub fn normalize_tree(root: &Path) -> Result<usize> {
    // Only checks that the tree is walkable; there are no mode bits to fix.
    for entry in WalkDir::new(root) {
        entry.with_context(|| format!("Failed to walk directory: {}", root.display()))?;
    }
    Ok(0)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    fn mode_of(path: &Path) -> anyhow::Result<u32> {
        Ok(fs::metadata(path)?.permissions().mode() & 0o777)
    }

    #[test]
    fn test_files_readable_and_dirs_traversable() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let base = dir.path().join("base");
        let nested = base.join("mysql");
        fs::create_dir_all(&nested)?;
        let file = nested.join("ibdata1");
        fs::write(&file, b"data")?;
        let top_file = base.join("xtrabackup_checkpoints");
        fs::write(&top_file, b"backup_type = full-backuped\n")?;

        fs::set_permissions(&file, fs::Permissions::from_mode(0o600))?;
        fs::set_permissions(&top_file, fs::Permissions::from_mode(0o640))?;
        fs::set_permissions(&nested, fs::Permissions::from_mode(0o700))?;
        fs::set_permissions(&base, fs::Permissions::from_mode(0o750))?;

        let changed = normalize_tree(&base)?;
        assert_eq!(changed, 4);

        assert_eq!(mode_of(&file)?, 0o644);
        assert_eq!(mode_of(&top_file)?, 0o644);
        assert_eq!(mode_of(&nested)?, 0o755);
        assert_eq!(mode_of(&base)?, 0o755);
        Ok(())
    }

    #[test]
    fn test_existing_bits_are_kept() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let base = dir.path().join("base");
        fs::create_dir(&base)?;
        let script = base.join("run.sh");
        fs::write(&script, b"#!/bin/sh\n")?;
        fs::set_permissions(&script, fs::Permissions::from_mode(0o700))?;
        fs::set_permissions(&base, fs::Permissions::from_mode(0o777))?;

        let changed = normalize_tree(&base)?;
        assert_eq!(changed, 1);
        assert_eq!(mode_of(&script)?, 0o744);
        assert_eq!(mode_of(&base)?, 0o777);
        Ok(())
    }

    #[test]
    fn test_missing_tree_is_an_error() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        assert!(normalize_tree(&dir.path().join("missing")).is_err());
        Ok(())
    }
}
