pub mod logger;

use anyhow::{Context, Result};
use std::path::PathBuf;
use which::which;

/// Finds an executable by name in the system PATH, or checks an explicit path.
pub fn find_executable(program: &str) -> Result<PathBuf> {
    which(program).with_context(|| {
        format!(
            "{} executable not found. Please ensure it is installed and in your PATH.",
            program
        )
    })
}
