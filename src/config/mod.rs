// easybackup/src/config/mod.rs
use anyhow::{Context, Result};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::errors::AppError;

pub const DEFAULT_PROGRAM: &str = "xtrabackup";
pub const DEFAULT_PARALLEL: u32 = 4;
pub const DEFAULT_USER: &str = "root";
pub const DEFAULT_COMPLETION_MARKER: &str = "xtrabackup_checkpoints";
const DEFAULT_DISABLED_FILE: &str = "/var/tmp/easybackup.disabled";

// Structs for deserializing the optional JSON config file
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JsonXtrabackupConfig {
    pub program: Option<String>,
    pub parallel: Option<u32>,
    pub user: Option<String>,
    pub extra_args: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawJsonConfig {
    pub default_backup_dir: Option<PathBuf>,
    pub lock_file: Option<PathBuf>,
    pub disabled_file: Option<PathBuf>,
    // `null` disables the marker, a missing key keeps the default.
    #[serde(default, deserialize_with = "deserialize_marker")]
    pub completion_marker: Option<Option<String>>,
    pub xtrabackup: Option<JsonXtrabackupConfig>,
}

fn deserialize_marker<'de, D>(deserializer: D) -> std::result::Result<Option<Option<String>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}

// Application's internal configuration structs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutorConfig {
    pub program: String,
    pub parallel: u32,
    pub user: Option<String>,
    pub extra_args: Vec<String>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        ExecutorConfig {
            program: DEFAULT_PROGRAM.to_string(),
            parallel: DEFAULT_PARALLEL,
            user: Some(DEFAULT_USER.to_string()),
            extra_args: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Backup root given on the command line. Must already exist.
    pub backup_dir: Option<PathBuf>,
    /// Used when `backup_dir` is absent; created on demand.
    pub default_backup_dir: PathBuf,
    pub lock_file: PathBuf,
    pub disabled_file: PathBuf,
    pub silent_lock: bool,
    pub completion_marker: Option<String>,
    pub executor: ExecutorConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            backup_dir: None,
            default_backup_dir: env::temp_dir().join("mysql"),
            lock_file: env::temp_dir().join("easybackup.pid"),
            disabled_file: PathBuf::from(DEFAULT_DISABLED_FILE),
            silent_lock: false,
            completion_marker: Some(DEFAULT_COMPLETION_MARKER.to_string()),
            executor: ExecutorConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn load_from_json(config_path: &Path) -> Result<Self> {
        let config_content = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file at {}", config_path.display()))?;
        let raw_json_config: RawJsonConfig = serde_json::from_str(&config_content)
            .with_context(|| {
                format!(
                    "Failed to parse JSON from config file at {}",
                    config_path.display()
                )
            })?;

        Self::from_raw(raw_json_config)
    }

    /// Layers the raw file values over the built-in defaults.
    pub fn from_raw(raw: RawJsonConfig) -> Result<Self> {
        let mut config = AppConfig::default();

        if let Some(dir) = raw.default_backup_dir {
            config.default_backup_dir = dir;
        }
        if let Some(lock_file) = raw.lock_file {
            config.lock_file = lock_file;
        }
        if let Some(disabled_file) = raw.disabled_file {
            config.disabled_file = disabled_file;
        }
        if let Some(marker) = raw.completion_marker {
            config.completion_marker = marker.filter(|m| !m.trim().is_empty());
        }

        if let Some(xb) = raw.xtrabackup {
            if let Some(program) = xb.program {
                config.executor.program = program;
            }
            if let Some(parallel) = xb.parallel {
                config.executor.parallel = parallel;
            }
            if let Some(user) = xb.user {
                config.executor.user = Some(user).filter(|u| !u.is_empty());
            }
            if let Some(extra_args) = xb.extra_args {
                config.executor.extra_args = extra_args;
            }
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.executor.program.trim().is_empty() {
            return Err(AppError::Config("xtrabackup.program cannot be empty".to_string()).into());
        }
        if self.executor.parallel == 0 {
            return Err(AppError::Config("xtrabackup.parallel must be at least 1".to_string()).into());
        }
        if self.lock_file.as_os_str().is_empty() {
            return Err(AppError::Config("lock_file cannot be empty".to_string()).into());
        }
        if self.default_backup_dir.as_os_str().is_empty() {
            return Err(AppError::Config("default_backup_dir cannot be empty".to_string()).into());
        }
        Ok(())
    }
}
