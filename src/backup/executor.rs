// easybackup/src/backup/executor.rs
use anyhow::{Context, Result};
use std::ffi::OsString;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::{ChildStderr, Command, Stdio};
use tracing::info;

use crate::config::ExecutorConfig;
use crate::errors::AppError;
use crate::utils::find_executable;

/// One invocation of the external backup utility.
#[derive(Debug, Clone, Copy)]
pub struct BackupRequest<'a> {
    /// Created by the executor; must not exist beforehand.
    pub target: &'a Path,
    /// Parent artifact for an incremental backup, `None` for a full one.
    pub incremental_basedir: Option<&'a Path>,
}

pub trait BackupExecutor {
    fn execute(&self, request: &BackupRequest<'_>) -> Result<()>;
}

/// Runs `xtrabackup --backup`, forwarding its stderr to stdout line by line.
#[derive(Debug, Clone)]
pub struct XtraBackup {
    config: ExecutorConfig,
}

impl XtraBackup {
    pub fn new(config: ExecutorConfig) -> Self {
        XtraBackup { config }
    }

    pub fn args(&self, request: &BackupRequest<'_>) -> Vec<OsString> {
        let mut args = vec![
            OsString::from("--backup"),
            prefixed("--target-dir=", request.target),
            OsString::from(format!("--parallel={}", self.config.parallel)),
        ];
        if let Some(user) = &self.config.user {
            args.push(OsString::from(format!("--user={}", user)));
        }
        if let Some(parent) = request.incremental_basedir {
            args.push(prefixed("--incremental-basedir=", parent));
        }
        args.extend(self.config.extra_args.iter().map(OsString::from));
        args
    }

    fn program_path(&self) -> Result<PathBuf> {
        find_executable(&self.config.program)
    }
}

impl BackupExecutor for XtraBackup {
    fn execute(&self, request: &BackupRequest<'_>) -> Result<()> {
        let program = self.program_path()?;
        info!(
            "🚀 Running {} into {}",
            program.display(),
            request.target.display()
        );

        let mut child = Command::new(&program)
            .args(self.args(request))
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("Failed to start {}", program.display()))?;

        let stderr = child
            .stderr
            .take()
            .context("Child process stderr was not captured")?;

        // The reader is dropped before `wait`, so a child still writing after
        // a forwarding failure gets EPIPE instead of blocking on a full pipe.
        let forwarded = forward_lines(DiagnosticLines::new(stderr), &mut std::io::stdout().lock());
        // Always reap the child, even if forwarding its output failed.
        let status = child
            .wait()
            .with_context(|| format!("Failed to wait for {}", program.display()))?;
        forwarded.with_context(|| format!("Failed to forward output of {}", program.display()))?;

        if !status.success() {
            return Err(AppError::ExecutorFailed {
                program: program.display().to_string(),
                status,
            }
            .into());
        }
        Ok(())
    }
}

fn prefixed(flag: &str, path: &Path) -> OsString {
    let mut arg = OsString::from(flag);
    arg.push(path.as_os_str());
    arg
}

fn forward_lines<I, W>(lines: I, out: &mut W) -> std::io::Result<()>
where
    I: Iterator<Item = std::io::Result<String>>,
    W: Write,
{
    for line in lines {
        writeln!(out, "{}", line?)?;
        out.flush()?;
    }
    Ok(())
}

/// Lines of a child's diagnostic stream, read as they are produced.
/// Invalid UTF-8 is replaced rather than treated as an error.
pub struct DiagnosticLines<R = ChildStderr> {
    reader: BufReader<R>,
    buf: Vec<u8>,
    done: bool,
}

impl<R: std::io::Read> DiagnosticLines<R> {
    pub fn new(inner: R) -> Self {
        DiagnosticLines {
            reader: BufReader::new(inner),
            buf: Vec::new(),
            done: false,
        }
    }
}

impl<R: std::io::Read> Iterator for DiagnosticLines<R> {
    type Item = std::io::Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        self.buf.clear();
        match self.reader.read_until(b'\n', &mut self.buf) {
            Ok(0) => {
                self.done = true;
                None
            }
            Ok(_) => {
                if self.buf.last() == Some(&b'\n') {
                    self.buf.pop();
                    if self.buf.last() == Some(&b'\r') {
                        self.buf.pop();
                    }
                }
                Some(Ok(String::from_utf8_lossy(&self.buf).into_owned()))
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
