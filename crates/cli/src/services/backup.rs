//! Database backups through the PostgreSQL client tools.
//!
//! `pg_dump` and `pg_restore` are invoked as child processes through the
//! [`CommandRunner`] seam, so the file handling can be tested without them.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

use crate::config::BackupConfig;

const BACKUP_PREFIX: &str = "backup_";
const BACKUP_EXTENSION: &str = "dump";

#[derive(Debug, Error)]
pub enum BackupError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{tool} exited with status {status}: {stderr}")]
    ToolFailed {
        tool: String,
        status: i32,
        stderr: String,
    },

    #[error("Backup file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Refusing to restore without --yes (this overwrites existing data)")]
    NotConfirmed,
}

/// Exit status and captured stderr of a finished child process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutput {
    pub status: i32,
    pub stderr: String,
}

/// Runs external programs.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, program: &str, args: &[String]) -> std::io::Result<ToolOutput>;
}

/// Runs programs as tokio child processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, program: &str, args: &[String]) -> std::io::Result<ToolOutput> {
        let output = tokio::process::Command::new(program)
            .args(args)
            .output()
            .await?;

        Ok(ToolOutput {
            status: output.status.code().unwrap_or(-1),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackupFile {
    pub path: PathBuf,
    pub size_bytes: u64,
    pub modified: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BackupOutcome {
    pub path: PathBuf,
    /// Backups removed by retention afterwards.
    pub removed: Vec<PathBuf>,
}

/// `backup_<YYYYmmdd_HHMMSS>.dump`, in UTC.
pub fn backup_file_name(at: DateTime<Utc>) -> String {
    format!(
        "{}{}.{}",
        BACKUP_PREFIX,
        at.format("%Y%m%d_%H%M%S"),
        BACKUP_EXTENSION
    )
}

fn is_backup_file(path: &Path) -> bool {
    let name_matches = path
        .file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with(BACKUP_PREFIX));
    let extension_matches = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e == BACKUP_EXTENSION);
    name_matches && extension_matches
}

/// Backups last modified before `now - retention_days`.
///
/// A retention of zero days keeps everything.
pub fn expired_backups(
    files: &[BackupFile],
    now: DateTime<Utc>,
    retention_days: u32,
) -> Vec<&BackupFile> {
    if retention_days == 0 {
        return Vec::new();
    }
    let cutoff = now - Duration::days(i64::from(retention_days));
    files.iter().filter(|f| f.modified < cutoff).collect()
}

pub struct BackupService<R = ProcessRunner> {
    config: BackupConfig,
    database_url: String,
    runner: R,
}

impl BackupService<ProcessRunner> {
    pub fn new(config: BackupConfig, database_url: impl Into<String>) -> Self {
        Self::with_runner(config, database_url, ProcessRunner)
    }
}

impl<R: CommandRunner> BackupService<R> {
    pub fn with_runner(config: BackupConfig, database_url: impl Into<String>, runner: R) -> Self {
        Self {
            config,
            database_url: database_url.into(),
            runner,
        }
    }

    /// Dumps the database in custom format, then applies retention.
    pub async fn create(&self, now: DateTime<Utc>) -> Result<BackupOutcome, BackupError> {
        tokio::fs::create_dir_all(&self.config.dir).await?;
        let path = self.config.dir.join(backup_file_name(now));

        let args = vec![
            "-Fc".to_string(),
            self.database_url.clone(),
            "-f".to_string(),
            path.display().to_string(),
        ];
        self.invoke(&self.config.pg_dump, &args).await?;
        info!(path = %path.display(), "Backup created");

        let removed = self.apply_retention(now).await?;
        Ok(BackupOutcome { path, removed })
    }

    /// Backups in the configured directory, newest first.
    pub async fn list(&self) -> Result<Vec<BackupFile>, BackupError> {
        let mut entries = match tokio::fs::read_dir(&self.config.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let metadata = entry.metadata().await?;
            if !metadata.is_file() || !is_backup_file(&path) {
                continue;
            }
            files.push(BackupFile {
                path,
                size_bytes: metadata.len(),
                modified: DateTime::<Utc>::from(metadata.modified()?),
            });
        }

        files.sort_by(|a, b| b.modified.cmp(&a.modified).then_with(|| b.path.cmp(&a.path)));
        Ok(files)
    }

    pub async fn apply_retention(&self, now: DateTime<Utc>) -> Result<Vec<PathBuf>, BackupError> {
        let files = self.list().await?;
        let mut removed = Vec::new();

        for file in expired_backups(&files, now, self.config.retention_days) {
            match tokio::fs::remove_file(&file.path).await {
                Ok(()) => removed.push(file.path.clone()),
                Err(e) => warn!(path = %file.path.display(), error = %e, "Failed to remove old backup"),
            }
        }

        if !removed.is_empty() {
            info!(
                removed = removed.len(),
                retention_days = self.config.retention_days,
                "Old backups removed"
            );
        }
        Ok(removed)
    }

    /// Restores a custom-format dump over the current database.
    pub async fn restore(&self, path: &Path, confirmed: bool) -> Result<(), BackupError> {
        if !confirmed {
            return Err(BackupError::NotConfirmed);
        }
        if !tokio::fs::try_exists(path).await? {
            return Err(BackupError::NotFound(path.to_path_buf()));
        }

        let args = vec![
            "--clean".to_string(),
            "--if-exists".to_string(),
            "-d".to_string(),
            self.database_url.clone(),
            path.display().to_string(),
        ];
        self.invoke(&self.config.pg_restore, &args).await?;
        info!(path = %path.display(), "Database restored");
        Ok(())
    }

    async fn invoke(&self, program: &str, args: &[String]) -> Result<(), BackupError> {
        let output = self.runner.run(program, args).await?;
        if output.status != 0 {
            return Err(BackupError::ToolFailed {
                tool: program.to_string(),
                status: output.status,
                stderr: output.stderr,
            });
        }
        Ok(())
    }
}
