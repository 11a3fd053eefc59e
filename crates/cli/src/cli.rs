//! Command-line arguments.

use clap::{Args, Parser, Subcommand};
use persistence::healer::PhaseId;
use std::path::PathBuf;

/// `records-admin` command arguments.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "records-admin",
    about = "Maintenance tooling for the barangay records database",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Bring an older database up to the current schema.
    Heal(HealArgs),
    /// Insert the built-in document types and the first administrator.
    Seed,
    /// Write a timestamped pg_dump and prune old backups.
    Backup,
    /// Show backups in the backup directory, newest first.
    ListBackups(ListBackupsArgs),
    /// Restore the database from a backup file.
    Restore(RestoreArgs),
    /// Archive expired documents and delete archived ones after a grace period.
    PurgeDocuments(PurgeArgs),
}

#[derive(Debug, Clone, Args)]
pub struct HealArgs {
    /// Print the statements each phase would run without executing them.
    #[arg(long)]
    pub dry_run: bool,

    /// Only run the named phase. Repeatable; defaults to all phases.
    #[arg(long = "phase", value_name = "name")]
    pub phases: Vec<PhaseId>,

    /// Print the report as JSON.
    #[arg(long)]
    pub json: bool,
}

impl HealArgs {
    /// Selected phases in execution order.
    pub fn selected_phases(&self) -> Vec<PhaseId> {
        PhaseId::ALL
            .into_iter()
            .filter(|p| self.phases.is_empty() || self.phases.contains(p))
            .collect()
    }
}

#[derive(Debug, Clone, Args)]
pub struct ListBackupsArgs {
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Clone, Args)]
pub struct RestoreArgs {
    #[arg(long, value_name = "file")]
    pub path: PathBuf,

    /// Confirm the restore; existing data is overwritten.
    #[arg(long)]
    pub yes: bool,
}

#[derive(Debug, Clone, Args)]
pub struct PurgeArgs {
    /// Validity window in months. Defaults to `purge.validity_months`.
    #[arg(long)]
    pub months: Option<i32>,

    /// Days to keep archived documents. Defaults to `purge.grace_days`.
    #[arg(long)]
    pub grace_days: Option<i64>,

    /// Show counts without making changes.
    #[arg(long)]
    pub dry_run: bool,

    /// Confirm archiving and deletion.
    #[arg(long)]
    pub yes: bool,
}
