//! Subcommand handlers.
//!
//! Handlers print their results to stdout; logging goes to stderr.

use anyhow::{Context, Result};
use chrono::Utc;
use domain::services::PurgePolicy;
use persistence::db::create_pool;
use persistence::healer::{HealReport, PhaseOutcome, PhasePlan, SchemaHealer};
use persistence::seed::Seeder;
use sqlx::PgPool;
use std::process::ExitCode;
use tracing::info;

use crate::cli::{Command, HealArgs, ListBackupsArgs, PurgeArgs, RestoreArgs};
use crate::config::Config;
use crate::services::backup::BackupService;
use crate::services::purge::{DocumentPurger, PurgeError};

pub async fn run(command: Command, config: &Config) -> Result<ExitCode> {
    match command {
        Command::Heal(args) => heal(config, args).await,
        Command::Seed => seed(config).await,
        Command::Backup => backup(config).await,
        Command::ListBackups(args) => list_backups(config, args).await,
        Command::Restore(args) => restore(config, args).await,
        Command::PurgeDocuments(args) => purge_documents(config, args).await,
    }
}

async fn connect(config: &Config) -> Result<PgPool> {
    let pool_config = config.database.pool_config()?;
    create_pool(&pool_config)
        .await
        .context("Failed to connect to database")
}

async fn heal(config: &Config, args: HealArgs) -> Result<ExitCode> {
    let pool = connect(config).await?;
    let healer = SchemaHealer::new(pool, config.heal.options(args.selected_phases()));

    if args.dry_run {
        for (phase, plan) in healer.preview().await? {
            match plan {
                PhasePlan::Skip(reason) => println!("{phase}: skipped ({reason})"),
                PhasePlan::Run(steps) if steps.is_empty() => println!("{phase}: up to date"),
                PhasePlan::Run(steps) => {
                    println!("{phase}:");
                    for step in steps {
                        println!("  {};", step.sql);
                    }
                }
            }
        }
        return Ok(ExitCode::SUCCESS);
    }

    let report = healer.run().await;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_heal_report(&report);
    }

    Ok(if report.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn print_heal_report(report: &HealReport) {
    for entry in &report.phases {
        match &entry.outcome {
            PhaseOutcome::Applied { changes } => {
                println!("{:<26} applied  {} change(s)", entry.phase, changes)
            }
            PhaseOutcome::Skipped { reason } => println!("{:<26} skipped  {}", entry.phase, reason),
            PhaseOutcome::Failed { error, attempts } => println!(
                "{:<26} FAILED   {} (after {} attempt(s))",
                entry.phase, error, attempts
            ),
        }
    }
    println!(
        "{} change(s), {} failed phase(s)",
        report.total_changes(),
        report.failures().count()
    );
}

async fn seed(config: &Config) -> Result<ExitCode> {
    let pool = connect(config).await?;
    let admin = config.seed.admin_account();
    if admin.is_none() {
        info!("seed.admin_password not set, bootstrap administrator will not be created");
    }

    let report = Seeder::new(pool).run(admin.as_ref()).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(ExitCode::SUCCESS)
}

async fn backup(config: &Config) -> Result<ExitCode> {
    let url = config.database.require_url()?;
    let service = BackupService::new(config.backup.clone(), url.to_string());
    let outcome = service.create(Utc::now()).await?;

    println!("PostgreSQL backup created: {}", outcome.path.display());
    for path in &outcome.removed {
        println!("Removed old backup: {}", path.display());
    }
    Ok(ExitCode::SUCCESS)
}

async fn list_backups(config: &Config, args: ListBackupsArgs) -> Result<ExitCode> {
    let service = BackupService::new(config.backup.clone(), config.database.url.clone());
    let files = service.list().await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&files)?);
    } else if files.is_empty() {
        println!("No backups in {}", config.backup.dir.display());
    } else {
        for file in &files {
            println!(
                "{}  {:>12} bytes  {}",
                file.modified.format("%Y-%m-%d %H:%M:%S UTC"),
                file.size_bytes,
                file.path.display()
            );
        }
    }
    Ok(ExitCode::SUCCESS)
}

async fn restore(config: &Config, args: RestoreArgs) -> Result<ExitCode> {
    let url = config.database.require_url()?;
    let service = BackupService::new(config.backup.clone(), url.to_string());
    service.restore(&args.path, args.yes).await?;

    println!("PostgreSQL restored from: {}", args.path.display());
    Ok(ExitCode::SUCCESS)
}

async fn purge_documents(config: &Config, args: PurgeArgs) -> Result<ExitCode> {
    if !args.dry_run && !args.yes {
        return Err(PurgeError::NotConfirmed.into());
    }
    let policy = PurgePolicy::new(
        args.months.unwrap_or(config.purge.validity_months),
        args.grace_days.unwrap_or(config.purge.grace_days),
    );
    let pool = connect(config).await?;
    let purger = DocumentPurger::new(pool, config.purge.static_root.clone());

    let summary = purger.run(policy, args.dry_run, args.yes).await?;
    println!(
        "Expired documents{}: archived={}, deleted={} (months={}, grace_days={})",
        if summary.dry_run { " (dry run)" } else { "" },
        summary.archived,
        summary.deleted,
        summary.months,
        summary.grace_days
    );
    Ok(ExitCode::SUCCESS)
}
