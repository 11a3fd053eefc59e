//! Reference data seeding.
//!
//! Seeds the built-in document types and, on a fresh install, the first
//! administrator account. Safe to run repeatedly.

use domain::models::{DocumentTypeSeed, UserRole, DEFAULT_DOCUMENT_TYPES};
use serde::Serialize;
use shared::password::{check_strength, hash_password, PasswordError};
use sqlx::PgPool;
use thiserror::Error;
use tracing::{debug, info};

use crate::catalog::{Catalog, SchemaSnapshot};
use crate::repositories::{DocumentTypeRepository, NewUser, SeedResult, UserRepository};
use crate::schema::{DOCUMENT_TYPES, USERS};

#[derive(Debug, Error)]
pub enum SeedError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Invalid admin password: {0}")]
    Password(#[from] PasswordError),

    #[error("Column {table}.{column} is missing; run `heal` first")]
    SchemaOutdated {
        table: &'static str,
        column: &'static str,
    },
}

/// Credentials for the bootstrap administrator.
#[derive(Debug, Clone)]
pub struct AdminAccount {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AdminOutcome {
    Created { id: i32 },
    /// Accounts already exist; nothing was inserted.
    AlreadyPresent,
    NotConfigured,
    TableMissing,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SeedReport {
    pub document_types_inserted: usize,
    pub document_types_updated: usize,
    /// Set when `document_types` does not exist.
    pub document_types_skipped: bool,
    pub admin: AdminOutcome,
}

const DOCUMENT_TYPE_COLUMNS: &[&str] = &["name", "description", "requires_photo", "template_path"];
const USER_COLUMNS: &[&str] = &["username", "email", "password_hash", "role"];

/// First column of `columns` missing from `table`.
fn missing_column(
    catalog: &dyn Catalog,
    table: &'static str,
    columns: &[&'static str],
) -> Option<SeedError> {
    columns
        .iter()
        .find(|c| !catalog.column_exists(table, c))
        .map(|&column| SeedError::SchemaOutdated { table, column })
}

pub struct Seeder {
    pool: PgPool,
    types: DocumentTypeRepository,
    users: UserRepository,
}

impl Seeder {
    pub fn new(pool: PgPool) -> Self {
        Self {
            types: DocumentTypeRepository::new(pool.clone()),
            users: UserRepository::new(pool.clone()),
            pool,
        }
    }

    pub async fn run(&self, admin: Option<&AdminAccount>) -> Result<SeedReport, SeedError> {
        let snapshot = {
            let mut conn = self.pool.acquire().await?;
            SchemaSnapshot::load(&mut conn, &[DOCUMENT_TYPES, USERS]).await?
        };

        let mut report = SeedReport {
            document_types_inserted: 0,
            document_types_updated: 0,
            document_types_skipped: true,
            admin: AdminOutcome::TableMissing,
        };

        if snapshot.table_exists(DOCUMENT_TYPES) {
            if let Some(err) = missing_column(&snapshot, DOCUMENT_TYPES, DOCUMENT_TYPE_COLUMNS) {
                return Err(err);
            }
            report.document_types_skipped = false;
            self.seed_document_types(DEFAULT_DOCUMENT_TYPES, &mut report)
                .await?;
        } else {
            info!("document_types table does not exist, skipping document types");
        }

        if snapshot.table_exists(USERS) {
            report.admin = match admin {
                None => AdminOutcome::NotConfigured,
                Some(account) => {
                    if let Some(err) = missing_column(&snapshot, USERS, USER_COLUMNS) {
                        return Err(err);
                    }
                    self.seed_admin(account).await?
                }
            };
        }

        info!(
            inserted = report.document_types_inserted,
            updated = report.document_types_updated,
            admin = ?report.admin,
            "Seeding finished"
        );
        Ok(report)
    }

    async fn seed_document_types(
        &self,
        seeds: &[DocumentTypeSeed],
        report: &mut SeedReport,
    ) -> Result<(), SeedError> {
        for seed in seeds {
            match self.types.upsert_seed(seed).await? {
                SeedResult::Inserted => {
                    debug!(name = seed.name, "Document type inserted");
                    report.document_types_inserted += 1;
                }
                SeedResult::Updated => report.document_types_updated += 1,
            }
        }
        Ok(())
    }

    async fn seed_admin(&self, account: &AdminAccount) -> Result<AdminOutcome, SeedError> {
        if self.users.count().await? > 0 {
            return Ok(AdminOutcome::AlreadyPresent);
        }

        check_strength(&account.password)?;
        let user = NewUser {
            username: account.username.clone(),
            email: account.email.clone(),
            password_hash: hash_password(&account.password)?,
            role: UserRole::Admin,
        };

        Ok(match self.users.create_if_empty(&user).await? {
            Some(id) => {
                info!(user_id = id, username = %user.username, "Bootstrap administrator created");
                AdminOutcome::Created { id }
            }
            None => AdminOutcome::AlreadyPresent,
        })
    }
}
