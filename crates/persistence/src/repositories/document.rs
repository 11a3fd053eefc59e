//! Repository for issued document maintenance.

use chrono::NaiveDateTime;
use domain::services::TransactionLogEntry;
use sqlx::PgPool;

use super::transaction_log::TransactionLogRepository;
use crate::entities::ExpiryCandidateEntity;
use crate::metrics::QueryTimer;

/// Changes applied by one purge, committed together.
#[derive(Debug, Clone, Default)]
pub struct PurgeChanges {
    pub archive_ids: Vec<i32>,
    pub delete_ids: Vec<i32>,
    pub log_entries: Vec<TransactionLogEntry>,
}

impl PurgeChanges {
    pub fn is_empty(&self) -> bool {
        self.archive_ids.is_empty() && self.delete_ids.is_empty()
    }
}

/// What a committed purge actually touched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PurgeApplied {
    pub archived: u64,
    pub deleted: u64,
    /// Non-empty `file_path` values of the deleted rows, relative to the
    /// application's static root.
    pub files: Vec<String>,
}

const EXPIRY_CANDIDATES: &str = r#"
    SELECT id, issue_date::date AS issue_date, is_archived
    FROM documents
    WHERE status = 'issued'
      AND issue_date IS NOT NULL
    ORDER BY id
"#;

/// Repository for document operations.
#[derive(Debug, Clone)]
pub struct DocumentRepository {
    pool: PgPool,
}

impl DocumentRepository {
    /// Create a new repository instance.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Issued documents with a known issue date, archived or not.
    pub async fn find_expiry_candidates(&self) -> Result<Vec<ExpiryCandidateEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_expiry_candidates");
        let result = sqlx::query_as::<_, ExpiryCandidateEntity>(EXPIRY_CANDIDATES)
            .fetch_all(&self.pool)
            .await;
        timer.record();
        result
    }

    /// Locks the expiry candidates, lets `plan` choose what to archive and
    /// delete, then applies and logs the changes in the same transaction.
    ///
    /// The writes repeat the candidate predicates, so an id `plan` returns
    /// for a row that is no longer issued (or no longer in the expected
    /// archive state) is left untouched.
    pub async fn purge_expired<F>(
        &self,
        now: NaiveDateTime,
        plan: F,
    ) -> Result<PurgeApplied, sqlx::Error>
    where
        F: FnOnce(&[ExpiryCandidateEntity]) -> PurgeChanges,
    {
        let timer = QueryTimer::new("purge_expired_documents");
        let mut tx = self.pool.begin().await?;

        let locking = format!("{EXPIRY_CANDIDATES} FOR UPDATE");
        let candidates = sqlx::query_as::<_, ExpiryCandidateEntity>(&locking)
            .fetch_all(&mut *tx)
            .await?;

        let changes = plan(&candidates);
        let mut applied = PurgeApplied::default();
        if changes.is_empty() {
            tx.rollback().await?;
            timer.record();
            return Ok(applied);
        }

        if !changes.archive_ids.is_empty() {
            // archived by the system, not by a user
            applied.archived = sqlx::query(
                r#"
                UPDATE documents
                SET is_archived = TRUE,
                    archived_at = $2,
                    archived_by_id = NULL,
                    updated_at = $2
                WHERE id = ANY($1)
                  AND status = 'issued'
                  AND is_archived = FALSE
                "#,
            )
            .bind(&changes.archive_ids)
            .bind(now)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        }

        if !changes.delete_ids.is_empty() {
            let deleted: Vec<(Option<String>,)> = sqlx::query_as(
                r#"
                DELETE FROM documents
                WHERE id = ANY($1)
                  AND status = 'issued'
                  AND is_archived = TRUE
                RETURNING file_path
                "#,
            )
            .bind(&changes.delete_ids)
            .fetch_all(&mut *tx)
            .await?;

            applied.deleted = deleted.len() as u64;
            applied.files = deleted
                .into_iter()
                .filter_map(|(file,)| file.filter(|f| !f.is_empty()))
                .collect();
        }

        for entry in &changes.log_entries {
            TransactionLogRepository::insert_with(&mut tx, entry).await?;
        }

        tx.commit().await?;
        timer.record();
        Ok(applied)
    }
}
