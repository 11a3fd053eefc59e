//! Expired document purge.

use chrono::{NaiveDate, Utc};
use domain::services::{PurgeAction, PurgePolicy, TransactionLogEntry};
use persistence::entities::ExpiryCandidateEntity;
use persistence::repositories::{DocumentRepository, PurgeChanges};
use serde::Serialize;
use sqlx::PgPool;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum PurgeError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Refusing to run without --dry-run or --yes")]
    NotConfirmed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PurgeSummary {
    pub archived: usize,
    pub deleted: usize,
    pub files_removed: usize,
    pub months: i32,
    pub grace_days: i64,
    pub dry_run: bool,
}

/// Sorts candidates into archive and delete sets and prepares the log rows.
pub fn plan_purge(
    candidates: &[ExpiryCandidateEntity],
    policy: &PurgePolicy,
    today: NaiveDate,
) -> PurgeChanges {
    let mut changes = PurgeChanges::default();
    if !policy.is_enabled() {
        return changes;
    }

    for doc in candidates {
        match policy.classify(doc.issue_date, doc.is_archived, today) {
            Some(PurgeAction::Archive) => changes.archive_ids.push(doc.id),
            Some(PurgeAction::Delete) => changes.delete_ids.push(doc.id),
            None => {}
        }
    }

    if !changes.archive_ids.is_empty() {
        changes.log_entries.push(TransactionLogEntry::auto_archived(
            changes.archive_ids.len(),
            policy.validity_months,
        ));
    }
    if !changes.delete_ids.is_empty() {
        changes.log_entries.push(TransactionLogEntry::auto_deleted(
            changes.delete_ids.len(),
            policy.grace_days,
        ));
    }
    changes
}

/// Resolves an attachment path under `root`, refusing anything that could
/// escape it.
pub fn attachment_path(root: &Path, relative: &str) -> Option<PathBuf> {
    let relative = Path::new(relative);
    let contained = relative
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
    contained.then(|| root.join(relative))
}

pub struct DocumentPurger {
    documents: DocumentRepository,
    static_root: PathBuf,
}

impl DocumentPurger {
    pub fn new(pool: PgPool, static_root: PathBuf) -> Self {
        Self {
            documents: DocumentRepository::new(pool),
            static_root,
        }
    }

    pub async fn run(
        &self,
        policy: PurgePolicy,
        dry_run: bool,
        confirmed: bool,
    ) -> Result<PurgeSummary, PurgeError> {
        if !dry_run && !confirmed {
            return Err(PurgeError::NotConfirmed);
        }

        let mut summary = PurgeSummary {
            archived: 0,
            deleted: 0,
            files_removed: 0,
            months: policy.validity_months,
            grace_days: policy.grace_days,
            dry_run,
        };
        if !policy.is_enabled() {
            info!(months = policy.validity_months, "Document purge disabled");
            return Ok(summary);
        }

        let now = Utc::now().naive_utc();
        let today = now.date();

        if dry_run {
            let candidates = self.documents.find_expiry_candidates().await?;
            let changes = plan_purge(&candidates, &policy, today);
            summary.archived = changes.archive_ids.len();
            summary.deleted = changes.delete_ids.len();
            return Ok(summary);
        }

        let applied = self
            .documents
            .purge_expired(now, |candidates| plan_purge(candidates, &policy, today))
            .await?;
        summary.archived = applied.archived as usize;
        summary.deleted = applied.deleted as usize;
        if summary.archived == 0 && summary.deleted == 0 {
            return Ok(summary);
        }
        summary.files_removed = self.remove_files(&applied.files).await;

        info!(
            archived = summary.archived,
            deleted = summary.deleted,
            files_removed = summary.files_removed,
            "Expired documents purged"
        );
        Ok(summary)
    }

    /// Best effort: a file that cannot be removed is logged and skipped.
    async fn remove_files(&self, files: &[String]) -> usize {
        let mut removed = 0;
        for file in files {
            let Some(path) = attachment_path(&self.static_root, file) else {
                warn!(file = %file, "Attachment path outside static root, skipping");
                continue;
            };
            match tokio::fs::remove_file(&path).await {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove attachment"),
            }
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn candidate(id: i32, issue_date: NaiveDate, is_archived: bool) -> ExpiryCandidateEntity {
        ExpiryCandidateEntity {
            id,
            issue_date,
            is_archived,
        }
    }

    #[test]
    fn test_plan_splits_archive_and_delete() {
        let today = date(2024, 9, 1);
        let candidates = vec![
            // expired 2024-07-15, not yet archived
            candidate(1, date(2024, 1, 15), false),
            // still valid
            candidate(2, date(2024, 6, 1), false),
            // expired 2024-03-10, archived, past grace
            candidate(3, date(2023, 9, 10), true),
            // expired 2024-08-10, archived, within grace
            candidate(4, date(2024, 2, 10), true),
        ];

        let changes = plan_purge(&candidates, &PurgePolicy::default(), today);

        assert_eq!(changes.archive_ids, vec![1]);
        assert_eq!(changes.delete_ids, vec![3]);
        assert_eq!(changes.log_entries.len(), 2);
        assert_eq!(
            changes.log_entries[0].action,
            "Auto-archived expired documents"
        );
        assert_eq!(
            changes.log_entries[1].action,
            "Auto-deleted expired documents"
        );
    }

    #[test]
    fn test_plan_without_matches_logs_nothing() {
        let candidates = vec![candidate(1, date(2024, 8, 1), false)];
        let changes = plan_purge(&candidates, &PurgePolicy::default(), date(2024, 9, 1));
        assert!(changes.is_empty());
        assert!(changes.log_entries.is_empty());
    }

    #[test]
    fn test_disabled_policy_plans_nothing() {
        let candidates = vec![candidate(1, date(2000, 1, 1), true)];
        let changes = plan_purge(&candidates, &PurgePolicy::new(0, 30), date(2024, 9, 1));
        assert!(changes.is_empty());
    }

    #[test]
    fn test_attachment_path_stays_under_root() {
        let root = Path::new("/srv/records/static");
        assert_eq!(
            attachment_path(root, "generated/a.pdf"),
            Some(PathBuf::from("/srv/records/static/generated/a.pdf"))
        );
        assert_eq!(attachment_path(root, "../secrets.env"), None);
        assert_eq!(attachment_path(root, "/etc/passwd"), None);
    }

    #[tokio::test]
    async fn test_remove_files_is_best_effort() {
        let root = std::env::temp_dir().join(format!("records-static-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(root.join("generated")).unwrap();
        std::fs::write(root.join("generated/present.pdf"), b"%PDF").unwrap();

        let pool = sqlx::postgres::PgPoolOptions::new()
            .connect_lazy("postgres://localhost/unused")
            .unwrap();
        let purger = DocumentPurger::new(pool, root.clone());
        let removed = purger
            .remove_files(&[
                "generated/present.pdf".to_string(),
                "generated/missing.pdf".to_string(),
                "../outside.pdf".to_string(),
            ])
            .await;

        assert_eq!(removed, 1);
        assert!(!root.join("generated/present.pdf").exists());
        std::fs::remove_dir_all(root).unwrap();
    }

    #[tokio::test]
    async fn test_refuses_without_confirmation() {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .connect_lazy("postgres://localhost/unused")
            .unwrap();
        let purger = DocumentPurger::new(pool, PathBuf::from("static"));

        let result = purger.run(PurgePolicy::default(), false, false).await;
        assert!(matches!(result, Err(PurgeError::NotConfirmed)));
    }
}
