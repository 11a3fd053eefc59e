//! Row backfills for columns introduced after data was already written.
//!
//! Rules run in declaration order; later rules read columns written by
//! earlier ones (the `issued_at` rule relies on `status` being settled).

use crate::catalog::Catalog;
use crate::schema::DOCUMENTS;
use domain::models::DocumentStatus;
use std::collections::BTreeSet;

/// `UPDATE table SET column = value WHERE predicate`, applied only when
/// every column in `requires` is present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackfillRule {
    pub name: &'static str,
    pub table: &'static str,
    pub requires: &'static [&'static str],
    pub column: &'static str,
    pub value: String,
    pub predicate: String,
}

impl BackfillRule {
    pub fn sql(&self) -> String {
        format!(
            "UPDATE {} SET {} = {} WHERE {}",
            self.table, self.column, self.value, self.predicate
        )
    }

    /// Whether the rule can run once `pending` columns have been added.
    pub fn applies(&self, catalog: &dyn Catalog, pending: &BTreeSet<&str>) -> bool {
        catalog.table_exists(self.table)
            && self
                .requires
                .iter()
                .all(|c| pending.contains(c) || catalog.column_exists(self.table, c))
    }
}

/// Backfills for the issuance-record table.
pub fn document_rules() -> Vec<BackfillRule> {
    let legacy = format!("'{}'", DocumentStatus::LEGACY);

    vec![
        BackfillRule {
            name: "documents.status",
            table: DOCUMENTS,
            requires: &["status"],
            column: "status",
            value: legacy.clone(),
            predicate: "status IS NULL".to_string(),
        },
        BackfillRule {
            name: "documents.created_at",
            table: DOCUMENTS,
            requires: &["created_at", "issue_date"],
            column: "created_at",
            value: "issue_date".to_string(),
            predicate: "created_at IS NULL".to_string(),
        },
        BackfillRule {
            name: "documents.issued_at",
            table: DOCUMENTS,
            requires: &["issued_at", "issue_date", "status"],
            column: "issued_at",
            value: "issue_date".to_string(),
            predicate: format!("issued_at IS NULL AND status = {}", legacy),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::SchemaSnapshot;

    #[test]
    fn test_rule_order_settles_status_first() {
        let names: Vec<_> = document_rules().iter().map(|r| r.name).collect();
        assert_eq!(
            names,
            vec!["documents.status", "documents.created_at", "documents.issued_at"]
        );
    }

    #[test]
    fn test_issued_at_only_for_issued_rows() {
        let rules = document_rules();
        assert_eq!(
            rules[2].sql(),
            "UPDATE documents SET issued_at = issue_date WHERE issued_at IS NULL AND status = 'issued'"
        );
    }

    #[test]
    fn test_status_backfill_sql() {
        assert_eq!(
            document_rules()[0].sql(),
            "UPDATE documents SET status = 'issued' WHERE status IS NULL"
        );
    }

    #[test]
    fn test_pending_columns_satisfy_requirements() {
        let catalog = SchemaSnapshot::default().with_table("documents", &["id", "issue_date"]);
        let pending: BTreeSet<&str> = ["status", "created_at", "issued_at"].into_iter().collect();
        assert!(document_rules().iter().all(|r| r.applies(&catalog, &pending)));
    }

    #[test]
    fn test_rules_skip_without_issue_date() {
        let catalog = SchemaSnapshot::default().with_table("documents", &["id", "status"]);
        let pending: BTreeSet<&str> = ["created_at", "issued_at"].into_iter().collect();
        let applicable: Vec<_> = document_rules()
            .into_iter()
            .filter(|r| r.applies(&catalog, &pending))
            .map(|r| r.name)
            .collect();
        assert_eq!(applicable, vec!["documents.status"]);
    }

    #[test]
    fn test_rules_skip_without_table() {
        let catalog = SchemaSnapshot::default();
        let pending = BTreeSet::new();
        assert!(document_rules().iter().all(|r| !r.applies(&catalog, &pending)));
    }
}
