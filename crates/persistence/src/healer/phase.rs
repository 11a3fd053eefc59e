//! Healing phases and their planning.
//!
//! Planning is pure: a phase looks at a [`Catalog`] and returns the ordered
//! statements that bring its part of the schema up to date. Nothing here
//! touches a database.

use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::backfill::document_rules;
use crate::catalog::{Catalog, OnDelete};
use crate::schema::{
    TableSpec, CREATE_LOGIN_ATTEMPTS, CREATE_LOGIN_MFA_CODES, DOCUMENTS, DOCUMENTS_TABLE,
    DOCUMENT_TYPES, DOCUMENT_TYPES_TABLE, LOGIN_ATTEMPTS, LOGIN_MFA_CODES, RESIDENTS,
    RESIDENTS_TABLE, TRANSACTION_LOGS, TRANSACTION_LOGS_TABLE, USERS, USERS_TABLE,
};
use domain::models::FALLBACK_DOCUMENT_TYPE;

pub const TRANSACTION_LOGS_USER_FK: &str = "transaction_logs_user_id_fkey";
pub const DOCUMENTS_DOCUMENT_TYPE_FK: &str = "documents_document_type_id_fkey";

/// One independently committed unit of healing work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseId {
    Residents,
    DocumentTypes,
    Users,
    TransactionLogs,
    TransactionLogsUserFk,
    Documents,
    LegacyDocumentTypes,
    LoginAttempts,
    LoginMfaCodes,
}

impl PhaseId {
    /// Execution order. The legacy document type phase needs `documents.document_type_id`
    /// from the documents phase; the MFA table needs `users`.
    pub const ALL: [PhaseId; 9] = [
        PhaseId::Residents,
        PhaseId::DocumentTypes,
        PhaseId::Users,
        PhaseId::TransactionLogs,
        PhaseId::TransactionLogsUserFk,
        PhaseId::Documents,
        PhaseId::LegacyDocumentTypes,
        PhaseId::LoginAttempts,
        PhaseId::LoginMfaCodes,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            PhaseId::Residents => "residents",
            PhaseId::DocumentTypes => "document_types",
            PhaseId::Users => "users",
            PhaseId::TransactionLogs => "transaction_logs",
            PhaseId::TransactionLogsUserFk => "transaction_logs_user_fk",
            PhaseId::Documents => "documents",
            PhaseId::LegacyDocumentTypes => "legacy_document_types",
            PhaseId::LoginAttempts => "login_attempts",
            PhaseId::LoginMfaCodes => "login_mfa_codes",
        }
    }

    /// Tables the phase plans against. Its catalog snapshot covers only
    /// these, so a lock held on an unrelated table cannot stall it.
    pub fn tables(&self) -> &'static [&'static str] {
        match self {
            PhaseId::Residents => &[RESIDENTS],
            PhaseId::DocumentTypes => &[DOCUMENT_TYPES],
            PhaseId::Users => &[USERS],
            PhaseId::TransactionLogs => &[TRANSACTION_LOGS],
            PhaseId::TransactionLogsUserFk => &[TRANSACTION_LOGS, USERS],
            PhaseId::Documents => &[DOCUMENTS],
            PhaseId::LegacyDocumentTypes => &[DOCUMENTS, DOCUMENT_TYPES],
            PhaseId::LoginAttempts => &[LOGIN_ATTEMPTS],
            PhaseId::LoginMfaCodes => &[LOGIN_MFA_CODES, USERS],
        }
    }

    pub fn plan(&self, catalog: &dyn Catalog) -> PhasePlan {
        match self {
            PhaseId::Residents => plan_table(catalog, &RESIDENTS_TABLE),
            PhaseId::DocumentTypes => plan_table(catalog, &DOCUMENT_TYPES_TABLE),
            PhaseId::Users => plan_table(catalog, &USERS_TABLE),
            PhaseId::TransactionLogs => plan_transaction_logs(catalog),
            PhaseId::TransactionLogsUserFk => plan_transaction_logs_user_fk(catalog),
            PhaseId::Documents => plan_documents(catalog),
            PhaseId::LegacyDocumentTypes => plan_legacy_document_types(catalog),
            PhaseId::LoginAttempts => plan_login_attempts(catalog),
            PhaseId::LoginMfaCodes => plan_login_mfa_codes(catalog),
        }
    }
}

impl fmt::Display for PhaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.name())
    }
}

impl FromStr for PhaseId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PhaseId::ALL
            .into_iter()
            .find(|p| p.name() == s)
            .ok_or_else(|| format!("Unknown phase: {}", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    /// Counts as one change when executed.
    Ddl,
    /// Counts the rows it touched.
    Backfill,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub description: String,
    pub sql: String,
    pub kind: StepKind,
}

impl Step {
    fn ddl(description: impl Into<String>, sql: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            sql: sql.into(),
            kind: StepKind::Ddl,
        }
    }

    fn backfill(description: impl Into<String>, sql: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            sql: sql.into(),
            kind: StepKind::Backfill,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhasePlan {
    /// The guard failed; nothing is attempted.
    Skip(&'static str),
    /// Statements to run in one transaction. May be empty.
    Run(Vec<Step>),
}

impl PhasePlan {
    pub fn steps(&self) -> &[Step] {
        match self {
            PhasePlan::Skip(_) => &[],
            PhasePlan::Run(steps) => steps,
        }
    }
}

const TABLE_ABSENT: &str = "table does not exist";

/// Adds missing columns and returns the names of the columns being added.
fn add_missing_columns<'a>(
    catalog: &dyn Catalog,
    spec: &'a TableSpec,
    steps: &mut Vec<Step>,
) -> BTreeSet<&'a str> {
    let mut pending = BTreeSet::new();

    for column in spec.columns {
        if catalog.column_exists(spec.name, column.name) {
            continue;
        }
        let mut statements = column.add_statements(spec.name).into_iter();
        if let Some(add) = statements.next() {
            steps.push(Step::ddl(format!("add {}.{}", spec.name, column.name), add));
        }
        for follow_up in statements {
            steps.push(Step::ddl(
                format!("set default {}.{}", spec.name, column.name),
                follow_up,
            ));
        }
        pending.insert(column.name);
    }

    pending
}

fn add_missing_indexes(
    catalog: &dyn Catalog,
    spec: &TableSpec,
    pending: &BTreeSet<&str>,
    steps: &mut Vec<Step>,
) {
    for index in spec.indexes {
        let column_present =
            pending.contains(index.column) || catalog.column_exists(spec.name, index.column);
        if column_present && !catalog.index_exists(index.name) {
            steps.push(Step::ddl(
                format!("create index {}", index.name),
                index.create_statement(spec.name),
            ));
        }
    }
}

fn plan_table(catalog: &dyn Catalog, spec: &TableSpec) -> PhasePlan {
    if !catalog.table_exists(spec.name) {
        return PhasePlan::Skip(TABLE_ABSENT);
    }

    let mut steps = Vec::new();
    let pending = add_missing_columns(catalog, spec, &mut steps);
    add_missing_indexes(catalog, spec, &pending, &mut steps);
    PhasePlan::Run(steps)
}

fn plan_transaction_logs(catalog: &dyn Catalog) -> PhasePlan {
    let mut plan = plan_table(catalog, &TRANSACTION_LOGS_TABLE);

    if let PhasePlan::Run(steps) = &mut plan {
        // log rows outlive the users they mention
        if catalog.column_is_nullable(TRANSACTION_LOGS, "user_id") == Some(false) {
            steps.push(Step::ddl(
                "drop not null transaction_logs.user_id",
                "ALTER TABLE transaction_logs ALTER COLUMN user_id DROP NOT NULL",
            ));
        }
    }

    plan
}

fn plan_transaction_logs_user_fk(catalog: &dyn Catalog) -> PhasePlan {
    if !catalog.column_exists(TRANSACTION_LOGS, "user_id") {
        return PhasePlan::Skip("transaction_logs.user_id does not exist");
    }
    if !catalog.table_exists(USERS) {
        return PhasePlan::Skip("users table does not exist");
    }

    let current = catalog
        .constraint(TRANSACTION_LOGS_USER_FK)
        .and_then(|c| c.on_delete);
    if current == Some(OnDelete::SetNull) {
        return PhasePlan::Run(Vec::new());
    }

    // NOT VALID: historical rows may name users deleted before the
    // constraint existed; only new writes are checked.
    PhasePlan::Run(vec![
        Step::ddl(
            format!("drop {}", TRANSACTION_LOGS_USER_FK),
            format!(
                "ALTER TABLE transaction_logs DROP CONSTRAINT IF EXISTS {}",
                TRANSACTION_LOGS_USER_FK
            ),
        ),
        Step::ddl(
            format!("add {} on delete set null", TRANSACTION_LOGS_USER_FK),
            format!(
                "ALTER TABLE transaction_logs ADD CONSTRAINT {} \
                 FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE SET NULL NOT VALID",
                TRANSACTION_LOGS_USER_FK
            ),
        ),
    ])
}

fn plan_documents(catalog: &dyn Catalog) -> PhasePlan {
    if !catalog.table_exists(DOCUMENTS) {
        return PhasePlan::Skip(TABLE_ABSENT);
    }

    let mut steps = Vec::new();
    let pending = add_missing_columns(catalog, &DOCUMENTS_TABLE, &mut steps);

    for rule in document_rules() {
        if rule.applies(catalog, &pending) {
            steps.push(Step::backfill(format!("backfill {}", rule.name), rule.sql()));
        }
    }

    add_missing_indexes(catalog, &DOCUMENTS_TABLE, &pending, &mut steps);
    PhasePlan::Run(steps)
}

fn plan_legacy_document_types(catalog: &dyn Catalog) -> PhasePlan {
    if !catalog.table_exists(DOCUMENT_TYPES) {
        return PhasePlan::Skip("document_types table does not exist");
    }
    if !catalog.column_exists(DOCUMENTS, "document_type_id") {
        return PhasePlan::Skip("documents.document_type_id does not exist");
    }

    let fallback = FALLBACK_DOCUMENT_TYPE;
    let mut steps = Vec::new();

    // older deployments stored the type name inline
    if catalog.column_exists(DOCUMENTS, "doc_type") {
        steps.push(Step::backfill(
            "register legacy document types",
            "INSERT INTO document_types (name) \
             SELECT DISTINCT d.doc_type FROM documents d \
             WHERE d.doc_type IS NOT NULL AND d.doc_type <> '' \
             AND NOT EXISTS (SELECT 1 FROM document_types dt WHERE dt.name = d.doc_type)",
        ));
        steps.push(Step::backfill(
            "backfill documents.document_type_id from doc_type",
            "UPDATE documents d SET document_type_id = dt.id FROM document_types dt \
             WHERE d.document_type_id IS NULL AND d.doc_type = dt.name",
        ));
        if !catalog.column_has_default(DOCUMENTS, "doc_type") {
            steps.push(Step::ddl(
                "set default documents.doc_type",
                format!(
                    "ALTER TABLE documents ALTER COLUMN doc_type SET DEFAULT '{}'",
                    fallback
                ),
            ));
        }
        steps.push(Step::backfill(
            "backfill documents.doc_type",
            format!(
                "UPDATE documents SET doc_type = '{}' WHERE doc_type IS NULL",
                fallback
            ),
        ));
    }

    steps.push(Step::backfill(
        "register fallback document type",
        format!(
            "INSERT INTO document_types (name) SELECT '{0}' \
             WHERE EXISTS (SELECT 1 FROM documents WHERE document_type_id IS NULL) \
             AND NOT EXISTS (SELECT 1 FROM document_types WHERE name = '{0}')",
            fallback
        ),
    ));
    steps.push(Step::backfill(
        "backfill documents.document_type_id with fallback",
        format!(
            "UPDATE documents SET document_type_id = \
             (SELECT id FROM document_types WHERE name = '{}' ORDER BY id LIMIT 1) \
             WHERE document_type_id IS NULL",
            fallback
        ),
    ));

    if catalog.column_is_nullable(DOCUMENTS, "document_type_id") == Some(true) {
        steps.push(Step::ddl(
            "set not null documents.document_type_id",
            "ALTER TABLE documents ALTER COLUMN document_type_id SET NOT NULL",
        ));
    }

    if !catalog.constraint_exists(DOCUMENTS_DOCUMENT_TYPE_FK) {
        steps.push(Step::ddl(
            format!("add {}", DOCUMENTS_DOCUMENT_TYPE_FK),
            format!(
                "ALTER TABLE documents ADD CONSTRAINT {} \
                 FOREIGN KEY (document_type_id) REFERENCES document_types (id) NOT VALID",
                DOCUMENTS_DOCUMENT_TYPE_FK
            ),
        ));
    }

    PhasePlan::Run(steps)
}

fn plan_login_attempts(catalog: &dyn Catalog) -> PhasePlan {
    if catalog.table_exists(LOGIN_ATTEMPTS) {
        return PhasePlan::Run(Vec::new());
    }
    PhasePlan::Run(vec![Step::ddl(
        format!("create table {}", LOGIN_ATTEMPTS),
        CREATE_LOGIN_ATTEMPTS.trim(),
    )])
}

fn plan_login_mfa_codes(catalog: &dyn Catalog) -> PhasePlan {
    // user_id references users(id)
    if !catalog.table_exists(USERS) {
        return PhasePlan::Skip("users table does not exist");
    }
    if catalog.table_exists(LOGIN_MFA_CODES) {
        return PhasePlan::Run(Vec::new());
    }
    PhasePlan::Run(vec![Step::ddl(
        format!("create table {}", LOGIN_MFA_CODES),
        CREATE_LOGIN_MFA_CODES.trim(),
    )])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{ColumnInfo, SchemaSnapshot};

    fn descriptions(plan: &PhasePlan) -> Vec<&str> {
        plan.steps().iter().map(|s| s.description.as_str()).collect()
    }

    fn legacy_documents() -> SchemaSnapshot {
        SchemaSnapshot::default().with_table(
            "documents",
            &["id", "resident_id", "issue_date", "file_path"],
        )
    }

    #[test]
    fn test_phase_names_round_trip() {
        for phase in PhaseId::ALL {
            assert_eq!(phase.name().parse::<PhaseId>(), Ok(phase));
        }
        assert!("nope".parse::<PhaseId>().is_err());
    }

    #[test]
    fn test_legacy_document_types_phase_name() {
        assert_eq!(
            "legacy_document_types".parse::<PhaseId>(),
            Ok(PhaseId::LegacyDocumentTypes)
        );
    }

    #[test]
    fn test_phase_tables_cover_their_guards() {
        assert_eq!(PhaseId::LoginAttempts.tables(), &["login_attempts"]);
        assert!(!PhaseId::LoginAttempts.tables().contains(&"residents"));
        assert!(PhaseId::LoginMfaCodes.tables().contains(&"users"));
        assert!(PhaseId::TransactionLogsUserFk.tables().contains(&"users"));
        assert!(PhaseId::LegacyDocumentTypes.tables().contains(&"document_types"));
        for phase in PhaseId::ALL {
            assert!(!phase.tables().is_empty(), "{} reads no tables", phase);
        }
    }

    #[test]
    fn test_empty_database_only_creates_login_attempts() {
        let catalog = SchemaSnapshot::default();
        let mut created = Vec::new();

        for phase in PhaseId::ALL {
            match phase.plan(&catalog) {
                PhasePlan::Skip(_) => {}
                PhasePlan::Run(steps) => created.extend(steps.into_iter().map(|s| s.description)),
            }
        }

        assert_eq!(created, vec!["create table login_attempts"]);
    }

    #[test]
    fn test_mfa_codes_need_users() {
        let without_users = SchemaSnapshot::default();
        assert_eq!(
            PhaseId::LoginMfaCodes.plan(&without_users),
            PhasePlan::Skip("users table does not exist")
        );

        let with_users = SchemaSnapshot::default().with_table("users", &["id", "username"]);
        assert_eq!(
            descriptions(&PhaseId::LoginMfaCodes.plan(&with_users)),
            vec!["create table login_mfa_codes"]
        );
    }

    #[test]
    fn test_existing_tables_are_left_alone() {
        let catalog = SchemaSnapshot::default()
            .with_table("users", &["id"])
            .with_table("login_attempts", &["id"])
            .with_table("login_mfa_codes", &["id"]);
        assert_eq!(PhaseId::LoginAttempts.plan(&catalog), PhasePlan::Run(vec![]));
        assert_eq!(PhaseId::LoginMfaCodes.plan(&catalog), PhasePlan::Run(vec![]));
    }

    #[test]
    fn test_missing_table_is_skipped() {
        let catalog = SchemaSnapshot::default();
        assert_eq!(PhaseId::Residents.plan(&catalog), PhasePlan::Skip(TABLE_ABSENT));
        assert_eq!(PhaseId::Documents.plan(&catalog), PhasePlan::Skip(TABLE_ABSENT));
    }

    #[test]
    fn test_only_missing_columns_are_added() {
        let catalog = SchemaSnapshot::default().with_table(
            "document_types",
            &["id", "name", "description"],
        );
        assert_eq!(
            descriptions(&PhaseId::DocumentTypes.plan(&catalog)),
            vec!["add document_types.template_path", "add document_types.requires_photo"]
        );
    }

    #[test]
    fn test_legacy_documents_plan_order() {
        let plan = PhaseId::Documents.plan(&legacy_documents());
        let steps = descriptions(&plan);

        let status = steps.iter().position(|s| *s == "add documents.status").unwrap();
        let draft = steps
            .iter()
            .position(|s| *s == "set default documents.status")
            .unwrap();
        let created = steps
            .iter()
            .position(|s| *s == "backfill documents.created_at")
            .unwrap();
        let issued = steps
            .iter()
            .position(|s| *s == "backfill documents.issued_at")
            .unwrap();
        let index = steps
            .iter()
            .position(|s| *s == "create index ix_documents_issue_date")
            .unwrap();

        assert!(status < draft);
        assert!(draft < created);
        assert!(created < issued);
        assert!(issued < index);
    }

    #[test]
    fn test_up_to_date_documents_only_rerun_backfills() {
        let mut catalog = legacy_documents();
        for column in DOCUMENTS_TABLE.columns {
            catalog = catalog.with_table("documents", &[column.name]);
        }
        for index in DOCUMENTS_TABLE.indexes {
            catalog = catalog.with_index(index.name);
        }

        let plan = PhaseId::Documents.plan(&catalog);
        assert!(plan.steps().iter().all(|s| s.kind == StepKind::Backfill));
        assert_eq!(plan.steps().len(), 3);
    }

    #[test]
    fn test_resident_index_requires_column() {
        let catalog = SchemaSnapshot::default().with_table("residents", &["id", "last_name"]);
        let steps = descriptions(&PhaseId::Residents.plan(&catalog)).join(",");
        assert!(steps.contains("create index ix_residents_last_name"));
        assert!(!steps.contains("ix_residents_barangay_id"));
    }

    #[test]
    fn test_transaction_log_user_becomes_nullable() {
        let catalog = SchemaSnapshot::default()
            .with_table("transaction_logs", &["id", "action"])
            .with_column(
                "transaction_logs",
                "user_id",
                ColumnInfo {
                    nullable: false,
                    has_default: false,
                },
            );
        let plan = PhaseId::TransactionLogs.plan(&catalog);
        let steps = descriptions(&plan);
        assert_eq!(steps.last(), Some(&"drop not null transaction_logs.user_id"));
    }

    #[test]
    fn test_user_fk_rewritten_unless_set_null() {
        let base = SchemaSnapshot::default()
            .with_table("users", &["id"])
            .with_table("transaction_logs", &["id", "user_id"]);

        let restrict = base.clone().with_foreign_key(
            TRANSACTION_LOGS_USER_FK,
            "transaction_logs",
            OnDelete::NoAction,
        );
        assert_eq!(PhaseId::TransactionLogsUserFk.plan(&restrict).steps().len(), 2);

        let set_null = base.with_foreign_key(
            TRANSACTION_LOGS_USER_FK,
            "transaction_logs",
            OnDelete::SetNull,
        );
        assert_eq!(
            PhaseId::TransactionLogsUserFk.plan(&set_null),
            PhasePlan::Run(vec![])
        );
    }

    #[test]
    fn test_legacy_document_types_use_inline_column() {
        let catalog = legacy_documents()
            .with_table("documents", &["doc_type", "document_type_id"])
            .with_table("document_types", &["id", "name"]);

        let plan = PhaseId::LegacyDocumentTypes.plan(&catalog);
        let steps = descriptions(&plan);
        assert_eq!(steps[0], "register legacy document types");
        assert!(steps.contains(&"set not null documents.document_type_id"));
        assert!(steps.contains(&"add documents_document_type_id_fkey"));
    }

    #[test]
    fn test_legacy_document_types_wait_for_column() {
        let catalog = legacy_documents().with_table("document_types", &["id", "name"]);
        assert_eq!(
            PhaseId::LegacyDocumentTypes.plan(&catalog),
            PhasePlan::Skip("documents.document_type_id does not exist")
        );
    }
}
