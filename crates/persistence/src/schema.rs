//! Target schema of the records database.
//!
//! Lists, per table, the columns and indexes that older deployments may be
//! missing. Every entry is additive: healing never drops or renames.

use std::fmt;

pub const RESIDENTS: &str = "residents";
pub const DOCUMENT_TYPES: &str = "document_types";
pub const DOCUMENTS: &str = "documents";
pub const USERS: &str = "users";
pub const TRANSACTION_LOGS: &str = "transaction_logs";
pub const LOGIN_ATTEMPTS: &str = "login_attempts";
pub const LOGIN_MFA_CODES: &str = "login_mfa_codes";

/// Every table the healer knows about.
pub const TARGET_TABLES: [&str; 7] = [
    RESIDENTS,
    DOCUMENT_TYPES,
    USERS,
    TRANSACTION_LOGS,
    DOCUMENTS,
    LOGIN_ATTEMPTS,
    LOGIN_MFA_CODES,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Varchar(u16),
    Integer,
    Boolean,
    Timestamp,
    Jsonb,
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnType::Varchar(len) => write!(f, "VARCHAR({})", len),
            ColumnType::Integer => f.write_str("INTEGER"),
            ColumnType::Boolean => f.write_str("BOOLEAN"),
            ColumnType::Timestamp => f.write_str("TIMESTAMP WITHOUT TIME ZONE"),
            ColumnType::Jsonb => f.write_str("JSONB"),
        }
    }
}

/// A column that may have to be added to an existing table.
///
/// `fill` is what rows already in the table get when the column is added;
/// `default` is what rows inserted later get. They differ for columns whose
/// meaning for legacy rows is not the meaning for new ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnSpec {
    pub name: &'static str,
    pub ty: ColumnType,
    pub not_null: bool,
    pub fill: Option<&'static str>,
    pub default: Option<&'static str>,
}

impl ColumnSpec {
    pub const fn nullable(name: &'static str, ty: ColumnType) -> Self {
        Self {
            name,
            ty,
            not_null: false,
            fill: None,
            default: None,
        }
    }

    /// `BOOLEAN NOT NULL DEFAULT FALSE`.
    pub const fn flag(name: &'static str) -> Self {
        Self {
            name,
            ty: ColumnType::Boolean,
            not_null: true,
            fill: Some("FALSE"),
            default: Some("FALSE"),
        }
    }

    /// NOT NULL column: existing rows receive `fill`, new rows `default`.
    pub const fn required(
        name: &'static str,
        ty: ColumnType,
        fill: &'static str,
        default: &'static str,
    ) -> Self {
        Self {
            name,
            ty,
            not_null: true,
            fill: Some(fill),
            default: Some(default),
        }
    }

    pub const fn with_default(mut self, default: &'static str) -> Self {
        self.default = Some(default);
        self
    }

    /// Statements that add this column to `table`, in execution order.
    ///
    /// The fill is supplied as the add-time default so existing rows are
    /// populated by the same statement that creates the column.
    pub fn add_statements(&self, table: &str) -> Vec<String> {
        let mut add = format!(
            "ALTER TABLE {} ADD COLUMN IF NOT EXISTS {} {}",
            table, self.name, self.ty
        );
        if self.not_null {
            add.push_str(" NOT NULL");
        }
        if let Some(fill) = self.fill {
            add.push_str(" DEFAULT ");
            add.push_str(fill);
        }

        let mut statements = vec![add];
        if self.default != self.fill {
            statements.push(match self.default {
                Some(default) => format!(
                    "ALTER TABLE {} ALTER COLUMN {} SET DEFAULT {}",
                    table, self.name, default
                ),
                None => format!("ALTER TABLE {} ALTER COLUMN {} DROP DEFAULT", table, self.name),
            });
        }
        statements
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexSpec {
    pub name: &'static str,
    pub column: &'static str,
}

impl IndexSpec {
    pub const fn new(name: &'static str, column: &'static str) -> Self {
        Self { name, column }
    }

    pub fn create_statement(&self, table: &str) -> String {
        format!(
            "CREATE INDEX IF NOT EXISTS {} ON {} ({})",
            self.name, table, self.column
        )
    }
}

/// Additive target for one existing table.
#[derive(Debug, Clone, Copy)]
pub struct TableSpec {
    pub name: &'static str,
    pub columns: &'static [ColumnSpec],
    pub indexes: &'static [IndexSpec],
}

impl TableSpec {
    pub fn column(&self, name: &str) -> Option<&ColumnSpec> {
        self.columns.iter().find(|c| c.name == name)
    }
}

use ColumnType::{Integer, Jsonb, Timestamp, Varchar};

pub const RESIDENTS_TABLE: TableSpec = TableSpec {
    name: RESIDENTS,
    columns: &[
        ColumnSpec::nullable("middle_name", Varchar(100)),
        ColumnSpec::nullable("marital_status", Varchar(50)),
        ColumnSpec::nullable("photo_path", Varchar(255)),
        ColumnSpec::nullable("created_by_id", Integer),
        ColumnSpec::nullable("updated_by_id", Integer),
        ColumnSpec::nullable("updated_at", Timestamp),
        ColumnSpec::flag("is_archived"),
        ColumnSpec::nullable("archived_at", Timestamp),
        ColumnSpec::nullable("archived_by_id", Integer),
    ],
    indexes: &[
        IndexSpec::new("ix_residents_last_name", "last_name"),
        IndexSpec::new("ix_residents_barangay_id", "barangay_id"),
    ],
};

pub const DOCUMENT_TYPES_TABLE: TableSpec = TableSpec {
    name: DOCUMENT_TYPES,
    columns: &[
        ColumnSpec::nullable("description", Varchar(255)),
        ColumnSpec::nullable("template_path", Varchar(255)),
        ColumnSpec::flag("requires_photo"),
    ],
    indexes: &[],
};

pub const USERS_TABLE: TableSpec = TableSpec {
    name: USERS,
    columns: &[
        ColumnSpec::nullable("email", Varchar(255)),
        ColumnSpec::required("role", Varchar(50), "'clerk'", "'clerk'"),
        ColumnSpec::nullable("password_hash", Varchar(255)),
    ],
    indexes: &[],
};

pub const TRANSACTION_LOGS_TABLE: TableSpec = TableSpec {
    name: TRANSACTION_LOGS,
    columns: &[
        ColumnSpec::nullable("entity_type", Varchar(50)),
        ColumnSpec::nullable("entity_id", Integer),
        ColumnSpec::nullable("ip_address", Varchar(64)),
        ColumnSpec::nullable("user_agent", Varchar(255)),
        ColumnSpec::nullable("meta", Jsonb),
    ],
    indexes: &[],
};

pub const DOCUMENTS_TABLE: TableSpec = TableSpec {
    name: DOCUMENTS,
    columns: &[
        ColumnSpec::nullable("document_type_id", Integer),
        // rows that predate the lifecycle were issued on creation
        ColumnSpec::required("status", Varchar(20), "'issued'", "'draft'"),
        // left NULL for existing rows so the backfill can copy issue_date
        ColumnSpec::nullable("created_at", Timestamp).with_default("NOW()"),
        ColumnSpec::nullable("updated_at", Timestamp),
        ColumnSpec::nullable("approved_at", Timestamp),
        ColumnSpec::nullable("issued_at", Timestamp),
        ColumnSpec::flag("is_archived"),
        ColumnSpec::nullable("archived_at", Timestamp),
        ColumnSpec::nullable("created_by_id", Integer),
        ColumnSpec::nullable("updated_by_id", Integer),
        ColumnSpec::nullable("approved_by_id", Integer),
        ColumnSpec::nullable("issued_by_id", Integer),
        ColumnSpec::nullable("archived_by_id", Integer),
    ],
    indexes: &[
        IndexSpec::new("ix_documents_issue_date", "issue_date"),
        IndexSpec::new("ix_documents_resident_id", "resident_id"),
        IndexSpec::new("ix_documents_document_type_id", "document_type_id"),
    ],
};

pub const CREATE_LOGIN_ATTEMPTS: &str = r#"
CREATE TABLE IF NOT EXISTS login_attempts (
    id SERIAL PRIMARY KEY,
    username VARCHAR(150),
    ip_address VARCHAR(64),
    success BOOLEAN NOT NULL DEFAULT FALSE,
    created_at TIMESTAMP WITHOUT TIME ZONE DEFAULT NOW() NOT NULL
)
"#;

pub const CREATE_LOGIN_MFA_CODES: &str = r#"
CREATE TABLE IF NOT EXISTS login_mfa_codes (
    id SERIAL PRIMARY KEY,
    user_id INTEGER NOT NULL REFERENCES users(id),
    otp_code VARCHAR(20) NOT NULL,
    expires_at TIMESTAMP WITHOUT TIME ZONE NOT NULL,
    used BOOLEAN NOT NULL DEFAULT FALSE,
    created_at TIMESTAMP WITHOUT TIME ZONE DEFAULT NOW() NOT NULL
)
"#;
