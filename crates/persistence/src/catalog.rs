//! Catalog introspection.
//!
//! Healing decisions only ever ask the catalog yes/no questions, so they are
//! made against the [`Catalog`] trait. [`SchemaSnapshot`] is the in-memory
//! implementation: loaded from `pg_catalog` for a live database, or built by
//! hand in tests.

use sqlx::PgConnection;
use std::collections::{BTreeMap, BTreeSet};

/// Read-only view of the current schema.
pub trait Catalog {
    fn table_exists(&self, table: &str) -> bool;

    fn column_exists(&self, table: &str, column: &str) -> bool;

    /// `None` when the column does not exist.
    fn column_is_nullable(&self, table: &str, column: &str) -> Option<bool>;

    /// Whether the column carries any server-side default.
    fn column_has_default(&self, table: &str, column: &str) -> bool;

    fn constraint(&self, name: &str) -> Option<&ConstraintInfo>;

    fn constraint_exists(&self, name: &str) -> bool {
        self.constraint(name).is_some()
    }

    fn index_exists(&self, name: &str) -> bool;
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ColumnInfo {
    pub nullable: bool,
    pub has_default: bool,
}

/// Foreign key `ON DELETE` behaviour as stored in `pg_constraint.confdeltype`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnDelete {
    NoAction,
    Restrict,
    Cascade,
    SetNull,
    SetDefault,
}

impl OnDelete {
    fn from_code(code: &str) -> Option<Self> {
        match code {
            "a" => Some(OnDelete::NoAction),
            "r" => Some(OnDelete::Restrict),
            "c" => Some(OnDelete::Cascade),
            "n" => Some(OnDelete::SetNull),
            "d" => Some(OnDelete::SetDefault),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstraintInfo {
    pub table: String,
    /// Only set for foreign keys.
    pub on_delete: Option<OnDelete>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaSnapshot {
    tables: BTreeMap<String, BTreeMap<String, ColumnInfo>>,
    constraints: BTreeMap<String, ConstraintInfo>,
    indexes: BTreeSet<String>,
}

impl SchemaSnapshot {
    /// Reads the named tables of `current_schema()` with their columns,
    /// constraints and indexes. Other tables are not looked at.
    ///
    /// Reads `pg_catalog` directly: `information_schema.columns` deparses
    /// defaults, which waits on a lock held on any table in the schema.
    /// Run it on the connection that will execute the resulting plan so the
    /// snapshot sees the same transaction state.
    pub async fn load(conn: &mut PgConnection, tables: &[&str]) -> Result<Self, sqlx::Error> {
        let mut snapshot = SchemaSnapshot::default();
        let names: Vec<String> = tables.iter().map(|t| t.to_string()).collect();

        let columns: Vec<(String, Option<String>, bool, bool)> = sqlx::query_as(
            r#"
            SELECT
                t.relname::text,
                a.attname::text,
                NOT COALESCE(a.attnotnull, FALSE) AS nullable,
                COALESCE(a.atthasdef, FALSE) AS has_default
            FROM pg_class t
            JOIN pg_namespace n ON n.oid = t.relnamespace
            LEFT JOIN pg_attribute a
              ON a.attrelid = t.oid AND a.attnum > 0 AND NOT a.attisdropped
            WHERE n.nspname = current_schema()
              AND t.relkind IN ('r', 'p')
              AND t.relname::text = ANY($1)
            "#,
        )
        .bind(&names)
        .fetch_all(&mut *conn)
        .await?;

        for (table, column, nullable, has_default) in columns {
            let cols = snapshot.tables.entry(table).or_default();
            // a table without columns still exists
            if let Some(column) = column {
                cols.insert(
                    column,
                    ColumnInfo {
                        nullable,
                        has_default,
                    },
                );
            }
        }

        let constraints: Vec<(String, String, String)> = sqlx::query_as(
            r#"
            SELECT c.conname::text, t.relname::text, c.confdeltype::text
            FROM pg_constraint c
            JOIN pg_class t ON t.oid = c.conrelid
            JOIN pg_namespace n ON n.oid = t.relnamespace
            WHERE n.nspname = current_schema()
              AND t.relname::text = ANY($1)
            "#,
        )
        .bind(&names)
        .fetch_all(&mut *conn)
        .await?;

        for (name, table, on_delete) in constraints {
            snapshot.constraints.insert(
                name,
                ConstraintInfo {
                    table,
                    on_delete: OnDelete::from_code(on_delete.trim()),
                },
            );
        }

        let indexes: Vec<(String,)> = sqlx::query_as(
            r#"
            SELECT i.relname::text
            FROM pg_index x
            JOIN pg_class i ON i.oid = x.indexrelid
            JOIN pg_class t ON t.oid = x.indrelid
            JOIN pg_namespace n ON n.oid = t.relnamespace
            WHERE n.nspname = current_schema()
              AND t.relname::text = ANY($1)
            "#,
        )
        .bind(&names)
        .fetch_all(&mut *conn)
        .await?;

        snapshot.indexes = indexes.into_iter().map(|(name,)| name).collect();

        Ok(snapshot)
    }

    /// Adds a table with nullable, default-less columns.
    pub fn with_table(mut self, table: &str, columns: &[&str]) -> Self {
        let cols = self.tables.entry(table.to_string()).or_default();
        for column in columns {
            cols.insert(
                column.to_string(),
                ColumnInfo {
                    nullable: true,
                    has_default: false,
                },
            );
        }
        self
    }

    pub fn with_column(mut self, table: &str, column: &str, info: ColumnInfo) -> Self {
        self.tables
            .entry(table.to_string())
            .or_default()
            .insert(column.to_string(), info);
        self
    }

    pub fn with_foreign_key(mut self, name: &str, table: &str, on_delete: OnDelete) -> Self {
        self.constraints.insert(
            name.to_string(),
            ConstraintInfo {
                table: table.to_string(),
                on_delete: Some(on_delete),
            },
        );
        self
    }

    pub fn with_index(mut self, name: &str) -> Self {
        self.indexes.insert(name.to_string());
        self
    }

    fn column(&self, table: &str, column: &str) -> Option<&ColumnInfo> {
        self.tables.get(table).and_then(|cols| cols.get(column))
    }
}

impl Catalog for SchemaSnapshot {
    fn table_exists(&self, table: &str) -> bool {
        self.tables.contains_key(table)
    }

    fn column_exists(&self, table: &str, column: &str) -> bool {
        self.column(table, column).is_some()
    }

    fn column_is_nullable(&self, table: &str, column: &str) -> Option<bool> {
        self.column(table, column).map(|c| c.nullable)
    }

    fn column_has_default(&self, table: &str, column: &str) -> bool {
        self.column(table, column)
            .map(|c| c.has_default)
            .unwrap_or(false)
    }

    fn constraint(&self, name: &str) -> Option<&ConstraintInfo> {
        self.constraints.get(name)
    }

    fn index_exists(&self, name: &str) -> bool {
        self.indexes.contains(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_snapshot_has_nothing() {
        let snapshot = SchemaSnapshot::default();
        assert!(!snapshot.table_exists("documents"));
        assert!(!snapshot.column_exists("documents", "id"));
        assert_eq!(snapshot.column_is_nullable("documents", "id"), None);
        assert!(!snapshot.constraint_exists("documents_pkey"));
    }

    #[test]
    fn test_with_table_registers_columns() {
        let snapshot = SchemaSnapshot::default().with_table("residents", &["id", "last_name"]);
        assert!(snapshot.table_exists("residents"));
        assert!(snapshot.column_exists("residents", "last_name"));
        assert!(!snapshot.column_exists("residents", "photo_path"));
        assert_eq!(snapshot.column_is_nullable("residents", "id"), Some(true));
    }

    #[test]
    fn test_column_flags() {
        let snapshot = SchemaSnapshot::default().with_column(
            "transaction_logs",
            "user_id",
            ColumnInfo {
                nullable: false,
                has_default: true,
            },
        );
        assert_eq!(
            snapshot.column_is_nullable("transaction_logs", "user_id"),
            Some(false)
        );
        assert!(snapshot.column_has_default("transaction_logs", "user_id"));
    }

    #[test]
    fn test_foreign_key_lookup() {
        let snapshot = SchemaSnapshot::default().with_foreign_key(
            "transaction_logs_user_id_fkey",
            "transaction_logs",
            OnDelete::NoAction,
        );
        let fk = snapshot.constraint("transaction_logs_user_id_fkey").unwrap();
        assert_eq!(fk.table, "transaction_logs");
        assert_eq!(fk.on_delete, Some(OnDelete::NoAction));
    }

    #[test]
    fn test_on_delete_codes() {
        assert_eq!(OnDelete::from_code("n"), Some(OnDelete::SetNull));
        assert_eq!(OnDelete::from_code("c"), Some(OnDelete::Cascade));
        // non-FK constraints carry a blank code
        assert_eq!(OnDelete::from_code(""), None);
    }
}
