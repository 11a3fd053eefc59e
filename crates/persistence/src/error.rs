//! Error types for schema healing.

use thiserror::Error;

/// SQLSTATE codes worth retrying a whole phase for.
const LOCK_NOT_AVAILABLE: &str = "55P03";
const DEADLOCK_DETECTED: &str = "40P01";
const SERIALIZATION_FAILURE: &str = "40001";

#[derive(Debug, Error)]
pub enum HealError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("{step} failed: {source}")]
    Statement {
        step: String,
        #[source]
        source: sqlx::Error,
    },
}

impl HealError {
    pub fn statement(step: impl Into<String>, source: sqlx::Error) -> Self {
        Self::Statement {
            step: step.into(),
            source,
        }
    }

    fn sqlx_error(&self) -> &sqlx::Error {
        match self {
            HealError::Database(e) => e,
            HealError::Statement { source, .. } => source,
        }
    }

    /// SQLSTATE reported by the server, if any.
    pub fn code(&self) -> Option<String> {
        match self.sqlx_error() {
            sqlx::Error::Database(db) => db.code().map(|c| c.into_owned()),
            _ => None,
        }
    }

    /// Lock timeouts, deadlocks and serialization failures leave nothing
    /// behind once the transaction rolls back, so the phase can run again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.code().as_deref(),
            Some(LOCK_NOT_AVAILABLE | DEADLOCK_DETECTED | SERIALIZATION_FAILURE)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_database_errors_are_not_retryable() {
        let err = HealError::from(sqlx::Error::RowNotFound);
        assert_eq!(err.code(), None);
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_statement_error_display_names_step() {
        let err = HealError::statement("add documents.status", sqlx::Error::PoolTimedOut);
        let message = err.to_string();
        assert!(message.starts_with("add documents.status failed"));
    }
}
