//! Issued document entities.

use chrono::NaiveDate;
use sqlx::FromRow;

/// An issued document considered by the expiry purge.
#[derive(Debug, Clone, FromRow)]
pub struct ExpiryCandidateEntity {
    pub id: i32,
    /// Calendar date of issuance; legacy rows store a timestamp.
    pub issue_date: NaiveDate,
    pub is_archived: bool,
}
