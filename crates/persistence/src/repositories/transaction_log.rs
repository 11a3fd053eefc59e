//! Repository for the immutable audit trail.

use chrono::Utc;
use domain::services::TransactionLogEntry;
use sqlx::PgConnection;

use crate::metrics::QueryTimer;

/// Writes to the transaction log. Entries are appended inside the
/// transaction of the change they describe.
pub struct TransactionLogRepository;

impl TransactionLogRepository {
    /// Append an entry on an existing connection or transaction, returning
    /// its id.
    pub async fn insert_with(
        conn: &mut PgConnection,
        entry: &TransactionLogEntry,
    ) -> Result<i32, sqlx::Error> {
        let timer = QueryTimer::new("insert_transaction_log");
        let result = sqlx::query_scalar::<_, i32>(
            r#"
            INSERT INTO transaction_logs (user_id, action, entity_type, entity_id, meta, timestamp)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            "#,
        )
        .bind(entry.user_id)
        .bind(&entry.action)
        .bind(&entry.entity_type)
        .bind(entry.entity_id)
        .bind(&entry.meta)
        .bind(Utc::now().naive_utc())
        .fetch_one(conn)
        .await;
        timer.record();
        result
    }
}
