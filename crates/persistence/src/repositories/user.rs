//! Repository for staff accounts.

use domain::models::UserRole;
use sqlx::PgPool;

use crate::metrics::QueryTimer;

/// Input for creating a staff account.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: UserRole,
}

/// Repository for user operations needed by the operator tooling.
#[derive(Debug, Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    /// Create a new repository instance.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Count all accounts.
    pub async fn count(&self) -> Result<i64, sqlx::Error> {
        let timer = QueryTimer::new("count_users");
        let result = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await;
        timer.record();
        result
    }

    /// Insert the first account, but only while the table is still empty.
    ///
    /// Returns `None` when another account already exists.
    pub async fn create_if_empty(&self, user: &NewUser) -> Result<Option<i32>, sqlx::Error> {
        let timer = QueryTimer::new("create_first_user");
        let result = sqlx::query_scalar::<_, i32>(
            r#"
            INSERT INTO users (username, email, password_hash, role)
            SELECT $1, $2, $3, $4
            WHERE NOT EXISTS (SELECT 1 FROM users)
            RETURNING id
            "#,
        )
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }
}
