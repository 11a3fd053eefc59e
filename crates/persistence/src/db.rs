//! Database connection pool management.

use sqlx::postgres::PgPoolOptions;
use sqlx::{Executor, PgPool};
use std::time::Duration;

/// Database configuration.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout_secs: u64,
    pub idle_timeout_secs: u64,
    /// Schema to operate on instead of the connection default (`public`).
    pub schema: Option<String>,
}

/// Creates a PostgreSQL connection pool with the given configuration.
///
/// When a schema is configured every pooled connection gets its
/// `search_path` pinned to it, so catalog introspection through
/// `current_schema()` only sees that schema.
pub async fn create_pool(config: &DatabaseConfig) -> Result<PgPool, sqlx::Error> {
    let search_path = config.schema.as_deref().map(search_path_statement);

    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
        .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
        .after_connect(move |conn, _meta| {
            let search_path = search_path.clone();
            Box::pin(async move {
                if let Some(statement) = search_path {
                    conn.execute(statement.as_str()).await?;
                }
                Ok(())
            })
        })
        .connect(&config.url)
        .await
}

fn search_path_statement(schema: &str) -> String {
    format!("SET search_path TO {}", quote_ident(schema))
}

/// Quotes an identifier for interpolation into DDL.
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident("records"), "\"records\"");
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
    }

    #[test]
    fn test_search_path_statement() {
        assert_eq!(
            search_path_statement("heal_test_1"),
            "SET search_path TO \"heal_test_1\""
        );
    }
}
