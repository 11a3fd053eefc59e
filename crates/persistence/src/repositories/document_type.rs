//! Repository for document type reference data.

use domain::models::DocumentTypeSeed;
use sqlx::PgPool;

use crate::metrics::QueryTimer;

/// What seeding did with one document type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedResult {
    Inserted,
    Updated,
}

/// Repository for document type operations.
#[derive(Debug, Clone)]
pub struct DocumentTypeRepository {
    pool: PgPool,
}

impl DocumentTypeRepository {
    /// Create a new repository instance.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert or refresh a built-in document type.
    ///
    /// A description customised by the barangay is kept; the template and
    /// photo requirement always follow the built-in definition.
    pub async fn upsert_seed(&self, seed: &DocumentTypeSeed) -> Result<SeedResult, sqlx::Error> {
        let timer = QueryTimer::new("upsert_document_type_seed");
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            r#"
            UPDATE document_types
            SET description = COALESCE(NULLIF(description, ''), $2),
                requires_photo = $3,
                template_path = $4
            WHERE name = $1
            "#,
        )
        .bind(seed.name)
        .bind(seed.description)
        .bind(seed.requires_photo)
        .bind(seed.template_path)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        let result = if updated > 0 {
            SeedResult::Updated
        } else {
            sqlx::query(
                r#"
                INSERT INTO document_types (name, description, requires_photo, template_path)
                VALUES ($1, $2, $3, $4)
                "#,
            )
            .bind(seed.name)
            .bind(seed.description)
            .bind(seed.requires_photo)
            .bind(seed.template_path)
            .execute(&mut *tx)
            .await?;
            SeedResult::Inserted
        };

        tx.commit().await?;
        timer.record();
        Ok(result)
    }
}
