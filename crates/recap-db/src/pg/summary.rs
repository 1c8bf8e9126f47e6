//! PostgreSQL summary repository implementation

use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::models::SummaryRow;
use crate::repo::{CreateSummary, SummaryRepository};

/// PostgreSQL summary repository
#[derive(Clone)]
pub struct PgSummaryRepository {
    pool: PgPool,
}

impl PgSummaryRepository {
    /// Create a new summary repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SummaryRepository for PgSummaryRepository {
    async fn find_by_id(&self, id: Uuid) -> DbResult<Option<SummaryRow>> {
        let summary = sqlx::query_as::<_, SummaryRow>(
            r#"
            SELECT id, user_id, context, text, created_at, updated_at
            FROM summaries
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(summary)
    }

    async fn find_by_user_id(&self, user_id: Uuid, limit: i64) -> DbResult<Vec<SummaryRow>> {
        let summaries = sqlx::query_as::<_, SummaryRow>(
            r#"
            SELECT id, user_id, context, text, created_at, updated_at
            FROM summaries
            WHERE user_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(summaries)
    }

    async fn create(&self, summary: CreateSummary) -> DbResult<SummaryRow> {
        let row = sqlx::query_as::<_, SummaryRow>(
            r#"
            INSERT INTO summaries (id, user_id, context, text)
            VALUES ($1, $2, $3, $4)
            RETURNING id, user_id, context, text, created_at, updated_at
            "#,
        )
        .bind(summary.id)
        .bind(summary.user_id)
        .bind(Json(&summary.context))
        .bind(&summary.text)
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    async fn update_text(&self, id: Uuid, text: &str) -> DbResult<SummaryRow> {
        let row = sqlx::query_as::<_, SummaryRow>(
            r#"
            UPDATE summaries
            SET text = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING id, user_id, context, text, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(text)
        .fetch_optional(&self.pool)
        .await?;

        row.ok_or(DbError::NotFound)
    }

    async fn delete(&self, id: Uuid) -> DbResult<bool> {
        // Messages go with it through ON DELETE CASCADE
        let result = sqlx::query("DELETE FROM summaries WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
