//! PostgreSQL message repository implementation

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::DbResult;
use crate::models::MessageRow;
use crate::repo::{MessageRepository, UpsertMessage};

/// PostgreSQL message repository
#[derive(Clone)]
pub struct PgMessageRepository {
    pool: PgPool,
}

impl PgMessageRepository {
    /// Create a new message repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MessageRepository for PgMessageRepository {
    async fn upsert(&self, message: UpsertMessage) -> DbResult<MessageRow> {
        let row = sqlx::query_as::<_, MessageRow>(
            r#"
            INSERT INTO messages (id, summary_id, channel, text)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (summary_id, channel)
            DO UPDATE SET text = EXCLUDED.text, updated_at = NOW()
            RETURNING id, summary_id, channel, text, created_at, updated_at
            "#,
        )
        .bind(message.id)
        .bind(message.summary_id)
        .bind(&message.channel)
        .bind(&message.text)
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    async fn find_by_summary_id(&self, summary_id: Uuid) -> DbResult<Vec<MessageRow>> {
        let messages = sqlx::query_as::<_, MessageRow>(
            r#"
            SELECT id, summary_id, channel, text, created_at, updated_at
            FROM messages
            WHERE summary_id = $1
            ORDER BY created_at
            "#,
        )
        .bind(summary_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(messages)
    }

    async fn find_by_id(&self, id: Uuid) -> DbResult<Option<MessageRow>> {
        let message = sqlx::query_as::<_, MessageRow>(
            r#"
            SELECT id, summary_id, channel, text, created_at, updated_at
            FROM messages
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(message)
    }

    async fn delete(&self, id: Uuid) -> DbResult<bool> {
        let result = sqlx::query("DELETE FROM messages WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_by_summary_id(&self, summary_id: Uuid) -> DbResult<u64> {
        let result = sqlx::query("DELETE FROM messages WHERE summary_id = $1")
            .bind(summary_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}
