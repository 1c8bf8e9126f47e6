//! PostgreSQL subscription event log

use async_trait::async_trait;
use sqlx::PgPool;

use crate::error::DbResult;
use crate::repo::{CreateSubscriptionEvent, SubscriptionEventRepository};

/// PostgreSQL subscription event repository
#[derive(Clone)]
pub struct PgSubscriptionEventRepository {
    pool: PgPool,
}

impl PgSubscriptionEventRepository {
    /// Create a new subscription event repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SubscriptionEventRepository for PgSubscriptionEventRepository {
    async fn exists(&self, stripe_event_id: &str) -> DbResult<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM subscription_events WHERE stripe_event_id = $1)",
        )
        .bind(stripe_event_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn record(&self, event: CreateSubscriptionEvent) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO subscription_events (id, user_id, event_type, stripe_event_id, event_data)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (stripe_event_id) DO NOTHING
            "#,
        )
        .bind(event.id)
        .bind(event.user_id)
        .bind(&event.event_type)
        .bind(&event.stripe_event_id)
        .bind(&event.event_data)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
