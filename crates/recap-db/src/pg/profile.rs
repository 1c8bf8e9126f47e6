//! PostgreSQL profile repository implementation

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::models::ProfileRow;
use crate::repo::{BillingUpdate, CreateProfile, ProfileRepository};

const PROFILE_COLUMNS: &str = "id, email, stripe_customer_id, subscription_plan, \
     subscription_status, summaries_used_this_period, period_start, \
     subscription_current_period_end, created_at, updated_at";

/// PostgreSQL profile repository
#[derive(Clone)]
pub struct PgProfileRepository {
    pool: PgPool,
}

impl PgProfileRepository {
    /// Create a new profile repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProfileRepository for PgProfileRepository {
    async fn find_by_id(&self, id: Uuid) -> DbResult<Option<ProfileRow>> {
        let profile = sqlx::query_as::<_, ProfileRow>(&format!(
            "SELECT {PROFILE_COLUMNS} FROM profiles WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(profile)
    }

    async fn find_by_stripe_customer_id(
        &self,
        customer_id: &str,
    ) -> DbResult<Option<ProfileRow>> {
        let profile = sqlx::query_as::<_, ProfileRow>(&format!(
            "SELECT {PROFILE_COLUMNS} FROM profiles WHERE stripe_customer_id = $1"
        ))
        .bind(customer_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(profile)
    }

    async fn create(&self, profile: CreateProfile) -> DbResult<ProfileRow> {
        // No-op update so RETURNING yields the existing row on conflict
        let row = sqlx::query_as::<_, ProfileRow>(&format!(
            r#"
            INSERT INTO profiles (id, email, subscription_plan, subscription_status,
                                  summaries_used_this_period, period_start)
            VALUES ($1, $2, 'free', 'free', 0, $3)
            ON CONFLICT (id) DO UPDATE SET email = COALESCE(profiles.email, EXCLUDED.email)
            RETURNING {PROFILE_COLUMNS}
            "#
        ))
        .bind(profile.id)
        .bind(&profile.email)
        .bind(profile.period_start)
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    async fn update_stripe_customer_id(&self, id: Uuid, customer_id: &str) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE profiles
            SET stripe_customer_id = $2, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(customer_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound);
        }

        Ok(())
    }

    async fn reset_period(
        &self,
        id: Uuid,
        observed_start: Option<DateTime<Utc>>,
        new_start: DateTime<Utc>,
    ) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE profiles
            SET summaries_used_this_period = 0, period_start = $3, updated_at = NOW()
            WHERE id = $1 AND period_start IS NOT DISTINCT FROM $2
            "#,
        )
        .bind(id)
        .bind(observed_start)
        .bind(new_start)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn init_period_start(&self, id: Uuid, start: DateTime<Utc>) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE profiles
            SET period_start = $2, updated_at = NOW()
            WHERE id = $1 AND period_start IS NULL
            "#,
        )
        .bind(id)
        .bind(start)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn try_reserve_usage(&self, id: Uuid, limit: u32) -> DbResult<Option<u32>> {
        let limit = i32::try_from(limit).unwrap_or(i32::MAX);

        let used: Option<i32> = sqlx::query_scalar(
            r#"
            UPDATE profiles
            SET summaries_used_this_period = COALESCE(summaries_used_this_period, 0) + 1,
                updated_at = NOW()
            WHERE id = $1 AND COALESCE(summaries_used_this_period, 0) < $2
            RETURNING summaries_used_this_period
            "#,
        )
        .bind(id)
        .bind(limit)
        .fetch_optional(&self.pool)
        .await?;

        Ok(used.map(|n| u32::try_from(n).unwrap_or(0)))
    }

    async fn release_usage(
        &self,
        id: Uuid,
        period_start: Option<DateTime<Utc>>,
    ) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE profiles
            SET summaries_used_this_period = summaries_used_this_period - 1,
                updated_at = NOW()
            WHERE id = $1
              AND COALESCE(summaries_used_this_period, 0) > 0
              AND period_start IS NOT DISTINCT FROM $2
            "#,
        )
        .bind(id)
        .bind(period_start)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn carry_usage(
        &self,
        id: Uuid,
        reserved_window: Option<DateTime<Utc>>,
        limit: u32,
    ) -> DbResult<Option<u32>> {
        let limit = i32::try_from(limit).unwrap_or(i32::MAX);

        let used: Option<i32> = sqlx::query_scalar(
            r#"
            UPDATE profiles
            SET summaries_used_this_period = COALESCE(summaries_used_this_period, 0) + 1,
                updated_at = NOW()
            WHERE id = $1
              AND period_start IS DISTINCT FROM $2
              AND COALESCE(summaries_used_this_period, 0) < $3
            RETURNING summaries_used_this_period
            "#,
        )
        .bind(id)
        .bind(reserved_window)
        .bind(limit)
        .fetch_optional(&self.pool)
        .await?;

        Ok(used.map(|n| u32::try_from(n).unwrap_or(0)))
    }

    async fn apply_billing_update(&self, id: Uuid, update: BillingUpdate) -> DbResult<()> {
        // A later provider cycle start opens a fresh window; an equal or
        // earlier one (replayed or lagging event) leaves usage untouched.
        let result = sqlx::query(
            r#"
            UPDATE profiles
            SET subscription_plan = $2,
                subscription_status = $3,
                subscription_current_period_end = $4,
                summaries_used_this_period = CASE
                    WHEN $5::timestamptz IS NOT NULL
                         AND (period_start IS NULL OR $5 > period_start) THEN 0
                    ELSE summaries_used_this_period
                END,
                period_start = CASE
                    WHEN $5::timestamptz IS NOT NULL
                         AND (period_start IS NULL OR $5 > period_start) THEN $5
                    ELSE period_start
                END,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(&update.plan)
        .bind(&update.status)
        .bind(update.period_end)
        .bind(update.cycle_start)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound);
        }

        Ok(())
    }
}
