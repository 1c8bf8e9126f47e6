//! Database row models
//!
//! These types map directly to database rows using SQLx's FromRow derive.

use chrono::{DateTime, Utc};
use recap_types::{
    Channel, Message, Plan, SubscriptionState, SubscriptionStatus, Summary, SummaryContext,
    SummaryId, UserId,
};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

use crate::error::{DbError, DbResult};

/// Profile row from the database (one per user, carries the subscription state)
#[derive(Debug, Clone, FromRow)]
pub struct ProfileRow {
    pub id: Uuid,
    pub email: Option<String>,
    pub stripe_customer_id: Option<String>,
    pub subscription_plan: String,
    pub subscription_status: String,
    pub summaries_used_this_period: Option<i32>,
    pub period_start: Option<DateTime<Utc>>,
    pub subscription_current_period_end: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Summary row from the database
#[derive(Debug, Clone, FromRow)]
pub struct SummaryRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub context: Json<SummaryContext>,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Channel message row from the database
#[derive(Debug, Clone, FromRow)]
pub struct MessageRow {
    pub id: Uuid,
    pub summary_id: Uuid,
    pub channel: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Billing provider event log row
#[derive(Debug, Clone, FromRow)]
pub struct SubscriptionEventRow {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub event_type: String,
    pub stripe_event_id: String,
    pub event_data: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

// Conversion implementations from Row types to recap-types domain types
impl ProfileRow {
    /// Convert to domain UserId
    pub fn user_id(&self) -> UserId {
        UserId(self.id)
    }

    /// Subscription state as seen by the usage gate
    ///
    /// Unknown plans fall back to free. Unknown statuses are treated as
    /// not active so the calendar-month window applies.
    pub fn subscription_state(&self) -> SubscriptionState {
        let status = self.subscription_status.parse().unwrap_or_else(|_| {
            tracing::warn!(
                user_id = %self.id,
                status = %self.subscription_status,
                "Unknown subscription status, treating as free"
            );
            SubscriptionStatus::Free
        });

        SubscriptionState {
            plan: Plan::parse_or_free(&self.subscription_plan),
            status,
            usage_count: self
                .summaries_used_this_period
                .map_or(0, |n| u32::try_from(n).unwrap_or(0)),
            period_start: self.period_start,
            period_end: self.subscription_current_period_end,
        }
    }
}

impl SummaryRow {
    /// Convert to the domain summary
    pub fn into_summary(self) -> Summary {
        Summary {
            id: SummaryId(self.id),
            user_id: UserId(self.user_id),
            context: self.context.0,
            text: self.text,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

impl MessageRow {
    /// Convert to the domain message
    pub fn into_message(self) -> DbResult<Message> {
        let channel: Channel = self
            .channel
            .parse()
            .map_err(|e: recap_types::ParseError| DbError::InvalidValue(e.to_string()))?;

        Ok(Message {
            id: self.id,
            summary_id: SummaryId(self.summary_id),
            channel,
            text: self.text,
            created_at: self.created_at,
        })
    }
}
