//! Repository traits
//!
//! Define async repository interfaces for database operations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use recap_types::SummaryContext;
use uuid::Uuid;

use crate::error::DbResult;
use crate::models::*;

/// Profile repository trait
///
/// The usage counter is only ever changed through the conditional
/// operations below, each of which must be a single atomic statement.
#[async_trait]
pub trait ProfileRepository: Send + Sync {
    /// Find a profile by user ID
    async fn find_by_id(&self, id: Uuid) -> DbResult<Option<ProfileRow>>;

    /// Find a profile by Stripe customer ID
    async fn find_by_stripe_customer_id(&self, customer_id: &str)
        -> DbResult<Option<ProfileRow>>;

    /// Create a profile with free-plan defaults, or return the existing one
    async fn create(&self, profile: CreateProfile) -> DbResult<ProfileRow>;

    /// Update the profile's Stripe customer ID
    async fn update_stripe_customer_id(&self, id: Uuid, customer_id: &str) -> DbResult<()>;

    /// Start a new usage window: counter to zero, `period_start` to `new_start`.
    ///
    /// Applies only if `period_start` still equals `observed_start`; returns
    /// whether this call performed the reset.
    async fn reset_period(
        &self,
        id: Uuid,
        observed_start: Option<DateTime<Utc>>,
        new_start: DateTime<Utc>,
    ) -> DbResult<bool>;

    /// Give a profile without a stored window the start `start`.
    ///
    /// Applies only while `period_start` is null; the usage counter is kept.
    async fn init_period_start(&self, id: Uuid, start: DateTime<Utc>) -> DbResult<bool>;

    /// Reserve one unit of quota: `usage = usage + 1 WHERE usage < limit`.
    ///
    /// Returns the new usage count, or `None` when the limit was already reached.
    async fn try_reserve_usage(&self, id: Uuid, limit: u32) -> DbResult<Option<u32>>;

    /// Undo a reservation made in the window starting at `period_start`.
    ///
    /// No-op if the window has since been reset or the counter is zero.
    async fn release_usage(&self, id: Uuid, period_start: Option<DateTime<Utc>>)
        -> DbResult<bool>;

    /// Count a reservation made in `reserved_window` again after the window moved.
    ///
    /// `usage = usage + 1 WHERE period_start IS DISTINCT FROM reserved_window AND
    /// usage < limit`. Returns the new count, or `None` when the window is
    /// unchanged or the new window is full.
    async fn carry_usage(
        &self,
        id: Uuid,
        reserved_window: Option<DateTime<Utc>>,
        limit: u32,
    ) -> DbResult<Option<u32>>;

    /// Apply a subscription lifecycle update from the billing provider
    async fn apply_billing_update(&self, id: Uuid, update: BillingUpdate) -> DbResult<()>;
}

/// Create profile input
#[derive(Debug, Clone)]
pub struct CreateProfile {
    pub id: Uuid,
    pub email: Option<String>,
    pub period_start: DateTime<Utc>,
}

/// Subscription fields reported by the billing provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BillingUpdate {
    pub plan: String,
    pub status: String,
    pub period_end: Option<DateTime<Utc>>,
    /// Start of the provider's current billing cycle. When it is later than
    /// the stored window start, a fresh window begins at this instant.
    pub cycle_start: Option<DateTime<Utc>>,
}

/// Summary repository trait
#[async_trait]
pub trait SummaryRepository: Send + Sync {
    /// Find a summary by ID
    async fn find_by_id(&self, id: Uuid) -> DbResult<Option<SummaryRow>>;

    /// List a user's summaries, newest first
    async fn find_by_user_id(&self, user_id: Uuid, limit: i64) -> DbResult<Vec<SummaryRow>>;

    /// Create a new summary
    async fn create(&self, summary: CreateSummary) -> DbResult<SummaryRow>;

    /// Replace the text, generated or edited by hand
    async fn update_text(&self, id: Uuid, text: &str) -> DbResult<SummaryRow>;

    /// Delete a summary; returns whether it existed
    async fn delete(&self, id: Uuid) -> DbResult<bool>;
}

/// Create summary input
#[derive(Debug, Clone)]
pub struct CreateSummary {
    pub id: Uuid,
    pub user_id: Uuid,
    pub context: SummaryContext,
    pub text: String,
}

/// Message repository trait
#[async_trait]
pub trait MessageRepository: Send + Sync {
    /// Insert or replace the message for a (summary, channel) pair
    async fn upsert(&self, message: UpsertMessage) -> DbResult<MessageRow>;

    /// Find a message by ID
    async fn find_by_id(&self, id: Uuid) -> DbResult<Option<MessageRow>>;

    /// All messages derived from a summary
    async fn find_by_summary_id(&self, summary_id: Uuid) -> DbResult<Vec<MessageRow>>;

    /// Delete a message; returns whether it existed
    async fn delete(&self, id: Uuid) -> DbResult<bool>;

    /// Delete every message derived from a summary
    async fn delete_by_summary_id(&self, summary_id: Uuid) -> DbResult<u64>;
}

/// Upsert message input
#[derive(Debug, Clone)]
pub struct UpsertMessage {
    pub id: Uuid,
    pub summary_id: Uuid,
    pub channel: String,
    pub text: String,
}

/// Billing provider event log
#[async_trait]
pub trait SubscriptionEventRepository: Send + Sync {
    /// Whether a provider event ID has already been recorded
    async fn exists(&self, stripe_event_id: &str) -> DbResult<bool>;

    /// Record an event; returns `false` if the provider event ID was already recorded
    async fn record(&self, event: CreateSubscriptionEvent) -> DbResult<bool>;
}

/// Create subscription event input
#[derive(Debug, Clone)]
pub struct CreateSubscriptionEvent {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub event_type: String,
    pub stripe_event_id: String,
    pub event_data: serde_json::Value,
}
