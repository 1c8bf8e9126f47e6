//! Billing and usage gate errors

use chrono::{DateTime, Utc};
use recap_types::Plan;
use thiserror::Error;

/// Billing errors
#[derive(Error, Debug)]
pub enum BillingError {
    /// Profile not found
    #[error("profile not found")]
    ProfileNotFound,

    /// Profile has no Stripe customer yet
    #[error("customer not found")]
    CustomerNotFound,

    /// No price configured for the plan
    #[error("plan is not purchasable: {0}")]
    InvalidPlan(Plan),

    /// Payment provider error
    #[error("provider error: {0}")]
    ProviderError(String),

    /// Webhook verification or processing error
    #[error("webhook error: {0}")]
    WebhookError(String),

    /// Database error
    #[error("database error: {0}")]
    Database(#[from] recap_db::DbError),

    /// Internal error
    #[error("internal error: {0}")]
    Internal(String),
}

impl BillingError {
    /// Check if this is a not found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::ProfileNotFound | Self::CustomerNotFound)
    }

    /// Check if this is a provider error
    pub fn is_provider_error(&self) -> bool {
        matches!(self, Self::ProviderError(_))
    }
}

/// Usage gate errors
#[derive(Error, Debug)]
pub enum GateError {
    /// Subscription state could not be loaded or persisted
    #[error("unable to verify subscription: {0}")]
    SubscriptionLookupFailed(String),

    /// The plan quota for the current period is used up
    #[error("{}", .0.message())]
    QuotaExceeded(QuotaDenial),

    /// The guarded action failed; no quota was consumed
    #[error("guarded action failed: {0}")]
    GuardedActionFailed(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl GateError {
    /// Denial details, if this is a quota denial
    pub fn denial(&self) -> Option<&QuotaDenial> {
        match self {
            Self::QuotaExceeded(denial) => Some(denial),
            _ => None,
        }
    }
}

/// Details of a quota denial
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuotaDenial {
    /// Plan the limit belongs to
    pub plan: Plan,
    /// Whether the user has an active paid subscription
    pub is_active: bool,
    /// Quota for the period
    pub limit: u32,
    /// Usage at the time of the check
    pub used: u32,
    /// When the current window ends
    pub resets_at: DateTime<Utc>,
    /// Quota of the plan to upgrade to, for free-plan users
    pub upgrade_limit: Option<u32>,
}

impl QuotaDenial {
    /// User-facing explanation
    pub fn message(&self) -> String {
        let window = if self.is_active { "billing period" } else { "month" };
        let mut message = format!(
            "You've reached your limit of {} summaries this {window}.",
            self.limit
        );

        match self.upgrade_limit {
            Some(upgrade) => message.push_str(&format!(
                " Upgrade to the Individual plan for {upgrade} summaries per billing period."
            )),
            None => message.push_str(&format!(
                " Your limit will reset on {}.",
                self.resets_at.format("%B %-d, %Y")
            )),
        }

        message
    }
}
