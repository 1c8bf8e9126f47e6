//! Subscription types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{ParseError, Plan};

/// Subscription status as reported by the billing provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    /// No paid subscription
    Free,
    /// Paying and currently valid
    Active,
    /// In trial period
    Trialing,
    /// Payment is past due
    PastDue,
    /// Subscription was canceled
    Canceled,
    /// First payment not yet completed
    Incomplete,
    /// First payment never completed
    IncompleteExpired,
    /// Retries exhausted without payment
    Unpaid,
    /// Collection paused
    Paused,
}

impl SubscriptionStatus {
    /// Stored string form (matches the billing provider's names)
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Active => "active",
            Self::Trialing => "trialing",
            Self::PastDue => "past_due",
            Self::Canceled => "canceled",
            Self::Incomplete => "incomplete",
            Self::IncompleteExpired => "incomplete_expired",
            Self::Unpaid => "unpaid",
            Self::Paused => "paused",
        }
    }

    /// Whether this is a paying, currently-valid subscription
    pub const fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }
}

impl Default for SubscriptionStatus {
    fn default() -> Self {
        Self::Free
    }
}

impl std::fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SubscriptionStatus {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "free" => Ok(Self::Free),
            "active" => Ok(Self::Active),
            "trialing" => Ok(Self::Trialing),
            "past_due" => Ok(Self::PastDue),
            "canceled" | "cancelled" => Ok(Self::Canceled),
            "incomplete" => Ok(Self::Incomplete),
            "incomplete_expired" => Ok(Self::IncompleteExpired),
            "unpaid" => Ok(Self::Unpaid),
            "paused" => Ok(Self::Paused),
            other => Err(ParseError::InvalidStatus(other.to_string())),
        }
    }
}

/// Per-user subscription and usage record
///
/// `period_start` and `usage_count` mirror nullable columns: a missing start
/// means "now", a missing count means zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionState {
    /// Plan tier, decides the quota
    pub plan: Plan,
    /// Billing status
    pub status: SubscriptionStatus,
    /// Quota-consuming actions in the current period
    pub usage_count: u32,
    /// Start of the current counting window
    pub period_start: Option<DateTime<Utc>>,
    /// End of the paid billing cycle, when known
    pub period_end: Option<DateTime<Utc>>,
}

impl SubscriptionState {
    /// State of a freshly created profile
    pub fn new_free(now: DateTime<Utc>) -> Self {
        Self {
            plan: Plan::Free,
            status: SubscriptionStatus::Free,
            usage_count: 0,
            period_start: Some(now),
            period_end: None,
        }
    }

    /// Window start, defaulting to `now` when unknown
    pub fn period_start_or(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        self.period_start.unwrap_or(now)
    }

    /// Paid window with a known end: `[period_start, period_end)`
    pub fn paid_period_end(&self) -> Option<DateTime<Utc>> {
        if self.status.is_active() {
            self.period_end
        } else {
            None
        }
    }
}
