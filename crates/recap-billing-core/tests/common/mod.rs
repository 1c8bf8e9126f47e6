//! Common test utilities for recap-billing-core integration tests

use chrono::{DateTime, TimeZone, Utc};
use recap_db::ProfileRow;
use uuid::Uuid;

pub fn at(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, min, s).unwrap()
}

/// Profile on the free plan
#[allow(dead_code)]
pub fn free_profile(used: i32, period_start: DateTime<Utc>) -> ProfileRow {
    profile("free", "free", used, period_start, None)
}

/// Profile with an active individual subscription
#[allow(dead_code)]
pub fn active_profile(
    used: i32,
    period_start: DateTime<Utc>,
    period_end: Option<DateTime<Utc>>,
) -> ProfileRow {
    profile("individual", "active", used, period_start, period_end)
}

pub fn profile(
    plan: &str,
    status: &str,
    used: i32,
    period_start: DateTime<Utc>,
    period_end: Option<DateTime<Utc>>,
) -> ProfileRow {
    ProfileRow {
        id: Uuid::new_v4(),
        email: Some("user@example.com".to_string()),
        stripe_customer_id: None,
        subscription_plan: plan.to_string(),
        subscription_status: status.to_string(),
        summaries_used_this_period: Some(used),
        period_start: Some(period_start),
        subscription_current_period_end: period_end,
        created_at: period_start,
        updated_at: period_start,
    }
}
