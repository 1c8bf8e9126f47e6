//! Profile handlers

use axum::extract::State;
use axum::Json;
use chrono::{DateTime, Utc};
use recap_types::{Plan, UserId};
use serde::{Deserialize, Serialize};
use std::time::Instant;

use super::shared::{parse_user_id, record_op_duration, validate_string_length};
use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateProfileRequest {
    pub user_id: String,
    pub email: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub user_id: UserId,
    pub email: Option<String>,
    pub plan: Plan,
    pub status: String,
    pub summaries_used_this_period: u32,
    pub period_start: Option<DateTime<Utc>>,
    pub period_end: Option<DateTime<Utc>>,
}

/// POST /api/v1/profiles
///
/// Called once after sign-up. Creating an existing profile returns it unchanged.
pub async fn create_profile(
    State(state): State<AppState>,
    Json(req): Json<CreateProfileRequest>,
) -> ApiResult<Json<ProfileResponse>> {
    let start = Instant::now();

    let user_id = parse_user_id(&req.user_id)?;
    if let Some(email) = &req.email {
        validate_string_length(email, "email")?;
    }

    let result = state.billing.ensure_profile(&user_id, req.email).await;
    record_op_duration("create_profile", start, result.is_ok());
    let profile = result?;

    let subscription = profile.subscription_state();
    Ok(Json(ProfileResponse {
        user_id: profile.user_id(),
        email: profile.email,
        plan: subscription.plan,
        status: subscription.status.to_string(),
        summaries_used_this_period: subscription.usage_count,
        period_start: subscription.period_start,
        period_end: subscription.period_end,
    }))
}
