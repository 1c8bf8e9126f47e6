//! Checkout and customer portal handlers

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use recap_types::Plan;

use super::shared::{parse_user_id, record_op_duration, validate_string_length};
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateCheckoutRequest {
    pub user_id: String,
    pub plan: String,
    pub success_url: Option<String>,
    pub cancel_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub session_id: String,
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct CreatePortalRequest {
    pub user_id: String,
    pub return_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PortalResponse {
    pub url: String,
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /api/v1/billing/checkout
pub async fn create_checkout(
    State(state): State<AppState>,
    Json(req): Json<CreateCheckoutRequest>,
) -> ApiResult<Json<CheckoutResponse>> {
    let start = Instant::now();

    let user_id = parse_user_id(&req.user_id)?;

    let plan: Plan = req
        .plan
        .parse()
        .map_err(|_| ApiError::BadRequest(format!("Invalid plan: {}", req.plan)))?;

    for url in [&req.success_url, &req.cancel_url].into_iter().flatten() {
        validate_string_length(url, "redirect url")?;
    }

    let result = state
        .billing
        .create_checkout(
            &user_id,
            plan,
            req.success_url.as_deref(),
            req.cancel_url.as_deref(),
        )
        .await;

    record_op_duration("create_checkout", start, result.is_ok());
    let session = result?;

    metrics::counter!("recap_checkouts_created_total").increment(1);
    tracing::info!(user_id = %user_id, plan = %plan, "Checkout session created");

    Ok(Json(CheckoutResponse {
        session_id: session.session_id,
        url: session.url,
    }))
}

/// POST /api/v1/billing/portal
pub async fn create_portal(
    State(state): State<AppState>,
    Json(req): Json<CreatePortalRequest>,
) -> ApiResult<Json<PortalResponse>> {
    let start = Instant::now();

    let user_id = parse_user_id(&req.user_id)?;
    if let Some(url) = &req.return_url {
        validate_string_length(url, "return_url")?;
    }

    let result = state
        .billing
        .create_portal_session(&user_id, req.return_url.as_deref())
        .await;

    record_op_duration("create_portal", start, result.is_ok());

    Ok(Json(PortalResponse { url: result?.url }))
}
