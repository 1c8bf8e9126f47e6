//! Usage handlers

use axum::extract::State;
use axum::Json;
use recap_billing_core::UsageSnapshot;
use serde::Deserialize;
use std::time::Instant;
use tracing::instrument;

use super::shared::{parse_user_id, record_op_duration};
use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct GetUsageRequest {
    pub user_id: String,
}

/// POST /api/v1/usage
///
/// Current window and remaining quota. Applies a pending period reset but
/// never consumes quota.
#[instrument(skip(state, req))]
pub async fn get_usage(
    State(state): State<AppState>,
    Json(req): Json<GetUsageRequest>,
) -> ApiResult<Json<UsageSnapshot>> {
    let start = Instant::now();

    let user_id = parse_user_id(&req.user_id)?;
    let result = state.gate.check(&user_id).await;

    record_op_duration("get_usage", start, result.is_ok());
    Ok(Json(result?))
}
