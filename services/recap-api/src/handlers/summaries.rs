//! Summary handlers
//!
//! Generation and regeneration consume quota and therefore run through the
//! usage gate. Reading, editing by hand and deleting do not.

use std::time::Instant;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use recap_db::{CreateSummary, DbError, SummaryRow};
use recap_llm::{summary_prompt, Generation, LlmError, SUMMARY_MAX_TOKENS};
use recap_types::{Message, Summary, SummaryContext, SummaryId, UserId};
use serde::{Deserialize, Serialize};

use super::shared::{
    parse_summary_id, parse_user_id, record_op_duration, validate_summary_context,
    validate_summary_text,
};
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

const DEFAULT_LIST_LIMIT: i64 = 20;
const MAX_LIST_LIMIT: i64 = 100;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct GenerateSummaryRequest {
    pub user_id: String,
    pub context: SummaryContext,
}

#[derive(Debug, Deserialize)]
pub struct RegenerateSummaryRequest {
    pub user_id: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateSummaryRequest {
    pub user_id: String,
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct SummaryQuery {
    pub user_id: String,
}

#[derive(Debug, Deserialize)]
pub struct ListSummariesQuery {
    pub user_id: String,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct SummaryListResponse {
    pub summaries: Vec<SummaryResponse>,
}

#[derive(Debug, Serialize)]
pub struct SummaryResponse {
    pub id: SummaryId,
    pub user_id: UserId,
    pub text: String,
    pub context: SummaryContext,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub messages: Vec<Message>,
}

impl SummaryResponse {
    fn new(summary: Summary) -> Self {
        Self {
            id: summary.id,
            user_id: summary.user_id,
            text: summary.text,
            context: summary.context,
            created_at: summary.created_at,
            updated_at: summary.updated_at,
            model: None,
            messages: Vec::new(),
        }
    }
}

/// Failure inside the guarded action
#[derive(Debug, thiserror::Error)]
enum GenerationError {
    #[error(transparent)]
    Llm(#[from] LlmError),
    #[error("failed to store summary: {0}")]
    Store(#[from] DbError),
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /api/v1/summaries
pub async fn generate_summary(
    State(state): State<AppState>,
    Json(req): Json<GenerateSummaryRequest>,
) -> ApiResult<Json<SummaryResponse>> {
    let start = Instant::now();

    let user_id = parse_user_id(&req.user_id)?;
    validate_summary_context(&req.context)?;

    let context = req.context;
    let result = state
        .gate
        .run_guarded(&user_id, || async {
            let generation = generate_text(&state, &context).await?;
            let row = state
                .summaries
                .create(CreateSummary {
                    id: SummaryId::new().0,
                    user_id: user_id.0,
                    context: context.clone(),
                    text: generation.text,
                })
                .await?;
            Ok::<_, GenerationError>((row, generation.model))
        })
        .await;

    record_op_duration("generate_summary", start, result.is_ok());
    let (row, model) = result?;

    tracing::info!(user_id = %user_id, summary_id = %row.id, "Summary generated");

    let mut response = SummaryResponse::new(row.into_summary());
    response.model = Some(model);
    Ok(Json(response))
}

/// POST /api/v1/summaries/{id}/regenerate
///
/// Redrafts from the stored context; counts against the quota like a new summary.
pub async fn regenerate_summary(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<RegenerateSummaryRequest>,
) -> ApiResult<Json<SummaryResponse>> {
    let start = Instant::now();

    let user_id = parse_user_id(&req.user_id)?;
    let summary_id = parse_summary_id(&id)?;
    let existing = load_owned(&state, summary_id, user_id).await?;

    let context = existing.context.0;
    let result = state
        .gate
        .run_guarded(&user_id, || async {
            let generation = generate_text(&state, &context).await?;
            let row = state
                .summaries
                .update_text(summary_id.0, &generation.text)
                .await?;
            Ok::<_, GenerationError>((row, generation.model))
        })
        .await;

    record_op_duration("regenerate_summary", start, result.is_ok());
    let (row, model) = result?;

    tracing::info!(user_id = %user_id, summary_id = %summary_id, "Summary regenerated");

    let mut response = SummaryResponse::new(row.into_summary());
    response.model = Some(model);
    Ok(Json(response))
}

/// GET /api/v1/summaries/{id}?user_id=...
pub async fn get_summary(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<SummaryQuery>,
) -> ApiResult<Json<SummaryResponse>> {
    let user_id = parse_user_id(&query.user_id)?;
    let summary_id = parse_summary_id(&id)?;
    let row = load_owned(&state, summary_id, user_id).await?;

    let messages = state
        .messages
        .find_by_summary_id(summary_id.0)
        .await?
        .into_iter()
        .map(|m| m.into_message())
        .collect::<Result<Vec<_>, _>>()?;

    let mut response = SummaryResponse::new(row.into_summary());
    response.messages = messages;
    Ok(Json(response))
}

/// GET /api/v1/summaries?user_id=...&limit=...
///
/// The caller's summaries, newest first.
pub async fn list_summaries(
    State(state): State<AppState>,
    Query(query): Query<ListSummariesQuery>,
) -> ApiResult<Json<SummaryListResponse>> {
    let user_id = parse_user_id(&query.user_id)?;
    let limit = query.limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, MAX_LIST_LIMIT);

    let summaries = state
        .summaries
        .find_by_user_id(user_id.0, limit)
        .await?
        .into_iter()
        .map(|row| SummaryResponse::new(row.into_summary()))
        .collect();

    Ok(Json(SummaryListResponse { summaries }))
}

/// PATCH /api/v1/summaries/{id}
///
/// Replaces the text with a hand-edited version. Does not consume quota.
pub async fn update_summary(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<UpdateSummaryRequest>,
) -> ApiResult<Json<SummaryResponse>> {
    let user_id = parse_user_id(&req.user_id)?;
    let summary_id = parse_summary_id(&id)?;
    validate_summary_text(&req.text)?;
    load_owned(&state, summary_id, user_id).await?;

    let row = state
        .summaries
        .update_text(summary_id.0, &req.text)
        .await
        .map_err(|e| match e {
            DbError::NotFound => ApiError::SummaryNotFound,
            e => e.into(),
        })?;

    tracing::info!(user_id = %user_id, summary_id = %summary_id, "Summary edited");

    Ok(Json(SummaryResponse::new(row.into_summary())))
}

/// DELETE /api/v1/summaries/{id}?user_id=...
///
/// Removes the summary and every channel message derived from it. Quota
/// already consumed is not given back.
pub async fn delete_summary(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<SummaryQuery>,
) -> ApiResult<StatusCode> {
    let user_id = parse_user_id(&query.user_id)?;
    let summary_id = parse_summary_id(&id)?;
    load_owned(&state, summary_id, user_id).await?;

    let messages = state.messages.delete_by_summary_id(summary_id.0).await?;
    if !state.summaries.delete(summary_id.0).await? {
        return Err(ApiError::SummaryNotFound);
    }

    tracing::info!(user_id = %user_id, summary_id = %summary_id, messages, "Summary deleted");

    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Helpers
// ============================================================================

async fn generate_text(state: &AppState, context: &SummaryContext) -> Result<Generation, LlmError> {
    let request = summary_prompt(context).into_request(SUMMARY_MAX_TOKENS);
    state.generator.generate(request).await
}

/// Load a summary the caller owns; someone else's summary is reported as missing
pub(crate) async fn load_owned(
    state: &AppState,
    summary_id: SummaryId,
    user_id: UserId,
) -> ApiResult<SummaryRow> {
    match state.summaries.find_by_id(summary_id.0).await? {
        Some(row) if row.user_id == user_id.0 => Ok(row),
        Some(row) => {
            tracing::warn!(
                user_id = %user_id,
                owner = %row.user_id,
                summary_id = %summary_id,
                "Summary requested by non-owner"
            );
            Err(ApiError::SummaryNotFound)
        }
        None => Err(ApiError::SummaryNotFound),
    }
}
