//! Channel message handlers

use std::time::Instant;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use recap_db::UpsertMessage;
use recap_llm::{character_limit_warning, message_prompt, MESSAGE_MAX_TOKENS};
use recap_types::{Channel, Message, SummaryId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::shared::{parse_message_id, parse_summary_id, parse_user_id, record_op_duration};
use super::summaries::load_owned;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct GenerateMessageRequest {
    pub user_id: String,
    pub channel: String,
}

#[derive(Debug, Deserialize)]
pub struct MessageQuery {
    pub user_id: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: Message,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

/// POST /api/v1/summaries/{id}/messages
///
/// Reformats a summary for one channel. Does not consume quota.
pub async fn generate_message(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<GenerateMessageRequest>,
) -> ApiResult<Json<MessageResponse>> {
    let start = Instant::now();

    let user_id = parse_user_id(&req.user_id)?;
    let summary_id = parse_summary_id(&id)?;
    let channel: Channel = req
        .channel
        .parse()
        .map_err(|_| ApiError::BadRequest(format!("Invalid channel: {}", req.channel)))?;

    let summary = load_owned(&state, summary_id, user_id).await?;

    let request =
        message_prompt(&summary.context.0, &summary.text, channel).into_request(MESSAGE_MAX_TOKENS);
    let generation = match state.generator.generate(request).await {
        Ok(generation) => generation,
        Err(e) => {
            record_op_duration("generate_message", start, false);
            return Err(ApiError::GenerationFailed {
                kind: "message",
                reason: e.to_string(),
            });
        }
    };

    let warning = character_limit_warning(channel, &generation.text);
    if let Some(warning) = &warning {
        tracing::warn!(summary_id = %summary_id, channel = %channel, warning = %warning, "Message over channel limit");
    }

    let row = state
        .messages
        .upsert(UpsertMessage {
            id: Uuid::new_v4(),
            summary_id: summary_id.0,
            channel: channel.as_str().to_string(),
            text: generation.text,
        })
        .await?;

    record_op_duration("generate_message", start, true);

    Ok(Json(MessageResponse {
        message: row.into_message()?,
        warning,
    }))
}

/// DELETE /api/v1/messages/{id}?user_id=...
///
/// Ownership follows the summary the message was derived from.
pub async fn delete_message(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<MessageQuery>,
) -> ApiResult<StatusCode> {
    let user_id = parse_user_id(&query.user_id)?;
    let message_id = parse_message_id(&id)?;

    let message = state
        .messages
        .find_by_id(message_id)
        .await?
        .ok_or(ApiError::MessageNotFound)?;

    load_owned(&state, SummaryId(message.summary_id), user_id)
        .await
        .map_err(|e| match e {
            ApiError::SummaryNotFound => ApiError::MessageNotFound,
            e => e,
        })?;

    if !state.messages.delete(message_id).await? {
        return Err(ApiError::MessageNotFound);
    }

    tracing::info!(user_id = %user_id, message_id = %message_id, channel = %message.channel, "Message deleted");

    Ok(StatusCode::NO_CONTENT)
}
