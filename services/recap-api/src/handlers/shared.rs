//! Shared handler utilities
//!
//! Common validation, metrics, and helper functions used across handlers.

use std::time::Instant;

use recap_types::{SummaryContext, SummaryId, UserId};

use crate::error::ApiError;

// ============================================================================
// Input Validation
// ============================================================================

/// Maximum length for short user-provided strings (names, URLs)
const MAX_STRING_LEN: usize = 256;

/// Maximum length for free text (notes, commit messages, descriptions)
const MAX_TEXT_LEN: usize = 10_000;

/// Maximum number of evidence items of each kind in one context
const MAX_ITEMS: usize = 500;

/// Maximum length of a hand-edited summary
const MAX_SUMMARY_LEN: usize = 20_000;

/// Parse a user ID from a request body
pub fn parse_user_id(raw: &str) -> Result<UserId, ApiError> {
    UserId::parse(raw).map_err(|_| ApiError::BadRequest("Invalid user_id".to_string()))
}

/// Parse a summary ID from a path segment
pub fn parse_summary_id(raw: &str) -> Result<SummaryId, ApiError> {
    uuid::Uuid::parse_str(raw)
        .map(SummaryId)
        .map_err(|_| ApiError::BadRequest("Invalid summary id".to_string()))
}

/// Parse a message ID from a path segment
pub fn parse_message_id(raw: &str) -> Result<uuid::Uuid, ApiError> {
    uuid::Uuid::parse_str(raw).map_err(|_| ApiError::BadRequest("Invalid message id".to_string()))
}

/// Validate a user-provided string is within safe bounds.
pub fn validate_string_length(value: &str, field_name: &str) -> Result<(), ApiError> {
    validate_length(value, field_name, MAX_STRING_LEN)
}

fn validate_length(value: &str, field_name: &str, max: usize) -> Result<(), ApiError> {
    if value.len() > max {
        return Err(ApiError::BadRequest(format!(
            "{field_name} too long (max {max} chars)"
        )));
    }
    Ok(())
}

fn validate_required(value: &str, field_name: &str) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        return Err(ApiError::BadRequest(format!("{field_name} is required")));
    }
    validate_string_length(value, field_name)
}

fn validate_count(count: usize, field_name: &str) -> Result<(), ApiError> {
    if count > MAX_ITEMS {
        return Err(ApiError::BadRequest(format!(
            "Too many {field_name} (max {MAX_ITEMS})"
        )));
    }
    Ok(())
}

/// Validate everything a summary is drafted from.
///
/// Runs before the usage gate so a malformed request never reserves quota.
pub fn validate_summary_context(ctx: &SummaryContext) -> Result<(), ApiError> {
    validate_required(&ctx.project_name, "project_name")?;
    validate_required(&ctx.audience_name, "audience_name")?;
    if let Some(description) = &ctx.audience_description {
        validate_length(description, "audience_description", MAX_TEXT_LEN)?;
    }

    if ctx.period_start > ctx.period_end {
        return Err(ApiError::BadRequest(
            "period_start must not be after period_end".to_string(),
        ));
    }

    validate_count(ctx.notes.len(), "notes")?;
    validate_count(ctx.commits.len(), "commits")?;
    validate_count(
        ctx.todoist_tasks.added_or_updated.len() + ctx.todoist_tasks.completed.len(),
        "tasks",
    )?;
    validate_count(ctx.repository_branches.len(), "repositories")?;

    for note in &ctx.notes {
        validate_length(&note.content, "note", MAX_TEXT_LEN)?;
    }
    for commit in &ctx.commits {
        validate_length(&commit.message, "commit message", MAX_TEXT_LEN)?;
    }
    for task in ctx
        .todoist_tasks
        .added_or_updated
        .iter()
        .chain(&ctx.todoist_tasks.completed)
    {
        validate_length(&task.content, "task", MAX_TEXT_LEN)?;
    }

    Ok(())
}

/// Validate summary text supplied by hand
pub fn validate_summary_text(text: &str) -> Result<(), ApiError> {
    if text.trim().is_empty() {
        return Err(ApiError::BadRequest("Summary text is required".to_string()));
    }
    validate_length(text, "text", MAX_SUMMARY_LEN)
}

// ============================================================================
// Metrics Helpers
// ============================================================================

/// Record operation duration with result label.
///
/// Labels: operation, result (ok/err)
#[inline]
pub fn record_op_duration(operation: &'static str, start: Instant, success: bool) {
    let result = if success { "ok" } else { "err" };
    metrics::histogram!(
        "recap_operation_duration_seconds",
        "operation" => operation,
        "result" => result
    )
    .record(start.elapsed().as_secs_f64());
}

// ============================================================================
// Tests
// ============================================================================
