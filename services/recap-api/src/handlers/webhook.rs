//! Stripe webhook handler

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use recap_billing_core::{BillingError, WebhookOutcome};
use std::time::Instant;

use super::shared::record_op_duration;
use crate::state::AppState;

/// POST /webhooks/stripe
///
/// Verifies the signature over the raw body before anything is parsed.
/// Duplicates and events for unknown customers are acknowledged with 200 so
/// Stripe does not retry them.
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    let start = Instant::now();

    // Extract Stripe signature header
    let Some(sig_header) = headers.get("stripe-signature") else {
        tracing::warn!("Missing Stripe-Signature header");
        return StatusCode::BAD_REQUEST;
    };

    let Ok(signature) = sig_header.to_str() else {
        tracing::warn!("Invalid Stripe-Signature header encoding");
        return StatusCode::BAD_REQUEST;
    };

    match state.billing.process_webhook(&body, signature).await {
        Ok(outcome) => {
            match &outcome {
                WebhookOutcome::Applied { user_id } => {
                    tracing::info!(user_id = %user_id, "Webhook applied");
                }
                WebhookOutcome::Duplicate => tracing::debug!("Duplicate webhook acknowledged"),
                WebhookOutcome::Ignored { reason } => {
                    tracing::debug!(reason = %reason, "Webhook ignored");
                }
            }
            record_op_duration("process_webhook", start, true);
            StatusCode::OK
        }
        Err(BillingError::WebhookError(reason)) => {
            tracing::warn!(reason = %reason, "Webhook rejected");
            record_op_duration("process_webhook", start, false);
            StatusCode::BAD_REQUEST
        }
        Err(e) => {
            tracing::error!(error = ?e, "Webhook processing failed");
            record_op_duration("process_webhook", start, false);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}
