//! Error types for the Recap API service.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use recap_billing_core::{BillingError, GateError, QuotaDenial};
use serde::Serialize;

/// API error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// API error type
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Summary not found")]
    SummaryNotFound,

    #[error("Message not found")]
    MessageNotFound,

    #[error("Profile not found")]
    ProfileNotFound,

    #[error("Customer not found")]
    CustomerNotFound,

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("{}", .0.message())]
    QuotaExceeded(QuotaDenial),

    #[error("Unable to verify subscription. Please try again later.")]
    SubscriptionUnavailable,

    /// Upstream reason is logged, never returned
    #[error("Failed to generate {kind}")]
    GenerationFailed { kind: &'static str, reason: String },

    #[error("Payment provider error")]
    PaymentProvider(String),

    #[error("Webhook error: {0}")]
    WebhookError(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Database error")]
    Database(#[from] recap_db::DbError),
}

impl ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::SummaryNotFound
            | Self::MessageNotFound
            | Self::ProfileNotFound
            | Self::CustomerNotFound => StatusCode::NOT_FOUND,
            Self::BadRequest(_) | Self::WebhookError(_) => StatusCode::BAD_REQUEST,
            Self::QuotaExceeded(_) => StatusCode::TOO_MANY_REQUESTS,
            Self::SubscriptionUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::GenerationFailed { .. } | Self::PaymentProvider(_) => StatusCode::BAD_GATEWAY,
            Self::Internal(_) | Self::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::SummaryNotFound => "SUMMARY_NOT_FOUND",
            Self::MessageNotFound => "MESSAGE_NOT_FOUND",
            Self::ProfileNotFound => "PROFILE_NOT_FOUND",
            Self::CustomerNotFound => "CUSTOMER_NOT_FOUND",
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::QuotaExceeded(_) => "QUOTA_EXCEEDED",
            Self::SubscriptionUnavailable => "SUBSCRIPTION_UNAVAILABLE",
            Self::GenerationFailed { .. } => "GENERATION_FAILED",
            Self::PaymentProvider(_) => "PAYMENT_PROVIDER_ERROR",
            Self::WebhookError(_) => "WEBHOOK_ERROR",
            Self::Internal(_) | Self::Database(_) => "INTERNAL_ERROR",
        }
    }

    fn details(&self) -> Option<serde_json::Value> {
        match self {
            Self::QuotaExceeded(denial) => Some(serde_json::json!({
                "plan": denial.plan,
                "limit": denial.limit,
                "used": denial.used,
                "resets_at": denial.resets_at,
            })),
            _ => None,
        }
    }
}

impl From<GateError> for ApiError {
    fn from(err: GateError) -> Self {
        match err {
            GateError::QuotaExceeded(denial) => Self::QuotaExceeded(denial),
            GateError::SubscriptionLookupFailed(reason) => {
                tracing::error!(reason = %reason, "Subscription lookup failed");
                Self::SubscriptionUnavailable
            }
            GateError::GuardedActionFailed(source) => Self::GenerationFailed {
                kind: "summary",
                reason: source.to_string(),
            },
        }
    }
}

impl From<BillingError> for ApiError {
    fn from(err: BillingError) -> Self {
        match err {
            BillingError::ProfileNotFound => Self::ProfileNotFound,
            BillingError::CustomerNotFound => Self::CustomerNotFound,
            BillingError::InvalidPlan(plan) => {
                Self::BadRequest(format!("Plan cannot be purchased: {plan}"))
            }
            BillingError::ProviderError(msg) => Self::PaymentProvider(msg),
            BillingError::WebhookError(msg) => Self::WebhookError(msg),
            BillingError::Database(e) => Self::Database(e),
            BillingError::Internal(msg) => Self::Internal(msg),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.error_code();

        // Log internal errors
        match &self {
            Self::Internal(_) | Self::Database(_) => {
                tracing::error!(error = ?self, "Internal API error");
            }
            Self::GenerationFailed { reason, .. } | Self::PaymentProvider(reason) => {
                tracing::warn!(code, reason = %reason, "Upstream call failed");
            }
            _ => {}
        }

        let body = ErrorResponse {
            error: ErrorDetail {
                code: code.to_string(),
                message: self.to_string(),
                details: self.details(),
            },
        };

        (status, Json(body)).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
