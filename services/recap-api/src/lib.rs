//! Recap API
//!
//! HTTP service for quota-gated summary generation.
//!
//! ## REST Endpoints
//!
//! - `POST /api/v1/profiles` - Create the caller's profile
//! - `POST /api/v1/usage` - Usage in the current window
//! - `POST /api/v1/summaries` - Generate a summary (consumes quota)
//! - `GET /api/v1/summaries` - List the caller's summaries
//! - `GET /api/v1/summaries/{id}` - Fetch a summary and its messages
//! - `PATCH /api/v1/summaries/{id}` - Replace a summary's text by hand
//! - `DELETE /api/v1/summaries/{id}` - Delete a summary and its messages
//! - `POST /api/v1/summaries/{id}/regenerate` - Regenerate a summary (consumes quota)
//! - `POST /api/v1/summaries/{id}/messages` - Channel message from a summary
//! - `DELETE /api/v1/messages/{id}` - Delete a channel message
//! - `POST /api/v1/billing/checkout` - Create checkout session
//! - `POST /api/v1/billing/portal` - Create customer portal session
//! - `POST /webhooks/stripe` - Stripe webhook handler
//!
//! ## Health Endpoints
//!
//! - `GET /health` - Liveness probe
//! - `GET /ready` - Readiness probe
//! - `GET /metrics` - Prometheus metrics

pub mod config;
pub mod error;
pub mod handlers;
pub mod state;

use axum::routing::{delete, get, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

pub use crate::config::{Config, ConfigError};
pub use crate::error::{ApiError, ApiResult};
pub use crate::state::AppState;

/// Build the HTTP router
pub fn build_router(state: AppState, metrics_handle: Option<PrometheusHandle>) -> Router {
    let request_timeout = state.request_timeout;

    let api_v1 = Router::new()
        // Profile and usage routes
        .route("/profiles", post(handlers::create_profile))
        .route("/usage", post(handlers::get_usage))
        // Summary routes
        .route(
            "/summaries",
            get(handlers::list_summaries).post(handlers::generate_summary),
        )
        .route(
            "/summaries/{id}",
            get(handlers::get_summary)
                .patch(handlers::update_summary)
                .delete(handlers::delete_summary),
        )
        .route("/summaries/{id}/regenerate", post(handlers::regenerate_summary))
        .route("/summaries/{id}/messages", post(handlers::generate_message))
        .route("/messages/{id}", delete(handlers::delete_message))
        // Billing routes
        .route("/billing/checkout", post(handlers::create_checkout))
        .route("/billing/portal", post(handlers::create_portal));

    // Webhook route (separate - uses raw body, no JSON parsing)
    let webhook_routes = Router::new().route("/webhooks/stripe", post(handlers::stripe_webhook));

    // Health routes (no timeout - must always respond quickly)
    let health_routes = Router::new()
        .route("/health", get(handlers::health))
        .route("/ready", get(handlers::ready));

    // Metrics route (no timeout)
    let metrics_route = if let Some(handle) = metrics_handle {
        Router::new().route("/metrics", get(move || async move { handle.render() }))
    } else {
        Router::new()
    };

    // Build middleware stack (order matters - outermost first)
    let middleware = ServiceBuilder::new()
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        // A timed-out generation drops its usage permit, which releases the slot
        .layer(TimeoutLayer::new(request_timeout));

    Router::new()
        .nest("/api/v1", api_v1)
        .merge(webhook_routes)
        .layer(middleware)
        .merge(health_routes)
        .merge(metrics_route)
        .with_state(state)
}
