//! Application state for the Recap API service.

use std::sync::Arc;
use std::time::Duration;

use recap_billing_core::{BillingService, UsageGate};
use recap_db::{
    DbPool, MessageRepository, ProfileRepository, SubscriptionEventRepository, SummaryRepository,
};
use recap_llm::TextGenerator;

/// Gate over whichever profile store is wired in
pub type Gate = UsageGate<dyn ProfileRepository>;

/// Billing service over whichever stores are wired in
pub type Billing = BillingService<dyn ProfileRepository, dyn SubscriptionEventRepository>;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    /// Quota enforcement for summary generation
    pub gate: Arc<Gate>,
    /// Profiles, checkout, portal and webhooks
    pub billing: Arc<Billing>,
    pub summaries: Arc<dyn SummaryRepository>,
    pub messages: Arc<dyn MessageRepository>,
    /// Text generation backend
    pub generator: Arc<dyn TextGenerator>,
    /// Database pool, checked by the readiness probe; `None` for in-memory stores
    pub pool: Option<DbPool>,
    /// Request timeout
    pub request_timeout: Duration,
}

impl AppState {
    /// Create new application state
    pub fn new(
        gate: Gate,
        billing: Billing,
        summaries: Arc<dyn SummaryRepository>,
        messages: Arc<dyn MessageRepository>,
        generator: Arc<dyn TextGenerator>,
    ) -> Self {
        Self {
            gate: Arc::new(gate),
            billing: Arc::new(billing),
            summaries,
            messages,
            generator,
            pool: None,
            request_timeout: Duration::from_secs(90),
        }
    }

    /// Attach the database pool used for readiness checks
    #[must_use]
    pub fn with_pool(mut self, pool: DbPool) -> Self {
        self.pool = Some(pool);
        self
    }

    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("gate", &self.gate)
            .field("request_timeout", &self.request_timeout)
            .finish_non_exhaustive()
    }
}
