//! Configuration for the Recap API service.

use std::time::Duration;

use recap_billing_core::BillingConfig;
use recap_llm::LlmConfig;
use recap_types::{Plan, QuotaTable};

/// Recap API configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port
    pub http_port: u16,
    /// Database URL
    pub database_url: String,
    /// Maximum database connections
    pub database_max_connections: u32,
    /// Stripe configuration
    pub billing: BillingConfig,
    /// Text generation configuration
    pub llm: LlmConfig,
    /// Per-plan summary limits
    pub quotas: QuotaTable,
    /// Request timeout; generation calls run inside it
    pub request_timeout: Duration,
    /// Metrics enabled
    pub metrics_enabled: bool,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &'static str| lookup(key).ok_or(ConfigError::Missing(key));

        // Database
        let database_url = required("DATABASE_URL")?;
        let database_max_connections = parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", 10)?;

        // Server
        let http_port = parse_or(&lookup, "HTTP_PORT", 8080)?;

        // Stripe
        let stripe_secret_key = required("STRIPE_SECRET_KEY")?;
        let stripe_webhook_secret = required("STRIPE_WEBHOOK_SECRET")?;

        let success_url = lookup("BILLING_SUCCESS_URL")
            .unwrap_or_else(|| "https://app.example.com/billing/success".to_string());
        let cancel_url = lookup("BILLING_CANCEL_URL")
            .unwrap_or_else(|| "https://app.example.com/billing/cancel".to_string());
        let return_url = lookup("BILLING_RETURN_URL")
            .unwrap_or_else(|| "https://app.example.com/settings".to_string());

        let mut billing = BillingConfig::new(stripe_secret_key, stripe_webhook_secret)
            .with_urls(success_url, cancel_url, return_url);
        if let Some(price_id) = lookup("STRIPE_PRICE_INDIVIDUAL") {
            billing = billing.with_price(Plan::Individual, price_id);
        }
        if let Some(api_base) = lookup("STRIPE_API_BASE") {
            billing = billing.with_api_base(api_base);
        }

        // Text generation
        let mut llm = LlmConfig::new(required("OPENAI_API_KEY")?);
        if let Some(base_url) = lookup("OPENAI_BASE_URL") {
            llm = llm.with_base_url(base_url);
        }
        if let Some(model) = lookup("OPENAI_MODEL") {
            llm = llm.with_model(model);
        }
        let llm_timeout_secs: u64 = parse_or(&lookup, "OPENAI_TIMEOUT_SECS", 60)?;
        llm = llm.with_timeout(Duration::from_secs(llm_timeout_secs));

        // Quotas
        let defaults = QuotaTable::default();
        let quotas = QuotaTable {
            free: parse_or(&lookup, "QUOTA_FREE", defaults.free)?,
            individual: parse_or(&lookup, "QUOTA_INDIVIDUAL", defaults.individual)?,
        };

        // Must outlast a generation call
        let request_timeout_secs: u64 = parse_or(&lookup, "REQUEST_TIMEOUT_SECS", 90)?;

        // Metrics
        let metrics_enabled = lookup("METRICS_ENABLED")
            .and_then(|v| v.parse().ok())
            .unwrap_or(true);

        Ok(Self {
            http_port,
            database_url,
            database_max_connections,
            billing,
            llm,
            quotas,
            request_timeout: Duration::from_secs(request_timeout_secs),
            metrics_enabled,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid(key)),
        None => Ok(default),
    }
}

/// Configuration error
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),
}
