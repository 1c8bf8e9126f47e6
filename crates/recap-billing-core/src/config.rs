//! Billing configuration

use recap_types::Plan;
use std::collections::HashMap;

const STRIPE_API_BASE: &str = "https://api.stripe.com/v1";

/// Billing service configuration
#[derive(Debug, Clone)]
pub struct BillingConfig {
    /// Stripe secret key
    pub stripe_secret_key: String,
    /// Stripe webhook secret
    pub stripe_webhook_secret: String,
    /// Stripe API base URL
    pub api_base: String,
    /// Map of plans to Stripe price IDs
    pub price_ids: HashMap<Plan, String>,
    /// Default success URL for checkout
    pub default_success_url: String,
    /// Default cancel URL for checkout
    pub default_cancel_url: String,
    /// Default return URL for the customer portal
    pub default_return_url: String,
}

impl BillingConfig {
    /// Create a new billing config
    pub fn new(
        stripe_secret_key: impl Into<String>,
        stripe_webhook_secret: impl Into<String>,
    ) -> Self {
        Self {
            stripe_secret_key: stripe_secret_key.into(),
            stripe_webhook_secret: stripe_webhook_secret.into(),
            api_base: STRIPE_API_BASE.to_string(),
            price_ids: HashMap::new(),
            default_success_url: "http://localhost:3000/protected/billing?success=true".to_string(),
            default_cancel_url: "http://localhost:3000/protected/billing?canceled=true".to_string(),
            default_return_url: "http://localhost:3000/protected/billing".to_string(),
        }
    }

    /// Set price ID for a plan
    pub fn with_price(mut self, plan: Plan, price_id: impl Into<String>) -> Self {
        self.price_ids.insert(plan, price_id.into());
        self
    }

    /// Set default URLs
    pub fn with_urls(
        mut self,
        success_url: impl Into<String>,
        cancel_url: impl Into<String>,
        return_url: impl Into<String>,
    ) -> Self {
        self.default_success_url = success_url.into();
        self.default_cancel_url = cancel_url.into();
        self.default_return_url = return_url.into();
        self
    }

    /// Point the client at a different Stripe API base
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        let api_base: String = api_base.into();
        self.api_base = api_base.trim_end_matches('/').to_string();
        self
    }

    /// Get price ID for a plan
    pub fn get_price_id(&self, plan: Plan) -> Option<&str> {
        self.price_ids.get(&plan).map(String::as_str)
    }

    /// Plan bought with a price ID
    ///
    /// Any paid subscription is on the individual plan unless its price is
    /// mapped to another plan.
    pub fn plan_for_price(&self, price_id: Option<&str>) -> Plan {
        price_id
            .and_then(|id| {
                self.price_ids
                    .iter()
                    .find(|(_, configured)| configured.as_str() == id)
                    .map(|(plan, _)| *plan)
            })
            .unwrap_or(Plan::Individual)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_for_price() {
        let config = BillingConfig::new("sk", "whsec").with_price(Plan::Individual, "price_ind");

        assert_eq!(config.plan_for_price(Some("price_ind")), Plan::Individual);
        assert_eq!(config.plan_for_price(Some("price_other")), Plan::Individual);
        assert_eq!(config.plan_for_price(None), Plan::Individual);
        assert_eq!(config.get_price_id(Plan::Free), None);
    }

    #[test]
    fn test_api_base_trailing_slash() {
        let config = BillingConfig::new("sk", "whsec").with_api_base("http://127.0.0.1:9999/");
        assert_eq!(config.api_base, "http://127.0.0.1:9999");
    }
}
