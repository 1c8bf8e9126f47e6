//! Payment provider abstraction

use async_trait::async_trait;
use recap_types::{CheckoutSession, Plan, UserId};

use crate::BillingError;

/// Payment provider trait
///
/// Abstracts payment processing to allow different providers (Stripe, etc.)
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Create a customer for a user, returning the provider's customer ID
    async fn create_customer(
        &self,
        user_id: &UserId,
        email: Option<&str>,
    ) -> Result<String, BillingError>;

    /// Create a subscription checkout session
    async fn create_checkout_session(
        &self,
        customer_id: &str,
        user_id: &UserId,
        plan: Plan,
        success_url: &str,
        cancel_url: &str,
    ) -> Result<CheckoutSession, BillingError>;

    /// Create a customer portal session
    async fn create_portal_session(
        &self,
        customer_id: &str,
        return_url: &str,
    ) -> Result<String, BillingError>;
}
