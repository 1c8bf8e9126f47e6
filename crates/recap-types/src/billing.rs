//! Billing provider session types

use serde::{Deserialize, Serialize};

/// Checkout session response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutSession {
    /// Stripe checkout session ID
    pub session_id: String,
    /// Checkout URL to redirect user to
    pub url: String,
}

/// Customer portal session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortalSession {
    /// Portal session URL
    pub url: String,
}
