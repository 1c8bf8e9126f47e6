//! Recap Billing Core - Quota and billing business logic
//!
//! The usage gate that guards summary generation, plus Stripe integration:
//! webhook verification, subscription lifecycle updates, checkout and
//! customer portal sessions.
//!
//! # Example
//!
//! ```rust,ignore
//! use recap_billing_core::UsageGate;
//! use recap_types::QuotaTable;
//!
//! let gate = UsageGate::new(profiles, QuotaTable::default());
//!
//! // Reserve a slot, run the AI call, keep the slot only if it succeeded
//! let summary = gate
//!     .run_guarded(&user_id, || generator.generate(&system, &prompt))
//!     .await?;
//! ```

pub mod clock;
pub mod config;
pub mod error;
pub mod gate;
pub mod period;
pub mod provider;
pub mod service;
pub mod stripe;
pub mod webhook;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::BillingConfig;
pub use error::{BillingError, GateError, QuotaDenial};
pub use gate::{UsageGate, UsagePermit, UsageSnapshot};
pub use provider::PaymentProvider;
pub use service::{BillingService, WebhookOutcome};
pub use stripe::StripeProvider;
pub use webhook::{WebhookEvent, WebhookEventData, WebhookEventType, WebhookHandler};
