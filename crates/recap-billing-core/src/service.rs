//! Billing service
//!
//! Applies Stripe subscription lifecycle events to profiles and drives
//! checkout and portal sessions through the payment provider.

use std::sync::Arc;

use chrono::Utc;
use recap_db::{
    BillingUpdate, CreateProfile, CreateSubscriptionEvent, ProfileRepository, ProfileRow,
    SubscriptionEventRepository,
};
use recap_types::{CheckoutSession, Plan, PortalSession, SubscriptionStatus, UserId};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::config::BillingConfig;
use crate::error::BillingError;
use crate::provider::PaymentProvider;
use crate::webhook::{
    CheckoutSessionData, InvoiceData, SubscriptionData, WebhookEvent, WebhookEventData,
    WebhookEventType, WebhookHandler,
};

/// Result of processing one webhook delivery
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// The event was applied to a profile
    Applied { user_id: UserId },
    /// The event ID was seen before
    Duplicate,
    /// Nothing to do: unhandled type or unknown customer
    Ignored { reason: String },
}

impl WebhookOutcome {
    fn label(&self) -> &'static str {
        match self {
            Self::Applied { .. } => "applied",
            Self::Duplicate => "duplicate",
            Self::Ignored { .. } => "ignored",
        }
    }
}

/// Billing service
pub struct BillingService<P: ProfileRepository + ?Sized, E: SubscriptionEventRepository + ?Sized> {
    profiles: Arc<P>,
    events: Arc<E>,
    provider: Arc<dyn PaymentProvider>,
    webhooks: WebhookHandler,
    config: BillingConfig,
}

impl<P: ProfileRepository + ?Sized, E: SubscriptionEventRepository + ?Sized> BillingService<P, E> {
    /// Create a new billing service
    pub fn new(
        profiles: Arc<P>,
        events: Arc<E>,
        provider: Arc<dyn PaymentProvider>,
        config: BillingConfig,
    ) -> Self {
        Self {
            webhooks: WebhookHandler::new(config.stripe_webhook_secret.clone()),
            profiles,
            events,
            provider,
            config,
        }
    }

    /// Create the user's profile on the free plan, or return the existing one
    #[instrument(skip(self, email))]
    pub async fn ensure_profile(
        &self,
        user_id: &UserId,
        email: Option<String>,
    ) -> Result<ProfileRow, BillingError> {
        let profile = self
            .profiles
            .create(CreateProfile {
                id: user_id.0,
                email,
                period_start: Utc::now(),
            })
            .await?;

        Ok(profile)
    }

    /// Start a subscription checkout, creating the Stripe customer on first use
    #[instrument(skip(self, success_url, cancel_url))]
    pub async fn create_checkout(
        &self,
        user_id: &UserId,
        plan: Plan,
        success_url: Option<&str>,
        cancel_url: Option<&str>,
    ) -> Result<CheckoutSession, BillingError> {
        if plan == Plan::Free {
            return Err(BillingError::InvalidPlan(plan));
        }

        let profile = self
            .profiles
            .find_by_id(user_id.0)
            .await?
            .ok_or(BillingError::ProfileNotFound)?;

        let customer_id = match profile.stripe_customer_id {
            Some(id) => id,
            None => {
                let id = self
                    .provider
                    .create_customer(user_id, profile.email.as_deref())
                    .await?;
                self.profiles.update_stripe_customer_id(user_id.0, &id).await?;
                info!(user_id = %user_id, customer_id = %id, "Created Stripe customer");
                id
            }
        };

        self.provider
            .create_checkout_session(
                &customer_id,
                user_id,
                plan,
                success_url.unwrap_or(&self.config.default_success_url),
                cancel_url.unwrap_or(&self.config.default_cancel_url),
            )
            .await
    }

    /// Open the Stripe customer portal
    #[instrument(skip(self, return_url))]
    pub async fn create_portal_session(
        &self,
        user_id: &UserId,
        return_url: Option<&str>,
    ) -> Result<PortalSession, BillingError> {
        let profile = self
            .profiles
            .find_by_id(user_id.0)
            .await?
            .ok_or(BillingError::ProfileNotFound)?;

        let customer_id = profile
            .stripe_customer_id
            .ok_or(BillingError::CustomerNotFound)?;

        let url = self
            .provider
            .create_portal_session(
                &customer_id,
                return_url.unwrap_or(&self.config.default_return_url),
            )
            .await?;

        Ok(PortalSession { url })
    }

    /// Verify, deduplicate and apply a Stripe webhook delivery
    #[instrument(skip(self, payload, signature))]
    pub async fn process_webhook(
        &self,
        payload: &[u8],
        signature: &str,
    ) -> Result<WebhookOutcome, BillingError> {
        let event = self.webhooks.verify_and_parse(payload, signature)?;
        self.apply_event(event).await
    }

    /// Apply an already verified event
    #[instrument(skip(self, event), fields(event_id = %event.id, event_type = %event.event_type.as_str()))]
    pub async fn apply_event(&self, event: WebhookEvent) -> Result<WebhookOutcome, BillingError> {
        if self.events.exists(&event.id).await? {
            info!("Duplicate webhook event, skipping");
            return Ok(self.finish(&event, WebhookOutcome::Duplicate));
        }

        let user = match &event.data {
            WebhookEventData::CheckoutSession(session) => self.on_checkout_completed(session).await?,
            WebhookEventData::Subscription(sub) => match event.event_type {
                WebhookEventType::CustomerSubscriptionDeleted => {
                    self.on_subscription_deleted(sub).await?
                }
                _ => self.on_subscription_changed(sub).await?,
            },
            WebhookEventData::Invoice(invoice) => match event.event_type {
                WebhookEventType::InvoicePaymentFailed => self.on_payment_failed(invoice).await?,
                _ => {
                    return Ok(self.finish(
                        &event,
                        WebhookOutcome::Ignored {
                            reason: "invoice paid is informational".to_string(),
                        },
                    ))
                }
            },
            WebhookEventData::Raw => {
                return Ok(self.finish(
                    &event,
                    WebhookOutcome::Ignored {
                        reason: format!("unhandled event type {}", event.event_type.as_str()),
                    },
                ))
            }
        };

        let recorded = self
            .events
            .record(CreateSubscriptionEvent {
                id: Uuid::new_v4(),
                user_id: user.map(|u| u.0),
                event_type: event.event_type.as_str().to_string(),
                stripe_event_id: event.id.clone(),
                event_data: event.object.clone(),
            })
            .await?;

        let outcome = match (recorded, user) {
            (false, _) => WebhookOutcome::Duplicate,
            (true, Some(user_id)) => WebhookOutcome::Applied { user_id },
            (true, None) => WebhookOutcome::Ignored {
                reason: "no profile for customer".to_string(),
            },
        };

        Ok(self.finish(&event, outcome))
    }

    async fn on_checkout_completed(
        &self,
        session: &CheckoutSessionData,
    ) -> Result<Option<UserId>, BillingError> {
        let from_metadata = session
            .user_id
            .as_deref()
            .and_then(|id| UserId::parse(id).ok());

        let user_id = match (from_metadata, session.customer_id.as_deref()) {
            (Some(user_id), _) => Some(user_id),
            (None, Some(customer_id)) => self
                .profiles
                .find_by_stripe_customer_id(customer_id)
                .await?
                .map(|p| p.user_id()),
            (None, None) => None,
        };

        let Some(user_id) = user_id else {
            warn!(session_id = %session.session_id, "Checkout session has no resolvable user");
            return Ok(None);
        };

        if self.profiles.find_by_id(user_id.0).await?.is_none() {
            warn!(user_id = %user_id, "Checkout completed for unknown profile");
            return Ok(None);
        }

        if let Some(customer_id) = session.customer_id.as_deref() {
            self.profiles
                .update_stripe_customer_id(user_id.0, customer_id)
                .await?;
        }

        info!(user_id = %user_id, "Checkout completed, waiting for subscription event");
        Ok(Some(user_id))
    }

    async fn on_subscription_changed(
        &self,
        sub: &SubscriptionData,
    ) -> Result<Option<UserId>, BillingError> {
        let Some(profile) = self.profile_for_customer(&sub.customer_id).await? else {
            return Ok(None);
        };

        let status = match sub.status.parse::<SubscriptionStatus>() {
            Ok(status) => status.as_str().to_string(),
            Err(_) => {
                warn!(status = %sub.status, "Unrecognized Stripe subscription status");
                sub.status.clone()
            }
        };
        let plan = self.config.plan_for_price(sub.price_id.as_deref());

        self.profiles
            .apply_billing_update(
                profile.id,
                BillingUpdate {
                    plan: plan.as_str().to_string(),
                    status,
                    period_end: sub.period_end,
                    cycle_start: sub.period_start,
                },
            )
            .await?;

        info!(
            user_id = %profile.id,
            subscription_id = %sub.subscription_id,
            plan = %plan,
            cancel_at_period_end = sub.cancel_at_period_end,
            "Subscription updated"
        );
        Ok(Some(profile.user_id()))
    }

    async fn on_subscription_deleted(
        &self,
        sub: &SubscriptionData,
    ) -> Result<Option<UserId>, BillingError> {
        let Some(profile) = self.profile_for_customer(&sub.customer_id).await? else {
            return Ok(None);
        };

        self.profiles
            .apply_billing_update(
                profile.id,
                BillingUpdate {
                    plan: Plan::Free.as_str().to_string(),
                    status: SubscriptionStatus::Free.as_str().to_string(),
                    period_end: None,
                    cycle_start: None,
                },
            )
            .await?;

        info!(user_id = %profile.id, "Subscription deleted, reverted to free plan");
        Ok(Some(profile.user_id()))
    }

    async fn on_payment_failed(
        &self,
        invoice: &InvoiceData,
    ) -> Result<Option<UserId>, BillingError> {
        let Some(profile) = self.profile_for_customer(&invoice.customer_id).await? else {
            return Ok(None);
        };

        self.profiles
            .apply_billing_update(
                profile.id,
                BillingUpdate {
                    plan: profile.subscription_plan.clone(),
                    status: SubscriptionStatus::PastDue.as_str().to_string(),
                    period_end: profile.subscription_current_period_end,
                    cycle_start: None,
                },
            )
            .await?;

        warn!(user_id = %profile.id, invoice_id = %invoice.invoice_id, "Payment failed");
        Ok(Some(profile.user_id()))
    }

    async fn profile_for_customer(
        &self,
        customer_id: &str,
    ) -> Result<Option<ProfileRow>, BillingError> {
        let profile = self.profiles.find_by_stripe_customer_id(customer_id).await?;
        if profile.is_none() {
            warn!(customer_id = %customer_id, "No profile found for Stripe customer");
        }
        Ok(profile)
    }

    fn finish(&self, event: &WebhookEvent, outcome: WebhookOutcome) -> WebhookOutcome {
        metrics::counter!(
            "recap_webhooks_processed_total",
            "event_type" => event.event_type.as_str().to_string(),
            "outcome" => outcome.label()
        )
        .increment(1);
        outcome
    }
}

impl<P: ProfileRepository + ?Sized, E: SubscriptionEventRepository + ?Sized> std::fmt::Debug
    for BillingService<P, E>
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BillingService").finish_non_exhaustive()
    }
}
