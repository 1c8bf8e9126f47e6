//! Subscription lifecycle driven through BillingService::process_webhook

mod common;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use common::{at, free_profile};
use hmac::{Hmac, Mac};
use recap_billing_core::{
    BillingConfig, BillingError, BillingService, PaymentProvider, WebhookOutcome,
};
use recap_db::memory::{MemoryProfileRepository, MemorySubscriptionEventRepository};
use recap_types::{CheckoutSession, Plan, UserId};
use sha2::Sha256;

const SECRET: &str = "whsec_lifecycle";

/// Provider that never talks to Stripe
struct StubProvider;

#[async_trait]
impl PaymentProvider for StubProvider {
    async fn create_customer(
        &self,
        _user_id: &UserId,
        _email: Option<&str>,
    ) -> Result<String, BillingError> {
        Ok("cus_new".to_string())
    }

    async fn create_checkout_session(
        &self,
        customer_id: &str,
        _user_id: &UserId,
        _plan: Plan,
        _success_url: &str,
        _cancel_url: &str,
    ) -> Result<CheckoutSession, BillingError> {
        Ok(CheckoutSession {
            session_id: format!("cs_{customer_id}"),
            url: "https://checkout.stripe.test/session".to_string(),
        })
    }

    async fn create_portal_session(
        &self,
        customer_id: &str,
        _return_url: &str,
    ) -> Result<String, BillingError> {
        Ok(format!("https://billing.stripe.test/{customer_id}"))
    }
}

struct Harness {
    profiles: Arc<MemoryProfileRepository>,
    events: Arc<MemorySubscriptionEventRepository>,
    billing: BillingService<MemoryProfileRepository, MemorySubscriptionEventRepository>,
}

impl Harness {
    fn new() -> Self {
        let profiles = Arc::new(MemoryProfileRepository::new());
        let events = Arc::new(MemorySubscriptionEventRepository::new());
        let config = BillingConfig::new("sk_test", SECRET).with_price(Plan::Individual, "price_ind");
        let billing = BillingService::new(
            Arc::clone(&profiles),
            Arc::clone(&events),
            Arc::new(StubProvider),
            config,
        );
        Self {
            profiles,
            events,
            billing,
        }
    }

    async fn deliver(&self, event: serde_json::Value) -> Result<WebhookOutcome, BillingError> {
        let payload = serde_json::to_vec(&event).unwrap();
        let ts = Utc::now().timestamp();
        let mut mac = Hmac::<Sha256>::new_from_slice(SECRET.as_bytes()).unwrap();
        mac.update(format!("{ts}.{}", std::str::from_utf8(&payload).unwrap()).as_bytes());
        let signature = format!("t={ts},v1={}", hex::encode(mac.finalize().into_bytes()));

        self.billing.process_webhook(&payload, &signature).await
    }
}

fn subscription_event(id: &str, kind: &str, customer: &str, start: i64, end: i64) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "type": kind,
        "created": start,
        "data": { "object": {
            "id": "sub_1",
            "customer": customer,
            "status": "active",
            "current_period_start": start,
            "current_period_end": end,
            "items": { "data": [ { "price": { "id": "price_ind" } } ] }
        } }
    })
}

#[tokio::test]
async fn test_checkout_links_customer_from_metadata() {
    let h = Harness::new();
    let profile = free_profile(0, at(2025, 3, 1, 0, 0, 0));
    let user_id = profile.user_id();
    h.profiles.insert(profile);

    let outcome = h
        .deliver(serde_json::json!({
            "id": "evt_checkout",
            "type": "checkout.session.completed",
            "created": 0,
            "data": { "object": {
                "id": "cs_1",
                "customer": "cus_abc",
                "subscription": "sub_1",
                "metadata": { "user_id": user_id.to_string() }
            } }
        }))
        .await
        .unwrap();

    assert_eq!(outcome, WebhookOutcome::Applied { user_id });
    assert_eq!(
        h.profiles.get(user_id.0).unwrap().stripe_customer_id.as_deref(),
        Some("cus_abc")
    );
    assert_eq!(h.events.get("evt_checkout").unwrap().user_id, Some(user_id.0));
}

#[tokio::test]
async fn test_subscription_created_starts_paid_window() {
    let h = Harness::new();
    let mut profile = free_profile(4, at(2025, 3, 1, 0, 0, 0));
    profile.stripe_customer_id = Some("cus_abc".to_string());
    let user_id = profile.user_id();
    h.profiles.insert(profile);

    let start = at(2025, 3, 10, 9, 0, 0);
    let end = at(2025, 4, 10, 9, 0, 0);
    h.deliver(subscription_event(
        "evt_created",
        "customer.subscription.created",
        "cus_abc",
        start.timestamp(),
        end.timestamp(),
    ))
    .await
    .unwrap();

    let row = h.profiles.get(user_id.0).unwrap();
    assert_eq!(row.subscription_plan, "individual");
    assert_eq!(row.subscription_status, "active");
    assert_eq!(row.subscription_current_period_end, Some(end));
    assert_eq!(row.period_start, Some(start));
    assert_eq!(row.summaries_used_this_period, Some(0));
}

#[tokio::test]
async fn test_renewal_after_gate_reset_keeps_usage() {
    let h = Harness::new();
    // The gate already rolled the window over five seconds after the old end
    let gate_reset_at = at(2025, 4, 10, 9, 0, 5);
    let mut profile = common::active_profile(3, gate_reset_at, Some(at(2025, 4, 10, 9, 0, 0)));
    profile.stripe_customer_id = Some("cus_abc".to_string());
    let user_id = profile.user_id();
    h.profiles.insert(profile);

    // Renewal cycle starts at the old end, before the gate's reset
    h.deliver(subscription_event(
        "evt_renewed",
        "customer.subscription.updated",
        "cus_abc",
        at(2025, 4, 10, 9, 0, 0).timestamp(),
        at(2025, 5, 10, 9, 0, 0).timestamp(),
    ))
    .await
    .unwrap();

    let row = h.profiles.get(user_id.0).unwrap();
    assert_eq!(row.summaries_used_this_period, Some(3));
    assert_eq!(row.period_start, Some(gate_reset_at));
    assert_eq!(row.subscription_current_period_end, Some(at(2025, 5, 10, 9, 0, 0)));
}

#[tokio::test]
async fn test_duplicate_event_is_ignored() {
    let h = Harness::new();
    let mut profile = free_profile(0, at(2025, 3, 1, 0, 0, 0));
    profile.stripe_customer_id = Some("cus_abc".to_string());
    h.profiles.insert(profile);

    let event = subscription_event(
        "evt_dup",
        "customer.subscription.updated",
        "cus_abc",
        at(2025, 3, 10, 0, 0, 0).timestamp(),
        at(2025, 4, 10, 0, 0, 0).timestamp(),
    );

    assert!(matches!(h.deliver(event.clone()).await.unwrap(), WebhookOutcome::Applied { .. }));
    assert_eq!(h.deliver(event).await.unwrap(), WebhookOutcome::Duplicate);
    assert_eq!(h.events.len(), 1);
}

#[tokio::test]
async fn test_deleted_reverts_to_free() {
    let h = Harness::new();
    let mut profile = common::active_profile(
        12,
        at(2025, 3, 10, 0, 0, 0),
        Some(at(2025, 4, 10, 0, 0, 0)),
    );
    profile.stripe_customer_id = Some("cus_abc".to_string());
    let user_id = profile.user_id();
    h.profiles.insert(profile);

    h.deliver(subscription_event(
        "evt_deleted",
        "customer.subscription.deleted",
        "cus_abc",
        at(2025, 3, 10, 0, 0, 0).timestamp(),
        at(2025, 4, 10, 0, 0, 0).timestamp(),
    ))
    .await
    .unwrap();

    let row = h.profiles.get(user_id.0).unwrap();
    assert_eq!(row.subscription_plan, "free");
    assert_eq!(row.subscription_status, "free");
    assert_eq!(row.subscription_current_period_end, None);
    assert_eq!(row.summaries_used_this_period, Some(12));
}

#[tokio::test]
async fn test_payment_failed_marks_past_due() {
    let h = Harness::new();
    let end = at(2025, 4, 10, 0, 0, 0);
    let mut profile = common::active_profile(1, at(2025, 3, 10, 0, 0, 0), Some(end));
    profile.stripe_customer_id = Some("cus_abc".to_string());
    let user_id = profile.user_id();
    h.profiles.insert(profile);

    h.deliver(serde_json::json!({
        "id": "evt_failed",
        "type": "invoice.payment_failed",
        "created": 0,
        "data": { "object": {
            "id": "in_1",
            "customer": "cus_abc",
            "subscription": "sub_1",
            "status": "open"
        } }
    }))
    .await
    .unwrap();

    let row = h.profiles.get(user_id.0).unwrap();
    assert_eq!(row.subscription_status, "past_due");
    assert_eq!(row.subscription_plan, "individual");
    assert_eq!(row.subscription_current_period_end, Some(end));
}

#[tokio::test]
async fn test_unknown_customer_is_acknowledged() {
    let h = Harness::new();
    let outcome = h
        .deliver(subscription_event(
            "evt_orphan",
            "customer.subscription.updated",
            "cus_missing",
            0,
            86_400,
        ))
        .await
        .unwrap();

    assert!(matches!(outcome, WebhookOutcome::Ignored { .. }));
}

#[tokio::test]
async fn test_bad_signature_is_rejected() {
    let h = Harness::new();
    let err = h
        .billing
        .process_webhook(b"{}", "t=1,v1=00")
        .await
        .unwrap_err();
    assert!(matches!(err, BillingError::WebhookError(_)));
}

#[tokio::test]
async fn test_checkout_creates_customer_once() {
    let h = Harness::new();
    let profile = free_profile(0, at(2025, 3, 1, 0, 0, 0));
    let user_id = profile.user_id();
    h.profiles.insert(profile);

    let session = h
        .billing
        .create_checkout(&user_id, Plan::Individual, None, None)
        .await
        .unwrap();
    assert_eq!(session.session_id, "cs_cus_new");
    assert_eq!(
        h.profiles.get(user_id.0).unwrap().stripe_customer_id.as_deref(),
        Some("cus_new")
    );

    let portal = h.billing.create_portal_session(&user_id, None).await.unwrap();
    assert_eq!(portal.url, "https://billing.stripe.test/cus_new");
}

#[tokio::test]
async fn test_free_plan_checkout_is_rejected() {
    let h = Harness::new();
    let err = h
        .billing
        .create_checkout(&UserId::new(), Plan::Free, None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, BillingError::InvalidPlan(Plan::Free)));
}

#[tokio::test]
async fn test_portal_requires_customer() {
    let h = Harness::new();
    let profile = free_profile(0, at(2025, 3, 1, 0, 0, 0));
    let user_id = profile.user_id();
    h.profiles.insert(profile);

    let err = h.billing.create_portal_session(&user_id, None).await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_ensure_profile_is_idempotent() {
    let h = Harness::new();
    let user_id = UserId::new();

    let first = h.billing.ensure_profile(&user_id, Some("a@b.test".into())).await.unwrap();
    let second = h.billing.ensure_profile(&user_id, None).await.unwrap();

    assert_eq!(first.subscription_plan, "free");
    assert_eq!(first.summaries_used_this_period, Some(0));
    assert_eq!(first.period_start, second.period_start);
}
