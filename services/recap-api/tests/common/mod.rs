//! Common test utilities for recap-api router tests
#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::{DateTime, TimeZone, Utc};
use hmac::{Hmac, Mac};
use recap_api::{build_router, AppState};
use recap_billing_core::{
    BillingConfig, BillingError, BillingService, FixedClock, PaymentProvider, UsageGate,
};
use recap_db::memory::{
    MemoryMessageRepository, MemoryProfileRepository, MemorySubscriptionEventRepository,
    MemorySummaryRepository,
};
use recap_db::{ProfileRepository, ProfileRow, SubscriptionEventRepository};
use recap_llm::{Generation, GenerationRequest, LlmError, TextGenerator};
use recap_types::{CheckoutSession, Plan, QuotaTable, UserId};
use sha2::Sha256;
use tower::ServiceExt;
use uuid::Uuid;

pub const WEBHOOK_SECRET: &str = "whsec_router_tests";

pub fn at(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, min, s).unwrap()
}

/// Generator returning canned text, or failing on demand
#[derive(Default)]
pub struct StubGenerator {
    pub calls: AtomicUsize,
    pub fail: AtomicBool,
    pub text: Mutex<Option<String>>,
}

impl StubGenerator {
    pub fn set_text(&self, text: impl Into<String>) {
        *self.text.lock().unwrap() = Some(text.into());
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TextGenerator for StubGenerator {
    async fn generate(&self, request: GenerationRequest) -> Result<Generation, LlmError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail.load(Ordering::SeqCst) {
            return Err(LlmError::Api {
                status: 500,
                message: "upstream exploded".to_string(),
            });
        }
        let text = self
            .text
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| format!("Draft #{call} ({} tokens max)", request.max_tokens));
        Ok(Generation {
            text,
            model: "stub-model".to_string(),
            usage: None,
        })
    }
}

/// Provider that never talks to Stripe
pub struct StubProvider;

#[async_trait]
impl PaymentProvider for StubProvider {
    async fn create_customer(
        &self,
        _user_id: &UserId,
        _email: Option<&str>,
    ) -> Result<String, BillingError> {
        Ok("cus_router".to_string())
    }

    async fn create_checkout_session(
        &self,
        customer_id: &str,
        _user_id: &UserId,
        plan: Plan,
        success_url: &str,
        _cancel_url: &str,
    ) -> Result<CheckoutSession, BillingError> {
        Ok(CheckoutSession {
            session_id: format!("cs_{customer_id}_{plan}"),
            url: format!("https://checkout.stripe.test/?next={success_url}"),
        })
    }

    async fn create_portal_session(
        &self,
        customer_id: &str,
        return_url: &str,
    ) -> Result<String, BillingError> {
        Ok(format!("https://billing.stripe.test/{customer_id}?return={return_url}"))
    }
}

/// Router over in-memory stores with handles to inspect them
pub struct TestApp {
    pub router: Router,
    pub profiles: Arc<MemoryProfileRepository>,
    pub summaries: Arc<MemorySummaryRepository>,
    pub messages: Arc<MemoryMessageRepository>,
    pub generator: Arc<StubGenerator>,
    pub clock: Arc<FixedClock>,
}

impl TestApp {
    /// App with default quotas (free 5, individual 30) and the clock at `now`
    pub fn new(now: DateTime<Utc>) -> Self {
        Self::with_quotas(now, QuotaTable::default())
    }

    pub fn with_quotas(now: DateTime<Utc>, quotas: QuotaTable) -> Self {
        let profiles = Arc::new(MemoryProfileRepository::new());
        let events = Arc::new(MemorySubscriptionEventRepository::new());
        let summaries = Arc::new(MemorySummaryRepository::new());
        let messages = Arc::new(MemoryMessageRepository::new());
        let generator = Arc::new(StubGenerator::default());
        let clock = Arc::new(FixedClock::new(now));

        let profile_store: Arc<dyn ProfileRepository> = profiles.clone();
        let event_store: Arc<dyn SubscriptionEventRepository> = events;

        let gate = UsageGate::new(Arc::clone(&profile_store), quotas).with_clock(clock.clone());
        let config = BillingConfig::new("sk_test", WEBHOOK_SECRET)
            .with_price(Plan::Individual, "price_ind");
        let billing = BillingService::new(
            profile_store,
            event_store,
            Arc::new(StubProvider),
            config,
        );

        let state = AppState::new(
            gate,
            billing,
            summaries.clone(),
            messages.clone(),
            generator.clone(),
        );

        Self {
            router: build_router(state, None),
            profiles,
            summaries,
            messages,
            generator,
            clock,
        }
    }

    /// Insert a free-plan profile and return its user ID
    pub fn free_user(&self, used: i32, period_start: DateTime<Utc>) -> UserId {
        let id = Uuid::new_v4();
        self.profiles
            .insert(MemoryProfileRepository::free_profile(id, used, period_start));
        UserId(id)
    }

    /// Insert an active individual-plan profile and return its user ID
    pub fn paid_user(
        &self,
        used: i32,
        period_start: DateTime<Utc>,
        period_end: DateTime<Utc>,
    ) -> UserId {
        let id = Uuid::new_v4();
        let mut row = MemoryProfileRepository::free_profile(id, used, period_start);
        row.subscription_plan = "individual".to_string();
        row.subscription_status = "active".to_string();
        row.subscription_current_period_end = Some(period_end);
        self.profiles.insert(row);
        UserId(id)
    }

    pub fn profile(&self, user_id: UserId) -> ProfileRow {
        self.profiles.get(user_id.0).expect("profile exists")
    }

    pub fn usage(&self, user_id: UserId) -> i32 {
        self.profile(user_id).summaries_used_this_period.unwrap_or(0)
    }

    pub async fn post(&self, uri: &str, body: serde_json::Value) -> (StatusCode, serde_json::Value) {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap();
        self.send(request).await
    }

    pub async fn patch(&self, uri: &str, body: serde_json::Value) -> (StatusCode, serde_json::Value) {
        let request = Request::builder()
            .method("PATCH")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap();
        self.send(request).await
    }

    pub async fn delete(&self, uri: &str) -> (StatusCode, serde_json::Value) {
        let request = Request::builder()
            .method("DELETE")
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        self.send(request).await
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, serde_json::Value) {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        self.send(request).await
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null)
        };
        (status, json)
    }
}

/// Stripe `t=...,v1=...` signature header for a payload
pub fn sign(payload: &[u8], secret: &str, timestamp: i64) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(format!("{timestamp}.").as_bytes());
    mac.update(payload);
    format!("t={timestamp},v1={}", hex::encode(mac.finalize().into_bytes()))
}

/// Request body for a summary covering the first week of March 2025
pub fn summary_request(user_id: UserId) -> serde_json::Value {
    serde_json::json!({
        "user_id": user_id.to_string(),
        "context": {
            "project_name": "Recap",
            "audience_name": "Leadership",
            "period_start": "2025-03-01T00:00:00Z",
            "period_end": "2025-03-07T23:59:59Z",
            "notes": [
                { "content": "Shipped the usage gate", "created_at": "2025-03-03T10:00:00Z" }
            ],
            "commits": [
                {
                    "sha": "a1b2c3d",
                    "message": "Reserve quota atomically",
                    "author": "dev",
                    "committed_at": "2025-03-04T15:30:00Z"
                }
            ]
        }
    })
}
