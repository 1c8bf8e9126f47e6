//! In-memory repository implementations
//!
//! Backed by `DashMap`. Conditional updates run under the map's entry lock,
//! so they are atomic in the same way the PostgreSQL statements are.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use sqlx::types::Json;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::models::{MessageRow, ProfileRow, SubscriptionEventRow, SummaryRow};
use crate::repo::*;

/// In-memory profile repository
#[derive(Default, Clone)]
pub struct MemoryProfileRepository {
    profiles: Arc<DashMap<Uuid, ProfileRow>>,
    unavailable: Arc<AtomicBool>,
}

impl MemoryProfileRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a profile row directly
    pub fn insert(&self, profile: ProfileRow) {
        self.profiles.insert(profile.id, profile);
    }

    /// Snapshot of a stored profile
    pub fn get(&self, id: Uuid) -> Option<ProfileRow> {
        self.profiles.get(&id).map(|r| r.value().clone())
    }

    /// Make every call fail as if the database were unreachable
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> DbResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(DbError::Sqlx(sqlx::Error::PoolTimedOut));
        }
        Ok(())
    }

    /// A free-plan profile row with the given usage, for tests
    pub fn free_profile(id: Uuid, used: i32, period_start: DateTime<Utc>) -> ProfileRow {
        ProfileRow {
            id,
            email: None,
            stripe_customer_id: None,
            subscription_plan: "free".to_string(),
            subscription_status: "free".to_string(),
            summaries_used_this_period: Some(used),
            period_start: Some(period_start),
            subscription_current_period_end: None,
            created_at: period_start,
            updated_at: period_start,
        }
    }
}

#[async_trait]
impl ProfileRepository for MemoryProfileRepository {
    async fn find_by_id(&self, id: Uuid) -> DbResult<Option<ProfileRow>> {
        self.check_available()?;
        Ok(self.get(id))
    }

    async fn find_by_stripe_customer_id(
        &self,
        customer_id: &str,
    ) -> DbResult<Option<ProfileRow>> {
        self.check_available()?;
        Ok(self
            .profiles
            .iter()
            .find(|r| r.stripe_customer_id.as_deref() == Some(customer_id))
            .map(|r| r.value().clone()))
    }

    async fn create(&self, profile: CreateProfile) -> DbResult<ProfileRow> {
        self.check_available()?;
        let row = self
            .profiles
            .entry(profile.id)
            .or_insert_with(|| ProfileRow {
                id: profile.id,
                email: profile.email.clone(),
                stripe_customer_id: None,
                subscription_plan: "free".to_string(),
                subscription_status: "free".to_string(),
                summaries_used_this_period: Some(0),
                period_start: Some(profile.period_start),
                subscription_current_period_end: None,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            });
        Ok(row.value().clone())
    }

    async fn update_stripe_customer_id(&self, id: Uuid, customer_id: &str) -> DbResult<()> {
        self.check_available()?;
        let mut row = self.profiles.get_mut(&id).ok_or(DbError::NotFound)?;
        row.stripe_customer_id = Some(customer_id.to_string());
        row.updated_at = Utc::now();
        Ok(())
    }

    async fn reset_period(
        &self,
        id: Uuid,
        observed_start: Option<DateTime<Utc>>,
        new_start: DateTime<Utc>,
    ) -> DbResult<bool> {
        self.check_available()?;
        let Some(mut row) = self.profiles.get_mut(&id) else {
            return Ok(false);
        };
        if row.period_start != observed_start {
            return Ok(false);
        }
        row.summaries_used_this_period = Some(0);
        row.period_start = Some(new_start);
        row.updated_at = Utc::now();
        Ok(true)
    }

    async fn init_period_start(&self, id: Uuid, start: DateTime<Utc>) -> DbResult<bool> {
        self.check_available()?;
        let Some(mut row) = self.profiles.get_mut(&id) else {
            return Ok(false);
        };
        if row.period_start.is_some() {
            return Ok(false);
        }
        row.period_start = Some(start);
        row.updated_at = Utc::now();
        Ok(true)
    }

    async fn try_reserve_usage(&self, id: Uuid, limit: u32) -> DbResult<Option<u32>> {
        self.check_available()?;
        let Some(mut row) = self.profiles.get_mut(&id) else {
            return Ok(None);
        };
        let used = row.summaries_used_this_period.unwrap_or(0);
        if i64::from(used) >= i64::from(limit) {
            return Ok(None);
        }
        row.summaries_used_this_period = Some(used + 1);
        row.updated_at = Utc::now();
        Ok(Some(u32::try_from(used + 1).unwrap_or(0)))
    }

    async fn release_usage(
        &self,
        id: Uuid,
        period_start: Option<DateTime<Utc>>,
    ) -> DbResult<bool> {
        self.check_available()?;
        let Some(mut row) = self.profiles.get_mut(&id) else {
            return Ok(false);
        };
        let used = row.summaries_used_this_period.unwrap_or(0);
        if used <= 0 || row.period_start != period_start {
            return Ok(false);
        }
        row.summaries_used_this_period = Some(used - 1);
        row.updated_at = Utc::now();
        Ok(true)
    }

    async fn carry_usage(
        &self,
        id: Uuid,
        reserved_window: Option<DateTime<Utc>>,
        limit: u32,
    ) -> DbResult<Option<u32>> {
        self.check_available()?;
        let Some(mut row) = self.profiles.get_mut(&id) else {
            return Ok(None);
        };
        let used = row.summaries_used_this_period.unwrap_or(0);
        if row.period_start == reserved_window || i64::from(used) >= i64::from(limit) {
            return Ok(None);
        }
        row.summaries_used_this_period = Some(used + 1);
        row.updated_at = Utc::now();
        Ok(Some(u32::try_from(used + 1).unwrap_or(0)))
    }

    async fn apply_billing_update(&self, id: Uuid, update: BillingUpdate) -> DbResult<()> {
        self.check_available()?;
        let mut row = self.profiles.get_mut(&id).ok_or(DbError::NotFound)?;
        row.subscription_plan = update.plan;
        row.subscription_status = update.status;
        row.subscription_current_period_end = update.period_end;
        if let Some(cycle_start) = update.cycle_start {
            if row.period_start.map_or(true, |start| cycle_start > start) {
                row.summaries_used_this_period = Some(0);
                row.period_start = Some(cycle_start);
            }
        }
        row.updated_at = Utc::now();
        Ok(())
    }
}

/// In-memory summary repository
#[derive(Default, Clone)]
pub struct MemorySummaryRepository {
    summaries: Arc<DashMap<Uuid, SummaryRow>>,
}

impl MemorySummaryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored summaries
    pub fn len(&self) -> usize {
        self.summaries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.summaries.is_empty()
    }
}

#[async_trait]
impl SummaryRepository for MemorySummaryRepository {
    async fn find_by_id(&self, id: Uuid) -> DbResult<Option<SummaryRow>> {
        Ok(self.summaries.get(&id).map(|r| r.value().clone()))
    }

    async fn find_by_user_id(&self, user_id: Uuid, limit: i64) -> DbResult<Vec<SummaryRow>> {
        let mut rows: Vec<SummaryRow> = self
            .summaries
            .iter()
            .filter(|r| r.user_id == user_id)
            .map(|r| r.value().clone())
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        rows.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(rows)
    }

    async fn create(&self, summary: CreateSummary) -> DbResult<SummaryRow> {
        let now = Utc::now();
        let row = SummaryRow {
            id: summary.id,
            user_id: summary.user_id,
            context: Json(summary.context),
            text: summary.text,
            created_at: now,
            updated_at: now,
        };
        self.summaries.insert(row.id, row.clone());
        Ok(row)
    }

    async fn update_text(&self, id: Uuid, text: &str) -> DbResult<SummaryRow> {
        let mut row = self.summaries.get_mut(&id).ok_or(DbError::NotFound)?;
        row.text = text.to_string();
        row.updated_at = Utc::now();
        Ok(row.value().clone())
    }

    async fn delete(&self, id: Uuid) -> DbResult<bool> {
        Ok(self.summaries.remove(&id).is_some())
    }
}

/// In-memory message repository keyed by (summary, channel)
#[derive(Default, Clone)]
pub struct MemoryMessageRepository {
    messages: Arc<DashMap<(Uuid, String), MessageRow>>,
}

impl MemoryMessageRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored messages
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[async_trait]
impl MessageRepository for MemoryMessageRepository {
    async fn upsert(&self, message: UpsertMessage) -> DbResult<MessageRow> {
        let now = Utc::now();
        let mut entry = self
            .messages
            .entry((message.summary_id, message.channel.clone()))
            .or_insert_with(|| MessageRow {
                id: message.id,
                summary_id: message.summary_id,
                channel: message.channel.clone(),
                text: String::new(),
                created_at: now,
                updated_at: now,
            });
        entry.text = message.text;
        entry.updated_at = now;
        Ok(entry.value().clone())
    }

    async fn find_by_summary_id(&self, summary_id: Uuid) -> DbResult<Vec<MessageRow>> {
        let mut rows: Vec<MessageRow> = self
            .messages
            .iter()
            .filter(|r| r.summary_id == summary_id)
            .map(|r| r.value().clone())
            .collect();
        rows.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(rows)
    }

    async fn find_by_id(&self, id: Uuid) -> DbResult<Option<MessageRow>> {
        Ok(self
            .messages
            .iter()
            .find(|r| r.id == id)
            .map(|r| r.value().clone()))
    }

    async fn delete(&self, id: Uuid) -> DbResult<bool> {
        let before = self.messages.len();
        self.messages.retain(|_, row| row.id != id);
        Ok(self.messages.len() < before)
    }

    async fn delete_by_summary_id(&self, summary_id: Uuid) -> DbResult<u64> {
        let before = self.messages.len();
        self.messages.retain(|(owner, _), _| *owner != summary_id);
        Ok(u64::try_from(before - self.messages.len()).unwrap_or(0))
    }
}

/// In-memory subscription event log
#[derive(Default, Clone)]
pub struct MemorySubscriptionEventRepository {
    events: Arc<DashMap<String, SubscriptionEventRow>>,
}

impl MemorySubscriptionEventRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of recorded events
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// A recorded event by provider event ID
    pub fn get(&self, stripe_event_id: &str) -> Option<SubscriptionEventRow> {
        self.events.get(stripe_event_id).map(|r| r.value().clone())
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

#[async_trait]
impl SubscriptionEventRepository for MemorySubscriptionEventRepository {
    async fn exists(&self, stripe_event_id: &str) -> DbResult<bool> {
        Ok(self.events.contains_key(stripe_event_id))
    }

    async fn record(&self, event: CreateSubscriptionEvent) -> DbResult<bool> {
        let mut inserted = false;
        self.events
            .entry(event.stripe_event_id.clone())
            .or_insert_with(|| {
                inserted = true;
                SubscriptionEventRow {
                    id: event.id,
                    user_id: event.user_id,
                    event_type: event.event_type,
                    stripe_event_id: event.stripe_event_id,
                    event_data: event.event_data,
                    created_at: Utc::now(),
                }
            });
        Ok(inserted)
    }
}
