//! Usage gate
//!
//! Decides, immediately before a quota-consuming action, whether the user's
//! counting window has rolled over and whether one more action fits in the
//! plan's quota.
//!
//! Authorization reserves the slot with an atomic conditional increment, so
//! concurrent requests can never push usage past the limit. The reservation
//! is handed out as a [`UsagePermit`]: committing it keeps the increment,
//! releasing it (or dropping it unsettled) gives the slot back.
//!
//! A profile stored without a window start gets `now` persisted as its start
//! on first contact, so the calendar rule has a month to compare against.

use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use recap_db::ProfileRepository;
use recap_types::{Plan, QuotaTable, SubscriptionState, UserId};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::clock::{Clock, SystemClock};
use crate::error::{GateError, QuotaDenial};
use crate::period;

/// Quota enforcement in front of summary generation
pub struct UsageGate<R: ProfileRepository + ?Sized + 'static> {
    repo: Arc<R>,
    quotas: QuotaTable,
    clock: Arc<dyn Clock>,
}

impl<R: ProfileRepository + ?Sized + 'static> Clone for UsageGate<R> {
    fn clone(&self) -> Self {
        Self {
            repo: Arc::clone(&self.repo),
            quotas: self.quotas,
            clock: Arc::clone(&self.clock),
        }
    }
}

/// Read-only view of a user's usage in the current window
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UsageSnapshot {
    pub plan: Plan,
    pub status: String,
    pub used: u32,
    pub limit: u32,
    pub remaining: u32,
    pub period_start: DateTime<Utc>,
    pub resets_at: DateTime<Utc>,
}

impl<R: ProfileRepository + ?Sized + 'static> UsageGate<R> {
    /// Create a gate reading the wall clock
    pub fn new(repo: Arc<R>, quotas: QuotaTable) -> Self {
        Self {
            repo,
            quotas,
            clock: Arc::new(SystemClock),
        }
    }

    /// Replace the time source
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Quota table in effect
    pub fn quotas(&self) -> &QuotaTable {
        &self.quotas
    }

    /// Current usage after applying any pending rollover
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn check(&self, user_id: &UserId) -> Result<UsageSnapshot, GateError> {
        let (state, now) = self.current_state(user_id).await?;
        let limit = self.quotas.limit_for(state.plan);

        Ok(UsageSnapshot {
            plan: state.plan,
            status: state.status.to_string(),
            used: state.usage_count,
            limit,
            remaining: limit.saturating_sub(state.usage_count),
            period_start: state.period_start_or(now),
            resets_at: period::resets_at(&state, now),
        })
    }

    /// Reserve one quota slot for a guarded action
    ///
    /// A rollover detected here is persisted before the quota check and
    /// stays in place even if the request is then denied.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn authorize(&self, user_id: &UserId) -> Result<UsagePermit<R>, GateError> {
        let (state, now) = self.current_state(user_id).await?;
        let limit = self.quotas.limit_for(state.plan);

        if state.usage_count >= limit {
            record_decision("denied");
            return Err(self.deny(&state, state.usage_count, limit, now));
        }

        let reserved = self
            .repo
            .try_reserve_usage(user_id.0, limit)
            .await
            .map_err(lookup_failed)?;

        match reserved {
            Some(used) => {
                record_decision("authorized");
                debug!(used, limit, "Usage slot reserved");
                Ok(UsagePermit {
                    repo: Arc::clone(&self.repo),
                    user_id: *user_id,
                    window: state.period_start,
                    used,
                    limit,
                    settled: false,
                })
            }
            None => {
                // Another request took the last slot between read and reserve
                record_decision("denied");
                Err(self.deny(&state, limit, limit, now))
            }
        }
    }

    /// Authorize, run `action`, then keep or give back the slot
    ///
    /// Initial generation and regeneration both go through here.
    pub async fn run_guarded<T, E, F, Fut>(
        &self,
        user_id: &UserId,
        action: F,
    ) -> Result<T, GateError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let permit = self.authorize(user_id).await?;

        match action().await {
            Ok(value) => {
                if let Err(e) = permit.commit().await {
                    warn!(user_id = %user_id, error = %e, "Failed to settle usage slot");
                }
                Ok(value)
            }
            Err(err) => {
                let err: Box<dyn std::error::Error + Send + Sync> = err.into();
                warn!(user_id = %user_id, error = %err, "Guarded action failed, releasing usage slot");
                if let Err(release_err) = permit.release().await {
                    warn!(user_id = %user_id, error = %release_err, "Failed to release usage slot");
                }
                Err(GateError::GuardedActionFailed(err))
            }
        }
    }

    /// Load the state and roll the window over if it has expired
    async fn current_state(
        &self,
        user_id: &UserId,
    ) -> Result<(SubscriptionState, DateTime<Utc>), GateError> {
        let mut state = self.load(user_id).await?;
        let now = self.clock.now();

        if state.period_start.is_none() {
            let applied = self
                .repo
                .init_period_start(user_id.0, now)
                .await
                .map_err(lookup_failed)?;

            if applied {
                debug!(user_id = %user_id, "Usage window start recorded");
                state.period_start = Some(now);
            } else {
                state = self.load(user_id).await?;
            }
        }

        if period::needs_reset(&state, now) {
            let applied = self
                .repo
                .reset_period(user_id.0, state.period_start, now)
                .await
                .map_err(lookup_failed)?;

            if applied {
                info!(
                    user_id = %user_id,
                    previous_usage = state.usage_count,
                    "Usage period rolled over"
                );
                record_decision("reset");
                state.usage_count = 0;
                state.period_start = Some(now);
            } else {
                // Someone else moved the window first; use what they wrote
                state = self.load(user_id).await?;
            }
        }

        Ok((state, now))
    }

    async fn load(&self, user_id: &UserId) -> Result<SubscriptionState, GateError> {
        let profile = self.repo.find_by_id(user_id.0).await.map_err(|e| {
            record_decision("lookup_failed");
            lookup_failed(e)
        })?;

        match profile {
            Some(profile) => Ok(profile.subscription_state()),
            None => {
                record_decision("lookup_failed");
                Err(GateError::SubscriptionLookupFailed(format!(
                    "no profile for user {user_id}"
                )))
            }
        }
    }

    fn deny(
        &self,
        state: &SubscriptionState,
        used: u32,
        limit: u32,
        now: DateTime<Utc>,
    ) -> GateError {
        let upgrade_limit =
            (state.plan == Plan::Free).then(|| self.quotas.limit_for(Plan::Individual));

        GateError::QuotaExceeded(QuotaDenial {
            plan: state.plan,
            is_active: state.status.is_active(),
            limit,
            used,
            resets_at: period::resets_at(state, now),
            upgrade_limit,
        })
    }
}

impl<R: ProfileRepository + ?Sized + 'static> std::fmt::Debug for UsageGate<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UsageGate")
            .field("quotas", &self.quotas)
            .finish()
    }
}

/// A reserved quota slot
///
/// Must be settled with [`commit`](Self::commit) or
/// [`release`](Self::release). Dropping it unsettled, e.g. when the request
/// future is cancelled, releases the slot on the current runtime.
#[must_use = "an unsettled permit gives its slot back when dropped"]
pub struct UsagePermit<R: ProfileRepository + ?Sized + 'static> {
    repo: Arc<R>,
    user_id: UserId,
    window: Option<DateTime<Utc>>,
    used: u32,
    limit: u32,
    settled: bool,
}

impl<R: ProfileRepository + ?Sized + 'static> UsagePermit<R> {
    /// Usage count including this reservation
    pub fn used(&self) -> u32 {
        self.used
    }

    /// Limit the reservation was made against
    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Keep the increment
    ///
    /// If the window was reset while the action ran, the reset wiped the
    /// reservation; the slot is then counted in the new window, still bounded
    /// by the limit.
    pub async fn commit(mut self) -> Result<u32, GateError> {
        self.settled = true;
        let carried = self
            .repo
            .carry_usage(self.user_id.0, self.window, self.limit)
            .await
            .map_err(lookup_failed)?;

        if let Some(used) = carried {
            debug!(user_id = %self.user_id, used, "Usage slot carried into new window");
            return Ok(used);
        }
        Ok(self.used)
    }

    /// Give the slot back
    ///
    /// Has no effect if the window was reset since the reservation.
    pub async fn release(mut self) -> Result<bool, GateError> {
        self.settled = true;
        self.repo
            .release_usage(self.user_id.0, self.window)
            .await
            .map_err(lookup_failed)
    }
}

impl<R: ProfileRepository + ?Sized + 'static> Drop for UsagePermit<R> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }

        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!(user_id = %self.user_id, "Usage permit dropped outside a runtime, slot not released");
            return;
        };

        let repo = Arc::clone(&self.repo);
        let user_id = self.user_id;
        let window = self.window;
        handle.spawn(async move {
            if let Err(e) = repo.release_usage(user_id.0, window).await {
                warn!(user_id = %user_id, error = %e, "Failed to release abandoned usage slot");
            } else {
                debug!(user_id = %user_id, "Released abandoned usage slot");
            }
        });
    }
}

impl<R: ProfileRepository + ?Sized + 'static> std::fmt::Debug for UsagePermit<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UsagePermit")
            .field("user_id", &self.user_id)
            .field("used", &self.used)
            .field("limit", &self.limit)
            .field("settled", &self.settled)
            .finish()
    }
}

fn lookup_failed(err: recap_db::DbError) -> GateError {
    GateError::SubscriptionLookupFailed(err.to_string())
}

fn record_decision(decision: &'static str) {
    metrics::counter!("recap_gate_decisions_total", "decision" => decision).increment(1);
}
