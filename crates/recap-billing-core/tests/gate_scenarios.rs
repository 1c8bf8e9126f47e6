//! Usage gate behaviour against the in-memory profile repository

mod common;

use std::sync::Arc;
use std::time::Duration;

use chrono::Duration as ChronoDuration;
use common::{active_profile, at, free_profile};
use recap_billing_core::{FixedClock, GateError, UsageGate};
use recap_db::memory::MemoryProfileRepository;
use recap_db::ProfileRow;
use recap_types::{Plan, QuotaTable, UserId};

#[derive(Debug, thiserror::Error)]
#[error("model unavailable")]
struct ModelUnavailable;

struct Harness {
    repo: Arc<MemoryProfileRepository>,
    clock: Arc<FixedClock>,
    gate: UsageGate<MemoryProfileRepository>,
}

impl Harness {
    fn new(now: chrono::DateTime<chrono::Utc>) -> Self {
        Self::with_quotas(now, QuotaTable::default())
    }

    fn with_quotas(now: chrono::DateTime<chrono::Utc>, quotas: QuotaTable) -> Self {
        let repo = Arc::new(MemoryProfileRepository::new());
        let clock = Arc::new(FixedClock::new(now));
        let gate = UsageGate::new(Arc::clone(&repo), quotas).with_clock(clock.clone());
        Self { repo, clock, gate }
    }

    fn add(&self, profile: ProfileRow) -> UserId {
        let id = profile.user_id();
        self.repo.insert(profile);
        id
    }

    fn row(&self, user: &UserId) -> ProfileRow {
        self.repo.get(user.0).unwrap()
    }

    async fn succeed(&self, user: &UserId) -> Result<&'static str, GateError> {
        self.gate
            .run_guarded(user, || async { Ok::<_, ModelUnavailable>("summary") })
            .await
    }

    async fn fail(&self, user: &UserId) -> Result<&'static str, GateError> {
        self.gate
            .run_guarded(user, || async { Err::<&'static str, _>(ModelUnavailable) })
            .await
    }
}

// ============================================================================
// Calendar windows
// ============================================================================

#[tokio::test]
async fn test_free_at_limit_in_current_month_is_denied_without_mutation() {
    let h = Harness::new(at(2025, 3, 20, 10, 0, 0));
    let start = at(2025, 3, 1, 0, 0, 0);
    let user = h.add(free_profile(5, start));

    for _ in 0..2 {
        let err = h.succeed(&user).await.unwrap_err();
        let denial = err.denial().cloned().unwrap();
        assert_eq!(denial.limit, 5);
        assert_eq!(denial.used, 5);
        assert_eq!(denial.resets_at, at(2025, 4, 1, 0, 0, 0));
        assert!(err.to_string().contains("Upgrade"));
    }

    let row = h.row(&user);
    assert_eq!(row.summaries_used_this_period, Some(5));
    assert_eq!(row.period_start, Some(start));
}

#[tokio::test]
async fn test_free_at_limit_from_last_month_resets_then_counts_one() {
    let now = at(2025, 4, 2, 8, 30, 0);
    let h = Harness::new(now);
    let user = h.add(free_profile(5, at(2025, 3, 10, 0, 0, 0)));

    assert_eq!(h.succeed(&user).await.unwrap(), "summary");

    let row = h.row(&user);
    assert_eq!(row.summaries_used_this_period, Some(1));
    assert_eq!(row.period_start, Some(now));
}

#[tokio::test]
async fn test_reset_is_persisted_even_when_then_denied() {
    let now = at(2025, 4, 2, 0, 0, 0);
    let h = Harness::with_quotas(now, QuotaTable::default().with_limit(Plan::Free, 0));
    let user = h.add(free_profile(3, at(2025, 3, 2, 0, 0, 0)));

    assert!(matches!(h.succeed(&user).await, Err(GateError::QuotaExceeded(_))));

    let row = h.row(&user);
    assert_eq!(row.summaries_used_this_period, Some(0));
    assert_eq!(row.period_start, Some(now));
}

#[tokio::test]
async fn test_reset_applies_once_within_new_window() {
    let h = Harness::new(at(2025, 4, 2, 0, 0, 0));
    let user = h.add(free_profile(4, at(2025, 3, 2, 0, 0, 0)));

    h.succeed(&user).await.unwrap();
    h.clock.advance(ChronoDuration::hours(1));
    h.succeed(&user).await.unwrap();

    let row = h.row(&user);
    assert_eq!(row.summaries_used_this_period, Some(2));
    assert_eq!(row.period_start, Some(at(2025, 4, 2, 0, 0, 0)));
}

// ============================================================================
// Paid windows
// ============================================================================

#[tokio::test]
async fn test_individual_last_slot_then_denied() {
    let end = at(2025, 4, 15, 12, 0, 0);
    let h = Harness::new(at(2025, 4, 1, 0, 0, 0));
    let user = h.add(active_profile(29, at(2025, 3, 15, 12, 0, 0), Some(end)));

    h.succeed(&user).await.unwrap();
    assert_eq!(h.row(&user).summaries_used_this_period, Some(30));

    let err = h.succeed(&user).await.unwrap_err();
    let denial = err.denial().unwrap();
    assert_eq!(denial.limit, 30);
    assert_eq!(denial.resets_at, end);
    assert_eq!(denial.upgrade_limit, None);
    assert!(err.to_string().contains("billing period"));
    assert!(err.to_string().contains("April 15, 2025"));
}

#[tokio::test]
async fn test_individual_past_period_end_resets() {
    let end = at(2025, 4, 15, 12, 0, 0);
    let now = end + ChronoDuration::seconds(1);
    let h = Harness::new(now);
    let user = h.add(active_profile(30, at(2025, 3, 15, 12, 0, 0), Some(end)));

    let snapshot = h.gate.check(&user).await.unwrap();
    assert_eq!(snapshot.used, 0);
    assert_eq!(snapshot.remaining, 30);

    let row = h.row(&user);
    assert_eq!(row.summaries_used_this_period, Some(0));
    assert_eq!(row.period_start, Some(now));
}

#[tokio::test]
async fn test_individual_exactly_at_period_end_does_not_reset() {
    let end = at(2025, 4, 15, 12, 0, 0);
    let h = Harness::new(end);
    let user = h.add(active_profile(30, at(2025, 3, 15, 12, 0, 0), Some(end)));

    assert!(matches!(h.succeed(&user).await, Err(GateError::QuotaExceeded(_))));
    assert_eq!(h.row(&user).summaries_used_this_period, Some(30));
}

#[tokio::test]
async fn test_stale_period_end_does_not_reset_twice() {
    let end = at(2025, 4, 15, 12, 0, 0);
    let h = Harness::new(end + ChronoDuration::minutes(5));
    let user = h.add(active_profile(30, at(2025, 3, 15, 12, 0, 0), Some(end)));

    h.succeed(&user).await.unwrap();
    h.clock.advance(ChronoDuration::minutes(5));
    h.succeed(&user).await.unwrap();

    assert_eq!(h.row(&user).summaries_used_this_period, Some(2));
}

#[tokio::test]
async fn test_past_due_uses_calendar_window() {
    let h = Harness::new(at(2025, 4, 20, 0, 0, 0));
    let user = h.add(common::profile(
        "individual",
        "past_due",
        30,
        at(2025, 4, 1, 0, 0, 0),
        Some(at(2025, 4, 10, 0, 0, 0)),
    ));

    let err = h.succeed(&user).await.unwrap_err();
    let denial = err.denial().unwrap();
    assert!(!denial.is_active);
    assert_eq!(denial.resets_at, at(2025, 5, 1, 0, 0, 0));
    assert!(err.to_string().contains("this month"));
}

#[tokio::test]
async fn test_missing_window_start_is_recorded_and_rolls_over() {
    let h = Harness::new(at(2025, 3, 10, 9, 0, 0));
    let mut row = free_profile(0, at(2025, 3, 1, 0, 0, 0));
    row.period_start = None;
    let user = h.add(row);

    for _ in 0..5 {
        h.succeed(&user).await.unwrap();
    }
    let row = h.row(&user);
    assert_eq!(row.period_start, Some(at(2025, 3, 10, 9, 0, 0)));
    assert_eq!(row.summaries_used_this_period, Some(5));
    assert!(h.succeed(&user).await.unwrap_err().denial().is_some());

    for (month, year) in [(4, 2025), (9, 2025), (3, 2026)] {
        let now = at(year, month, 15, 12, 0, 0);
        h.clock.set(now);
        h.succeed(&user).await.unwrap();

        let row = h.row(&user);
        assert_eq!(row.period_start, Some(now));
        assert_eq!(row.summaries_used_this_period, Some(1));
    }
}

#[tokio::test]
async fn test_missing_window_start_keeps_usage() {
    let h = Harness::new(at(2025, 3, 10, 9, 0, 0));
    let mut row = free_profile(3, at(2025, 3, 1, 0, 0, 0));
    row.period_start = None;
    let user = h.add(row);

    let snapshot = h.gate.check(&user).await.unwrap();
    assert_eq!(snapshot.used, 3);
    assert_eq!(snapshot.period_start, at(2025, 3, 10, 9, 0, 0));
    assert_eq!(h.row(&user).period_start, Some(at(2025, 3, 10, 9, 0, 0)));
}

// ============================================================================
// Guarded action outcome
// ============================================================================

#[tokio::test]
async fn test_failed_action_consumes_nothing() {
    let h = Harness::new(at(2025, 3, 20, 0, 0, 0));
    let user = h.add(free_profile(2, at(2025, 3, 1, 0, 0, 0)));

    let err = h.fail(&user).await.unwrap_err();
    assert!(matches!(err, GateError::GuardedActionFailed(_)));
    assert_eq!(h.row(&user).summaries_used_this_period, Some(2));
}

#[tokio::test]
async fn test_dropped_permit_releases_slot() {
    let h = Harness::new(at(2025, 3, 20, 0, 0, 0));
    let user = h.add(free_profile(1, at(2025, 3, 1, 0, 0, 0)));

    let permit = h.gate.authorize(&user).await.unwrap();
    assert_eq!(permit.used(), 2);
    drop(permit);

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(h.row(&user).summaries_used_this_period, Some(1));
}

#[tokio::test]
async fn test_committed_permit_keeps_slot() {
    let h = Harness::new(at(2025, 3, 20, 0, 0, 0));
    let user = h.add(free_profile(1, at(2025, 3, 1, 0, 0, 0)));

    let permit = h.gate.authorize(&user).await.unwrap();
    assert_eq!(permit.commit().await.unwrap(), 2);

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(h.row(&user).summaries_used_this_period, Some(2));
}

#[tokio::test]
async fn test_commit_after_rollover_counts_in_new_window() {
    let h = Harness::new(at(2025, 3, 31, 23, 59, 0));
    let user = h.add(free_profile(4, at(2025, 3, 1, 0, 0, 0)));

    let permit = h.gate.authorize(&user).await.unwrap();
    assert_eq!(permit.used(), 5);

    // Another request rolls the window over while the first is in flight
    h.clock.set(at(2025, 4, 1, 0, 1, 0));
    h.succeed(&user).await.unwrap();
    assert_eq!(h.row(&user).summaries_used_this_period, Some(1));

    assert_eq!(permit.commit().await.unwrap(), 2);
    let row = h.row(&user);
    assert_eq!(row.summaries_used_this_period, Some(2));
    assert_eq!(row.period_start, Some(at(2025, 4, 1, 0, 1, 0)));
}

#[tokio::test]
async fn test_commit_after_rollover_respects_new_limit() {
    let h = Harness::with_quotas(
        at(2025, 3, 31, 23, 59, 0),
        QuotaTable::default().with_limit(Plan::Free, 1),
    );
    let user = h.add(free_profile(0, at(2025, 3, 1, 0, 0, 0)));

    let permit = h.gate.authorize(&user).await.unwrap();

    h.clock.set(at(2025, 4, 1, 0, 1, 0));
    h.succeed(&user).await.unwrap();

    assert_eq!(permit.commit().await.unwrap(), 1);
    assert_eq!(h.row(&user).summaries_used_this_period, Some(1));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_generations_never_exceed_quota() {
    let h = Arc::new(Harness::new(at(2025, 3, 20, 0, 0, 0)));
    let user = h.add(free_profile(0, at(2025, 3, 1, 0, 0, 0)));

    let tasks: Vec<_> = (0..25)
        .map(|_| {
            let h = Arc::clone(&h);
            tokio::spawn(async move {
                h.gate
                    .run_guarded(&user, || async {
                        tokio::time::sleep(Duration::from_millis(5)).await;
                        Ok::<_, ModelUnavailable>(())
                    })
                    .await
                    .is_ok()
            })
        })
        .collect();

    let mut succeeded = 0;
    for task in tasks {
        if task.await.unwrap() {
            succeeded += 1;
        }
    }

    assert_eq!(succeeded, 5);
    assert_eq!(h.row(&user).summaries_used_this_period, Some(5));
}

// ============================================================================
// Lookup failures
// ============================================================================

#[tokio::test]
async fn test_missing_profile_is_lookup_failure() {
    let h = Harness::new(at(2025, 3, 20, 0, 0, 0));
    let err = h.succeed(&UserId::new()).await.unwrap_err();
    assert!(matches!(err, GateError::SubscriptionLookupFailed(_)));
}

#[tokio::test]
async fn test_unreachable_store_is_lookup_failure() {
    let h = Harness::new(at(2025, 3, 20, 0, 0, 0));
    let user = h.add(free_profile(0, at(2025, 3, 1, 0, 0, 0)));
    h.repo.set_unavailable(true);

    let err = h.succeed(&user).await.unwrap_err();
    assert!(matches!(err, GateError::SubscriptionLookupFailed(_)));
    assert!(err.denial().is_none());
}

#[tokio::test]
async fn test_check_does_not_consume() {
    let h = Harness::new(at(2025, 3, 20, 0, 0, 0));
    let user = h.add(free_profile(3, at(2025, 3, 1, 0, 0, 0)));

    let snapshot = h.gate.check(&user).await.unwrap();
    assert_eq!(snapshot.plan, Plan::Free);
    assert_eq!(snapshot.used, 3);
    assert_eq!(snapshot.remaining, 2);
    assert_eq!(snapshot.resets_at, at(2025, 4, 1, 0, 0, 0));
    assert_eq!(h.row(&user).summaries_used_this_period, Some(3));
}
