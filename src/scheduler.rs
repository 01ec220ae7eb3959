//! Refresh scheduling
//!
//! Decides which users are stale enough to refresh and drives the
//! batched, bounded-concurrency refresh pass. Recently-active users
//! get tighter staleness thresholds so freshness follows the people
//! actually on the leaderboard, while the upstream source stays within
//! its rate budget.

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::storage::RefreshCandidate;
use crate::updater::{AuraUpdate, UpdateError};

/// Users refreshed concurrently within one batch
pub const DEFAULT_BATCH_SIZE: usize = 10;

/// Pause between batches
pub const DEFAULT_BATCH_DELAY_MS: u64 = 1000;

// ============================================================================
// STALENESS
// ============================================================================

/// Activity class by recency of the last contribution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityClass {
    /// No contribution on record
    Never,
    /// Contributed within the last 7 days
    Active,
    /// Contributed within the last 30 days
    SemiActive,
    /// Quiet for more than 30 days
    Inactive,
}

impl ActivityClass {
    pub fn classify(last_contribution: Option<NaiveDate>, today: NaiveDate) -> Self {
        match last_contribution {
            None => ActivityClass::Never,
            Some(date) => {
                let days = (today - date).num_days();
                if days <= 7 {
                    ActivityClass::Active
                } else if days <= 30 {
                    ActivityClass::SemiActive
                } else {
                    ActivityClass::Inactive
                }
            }
        }
    }

    /// Hours a refresh is allowed to age before the user is stale again
    pub fn staleness_threshold_hours(&self) -> i64 {
        match self {
            ActivityClass::Never => 24,
            ActivityClass::Active => 2,
            ActivityClass::SemiActive => 6,
            ActivityClass::Inactive => 24,
        }
    }
}

/// Whether a user's stored state is stale enough to refresh at `now`.
pub fn should_refresh(candidate: &RefreshCandidate, now: DateTime<Utc>) -> bool {
    let class = ActivityClass::classify(candidate.last_contribution_date, now.date_naive());
    match candidate.last_refreshed {
        None => true,
        Some(refreshed_at) => (now - refreshed_at).num_hours() >= class.staleness_threshold_hours(),
    }
}

/// Keep only the candidates due for a refresh.
pub fn select_stale(candidates: Vec<RefreshCandidate>, now: DateTime<Utc>) -> Vec<RefreshCandidate> {
    candidates
        .into_iter()
        .filter(|candidate| should_refresh(candidate, now))
        .collect()
}

// ============================================================================
// BATCH DRIVER
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct RefreshFailure {
    pub username: String,
    pub kind: String,
    pub message: String,
}

/// Aggregated outcome of one refresh pass
#[derive(Debug, Clone, Serialize)]
pub struct RefreshReport {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub errors: Vec<RefreshFailure>,
}

/// Run `refresh` over the candidates in fixed-size batches.
///
/// Each batch runs concurrently and completes in full before the next
/// starts, with `batch_delay` between batches (none after the last).
/// Per-user failures are collected into the report; they never abort
/// the batch.
pub async fn drive_batches<F, Fut>(
    candidates: Vec<RefreshCandidate>,
    batch_size: usize,
    batch_delay: Duration,
    mut refresh: F,
) -> RefreshReport
where
    F: FnMut(RefreshCandidate) -> Fut,
    Fut: Future<Output = Result<AuraUpdate, UpdateError>>,
{
    let mut report = RefreshReport {
        total: candidates.len(),
        successful: 0,
        failed: 0,
        errors: Vec::new(),
    };

    let batch_size = batch_size.max(1);
    let batch_count = candidates.len().div_ceil(batch_size);

    for (index, batch) in candidates.chunks(batch_size).enumerate() {
        if index > 0 {
            tokio::time::sleep(batch_delay).await;
        }

        let futures: Vec<Fut> = batch
            .iter()
            .map(|candidate| refresh(candidate.clone()))
            .collect();
        let results = futures::future::join_all(futures).await;

        for (candidate, result) in batch.iter().zip(results) {
            match result {
                Ok(update) => {
                    report.successful += 1;
                    debug!(
                        "Refreshed {} ({} aura)",
                        update.username, update.total_aura
                    );
                }
                Err(err) => {
                    warn!("Refresh failed for {}: {}", candidate.username, err);
                    report.failed += 1;
                    report.errors.push(RefreshFailure {
                        username: candidate.username.clone(),
                        kind: err.kind().to_string(),
                        message: err.to_string(),
                    });
                }
            }
        }

        info!(
            "Refresh batch {}/{} done ({} users)",
            index + 1,
            batch_count,
            batch.len()
        );
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aura::StreakState;
    use chrono::TimeZone;
    use std::sync::{Arc, Mutex};
    use uuid::Uuid;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn candidate(
        username: &str,
        last_contribution: Option<NaiveDate>,
        last_refreshed: Option<DateTime<Utc>>,
    ) -> RefreshCandidate {
        RefreshCandidate {
            user_id: Uuid::new_v4(),
            username: username.to_string(),
            last_contribution_date: last_contribution,
            last_refreshed,
        }
    }

    fn dummy_update(username: &str) -> AuraUpdate {
        AuraUpdate {
            user_id: Uuid::new_v4(),
            username: username.to_string(),
            total_aura: 0,
            contributions_count: 0,
            months: Vec::new(),
            streaks: StreakState::default(),
        }
    }

    #[test]
    fn classification_follows_recency() {
        let today = date(2024, 6, 30);
        assert_eq!(
            ActivityClass::classify(None, today),
            ActivityClass::Never
        );
        assert_eq!(
            ActivityClass::classify(Some(date(2024, 6, 30)), today),
            ActivityClass::Active
        );
        assert_eq!(
            ActivityClass::classify(Some(date(2024, 6, 23)), today),
            ActivityClass::Active
        );
        assert_eq!(
            ActivityClass::classify(Some(date(2024, 6, 22)), today),
            ActivityClass::SemiActive
        );
        assert_eq!(
            ActivityClass::classify(Some(date(2024, 5, 31)), today),
            ActivityClass::SemiActive
        );
        assert_eq!(
            ActivityClass::classify(Some(date(2024, 5, 30)), today),
            ActivityClass::Inactive
        );
    }

    #[test]
    fn thresholds_per_class() {
        assert_eq!(ActivityClass::Never.staleness_threshold_hours(), 24);
        assert_eq!(ActivityClass::Active.staleness_threshold_hours(), 2);
        assert_eq!(ActivityClass::SemiActive.staleness_threshold_hours(), 6);
        assert_eq!(ActivityClass::Inactive.staleness_threshold_hours(), 24);
    }

    #[test]
    fn never_refreshed_users_are_always_stale() {
        let now = Utc.with_ymd_and_hms(2024, 6, 30, 12, 0, 0).unwrap();
        assert!(should_refresh(&candidate("new", None, None), now));
    }

    #[test]
    fn active_users_go_stale_after_two_hours() {
        let now = Utc.with_ymd_and_hms(2024, 6, 30, 12, 0, 0).unwrap();
        let recent = candidate(
            "active",
            Some(date(2024, 6, 29)),
            Some(now - chrono::Duration::minutes(90)),
        );
        assert!(!should_refresh(&recent, now));

        let stale = candidate(
            "active",
            Some(date(2024, 6, 29)),
            Some(now - chrono::Duration::hours(3)),
        );
        assert!(should_refresh(&stale, now));
    }

    #[test]
    fn inactive_users_wait_a_full_day() {
        let now = Utc.with_ymd_and_hms(2024, 6, 30, 12, 0, 0).unwrap();
        let fresh_enough = candidate(
            "sleepy",
            Some(date(2024, 1, 1)),
            Some(now - chrono::Duration::hours(23)),
        );
        assert!(!should_refresh(&fresh_enough, now));

        let overdue = candidate(
            "sleepy",
            Some(date(2024, 1, 1)),
            Some(now - chrono::Duration::hours(25)),
        );
        assert!(should_refresh(&overdue, now));
    }

    #[test]
    fn select_stale_filters_in_place() {
        let now = Utc.with_ymd_and_hms(2024, 6, 30, 12, 0, 0).unwrap();
        let candidates = vec![
            candidate("due", None, None),
            candidate(
                "fresh",
                Some(date(2024, 6, 30)),
                Some(now - chrono::Duration::minutes(10)),
            ),
        ];

        let stale = select_stale(candidates, now);
        assert_eq!(stale.len(), 1);
        assert_eq!(stale[0].username, "due");
    }

    #[tokio::test(start_paused = true)]
    async fn twenty_five_users_run_as_three_batches_with_two_delays() {
        let candidates: Vec<RefreshCandidate> = (0..25)
            .map(|i| candidate(&format!("user-{:02}", i), None, None))
            .collect();

        let started_at = tokio::time::Instant::now();
        let offsets: Arc<Mutex<Vec<Duration>>> = Arc::new(Mutex::new(Vec::new()));

        let report = drive_batches(
            candidates,
            DEFAULT_BATCH_SIZE,
            Duration::from_millis(DEFAULT_BATCH_DELAY_MS),
            |candidate| {
                let offsets = Arc::clone(&offsets);
                async move {
                    offsets
                        .lock()
                        .unwrap()
                        .push(tokio::time::Instant::now() - started_at);
                    Ok(dummy_update(&candidate.username))
                }
            },
        )
        .await;

        assert_eq!(report.total, 25);
        assert_eq!(report.successful, 25);
        assert_eq!(report.failed, 0);

        // Two inter-batch delays and nothing after the last batch
        assert_eq!(started_at.elapsed(), Duration::from_millis(2000));

        let offsets = offsets.lock().unwrap();
        let batch_sizes = [
            offsets.iter().filter(|o| o.as_millis() == 0).count(),
            offsets.iter().filter(|o| o.as_millis() == 1000).count(),
            offsets.iter().filter(|o| o.as_millis() == 2000).count(),
        ];
        assert_eq!(batch_sizes, [10, 10, 5]);
    }

    #[tokio::test]
    async fn one_failure_never_aborts_the_batch() {
        let candidates = vec![
            candidate("good-1", None, None),
            candidate("broken", None, None),
            candidate("good-2", None, None),
        ];

        let report = drive_batches(
            candidates,
            DEFAULT_BATCH_SIZE,
            Duration::from_millis(0),
            |candidate| async move {
                if candidate.username == "broken" {
                    Err(UpdateError::Input("no contribution days".to_string()))
                } else {
                    Ok(dummy_update(&candidate.username))
                }
            },
        )
        .await;

        assert_eq!(report.total, 3);
        assert_eq!(report.successful, 2);
        assert_eq!(report.failed, 1);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].username, "broken");
        assert_eq!(report.errors[0].kind, "input");
    }

    #[tokio::test]
    async fn empty_candidate_list_is_a_quiet_no_op() {
        let report = drive_batches(
            Vec::new(),
            DEFAULT_BATCH_SIZE,
            Duration::from_millis(DEFAULT_BATCH_DELAY_MS),
            |candidate| async move { Ok(dummy_update(&candidate.username)) },
        )
        .await;

        assert_eq!(report.total, 0);
        assert_eq!(report.successful, 0);
        assert_eq!(report.failed, 0);
        assert!(report.errors.is_empty());
    }
}
