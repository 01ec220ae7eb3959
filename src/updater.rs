//! Aura store/updater
//!
//! Orchestrates one user's pipeline: score every month in the
//! calendar, recompute the lifetime total from stored months, and
//! persist streaks. Re-applying identical input is a no-op by design,
//! which is what makes partial failures safe to retry.

use chrono::NaiveDate;
use tracing::{debug, info};
use uuid::Uuid;

use crate::aura::{self, MonthYear, StreakState};
use crate::github::{ContributionHistory, SourceError};
use crate::storage::{AuraStorage, StorageError};

/// Failure of one user's refresh, classified for the batch report.
#[derive(Debug, thiserror::Error)]
pub enum UpdateError {
    /// Bad input data; skipped, never retried within a run.
    #[error("invalid input: {0}")]
    Input(String),

    /// Contribution source failure; retried on the next scheduled pass.
    #[error("contribution source: {0}")]
    Upstream(#[from] SourceError),

    /// Storage write failure; only the affected user is aborted.
    #[error("persistence: {0}")]
    Persistence(#[from] StorageError),
}

impl UpdateError {
    pub fn kind(&self) -> &'static str {
        match self {
            UpdateError::Input(_) => "input",
            UpdateError::Upstream(_) => "upstream",
            UpdateError::Persistence(_) => "persistence",
        }
    }
}

/// Outcome of one applied refresh
#[derive(Debug, Clone)]
pub struct AuraUpdate {
    pub user_id: Uuid,
    pub username: String,
    pub total_aura: i64,
    pub contributions_count: i64,
    pub months: Vec<MonthYear>,
    pub streaks: StreakState,
}

/// Score a contribution calendar and persist the result.
///
/// Validates before the first write, so a rejected input leaves
/// storage untouched. The lifetime total is re-summed from the stored
/// monthly rows rather than accumulated, so reruns converge instead of
/// drifting.
pub async fn apply_contributions(
    storage: &dyn AuraStorage,
    history: &ContributionHistory,
    today: NaiveDate,
) -> Result<AuraUpdate, UpdateError> {
    if history.username.trim().is_empty() {
        return Err(UpdateError::Input("empty username".to_string()));
    }
    if history.days.is_empty() {
        return Err(UpdateError::Input(format!(
            "no contribution days for {}",
            history.username
        )));
    }

    let user = storage
        .upsert_user(
            &history.username,
            history.display_name.as_deref(),
            history.avatar_url.as_deref(),
        )
        .await?;

    let months = aura::months_covered(&history.days);
    for month in &months {
        let monthly = aura::compute_month(*month, &history.days);
        storage.upsert_monthly_aura(user.id, &monthly).await?;
        debug!(
            "Stored {} aura for {} in {}",
            monthly.total_aura, user.username, month
        );
    }

    let (total_aura, contributions_count) = storage.sum_monthly_aura(user.id).await?;
    let streaks = aura::compute_streaks(&history.days, today);

    storage.update_user_aura(user.id, total_aura, &streaks).await?;
    storage
        .upsert_global_entry(user.id, total_aura, contributions_count)
        .await?;

    info!(
        "Updated aura for {}: {} total across {} months (streak {})",
        user.username,
        total_aura,
        months.len(),
        streaks.current
    );

    Ok(AuraUpdate {
        user_id: user.id,
        username: user.username,
        total_aura,
        contributions_count,
        months,
        streaks,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aura::ContributionDay;
    use crate::storage::SqliteStorage;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn history(username: &str, days: Vec<ContributionDay>) -> ContributionHistory {
        ContributionHistory {
            username: username.to_string(),
            display_name: None,
            avatar_url: None,
            total_contributions: days.iter().map(|d| d.count).sum(),
            days,
        }
    }

    fn january_days() -> Vec<ContributionDay> {
        vec![
            ContributionDay {
                date: date(2024, 1, 1),
                count: 5,
            },
            ContributionDay {
                date: date(2024, 1, 2),
                count: 0,
            },
            ContributionDay {
                date: date(2024, 1, 3),
                count: 3,
            },
        ]
    }

    #[tokio::test]
    async fn applies_the_full_pipeline() {
        let storage = SqliteStorage::in_memory().unwrap();
        let history = history("octocat", january_days());

        let update = apply_contributions(&storage, &history, date(2024, 1, 4))
            .await
            .unwrap();

        assert_eq!(update.total_aura, 245);
        assert_eq!(update.contributions_count, 8);
        assert_eq!(update.months, vec!["2024-01".parse().unwrap()]);

        let user = storage.get_user("octocat").await.unwrap().unwrap();
        assert_eq!(user.total_aura, 245);
        assert_eq!(user.last_contribution_date, Some(date(2024, 1, 3)));

        let global = storage.global_leaderboard(10).await.unwrap();
        assert_eq!(global.len(), 1);
        assert_eq!(global[0].total_aura, 245);
    }

    #[tokio::test]
    async fn reapplying_identical_input_is_idempotent() {
        let storage = SqliteStorage::in_memory().unwrap();
        let history = history("octocat", january_days());
        let today = date(2024, 1, 4);

        let first = apply_contributions(&storage, &history, today).await.unwrap();
        let second = apply_contributions(&storage, &history, today).await.unwrap();

        assert_eq!(first.total_aura, second.total_aura);
        assert_eq!(first.contributions_count, second.contributions_count);

        let entries = storage
            .month_leaderboard("2024-01".parse().unwrap(), 10)
            .await
            .unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].total_aura, 245);
        assert_eq!(entries[0].contributions_count, 8);
    }

    #[tokio::test]
    async fn lifetime_total_is_summed_from_stored_months() {
        let storage = SqliteStorage::in_memory().unwrap();
        let mut days = january_days();
        days.push(ContributionDay {
            date: date(2024, 2, 1),
            count: 2,
        });

        apply_contributions(&storage, &history("octocat", days), date(2024, 2, 2))
            .await
            .unwrap();

        // Later run only sees February, with more activity
        let feb_only = vec![
            ContributionDay {
                date: date(2024, 2, 1),
                count: 2,
            },
            ContributionDay {
                date: date(2024, 2, 2),
                count: 1,
            },
        ];
        let update = apply_contributions(&storage, &history("octocat", feb_only), date(2024, 2, 2))
            .await
            .unwrap();

        // January's stored row still counts toward the lifetime total
        let jan = storage
            .month_leaderboard("2024-01".parse().unwrap(), 10)
            .await
            .unwrap();
        let feb = storage
            .month_leaderboard("2024-02".parse().unwrap(), 10)
            .await
            .unwrap();
        assert_eq!(update.total_aura, jan[0].total_aura + feb[0].total_aura);
    }

    #[tokio::test]
    async fn empty_input_is_rejected_without_writes() {
        let storage = SqliteStorage::in_memory().unwrap();
        let history = history("octocat", Vec::new());

        let err = apply_contributions(&storage, &history, date(2024, 1, 4))
            .await
            .unwrap_err();
        assert!(matches!(err, UpdateError::Input(_)));
        assert_eq!(err.kind(), "input");

        assert!(storage.get_user("octocat").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn streaks_are_persisted_on_the_user() {
        let storage = SqliteStorage::in_memory().unwrap();
        // 1,1,0,1,1,1 ending today
        let days: Vec<ContributionDay> = [1u32, 1, 0, 1, 1, 1]
            .iter()
            .enumerate()
            .map(|(i, count)| ContributionDay {
                date: date(2024, 6, i as u32 + 1),
                count: *count,
            })
            .collect();

        apply_contributions(&storage, &history("octocat", days), date(2024, 6, 6))
            .await
            .unwrap();

        let user = storage.get_user("octocat").await.unwrap().unwrap();
        assert_eq!(user.current_streak, 3);
        assert_eq!(user.longest_streak, 3);
    }
}
