//! Aura engine implementation
//!
//! Facade over the refresh pipeline: fetch contributions, apply aura
//! updates, recompute ranks, capture winners. Collaborators sit behind
//! traits so the pipeline is testable without the network.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use tracing::{info, warn};

use crate::aura::MonthYear;
use crate::badges::BadgeIssuer;
use crate::github::ContributionSource;
use crate::ranking::{self, RankScope};
use crate::scheduler::{self, RefreshReport};
use crate::storage::{
    AuraStorage, GlobalLeaderboardEntry, MonthlyLeaderboardEntry, MonthlyWinner, StorageError,
    UserAuraSummary,
};
use crate::updater::{self, AuraUpdate, UpdateError};
use crate::winners;

pub struct AuraEngine {
    storage: Arc<dyn AuraStorage>,
    source: Arc<dyn ContributionSource>,
    issuer: Arc<dyn BadgeIssuer>,
}

impl AuraEngine {
    pub fn new(
        storage: Arc<dyn AuraStorage>,
        source: Arc<dyn ContributionSource>,
        issuer: Arc<dyn BadgeIssuer>,
    ) -> Self {
        Self {
            storage,
            source,
            issuer,
        }
    }

    /// Fetch one user's calendar and persist their aura state.
    pub async fn refresh_user(&self, username: &str) -> Result<AuraUpdate, UpdateError> {
        let history = self.source.fetch(username).await?;
        let today = Utc::now().date_naive();
        updater::apply_contributions(self.storage.as_ref(), &history, today).await
    }

    /// Refresh every stale user in batches, then recompute ranks once
    /// per touched month plus the all-time scope.
    pub async fn refresh_all_eligible(
        &self,
        batch_size: usize,
        batch_delay: Duration,
    ) -> Result<RefreshReport, StorageError> {
        let now = Utc::now();
        let candidates = self.storage.refresh_candidates().await?;
        let total_candidates = candidates.len();
        let stale = scheduler::select_stale(candidates, now);
        info!(
            "Refreshing {} of {} users ({} up to date)",
            stale.len(),
            total_candidates,
            total_candidates - stale.len()
        );

        let touched: Arc<Mutex<BTreeSet<MonthYear>>> = Arc::new(Mutex::new(BTreeSet::new()));
        let report = scheduler::drive_batches(stale, batch_size, batch_delay, |candidate| {
            let storage = Arc::clone(&self.storage);
            let source = Arc::clone(&self.source);
            let touched = Arc::clone(&touched);
            async move {
                let history = source.fetch(&candidate.username).await?;
                let today = Utc::now().date_naive();
                let update =
                    updater::apply_contributions(storage.as_ref(), &history, today).await?;
                touched.lock().unwrap().extend(update.months.iter().copied());
                Ok(update)
            }
        })
        .await;

        // Rank failures leave that scope stale until the next pass;
        // they never unwind the aura writes above.
        if report.successful > 0 {
            let months: Vec<MonthYear> = touched.lock().unwrap().iter().copied().collect();
            for month in months {
                if let Err(err) =
                    ranking::recompute(self.storage.as_ref(), RankScope::Month(month)).await
                {
                    warn!("Rank recompute failed for month {}: {}", month, err);
                }
            }
            if let Err(err) = ranking::recompute(self.storage.as_ref(), RankScope::Global).await {
                warn!("Rank recompute failed for all-time scope: {}", err);
            }
        }

        info!(
            "Refresh pass finished: {} ok, {} failed of {}",
            report.successful, report.failed, report.total
        );
        Ok(report)
    }

    /// Full resort and dense rank write for one scope.
    pub async fn recompute_ranks(&self, scope: RankScope) -> Result<u64, StorageError> {
        ranking::recompute(self.storage.as_ref(), scope).await
    }

    /// Capture winners for `month`, defaulting to the month that just
    /// ended. Returns only newly created winner rows.
    pub async fn capture_monthly_winners(
        &self,
        month: Option<MonthYear>,
    ) -> Result<Vec<MonthlyWinner>, StorageError> {
        let month =
            month.unwrap_or_else(|| MonthYear::containing(Utc::now().date_naive()).previous());
        winners::capture_month(self.storage.as_ref(), self.issuer.as_ref(), month).await
    }

    /// Everything on record for one month's podium, captured or not.
    pub async fn month_winners(
        &self,
        month: MonthYear,
    ) -> Result<Vec<MonthlyWinner>, StorageError> {
        self.storage.winners_for_month(month).await
    }

    /// Month leaderboard, defaulting to the current month.
    pub async fn monthly_leaderboard(
        &self,
        month: Option<MonthYear>,
        limit: i64,
    ) -> Result<Vec<MonthlyLeaderboardEntry>, StorageError> {
        let month = month.unwrap_or_else(|| MonthYear::containing(Utc::now().date_naive()));
        self.storage.month_leaderboard(month, limit).await
    }

    pub async fn global_leaderboard(
        &self,
        limit: i64,
    ) -> Result<Vec<GlobalLeaderboardEntry>, StorageError> {
        self.storage.global_leaderboard(limit).await
    }

    pub async fn user_summary(
        &self,
        username: &str,
    ) -> Result<Option<UserAuraSummary>, StorageError> {
        self.storage.user_summary(username).await
    }

    pub async fn set_user_banned(
        &self,
        username: &str,
        banned: bool,
    ) -> Result<bool, StorageError> {
        self.storage.set_user_banned(username, banned).await
    }
}
