//! Leaderboard rank recomputation
//!
//! Full resort of one scope followed by dense 1..N rank writes. Only
//! the `rank` column is touched, so this never races with aura-field
//! writers; rerunning on unchanged data writes identical ranks.

use tracing::info;
use uuid::Uuid;

use crate::aura::MonthYear;
use crate::storage::{AuraStorage, RankCandidate, StorageError};

/// Rank updates are flushed in chunks of this many rows
pub const RANK_WRITE_BATCH: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RankScope {
    Month(MonthYear),
    Global,
}

impl std::fmt::Display for RankScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RankScope::Month(month) => write!(f, "month {}", month),
            RankScope::Global => write!(f, "all-time"),
        }
    }
}

/// Total order for a scope: aura, then contributions, then streak,
/// with the user id as the final deterministic key.
fn sort_candidates(candidates: &mut [RankCandidate]) {
    candidates.sort_by(|a, b| {
        b.total_aura
            .cmp(&a.total_aura)
            .then_with(|| b.contributions_count.cmp(&a.contributions_count))
            .then_with(|| b.current_streak.cmp(&a.current_streak))
            .then_with(|| a.user_id.cmp(&b.user_id))
    });
}

/// Recompute and persist ranks for one scope. Returns rows updated.
pub async fn recompute(
    storage: &dyn AuraStorage,
    scope: RankScope,
) -> Result<u64, StorageError> {
    let mut candidates = match scope {
        RankScope::Month(month) => storage.month_rank_candidates(month).await?,
        RankScope::Global => storage.global_rank_candidates().await?,
    };
    sort_candidates(&mut candidates);

    let ranks: Vec<(Uuid, i32)> = candidates
        .iter()
        .enumerate()
        .map(|(position, candidate)| (candidate.user_id, position as i32 + 1))
        .collect();

    let mut updated = 0u64;
    for chunk in ranks.chunks(RANK_WRITE_BATCH) {
        updated += match scope {
            RankScope::Month(month) => storage.write_month_ranks(month, chunk).await?,
            RankScope::Global => storage.write_global_ranks(chunk).await?,
        };
    }

    info!("Recomputed ranks for {}: {} rows", scope, updated);
    Ok(updated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aura::MonthlyAura;
    use crate::storage::SqliteStorage;

    fn candidate(id: u128, aura: i64, contributions: i64, streak: i32) -> RankCandidate {
        RankCandidate {
            user_id: Uuid::from_u128(id),
            total_aura: aura,
            contributions_count: contributions,
            current_streak: streak,
        }
    }

    #[test]
    fn sort_applies_every_tiebreak_in_order() {
        let mut candidates = vec![
            candidate(4, 100, 5, 2),
            candidate(3, 100, 5, 9),
            candidate(2, 100, 8, 1),
            candidate(1, 300, 1, 0),
            candidate(5, 100, 5, 2),
        ];
        sort_candidates(&mut candidates);

        let order: Vec<u128> = candidates.iter().map(|c| c.user_id.as_u128()).collect();
        // aura first, then contributions, then streak, then user id
        assert_eq!(order, vec![1, 2, 3, 4, 5]);
    }

    async fn seed_month(
        storage: &SqliteStorage,
        month: MonthYear,
        users: &[(&str, i64, u32)],
    ) -> Vec<Uuid> {
        let mut ids = Vec::new();
        for (name, aura, contributions) in users {
            let user = storage.upsert_user(name, None, None).await.unwrap();
            storage
                .upsert_monthly_aura(
                    user.id,
                    &MonthlyAura {
                        month,
                        total_aura: *aura,
                        contributions_count: *contributions,
                        active_days: 1,
                    },
                )
                .await
                .unwrap();
            ids.push(user.id);
        }
        ids
    }

    #[tokio::test]
    async fn recompute_assigns_dense_ranks() {
        let storage = SqliteStorage::in_memory().unwrap();
        let month = "2024-01".parse().unwrap();
        seed_month(
            &storage,
            month,
            &[("alice", 300, 10), ("bob", 500, 20), ("carol", 100, 5)],
        )
        .await;

        let updated = recompute(&storage, RankScope::Month(month)).await.unwrap();
        assert_eq!(updated, 3);

        let entries = storage.month_leaderboard(month, 10).await.unwrap();
        let ranked: Vec<(String, Option<i32>)> = entries
            .iter()
            .map(|e| (e.username.clone(), e.rank))
            .collect();
        assert_eq!(
            ranked,
            vec![
                ("bob".to_string(), Some(1)),
                ("alice".to_string(), Some(2)),
                ("carol".to_string(), Some(3)),
            ]
        );
    }

    #[tokio::test]
    async fn rerun_with_unchanged_data_is_stable() {
        let storage = SqliteStorage::in_memory().unwrap();
        let month = "2024-01".parse().unwrap();
        seed_month(&storage, month, &[("alice", 300, 10), ("bob", 300, 10)]).await;

        recompute(&storage, RankScope::Month(month)).await.unwrap();
        let first = storage.month_leaderboard(month, 10).await.unwrap();

        recompute(&storage, RankScope::Month(month)).await.unwrap();
        let second = storage.month_leaderboard(month, 10).await.unwrap();

        let ranks = |entries: &[crate::storage::MonthlyLeaderboardEntry]| {
            entries
                .iter()
                .map(|e| (e.user_id, e.rank))
                .collect::<Vec<_>>()
        };
        assert_eq!(ranks(&first), ranks(&second));

        // Ties still get distinct, dense ranks
        let mut assigned: Vec<i32> = first.iter().filter_map(|e| e.rank).collect();
        assigned.sort_unstable();
        assert_eq!(assigned, vec![1, 2]);
    }

    #[tokio::test]
    async fn recompute_spans_multiple_write_chunks() {
        let storage = SqliteStorage::in_memory().unwrap();
        let month = "2024-01".parse().unwrap();

        for i in 0..150 {
            let user = storage
                .upsert_user(&format!("user-{:03}", i), None, None)
                .await
                .unwrap();
            storage
                .upsert_monthly_aura(
                    user.id,
                    &MonthlyAura {
                        month,
                        total_aura: 1000 - i as i64,
                        contributions_count: 1,
                        active_days: 1,
                    },
                )
                .await
                .unwrap();
        }

        let updated = recompute(&storage, RankScope::Month(month)).await.unwrap();
        assert_eq!(updated, 150);

        let entries = storage.month_leaderboard(month, 200).await.unwrap();
        assert_eq!(entries[0].rank, Some(1));
        assert_eq!(entries[149].rank, Some(150));
    }

    #[tokio::test]
    async fn global_scope_ranks_lifetime_totals() {
        let storage = SqliteStorage::in_memory().unwrap();
        for (name, aura) in [("alice", 250i64), ("bob", 900), ("carol", 40)] {
            let user = storage.upsert_user(name, None, None).await.unwrap();
            storage.upsert_global_entry(user.id, aura, 10).await.unwrap();
        }

        recompute(&storage, RankScope::Global).await.unwrap();

        let entries = storage.global_leaderboard(10).await.unwrap();
        assert_eq!(entries[0].username, "bob");
        assert_eq!(entries[0].rank, Some(1));
        assert_eq!(entries[2].username, "carol");
        assert_eq!(entries[2].rank, Some(3));
    }
}
