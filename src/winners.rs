//! Month-boundary winner capture
//!
//! Snapshots the top of a closed month into immutable winner rows and
//! triggers badge issuance. Double-award protection is the storage
//! uniqueness constraint on `(user_id, month_year)`; running capture
//! twice is always safe.

use tracing::{info, warn};

use crate::aura::MonthYear;
use crate::badges::BadgeIssuer;
use crate::storage::{AuraStorage, MonthlyWinner, NewWinner, StorageError};

/// Podium size captured per month
pub const TOP_WINNERS: i64 = 3;

/// Capture the month's podium and issue badges for it.
///
/// Returns only the winners newly created by this call; an already
/// captured month yields an empty list. `badge_awarded` flips to true
/// only after the issuer reports success, so a transient issuance
/// failure leaves the flag false and the next capture retries it.
pub async fn capture_month(
    storage: &dyn AuraStorage,
    issuer: &dyn BadgeIssuer,
    month: MonthYear,
) -> Result<Vec<MonthlyWinner>, StorageError> {
    let top = storage.month_leaderboard(month, TOP_WINNERS).await?;
    if top.is_empty() {
        info!("No leaderboard entries for {}, nothing to capture", month);
        return Ok(Vec::new());
    }

    let mut created_ids = Vec::new();
    for (position, entry) in top.iter().enumerate() {
        let winner = NewWinner {
            user_id: entry.user_id,
            month_year: month,
            rank: position as i32 + 1,
            total_aura: entry.total_aura,
            contributions_count: entry.contributions_count,
        };
        // A duplicate create is a no-op, not an error
        if storage.create_winner(&winner).await? {
            info!(
                "Captured {} as rank {} winner of {} ({} aura)",
                entry.username,
                winner.rank,
                month,
                entry.total_aura
            );
            created_ids.push(entry.user_id);
        }
    }

    let pending = storage.unawarded_winners(month).await?;
    if !pending.is_empty() {
        match issuer.award_top_monthly(month).await {
            Ok(issued) => {
                let marked = storage.mark_badges_awarded(month).await?;
                info!(
                    "Awarded {} badges for {} ({} winners marked)",
                    issued, month, marked
                );
            }
            Err(err) => {
                warn!(
                    "Badge issuance failed for {}: {} (will retry on next capture)",
                    month, err
                );
            }
        }
    }

    if created_ids.is_empty() {
        return Ok(Vec::new());
    }
    let winners = storage.winners_for_month(month).await?;
    Ok(winners
        .into_iter()
        .filter(|winner| created_ids.contains(&winner.user_id))
        .collect())
}
