//! Badge issuance for monthly winners

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::info;

use crate::aura::MonthYear;
use crate::storage::{AuraStorage, NewBadge};

pub const BADGE_TYPE_MONTHLY_WINNER: &str = "monthly_winner";

/// Rarity tier by podium position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BadgeRarity {
    Legendary,
    Epic,
    Rare,
}

impl BadgeRarity {
    pub fn for_rank(rank: i32) -> Self {
        match rank {
            1 => BadgeRarity::Legendary,
            2 => BadgeRarity::Epic,
            _ => BadgeRarity::Rare,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BadgeRarity::Legendary => "legendary",
            BadgeRarity::Epic => "epic",
            BadgeRarity::Rare => "rare",
        }
    }
}

impl fmt::Display for BadgeRarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Issues badges after winner capture. Kept behind a trait so capture
/// logic stays independent of how badges materialize.
#[async_trait]
pub trait BadgeIssuer: Send + Sync {
    /// Issue badges for every not-yet-awarded winner of the month.
    /// Returns the number of badges newly issued.
    async fn award_top_monthly(&self, month: MonthYear) -> anyhow::Result<usize>;
}

/// Default issuer: records badges in storage.
pub struct StorageBadgeIssuer {
    storage: Arc<dyn AuraStorage>,
}

impl StorageBadgeIssuer {
    pub fn new(storage: Arc<dyn AuraStorage>) -> Self {
        Self { storage }
    }
}

#[async_trait]
impl BadgeIssuer for StorageBadgeIssuer {
    async fn award_top_monthly(&self, month: MonthYear) -> anyhow::Result<usize> {
        let winners = self.storage.unawarded_winners(month).await?;

        let mut issued = 0;
        for winner in &winners {
            let rarity = BadgeRarity::for_rank(winner.rank);
            let created = self
                .storage
                .create_user_badge(&NewBadge {
                    user_id: winner.user_id,
                    badge_type: BADGE_TYPE_MONTHLY_WINNER.to_string(),
                    month_year: month,
                    rank: winner.rank,
                    rarity: rarity.as_str().to_string(),
                })
                .await?;
            if created {
                issued += 1;
                info!(
                    "Issued {} badge to {} for {}",
                    rarity, winner.username, month
                );
            }
        }

        Ok(issued)
    }
}
