//! Ranks command - recompute dense leaderboard ranks

use crate::style::*;
use anyhow::Result;
use aura_engine::{AuraEngine, MonthYear, RankScope};
use chrono::Utc;

pub async fn run(engine: &AuraEngine, month: Option<&str>, all_time: bool) -> Result<()> {
    let scope = if all_time {
        RankScope::Global
    } else {
        let month: MonthYear = match month {
            Some(raw) => raw.parse()?,
            None => MonthYear::containing(Utc::now().date_naive()),
        };
        RankScope::Month(month)
    };

    print_header(&format!("Recomputing ranks ({})", scope));

    let updated = engine.recompute_ranks(scope).await?;
    if updated == 0 {
        print_info("No leaderboard entries in this scope yet.");
    } else {
        print_success(&format!("{} entries ranked", updated));
    }

    Ok(())
}
