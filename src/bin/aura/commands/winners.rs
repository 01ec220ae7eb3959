//! Winners command - capture and show a month's podium

use crate::style::*;
use anyhow::Result;
use aura_engine::{AuraEngine, BadgeRarity, MonthYear};
use chrono::Utc;

pub async fn run(engine: &AuraEngine, month: Option<&str>) -> Result<()> {
    let month: MonthYear = match month {
        Some(raw) => raw.parse()?,
        None => MonthYear::containing(Utc::now().date_naive()).previous(),
    };

    print_header(&format!("Monthly winners for {}", month));

    let newly = engine.capture_monthly_winners(Some(month)).await?;
    if !newly.is_empty() {
        print_success(&format!("Captured {} new winners", newly.len()));
    }

    let podium = engine.month_winners(month).await?;
    if podium.is_empty() {
        print_info("No ranked activity for this month yet.");
        return Ok(());
    }

    println!();
    for winner in &podium {
        let place = match winner.rank {
            1 => style_yellow("#1"),
            2 => style_cyan("#2"),
            _ => style_dim("#3"),
        };
        let badge = if winner.badge_awarded {
            style_green(&format!("{} badge", BadgeRarity::for_rank(winner.rank)))
        } else {
            style_dim("badge pending")
        };
        println!(
            "{}  @{:<20} {:>8} aura  {:>5} contributions  {}",
            place, winner.username, winner.total_aura, winner.contributions_count, badge
        );
    }

    Ok(())
}
