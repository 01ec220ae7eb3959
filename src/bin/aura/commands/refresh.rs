//! Refresh command - update one user's aura from GitHub

use crate::style::*;
use anyhow::Result;
use aura_engine::{AuraEngine, RankScope};

pub async fn run(engine: &AuraEngine, username: &str) -> Result<()> {
    print_header(&format!("Refreshing @{}", username));

    let update = match engine.refresh_user(username).await {
        Ok(update) => update,
        Err(e) => {
            print_error(&format!("Refresh failed ({}): {}", e.kind(), e));
            return Ok(());
        }
    };

    print_success(&format!("Updated @{}", update.username));
    println!();
    println!(
        "Total aura:       {}",
        style_bold(&update.total_aura.to_string())
    );
    println!("Contributions:    {}", update.contributions_count);
    println!("Months scored:    {}", update.months.len());
    println!(
        "Current streak:   {} days",
        style_green(&update.streaks.current.to_string())
    );
    println!("Longest streak:   {} days", update.streaks.longest);

    // Bring ranks up to date for everything this refresh touched
    for month in &update.months {
        engine.recompute_ranks(RankScope::Month(*month)).await?;
    }
    let ranked = engine.recompute_ranks(RankScope::Global).await?;
    println!();
    println!(
        "{}",
        style_dim(&format!("Ranks recomputed across {} users", ranked))
    );

    Ok(())
}
