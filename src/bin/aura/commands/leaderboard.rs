//! Leaderboard command

use crate::style::*;
use anyhow::Result;
use aura_engine::{AuraEngine, MonthYear};
use chrono::Utc;

pub async fn run(engine: &AuraEngine, month: Option<&str>, all_time: bool, limit: i64) -> Result<()> {
    if all_time {
        return run_global(engine, limit).await;
    }

    let month: MonthYear = match month {
        Some(raw) => raw.parse()?,
        None => MonthYear::containing(Utc::now().date_naive()),
    };

    print_header(&format!("Aura Leaderboard - {}", month));

    let entries = engine.monthly_leaderboard(Some(month), limit).await?;
    if entries.is_empty() {
        print_info("No scored activity for this month yet.");
        return Ok(());
    }

    println!();
    println!(
        "{:>4}  {:<20}  {:>10}  {:>13}  {:>11}",
        "Rank", "User", "Aura", "Contributions", "Active Days"
    );
    println!("{}", "─".repeat(68));

    for entry in &entries {
        let rank = entry
            .rank
            .map(|r| format!("#{}", r))
            .unwrap_or_else(|| "-".to_string());
        let rank_styled = match entry.rank {
            Some(1) => style_yellow(&rank),
            Some(2) | Some(3) => style_cyan(&rank),
            _ => rank,
        };
        println!(
            "{:>4}  {:<20}  {:>10}  {:>13}  {:>11}",
            rank_styled,
            entry.username,
            entry.total_aura,
            entry.contributions_count,
            entry.active_days
        );
    }

    println!();
    println!("Total users: {}", entries.len());
    Ok(())
}

async fn run_global(engine: &AuraEngine, limit: i64) -> Result<()> {
    print_header("Aura Leaderboard - All Time");

    let entries = engine.global_leaderboard(limit).await?;
    if entries.is_empty() {
        print_info("No scored activity yet.");
        return Ok(());
    }

    println!();
    println!(
        "{:>4}  {:<20}  {:>10}  {:>13}  {:>7}",
        "Rank", "User", "Aura", "Contributions", "Streak"
    );
    println!("{}", "─".repeat(64));

    for entry in &entries {
        let rank = entry
            .rank
            .map(|r| format!("#{}", r))
            .unwrap_or_else(|| "-".to_string());
        let rank_styled = match entry.rank {
            Some(1) => style_yellow(&rank),
            Some(2) | Some(3) => style_cyan(&rank),
            _ => rank,
        };
        println!(
            "{:>4}  {:<20}  {:>10}  {:>13}  {:>7}",
            rank_styled,
            entry.username,
            entry.total_aura,
            entry.contributions_count,
            entry.current_streak
        );
    }

    println!();
    println!("Total users: {}", entries.len());
    Ok(())
}
