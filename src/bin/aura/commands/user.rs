//! User command - one account's aura profile

use crate::style::*;
use anyhow::Result;
use aura_engine::AuraEngine;

pub async fn run(engine: &AuraEngine, username: &str) -> Result<()> {
    print_header(&format!("Aura profile: @{}", username));

    let summary = match engine.user_summary(username).await? {
        Some(summary) => summary,
        None => {
            print_warning("User not found.");
            println!();
            println!("To score this account, run:");
            println!("  aura refresh {}", username);
            return Ok(());
        }
    };

    let user = &summary.user;
    if let Some(name) = &user.display_name {
        println!("Name:             {}", name);
    }
    if user.banned {
        print_warning("This account is banned and hidden from leaderboards");
    }
    println!(
        "Total aura:       {}",
        style_bold(&user.total_aura.to_string())
    );
    println!(
        "Global rank:      {}",
        match summary.global_rank {
            Some(r) => style_cyan(&format!("#{}", r)),
            None => style_dim("unranked"),
        }
    );
    println!(
        "Current streak:   {} days",
        style_green(&user.current_streak.to_string())
    );
    println!("Longest streak:   {} days", user.longest_streak);
    if let Some(last) = user.last_contribution_date {
        println!("Last contributed: {}", last);
    }

    if !summary.months.is_empty() {
        println!();
        println!(
            "{:<9}  {:>10}  {:>13}  {:>11}  {:>5}",
            "Month", "Aura", "Contributions", "Active Days", "Rank"
        );
        println!("{}", "─".repeat(58));
        for month in &summary.months {
            let rank = month
                .rank
                .map(|r| format!("#{}", r))
                .unwrap_or_else(|| "-".to_string());
            println!(
                "{:<9}  {:>10}  {:>13}  {:>11}  {:>5}",
                month.month_year.to_string(),
                month.total_aura,
                month.contributions_count,
                month.active_days,
                rank
            );
        }
    }

    if !summary.badges.is_empty() {
        print_header("Badges");
        for badge in &summary.badges {
            let rarity = match badge.rarity.as_str() {
                "legendary" => style_yellow(&badge.rarity),
                "epic" => style_cyan(&badge.rarity),
                _ => style_green(&badge.rarity),
            };
            println!(
                "  {} - rank #{} in {}",
                rarity, badge.rank, badge.month_year
            );
        }
    }

    Ok(())
}
