//! Refresh-all command - batch refresh every stale user

use std::time::Duration;

use crate::style::*;
use anyhow::Result;
use aura_engine::AuraEngine;

pub async fn run(engine: &AuraEngine, batch_size: usize, batch_delay: Duration) -> Result<()> {
    print_header("Refreshing all stale users");
    println!("Batch size:  {}", batch_size);
    println!("Batch delay: {}ms", batch_delay.as_millis());

    let report = engine.refresh_all_eligible(batch_size, batch_delay).await?;

    println!();
    if report.total == 0 {
        print_info("Everyone is up to date.");
        return Ok(());
    }

    print_success(&format!(
        "{} of {} users refreshed",
        report.successful, report.total
    ));

    if report.failed > 0 {
        print_warning(&format!("{} failed:", report.failed));
        for failure in &report.errors {
            println!(
                "  @{:<20} {} {}",
                failure.username,
                failure.message,
                style_dim(&format!("({})", failure.kind))
            );
        }
    }

    Ok(())
}
