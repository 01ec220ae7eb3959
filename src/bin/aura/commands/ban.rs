//! Ban command - hide a user from leaderboards and podiums

use crate::style::*;
use anyhow::Result;
use aura_engine::AuraEngine;

pub async fn run(engine: &AuraEngine, username: &str, banned: bool) -> Result<()> {
    let found = engine.set_user_banned(username, banned).await?;
    if !found {
        print_warning(&format!("No user named @{}", username));
        return Ok(());
    }

    if banned {
        print_success(&format!("@{} is now banned", username));
        println!("Hidden from leaderboards immediately; ranks close up on the next recompute.");
    } else {
        print_success(&format!("@{} is no longer banned", username));
        println!("Back on leaderboards; ranked again on the next recompute.");
    }

    Ok(())
}
