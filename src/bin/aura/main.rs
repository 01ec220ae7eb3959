//! Aura Engine CLI
//!
//! Command-line interface for the aura engine.

mod commands;
mod style;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use aura_engine::storage::AuraStorage;
use aura_engine::{
    AuraEngine, Config, GitHubContributionClient, PgStorage, SqliteStorage, StorageBadgeIssuer,
};
use clap::{Parser, Subcommand};
use style::*;

const BANNER: &str = r#"
   █████╗ ██╗   ██╗██████╗  █████╗
  ██╔══██╗██║   ██║██╔══██╗██╔══██╗
  ███████║██║   ██║██████╔╝███████║
  ██╔══██║██║   ██║██╔══██╗██╔══██║
  ██║  ██║╚██████╔╝██║  ██║██║  ██║
  ╚═╝  ╚═╝ ╚═════╝ ╚═╝  ╚═╝╚═╝  ╚═╝
"#;

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "aura")]
#[command(version)]
#[command(about = "Aura Engine - GitHub contribution scoring and leaderboards", long_about = None)]
#[command(propagate_version = true)]
#[command(arg_required_else_help = true)]
struct Cli {
    /// Path to the config file
    #[arg(short, long, default_value = "config.toml", global = true)]
    config: String,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Refresh one user's aura from GitHub
    #[command(visible_alias = "r")]
    Refresh {
        /// GitHub username to refresh
        username: String,
    },

    /// Refresh every stale user in batches
    #[command(visible_alias = "ra")]
    RefreshAll {
        /// Users refreshed concurrently within one batch
        #[arg(short, long)]
        batch_size: Option<usize>,

        /// Pause between batches, in milliseconds
        #[arg(short, long)]
        delay_ms: Option<u64>,
    },

    /// Recompute dense ranks for a month or all-time
    Ranks {
        /// Month to rank (YYYY-MM), defaults to the current month
        #[arg(short, long)]
        month: Option<String>,

        /// Recompute the all-time leaderboard instead
        #[arg(long)]
        all_time: bool,
    },

    /// Capture and show a month's podium
    #[command(visible_alias = "w")]
    Winners {
        /// Month to capture (YYYY-MM), defaults to the month just ended
        month: Option<String>,
    },

    /// View a leaderboard
    #[command(visible_alias = "lb")]
    Leaderboard {
        /// Month to show (YYYY-MM), defaults to the current month
        #[arg(short, long)]
        month: Option<String>,

        /// Show the all-time leaderboard instead
        #[arg(long)]
        all_time: bool,

        /// Number of entries to show
        #[arg(short, long, default_value = "20")]
        limit: i64,
    },

    /// Show one user's aura, streaks, and badges
    #[command(visible_alias = "u")]
    User {
        /// GitHub username
        username: String,
    },

    /// Hide a user from leaderboards and podiums
    Ban {
        /// GitHub username
        username: String,

        /// Lift the ban instead
        #[arg(long)]
        undo: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if cli.verbose {
        tracing_subscriber::fmt().with_env_filter("info").init();
    }

    if let Err(e) = run(cli).await {
        print_error(&format!("{}", e));
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load_from(&cli.config)?;
    let engine = build_engine(&config).await?;

    match cli.command {
        Commands::Refresh { username } => commands::refresh::run(&engine, &username).await,
        Commands::RefreshAll {
            batch_size,
            delay_ms,
        } => {
            print_banner();
            let batch_size = batch_size.unwrap_or(config.refresh.batch_size);
            let delay = delay_ms
                .map(Duration::from_millis)
                .unwrap_or_else(|| config.refresh.batch_delay());
            commands::refresh_all::run(&engine, batch_size, delay).await
        }
        Commands::Ranks { month, all_time } => {
            commands::ranks::run(&engine, month.as_deref(), all_time).await
        }
        Commands::Winners { month } => commands::winners::run(&engine, month.as_deref()).await,
        Commands::Leaderboard {
            month,
            all_time,
            limit,
        } => commands::leaderboard::run(&engine, month.as_deref(), all_time, limit).await,
        Commands::User { username } => commands::user::run(&engine, &username).await,
        Commands::Ban { username, undo } => commands::ban::run(&engine, &username, !undo).await,
    }
}

/// Storage backend follows the server: PostgreSQL when DATABASE_URL is
/// set, the configured SQLite file otherwise.
async fn build_engine(config: &Config) -> Result<AuraEngine> {
    let storage: Arc<dyn AuraStorage> = match config.database_url() {
        Some(url) => Arc::new(PgStorage::new(&url).await?),
        None => Arc::new(SqliteStorage::new(&config.database.path)?),
    };

    let client = GitHubContributionClient::new(&config.github.api_url);
    let issuer = Arc::new(StorageBadgeIssuer::new(storage.clone()));
    Ok(AuraEngine::new(storage, Arc::new(client), issuer))
}

pub fn print_banner() {
    println!("{}", style_cyan(BANNER));
    println!(
        "  {} {}",
        style_dim("Aura Engine"),
        style_dim(&format!("v{}", VERSION))
    );
    println!();
}
