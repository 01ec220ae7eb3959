//! CLI subcommands

pub mod ban;
pub mod leaderboard;
pub mod ranks;
pub mod refresh;
pub mod refresh_all;
pub mod user;
pub mod winners;
