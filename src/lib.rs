//! Aura Engine - Score GitHub contribution activity into aura points
//!
//! Turns raw contribution calendars into a monthly reputation score
//! ("aura"), with streak tracking, leaderboards, and a permanent record
//! of each month's top contributors.
//!
//! # How it works
//!
//! 1. Contribution calendars are fetched from the GitHub GraphQL API
//! 2. Each month scores 10 aura per contribution plus 50 per active day,
//!    plus a consistency bonus of up to 1000 for showing up all month
//! 3. Lifetime totals are re-summed from stored months on every refresh,
//!    so repeated runs converge instead of drifting
//! 4. Dense ranks are recomputed per month and all-time after each pass
//! 5. When a month closes, its top three land in a permanent winners
//!    table and earn rarity-tiered badges
//!
//! # Fairness measures
//!
//! - Banned users are invisible to leaderboards, ranks, and podiums
//! - A user can win a given month exactly once, enforced by storage
//! - Badges are only marked awarded after issuance actually succeeds
//! - Ties break by contributions, then streak, then stable user id

pub mod aura;
pub mod badges;
pub mod config;
pub mod engine;
pub mod github;
pub mod pg_storage;
pub mod ranking;
pub mod scheduler;
pub mod storage;
pub mod updater;
pub mod winners;

pub use aura::{ContributionDay, MonthYear, MonthlyAura, StreakState};
pub use badges::{BadgeIssuer, BadgeRarity, StorageBadgeIssuer};
pub use config::Config;
pub use engine::AuraEngine;
pub use github::{ContributionSource, GitHubContributionClient, RateLimitInfo};
pub use pg_storage::PgStorage;
pub use ranking::RankScope;
pub use scheduler::{ActivityClass, RefreshReport};
pub use storage::{AuraStorage, SqliteStorage};
pub use updater::{AuraUpdate, UpdateError};
