//! PostgreSQL storage for the aura engine
//!
//! Server-mode backend behind the same `AuraStorage` seam as the
//! SQLite backend. Connects with DATABASE_URL and applies embedded
//! migrations on startup.

use async_trait::async_trait;
use deadpool_postgres::{Config, Pool, Runtime};
use tokio_postgres::NoTls;
use tracing::info;
use uuid::Uuid;

use crate::aura::{MonthYear, MonthlyAura, StreakState};
use crate::storage::{
    AuraStorage, GlobalLeaderboardEntry, MonthlyLeaderboardEntry, MonthlyWinner, NewBadge,
    NewWinner, RankCandidate, RefreshCandidate, StorageError, User, UserAuraSummary, UserBadge,
};

/// Database pool configuration
const DB_POOL_MAX_SIZE: usize = 20;
const DB_QUERY_TIMEOUT_SECS: u64 = 30;

const USER_COLUMNS: &str = "id, username, display_name, avatar_url, banned, total_aura, \
     current_streak, longest_streak, last_contribution_date, created_at";

#[derive(Clone)]
pub struct PgStorage {
    pool: Pool,
}

impl PgStorage {
    /// Create storage from DATABASE_URL
    pub async fn new(database_url: &str) -> Result<Self, StorageError> {
        use deadpool_postgres::{ManagerConfig, PoolConfig, RecyclingMethod};
        use std::time::Duration;

        let mut config = Config::new();
        config.url = Some(database_url.to_string());

        config.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });

        config.pool = Some(PoolConfig {
            max_size: DB_POOL_MAX_SIZE,
            timeouts: deadpool_postgres::Timeouts {
                wait: Some(Duration::from_secs(DB_QUERY_TIMEOUT_SECS)),
                create: Some(Duration::from_secs(10)),
                recycle: Some(Duration::from_secs(30)),
            },
            ..Default::default()
        });

        let pool = config
            .create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|err| StorageError::Corrupt(format!("pool config: {}", err)))?;

        // Test connection
        let client = pool.get().await?;
        client
            .execute(
                &format!("SET statement_timeout = '{}s'", DB_QUERY_TIMEOUT_SECS),
                &[],
            )
            .await?;

        info!(
            "Connected to PostgreSQL (pool_size: {}, query_timeout: {}s)",
            DB_POOL_MAX_SIZE, DB_QUERY_TIMEOUT_SECS
        );

        let storage = Self { pool };
        storage.run_migrations().await?;

        Ok(storage)
    }

    /// Create storage from DATABASE_URL environment variable
    pub async fn from_env() -> Result<Self, StorageError> {
        let url = std::env::var("DATABASE_URL")
            .map_err(|_| StorageError::Corrupt("DATABASE_URL not set".to_string()))?;
        Self::new(&url).await
    }

    /// Run embedded migrations
    async fn run_migrations(&self) -> Result<(), StorageError> {
        let client = self.pool.get().await?;

        // Check if migrations table exists
        let exists: bool = client
            .query_one(
                "SELECT EXISTS(SELECT 1 FROM information_schema.tables WHERE table_name = 'schema_migrations')",
                &[],
            )
            .await?
            .get(0);

        if !exists {
            // Run initial schema migration
            let migration_sql = include_str!("../migrations/001_schema.sql");
            client.batch_execute(migration_sql).await?;
            info!("Applied migration 001_schema");
        }

        Ok(())
    }
}

fn parse_month(raw: &str) -> Result<MonthYear, StorageError> {
    raw.parse()
        .map_err(|err| StorageError::Corrupt(format!("bad month key '{}': {}", raw, err)))
}

fn user_from_pg(row: &tokio_postgres::Row) -> User {
    User {
        id: row.get(0),
        username: row.get(1),
        display_name: row.get(2),
        avatar_url: row.get(3),
        banned: row.get(4),
        total_aura: row.get(5),
        current_streak: row.get(6),
        longest_streak: row.get(7),
        last_contribution_date: row.get(8),
        created_at: row.get(9),
    }
}

fn monthly_entry_from_pg(
    row: &tokio_postgres::Row,
) -> Result<MonthlyLeaderboardEntry, StorageError> {
    let raw_month: String = row.get(2);
    Ok(MonthlyLeaderboardEntry {
        user_id: row.get(0),
        username: row.get(1),
        month_year: parse_month(&raw_month)?,
        total_aura: row.get(3),
        contributions_count: row.get(4),
        active_days: row.get(5),
        rank: row.get(6),
        last_updated: row.get(7),
    })
}

fn winner_from_pg(row: &tokio_postgres::Row) -> Result<MonthlyWinner, StorageError> {
    let raw_month: String = row.get(2);
    Ok(MonthlyWinner {
        user_id: row.get(0),
        username: row.get(1),
        month_year: parse_month(&raw_month)?,
        rank: row.get(3),
        total_aura: row.get(4),
        contributions_count: row.get(5),
        badge_awarded: row.get(6),
        captured_at: row.get(7),
    })
}

#[async_trait]
impl AuraStorage for PgStorage {
    async fn upsert_user(
        &self,
        username: &str,
        display_name: Option<&str>,
        avatar_url: Option<&str>,
    ) -> Result<User, StorageError> {
        let client = self.pool.get().await?;
        let row = client
            .query_one(
                &format!(
                    "INSERT INTO users (id, username, display_name, avatar_url)
                     VALUES ($1, $2, $3, $4)
                     ON CONFLICT (username) DO UPDATE SET
                         display_name = COALESCE(EXCLUDED.display_name, users.display_name),
                         avatar_url = COALESCE(EXCLUDED.avatar_url, users.avatar_url)
                     RETURNING {}",
                    USER_COLUMNS
                ),
                &[&Uuid::new_v4(), &username, &display_name, &avatar_url],
            )
            .await?;
        Ok(user_from_pg(&row))
    }

    async fn get_user(&self, username: &str) -> Result<Option<User>, StorageError> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                &format!("SELECT {} FROM users WHERE username = $1", USER_COLUMNS),
                &[&username],
            )
            .await?;
        Ok(row.map(|row| user_from_pg(&row)))
    }

    async fn set_user_banned(&self, username: &str, banned: bool) -> Result<bool, StorageError> {
        let client = self.pool.get().await?;
        let changed = client
            .execute(
                "UPDATE users SET banned = $1 WHERE username = $2",
                &[&banned, &username],
            )
            .await?;
        Ok(changed > 0)
    }

    async fn update_user_aura(
        &self,
        user_id: Uuid,
        total_aura: i64,
        streaks: &StreakState,
    ) -> Result<(), StorageError> {
        let client = self.pool.get().await?;
        client
            .execute(
                "UPDATE users SET
                     total_aura = $1,
                     current_streak = $2,
                     longest_streak = GREATEST(longest_streak, $3),
                     last_contribution_date = COALESCE($4, last_contribution_date)
                 WHERE id = $5",
                &[
                    &total_aura,
                    &(streaks.current as i32),
                    &(streaks.longest as i32),
                    &streaks.last_contribution_date,
                    &user_id,
                ],
            )
            .await?;
        Ok(())
    }

    async fn upsert_monthly_aura(
        &self,
        user_id: Uuid,
        aura: &MonthlyAura,
    ) -> Result<(), StorageError> {
        let client = self.pool.get().await?;
        client
            .execute(
                "INSERT INTO monthly_leaderboard
                     (user_id, month_year, total_aura, contributions_count, active_days)
                 VALUES ($1, $2, $3, $4, $5)
                 ON CONFLICT (user_id, month_year) DO UPDATE SET
                     total_aura = EXCLUDED.total_aura,
                     contributions_count = EXCLUDED.contributions_count,
                     active_days = EXCLUDED.active_days,
                     last_updated = NOW()",
                &[
                    &user_id,
                    &aura.month.to_string(),
                    &aura.total_aura,
                    &(aura.contributions_count as i32),
                    &(aura.active_days as i32),
                ],
            )
            .await?;
        Ok(())
    }

    async fn sum_monthly_aura(&self, user_id: Uuid) -> Result<(i64, i64), StorageError> {
        let client = self.pool.get().await?;
        let row = client
            .query_one(
                "SELECT COALESCE(SUM(total_aura), 0)::BIGINT,
                        COALESCE(SUM(contributions_count), 0)::BIGINT
                 FROM monthly_leaderboard WHERE user_id = $1",
                &[&user_id],
            )
            .await?;
        Ok((row.get(0), row.get(1)))
    }

    async fn upsert_global_entry(
        &self,
        user_id: Uuid,
        total_aura: i64,
        contributions_count: i64,
    ) -> Result<(), StorageError> {
        let client = self.pool.get().await?;
        client
            .execute(
                "INSERT INTO global_leaderboard (user_id, total_aura, contributions_count)
                 VALUES ($1, $2, $3)
                 ON CONFLICT (user_id) DO UPDATE SET
                     total_aura = EXCLUDED.total_aura,
                     contributions_count = EXCLUDED.contributions_count,
                     last_updated = NOW()",
                &[&user_id, &total_aura, &(contributions_count as i32)],
            )
            .await?;
        Ok(())
    }

    async fn month_rank_candidates(
        &self,
        month: MonthYear,
    ) -> Result<Vec<RankCandidate>, StorageError> {
        let client = self.pool.get().await?;
        let rows = client
            .query(
                "SELECT ml.user_id, ml.total_aura, ml.contributions_count::BIGINT,
                        u.current_streak
                 FROM monthly_leaderboard ml
                 JOIN users u ON u.id = ml.user_id
                 WHERE ml.month_year = $1",
                &[&month.to_string()],
            )
            .await?;
        Ok(rows
            .iter()
            .map(|row| RankCandidate {
                user_id: row.get(0),
                total_aura: row.get(1),
                contributions_count: row.get(2),
                current_streak: row.get(3),
            })
            .collect())
    }

    async fn global_rank_candidates(&self) -> Result<Vec<RankCandidate>, StorageError> {
        let client = self.pool.get().await?;
        let rows = client
            .query(
                "SELECT g.user_id, g.total_aura, g.contributions_count::BIGINT,
                        u.current_streak
                 FROM global_leaderboard g
                 JOIN users u ON u.id = g.user_id",
                &[],
            )
            .await?;
        Ok(rows
            .iter()
            .map(|row| RankCandidate {
                user_id: row.get(0),
                total_aura: row.get(1),
                contributions_count: row.get(2),
                current_streak: row.get(3),
            })
            .collect())
    }

    async fn write_month_ranks(
        &self,
        month: MonthYear,
        ranks: &[(Uuid, i32)],
    ) -> Result<u64, StorageError> {
        let mut client = self.pool.get().await?;
        let tx = client.transaction().await?;
        let month_key = month.to_string();
        let mut updated = 0u64;
        for (user_id, rank) in ranks {
            updated += tx
                .execute(
                    "UPDATE monthly_leaderboard SET rank = $1
                     WHERE user_id = $2 AND month_year = $3",
                    &[rank, user_id, &month_key],
                )
                .await?;
        }
        tx.commit().await?;
        Ok(updated)
    }

    async fn write_global_ranks(&self, ranks: &[(Uuid, i32)]) -> Result<u64, StorageError> {
        let mut client = self.pool.get().await?;
        let tx = client.transaction().await?;
        let mut updated = 0u64;
        for (user_id, rank) in ranks {
            updated += tx
                .execute(
                    "UPDATE global_leaderboard SET rank = $1 WHERE user_id = $2",
                    &[rank, user_id],
                )
                .await?;
        }
        tx.commit().await?;
        Ok(updated)
    }

    async fn refresh_candidates(&self) -> Result<Vec<RefreshCandidate>, StorageError> {
        let client = self.pool.get().await?;
        let rows = client
            .query(
                "SELECT u.id, u.username, u.last_contribution_date, g.last_updated
                 FROM users u
                 LEFT JOIN global_leaderboard g ON g.user_id = u.id
                 WHERE u.banned = FALSE
                 ORDER BY u.username",
                &[],
            )
            .await?;
        Ok(rows
            .iter()
            .map(|row| RefreshCandidate {
                user_id: row.get(0),
                username: row.get(1),
                last_contribution_date: row.get(2),
                last_refreshed: row.get(3),
            })
            .collect())
    }

    async fn create_winner(&self, winner: &NewWinner) -> Result<bool, StorageError> {
        let client = self.pool.get().await?;
        let inserted = client
            .execute(
                "INSERT INTO monthly_winners
                     (user_id, month_year, rank, total_aura, contributions_count)
                 VALUES ($1, $2, $3, $4, $5)
                 ON CONFLICT (user_id, month_year) DO NOTHING",
                &[
                    &winner.user_id,
                    &winner.month_year.to_string(),
                    &winner.rank,
                    &winner.total_aura,
                    &winner.contributions_count,
                ],
            )
            .await?;
        Ok(inserted > 0)
    }

    async fn winners_for_month(
        &self,
        month: MonthYear,
    ) -> Result<Vec<MonthlyWinner>, StorageError> {
        let client = self.pool.get().await?;
        let rows = client
            .query(
                "SELECT w.user_id, u.username, w.month_year, w.rank, w.total_aura,
                        w.contributions_count, w.badge_awarded, w.captured_at
                 FROM monthly_winners w
                 JOIN users u ON u.id = w.user_id
                 WHERE w.month_year = $1
                 ORDER BY w.rank",
                &[&month.to_string()],
            )
            .await?;
        let mut winners = Vec::with_capacity(rows.len());
        for row in &rows {
            winners.push(winner_from_pg(row)?);
        }
        Ok(winners)
    }

    async fn unawarded_winners(
        &self,
        month: MonthYear,
    ) -> Result<Vec<MonthlyWinner>, StorageError> {
        let client = self.pool.get().await?;
        let rows = client
            .query(
                "SELECT w.user_id, u.username, w.month_year, w.rank, w.total_aura,
                        w.contributions_count, w.badge_awarded, w.captured_at
                 FROM monthly_winners w
                 JOIN users u ON u.id = w.user_id
                 WHERE w.month_year = $1 AND w.badge_awarded = FALSE
                 ORDER BY w.rank",
                &[&month.to_string()],
            )
            .await?;
        let mut winners = Vec::with_capacity(rows.len());
        for row in &rows {
            winners.push(winner_from_pg(row)?);
        }
        Ok(winners)
    }

    async fn mark_badges_awarded(&self, month: MonthYear) -> Result<u64, StorageError> {
        let client = self.pool.get().await?;
        let changed = client
            .execute(
                "UPDATE monthly_winners SET badge_awarded = TRUE
                 WHERE month_year = $1 AND badge_awarded = FALSE",
                &[&month.to_string()],
            )
            .await?;
        Ok(changed)
    }

    async fn create_user_badge(&self, badge: &NewBadge) -> Result<bool, StorageError> {
        let client = self.pool.get().await?;
        let inserted = client
            .execute(
                "INSERT INTO user_badges (user_id, badge_type, month_year, rank, rarity)
                 VALUES ($1, $2, $3, $4, $5)
                 ON CONFLICT (user_id, month_year) DO NOTHING",
                &[
                    &badge.user_id,
                    &badge.badge_type,
                    &badge.month_year.to_string(),
                    &badge.rank,
                    &badge.rarity,
                ],
            )
            .await?;
        Ok(inserted > 0)
    }

    async fn month_leaderboard(
        &self,
        month: MonthYear,
        limit: i64,
    ) -> Result<Vec<MonthlyLeaderboardEntry>, StorageError> {
        let client = self.pool.get().await?;
        let rows = client
            .query(
                "SELECT ml.user_id, u.username, ml.month_year, ml.total_aura,
                        ml.contributions_count, ml.active_days, ml.rank, ml.last_updated
                 FROM monthly_leaderboard ml
                 JOIN users u ON u.id = ml.user_id
                 WHERE ml.month_year = $1 AND u.banned = FALSE
                 ORDER BY ml.total_aura DESC, ml.contributions_count DESC,
                          u.current_streak DESC, ml.user_id
                 LIMIT $2",
                &[&month.to_string(), &limit],
            )
            .await?;
        let mut entries = Vec::with_capacity(rows.len());
        for row in &rows {
            entries.push(monthly_entry_from_pg(row)?);
        }
        Ok(entries)
    }

    async fn global_leaderboard(
        &self,
        limit: i64,
    ) -> Result<Vec<GlobalLeaderboardEntry>, StorageError> {
        let client = self.pool.get().await?;
        let rows = client
            .query(
                "SELECT g.user_id, u.username, g.total_aura, g.contributions_count::BIGINT,
                        u.current_streak, u.longest_streak, g.rank, g.last_updated
                 FROM global_leaderboard g
                 JOIN users u ON u.id = g.user_id
                 WHERE u.banned = FALSE
                 ORDER BY g.total_aura DESC, g.contributions_count DESC,
                          u.current_streak DESC, g.user_id
                 LIMIT $1",
                &[&limit],
            )
            .await?;
        Ok(rows
            .iter()
            .map(|row| GlobalLeaderboardEntry {
                user_id: row.get(0),
                username: row.get(1),
                total_aura: row.get(2),
                contributions_count: row.get(3),
                current_streak: row.get(4),
                longest_streak: row.get(5),
                rank: row.get(6),
                last_updated: row.get(7),
            })
            .collect())
    }

    async fn user_summary(
        &self,
        username: &str,
    ) -> Result<Option<UserAuraSummary>, StorageError> {
        let client = self.pool.get().await?;

        let row = client
            .query_opt(
                &format!("SELECT {} FROM users WHERE username = $1", USER_COLUMNS),
                &[&username],
            )
            .await?;
        let user = match row {
            Some(row) => user_from_pg(&row),
            None => return Ok(None),
        };

        let global_rank: Option<i32> = client
            .query_opt(
                "SELECT rank FROM global_leaderboard WHERE user_id = $1",
                &[&user.id],
            )
            .await?
            .and_then(|row| row.get(0));

        let month_rows = client
            .query(
                "SELECT ml.user_id, u.username, ml.month_year, ml.total_aura,
                        ml.contributions_count, ml.active_days, ml.rank, ml.last_updated
                 FROM monthly_leaderboard ml
                 JOIN users u ON u.id = ml.user_id
                 WHERE ml.user_id = $1
                 ORDER BY ml.month_year DESC",
                &[&user.id],
            )
            .await?;
        let mut months = Vec::with_capacity(month_rows.len());
        for row in &month_rows {
            months.push(monthly_entry_from_pg(row)?);
        }

        let badge_rows = client
            .query(
                "SELECT user_id, badge_type, month_year, rank, rarity, awarded_at
                 FROM user_badges
                 WHERE user_id = $1
                 ORDER BY month_year DESC",
                &[&user.id],
            )
            .await?;
        let mut badges = Vec::with_capacity(badge_rows.len());
        for row in &badge_rows {
            let raw_month: String = row.get(2);
            badges.push(UserBadge {
                user_id: row.get(0),
                badge_type: row.get(1),
                month_year: parse_month(&raw_month)?,
                rank: row.get(3),
                rarity: row.get(4),
                awarded_at: row.get(5),
            });
        }

        Ok(Some(UserAuraSummary {
            user,
            global_rank,
            months,
            badges,
        }))
    }
}
