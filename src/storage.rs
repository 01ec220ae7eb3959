//! Storage layer for aura state
//!
//! Defines the persistence seam (`AuraStorage`) shared by the SQLite
//! backend below (local mode, tests) and the PostgreSQL backend in
//! `pg_storage`. Uniqueness on `(user_id, month_year)` is enforced by
//! the schema, not by application pre-checks.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Mutex;
use uuid::Uuid;

use crate::aura::{MonthYear, MonthlyAura, StreakState};

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("postgres error: {0}")]
    Postgres(#[from] tokio_postgres::Error),

    #[error("postgres pool error: {0}")]
    Pool(#[from] deadpool_postgres::PoolError),

    #[error("corrupt row: {0}")]
    Corrupt(String),

    #[error("user not found: {0}")]
    UserNotFound(String),
}

// ============================================================================
// DATA STRUCTURES
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub banned: bool,
    pub total_aura: i64,
    pub current_streak: i32,
    pub longest_streak: i32,
    pub last_contribution_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonthlyLeaderboardEntry {
    pub user_id: Uuid,
    pub username: String,
    pub month_year: MonthYear,
    pub total_aura: i64,
    pub contributions_count: i32,
    pub active_days: i32,
    pub rank: Option<i32>,
    pub last_updated: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalLeaderboardEntry {
    pub user_id: Uuid,
    pub username: String,
    pub total_aura: i64,
    pub contributions_count: i64,
    pub current_streak: i32,
    pub longest_streak: i32,
    pub rank: Option<i32>,
    pub last_updated: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonthlyWinner {
    pub user_id: Uuid,
    pub username: String,
    pub month_year: MonthYear,
    pub rank: i32,
    pub total_aura: i64,
    pub contributions_count: i32,
    pub badge_awarded: bool,
    pub captured_at: DateTime<Utc>,
}

/// Winner row to insert; `captured_at` is stamped by storage.
#[derive(Debug, Clone)]
pub struct NewWinner {
    pub user_id: Uuid,
    pub month_year: MonthYear,
    pub rank: i32,
    pub total_aura: i64,
    pub contributions_count: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserBadge {
    pub user_id: Uuid,
    pub badge_type: String,
    pub month_year: MonthYear,
    pub rank: i32,
    pub rarity: String,
    pub awarded_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewBadge {
    pub user_id: Uuid,
    pub badge_type: String,
    pub month_year: MonthYear,
    pub rank: i32,
    pub rarity: String,
}

/// Sort inputs for one leaderboard entry during a rank pass
#[derive(Debug, Clone)]
pub struct RankCandidate {
    pub user_id: Uuid,
    pub total_aura: i64,
    pub contributions_count: i64,
    pub current_streak: i32,
}

/// Staleness inputs for one user's refresh decision
#[derive(Debug, Clone)]
pub struct RefreshCandidate {
    pub user_id: Uuid,
    pub username: String,
    pub last_contribution_date: Option<NaiveDate>,
    pub last_refreshed: Option<DateTime<Utc>>,
}

/// Everything the `user` view shows for one account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserAuraSummary {
    pub user: User,
    pub global_rank: Option<i32>,
    pub months: Vec<MonthlyLeaderboardEntry>,
    pub badges: Vec<UserBadge>,
}

// ============================================================================
// STORAGE TRAIT
// ============================================================================

/// Persistence seam for the aura engine.
///
/// Writers are split by field, never by row: the updater owns aura
/// values and streaks, the rank recomputer owns `rank`, winner capture
/// owns winner rows. Duplicate-create calls (`create_winner`,
/// `create_user_badge`) report `Ok(false)` instead of an error.
#[async_trait]
pub trait AuraStorage: Send + Sync {
    /// Create the user if missing, refresh profile fields if present.
    async fn upsert_user(
        &self,
        username: &str,
        display_name: Option<&str>,
        avatar_url: Option<&str>,
    ) -> Result<User, StorageError>;

    async fn get_user(&self, username: &str) -> Result<Option<User>, StorageError>;

    /// Returns false if no such user exists.
    async fn set_user_banned(&self, username: &str, banned: bool) -> Result<bool, StorageError>;

    /// Write lifetime total and streak counters onto the user row.
    /// `longest_streak` never decreases regardless of the input.
    async fn update_user_aura(
        &self,
        user_id: Uuid,
        total_aura: i64,
        streaks: &StreakState,
    ) -> Result<(), StorageError>;

    /// Upsert one month's aura fields. `rank` is left untouched on
    /// update and NULL on insert.
    async fn upsert_monthly_aura(
        &self,
        user_id: Uuid,
        aura: &MonthlyAura,
    ) -> Result<(), StorageError>;

    /// Lifetime `(total_aura, contributions)` summed over stored months.
    async fn sum_monthly_aura(&self, user_id: Uuid) -> Result<(i64, i64), StorageError>;

    /// Upsert the all-time entry's aura fields and freshness stamp.
    async fn upsert_global_entry(
        &self,
        user_id: Uuid,
        total_aura: i64,
        contributions_count: i64,
    ) -> Result<(), StorageError>;

    async fn month_rank_candidates(
        &self,
        month: MonthYear,
    ) -> Result<Vec<RankCandidate>, StorageError>;

    async fn global_rank_candidates(&self) -> Result<Vec<RankCandidate>, StorageError>;

    async fn write_month_ranks(
        &self,
        month: MonthYear,
        ranks: &[(Uuid, i32)],
    ) -> Result<u64, StorageError>;

    async fn write_global_ranks(&self, ranks: &[(Uuid, i32)]) -> Result<u64, StorageError>;

    /// All non-banned users with their staleness inputs.
    async fn refresh_candidates(&self) -> Result<Vec<RefreshCandidate>, StorageError>;

    /// Insert a winner row; `Ok(false)` when `(user_id, month_year)`
    /// already exists.
    async fn create_winner(&self, winner: &NewWinner) -> Result<bool, StorageError>;

    async fn winners_for_month(&self, month: MonthYear)
        -> Result<Vec<MonthlyWinner>, StorageError>;

    async fn unawarded_winners(
        &self,
        month: MonthYear,
    ) -> Result<Vec<MonthlyWinner>, StorageError>;

    /// Flip `badge_awarded` for the month's winners. Returns rows
    /// changed; rows already true are left alone.
    async fn mark_badges_awarded(&self, month: MonthYear) -> Result<u64, StorageError>;

    /// Insert a badge; `Ok(false)` when the user already holds one for
    /// the month.
    async fn create_user_badge(&self, badge: &NewBadge) -> Result<bool, StorageError>;

    /// Month leaderboard, banned users excluded, best first.
    async fn month_leaderboard(
        &self,
        month: MonthYear,
        limit: i64,
    ) -> Result<Vec<MonthlyLeaderboardEntry>, StorageError>;

    /// All-time leaderboard, banned users excluded, best first.
    async fn global_leaderboard(
        &self,
        limit: i64,
    ) -> Result<Vec<GlobalLeaderboardEntry>, StorageError>;

    async fn user_summary(&self, username: &str)
        -> Result<Option<UserAuraSummary>, StorageError>;
}

// ============================================================================
// SQLITE BACKEND
// ============================================================================

pub struct SqliteStorage {
    conn: Mutex<Connection>,
}

impl SqliteStorage {
    pub fn new(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    pub fn in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self, StorageError> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(include_str!("../migrations/sqlite_schema.sql"))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

fn uuid_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Uuid> {
    let raw: String = row.get(idx)?;
    Uuid::parse_str(&raw)
        .map_err(|err| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err)))
}

fn month_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<MonthYear> {
    let raw: String = row.get(idx)?;
    raw.parse().map_err(|err: anyhow::Error| {
        rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, err.into())
    })
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: uuid_column(row, 0)?,
        username: row.get(1)?,
        display_name: row.get(2)?,
        avatar_url: row.get(3)?,
        banned: row.get(4)?,
        total_aura: row.get(5)?,
        current_streak: row.get(6)?,
        longest_streak: row.get(7)?,
        last_contribution_date: row.get(8)?,
        created_at: row.get(9)?,
    })
}

const USER_COLUMNS: &str = "id, username, display_name, avatar_url, banned, total_aura, \
     current_streak, longest_streak, last_contribution_date, created_at";

fn monthly_entry_from_row(row: &Row<'_>) -> rusqlite::Result<MonthlyLeaderboardEntry> {
    Ok(MonthlyLeaderboardEntry {
        user_id: uuid_column(row, 0)?,
        username: row.get(1)?,
        month_year: month_column(row, 2)?,
        total_aura: row.get(3)?,
        contributions_count: row.get(4)?,
        active_days: row.get(5)?,
        rank: row.get(6)?,
        last_updated: row.get(7)?,
    })
}

fn winner_from_row(row: &Row<'_>) -> rusqlite::Result<MonthlyWinner> {
    Ok(MonthlyWinner {
        user_id: uuid_column(row, 0)?,
        username: row.get(1)?,
        month_year: month_column(row, 2)?,
        rank: row.get(3)?,
        total_aura: row.get(4)?,
        contributions_count: row.get(5)?,
        badge_awarded: row.get(6)?,
        captured_at: row.get(7)?,
    })
}

#[async_trait]
impl AuraStorage for SqliteStorage {
    async fn upsert_user(
        &self,
        username: &str,
        display_name: Option<&str>,
        avatar_url: Option<&str>,
    ) -> Result<User, StorageError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO users (id, username, display_name, avatar_url, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT (username) DO UPDATE SET
                 display_name = COALESCE(excluded.display_name, users.display_name),
                 avatar_url = COALESCE(excluded.avatar_url, users.avatar_url)",
            params![
                Uuid::new_v4().to_string(),
                username,
                display_name,
                avatar_url,
                Utc::now(),
            ],
        )?;

        let user = conn.query_row(
            &format!("SELECT {} FROM users WHERE username = ?1", USER_COLUMNS),
            params![username],
            user_from_row,
        )?;
        Ok(user)
    }

    async fn get_user(&self, username: &str) -> Result<Option<User>, StorageError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM users WHERE username = ?1",
            USER_COLUMNS
        ))?;
        let mut rows = stmt.query_map(params![username], user_from_row)?;
        rows.next().transpose().map_err(StorageError::from)
    }

    async fn set_user_banned(&self, username: &str, banned: bool) -> Result<bool, StorageError> {
        let conn = self.conn.lock().unwrap();
        let changed = conn.execute(
            "UPDATE users SET banned = ?1 WHERE username = ?2",
            params![banned, username],
        )?;
        Ok(changed > 0)
    }

    async fn update_user_aura(
        &self,
        user_id: Uuid,
        total_aura: i64,
        streaks: &StreakState,
    ) -> Result<(), StorageError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE users SET
                 total_aura = ?1,
                 current_streak = ?2,
                 longest_streak = MAX(longest_streak, ?3),
                 last_contribution_date = COALESCE(?4, last_contribution_date)
             WHERE id = ?5",
            params![
                total_aura,
                streaks.current,
                streaks.longest,
                streaks.last_contribution_date,
                user_id.to_string(),
            ],
        )?;
        Ok(())
    }

    async fn upsert_monthly_aura(
        &self,
        user_id: Uuid,
        aura: &MonthlyAura,
    ) -> Result<(), StorageError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO monthly_leaderboard
                 (user_id, month_year, total_aura, contributions_count, active_days, last_updated)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT (user_id, month_year) DO UPDATE SET
                 total_aura = excluded.total_aura,
                 contributions_count = excluded.contributions_count,
                 active_days = excluded.active_days,
                 last_updated = excluded.last_updated",
            params![
                user_id.to_string(),
                aura.month.to_string(),
                aura.total_aura,
                aura.contributions_count,
                aura.active_days,
                Utc::now(),
            ],
        )?;
        Ok(())
    }

    async fn sum_monthly_aura(&self, user_id: Uuid) -> Result<(i64, i64), StorageError> {
        let conn = self.conn.lock().unwrap();
        let totals = conn.query_row(
            "SELECT COALESCE(SUM(total_aura), 0), COALESCE(SUM(contributions_count), 0)
             FROM monthly_leaderboard WHERE user_id = ?1",
            params![user_id.to_string()],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        Ok(totals)
    }

    async fn upsert_global_entry(
        &self,
        user_id: Uuid,
        total_aura: i64,
        contributions_count: i64,
    ) -> Result<(), StorageError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO global_leaderboard (user_id, total_aura, contributions_count, last_updated)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT (user_id) DO UPDATE SET
                 total_aura = excluded.total_aura,
                 contributions_count = excluded.contributions_count,
                 last_updated = excluded.last_updated",
            params![
                user_id.to_string(),
                total_aura,
                contributions_count,
                Utc::now(),
            ],
        )?;
        Ok(())
    }

    async fn month_rank_candidates(
        &self,
        month: MonthYear,
    ) -> Result<Vec<RankCandidate>, StorageError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT ml.user_id, ml.total_aura, ml.contributions_count, u.current_streak
             FROM monthly_leaderboard ml
             JOIN users u ON u.id = ml.user_id
             WHERE ml.month_year = ?1",
        )?;
        let candidates = stmt
            .query_map(params![month.to_string()], |row| {
                Ok(RankCandidate {
                    user_id: uuid_column(row, 0)?,
                    total_aura: row.get(1)?,
                    contributions_count: row.get(2)?,
                    current_streak: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(candidates)
    }

    async fn global_rank_candidates(&self) -> Result<Vec<RankCandidate>, StorageError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT g.user_id, g.total_aura, g.contributions_count, u.current_streak
             FROM global_leaderboard g
             JOIN users u ON u.id = g.user_id",
        )?;
        let candidates = stmt
            .query_map([], |row| {
                Ok(RankCandidate {
                    user_id: uuid_column(row, 0)?,
                    total_aura: row.get(1)?,
                    contributions_count: row.get(2)?,
                    current_streak: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(candidates)
    }

    async fn write_month_ranks(
        &self,
        month: MonthYear,
        ranks: &[(Uuid, i32)],
    ) -> Result<u64, StorageError> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        let mut updated = 0u64;
        for (user_id, rank) in ranks {
            updated += tx.execute(
                "UPDATE monthly_leaderboard SET rank = ?1
                 WHERE user_id = ?2 AND month_year = ?3",
                params![rank, user_id.to_string(), month.to_string()],
            )? as u64;
        }
        tx.commit()?;
        Ok(updated)
    }

    async fn write_global_ranks(&self, ranks: &[(Uuid, i32)]) -> Result<u64, StorageError> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        let mut updated = 0u64;
        for (user_id, rank) in ranks {
            updated += tx.execute(
                "UPDATE global_leaderboard SET rank = ?1 WHERE user_id = ?2",
                params![rank, user_id.to_string()],
            )? as u64;
        }
        tx.commit()?;
        Ok(updated)
    }

    async fn refresh_candidates(&self) -> Result<Vec<RefreshCandidate>, StorageError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT u.id, u.username, u.last_contribution_date, g.last_updated
             FROM users u
             LEFT JOIN global_leaderboard g ON g.user_id = u.id
             WHERE u.banned = 0
             ORDER BY u.username",
        )?;
        let candidates = stmt
            .query_map([], |row| {
                Ok(RefreshCandidate {
                    user_id: uuid_column(row, 0)?,
                    username: row.get(1)?,
                    last_contribution_date: row.get(2)?,
                    last_refreshed: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(candidates)
    }

    async fn create_winner(&self, winner: &NewWinner) -> Result<bool, StorageError> {
        let conn = self.conn.lock().unwrap();
        let inserted = conn.execute(
            "INSERT INTO monthly_winners
                 (user_id, month_year, rank, total_aura, contributions_count, captured_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT (user_id, month_year) DO NOTHING",
            params![
                winner.user_id.to_string(),
                winner.month_year.to_string(),
                winner.rank,
                winner.total_aura,
                winner.contributions_count,
                Utc::now(),
            ],
        )?;
        Ok(inserted > 0)
    }

    async fn winners_for_month(
        &self,
        month: MonthYear,
    ) -> Result<Vec<MonthlyWinner>, StorageError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT w.user_id, u.username, w.month_year, w.rank, w.total_aura,
                    w.contributions_count, w.badge_awarded, w.captured_at
             FROM monthly_winners w
             JOIN users u ON u.id = w.user_id
             WHERE w.month_year = ?1
             ORDER BY w.rank",
        )?;
        let winners = stmt
            .query_map(params![month.to_string()], winner_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(winners)
    }

    async fn unawarded_winners(
        &self,
        month: MonthYear,
    ) -> Result<Vec<MonthlyWinner>, StorageError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT w.user_id, u.username, w.month_year, w.rank, w.total_aura,
                    w.contributions_count, w.badge_awarded, w.captured_at
             FROM monthly_winners w
             JOIN users u ON u.id = w.user_id
             WHERE w.month_year = ?1 AND w.badge_awarded = 0
             ORDER BY w.rank",
        )?;
        let winners = stmt
            .query_map(params![month.to_string()], winner_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(winners)
    }

    async fn mark_badges_awarded(&self, month: MonthYear) -> Result<u64, StorageError> {
        let conn = self.conn.lock().unwrap();
        let changed = conn.execute(
            "UPDATE monthly_winners SET badge_awarded = 1
             WHERE month_year = ?1 AND badge_awarded = 0",
            params![month.to_string()],
        )?;
        Ok(changed as u64)
    }

    async fn create_user_badge(&self, badge: &NewBadge) -> Result<bool, StorageError> {
        let conn = self.conn.lock().unwrap();
        let inserted = conn.execute(
            "INSERT INTO user_badges (user_id, badge_type, month_year, rank, rarity, awarded_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT (user_id, month_year) DO NOTHING",
            params![
                badge.user_id.to_string(),
                badge.badge_type,
                badge.month_year.to_string(),
                badge.rank,
                badge.rarity,
                Utc::now(),
            ],
        )?;
        Ok(inserted > 0)
    }

    async fn month_leaderboard(
        &self,
        month: MonthYear,
        limit: i64,
    ) -> Result<Vec<MonthlyLeaderboardEntry>, StorageError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT ml.user_id, u.username, ml.month_year, ml.total_aura,
                    ml.contributions_count, ml.active_days, ml.rank, ml.last_updated
             FROM monthly_leaderboard ml
             JOIN users u ON u.id = ml.user_id
             WHERE ml.month_year = ?1 AND u.banned = 0
             ORDER BY ml.total_aura DESC, ml.contributions_count DESC,
                      u.current_streak DESC, ml.user_id
             LIMIT ?2",
        )?;
        let entries = stmt
            .query_map(params![month.to_string(), limit], monthly_entry_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    async fn global_leaderboard(
        &self,
        limit: i64,
    ) -> Result<Vec<GlobalLeaderboardEntry>, StorageError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT g.user_id, u.username, g.total_aura, g.contributions_count,
                    u.current_streak, u.longest_streak, g.rank, g.last_updated
             FROM global_leaderboard g
             JOIN users u ON u.id = g.user_id
             WHERE u.banned = 0
             ORDER BY g.total_aura DESC, g.contributions_count DESC,
                      u.current_streak DESC, g.user_id
             LIMIT ?1",
        )?;
        let entries = stmt
            .query_map(params![limit], |row| {
                Ok(GlobalLeaderboardEntry {
                    user_id: uuid_column(row, 0)?,
                    username: row.get(1)?,
                    total_aura: row.get(2)?,
                    contributions_count: row.get(3)?,
                    current_streak: row.get(4)?,
                    longest_streak: row.get(5)?,
                    rank: row.get(6)?,
                    last_updated: row.get(7)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    async fn user_summary(
        &self,
        username: &str,
    ) -> Result<Option<UserAuraSummary>, StorageError> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM users WHERE username = ?1",
            USER_COLUMNS
        ))?;
        let mut rows = stmt.query_map(params![username], user_from_row)?;
        let user = match rows.next().transpose()? {
            Some(user) => user,
            None => return Ok(None),
        };
        drop(rows);
        drop(stmt);

        let global_rank: Option<i32> = conn
            .query_row(
                "SELECT rank FROM global_leaderboard WHERE user_id = ?1",
                params![user.id.to_string()],
                |row| row.get(0),
            )
            .unwrap_or(None);

        let mut stmt = conn.prepare(
            "SELECT ml.user_id, u.username, ml.month_year, ml.total_aura,
                    ml.contributions_count, ml.active_days, ml.rank, ml.last_updated
             FROM monthly_leaderboard ml
             JOIN users u ON u.id = ml.user_id
             WHERE ml.user_id = ?1
             ORDER BY ml.month_year DESC",
        )?;
        let months = stmt
            .query_map(params![user.id.to_string()], monthly_entry_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        let mut stmt = conn.prepare(
            "SELECT user_id, badge_type, month_year, rank, rarity, awarded_at
             FROM user_badges
             WHERE user_id = ?1
             ORDER BY month_year DESC",
        )?;
        let badges = stmt
            .query_map(params![user.id.to_string()], |row| {
                Ok(UserBadge {
                    user_id: uuid_column(row, 0)?,
                    badge_type: row.get(1)?,
                    month_year: month_column(row, 2)?,
                    rank: row.get(3)?,
                    rarity: row.get(4)?,
                    awarded_at: row.get(5)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Some(UserAuraSummary {
            user,
            global_rank,
            months,
            badges,
        }))
    }
}
