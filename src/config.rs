//! Configuration management
//!
//! Loads configuration from config.toml with support for:
//! - GitHub GraphQL endpoint settings
//! - Local SQLite database path
//! - Refresh scheduling parameters

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::scheduler::{DEFAULT_BATCH_DELAY_MS, DEFAULT_BATCH_SIZE};

const DEFAULT_CONFIG: &str = include_str!("../config.toml");

const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 3_600;

/// Main configuration structure matching config.toml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub github: GitHubConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub refresh: RefreshConfig,
}

/// GitHub API configuration (the token comes from the environment)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubConfig {
    /// GraphQL endpoint used to fetch contribution calendars
    pub api_url: String,
}

/// Database configuration (DATABASE_URL env var takes precedence)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Local SQLite database path, ignored when DATABASE_URL is set
    pub path: String,
}

/// Refresh scheduling configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshConfig {
    /// Seconds between scheduled refresh passes
    pub interval_secs: u64,
    /// Users refreshed concurrently within one batch
    pub batch_size: usize,
    /// Pause between batches, in milliseconds
    pub batch_delay_ms: u64,
}

impl Config {
    /// Load from config.toml or use defaults
    pub fn load() -> Result<Self> {
        Self::load_from("config.toml")
    }

    /// Load from specific path
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if path.exists() {
            let content = std::fs::read_to_string(path).context("Failed to read config file")?;
            toml::from_str(&content).context("Failed to parse config file")
        } else {
            // Use embedded default config
            toml::from_str(DEFAULT_CONFIG).context("Failed to parse default config")
        }
    }

    /// Get the Postgres connection string, if one is configured
    pub fn database_url(&self) -> Option<String> {
        match std::env::var("DATABASE_URL") {
            Ok(url) if !url.is_empty() => Some(url),
            _ => None,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        // The embedded default config ships with the binary, so this
        // should never fail. Using a fallback for robustness.
        toml::from_str(DEFAULT_CONFIG).unwrap_or_else(|_| Self {
            github: GitHubConfig::default(),
            database: DatabaseConfig::default(),
            refresh: RefreshConfig::default(),
        })
    }
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            api_url: crate::github::DEFAULT_GRAPHQL_URL.to_string(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "aura.db".to_string(),
        }
    }
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            interval_secs: DEFAULT_REFRESH_INTERVAL_SECS,
            batch_size: DEFAULT_BATCH_SIZE,
            batch_delay_ms: DEFAULT_BATCH_DELAY_MS,
        }
    }
}

impl RefreshConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn batch_delay(&self) -> Duration {
        Duration::from_millis(self.batch_delay_ms)
    }
}
