//! GitHub contribution source
//!
//! Fetches per-day contribution calendars over the GraphQL API.
//! Supports authentication via environment variables:
//! - AURA_GITHUB_TOKEN (priority)
//! - GITHUB_TOKEN (fallback)

use async_trait::async_trait;
use chrono::{Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, warn};

use crate::aura::ContributionDay;

pub const DEFAULT_GRAPHQL_URL: &str = "https://api.github.com/graphql";

const GITHUB_API_BASE: &str = "https://api.github.com";

/// Trailing window of contribution history to request, in days
const HISTORY_WINDOW_DAYS: i64 = 365;

/// Per-request timeout; a stuck upstream call fails here, not in the engine
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Minimum remaining requests before we start throttling
const RATE_LIMIT_THRESHOLD: u32 = 100;

/// Get GitHub token from environment (AURA_GITHUB_TOKEN takes priority)
fn get_github_token() -> Option<String> {
    std::env::var("AURA_GITHUB_TOKEN")
        .or_else(|_| std::env::var("GITHUB_TOKEN"))
        .ok()
}

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("github user not found: {0}")]
    UnknownUser(String),

    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("github api error: {0}")]
    Api(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

/// One user's contribution calendar over the trailing window
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContributionHistory {
    pub username: String,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub total_contributions: u32,
    pub days: Vec<ContributionDay>,
}

/// Supplies contribution calendars; the engine only sees this seam.
#[async_trait]
pub trait ContributionSource: Send + Sync {
    async fn fetch(&self, username: &str) -> Result<ContributionHistory, SourceError>;
}

/// Rate limit information from GitHub API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitInfo {
    pub limit: u32,
    pub remaining: u32,
    pub reset: i64,
    pub used: u32,
}

impl RateLimitInfo {
    /// Check if we're running low on API calls
    pub fn is_low(&self) -> bool {
        self.remaining < RATE_LIMIT_THRESHOLD
    }

    /// Seconds until rate limit resets
    pub fn seconds_until_reset(&self) -> i64 {
        let now = Utc::now().timestamp();
        (self.reset - now).max(0)
    }
}

// ============================================================================
// GRAPHQL WIRE TYPES
// ============================================================================

const CONTRIBUTIONS_QUERY: &str = r#"
query($login: String!, $from: DateTime!, $to: DateTime!) {
  user(login: $login) {
    name
    avatarUrl
    contributionsCollection(from: $from, to: $to) {
      contributionCalendar {
        totalContributions
        weeks {
          contributionDays {
            date
            contributionCount
          }
        }
      }
    }
  }
}
"#;

#[derive(Debug, Deserialize)]
struct GraphQlResponse {
    data: Option<ResponseData>,
    errors: Option<Vec<GraphQlError>>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
    #[serde(rename = "type")]
    kind: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseData {
    user: Option<UserNode>,
}

#[derive(Debug, Deserialize)]
struct UserNode {
    name: Option<String>,
    #[serde(rename = "avatarUrl")]
    avatar_url: Option<String>,
    #[serde(rename = "contributionsCollection")]
    contributions: ContributionsCollection,
}

#[derive(Debug, Deserialize)]
struct ContributionsCollection {
    #[serde(rename = "contributionCalendar")]
    calendar: ContributionCalendar,
}

#[derive(Debug, Deserialize)]
struct ContributionCalendar {
    #[serde(rename = "totalContributions")]
    total_contributions: u32,
    weeks: Vec<CalendarWeek>,
}

#[derive(Debug, Deserialize)]
struct CalendarWeek {
    #[serde(rename = "contributionDays")]
    contribution_days: Vec<CalendarDay>,
}

#[derive(Debug, Deserialize)]
struct CalendarDay {
    date: NaiveDate,
    #[serde(rename = "contributionCount")]
    contribution_count: u32,
}

fn flatten_calendar(username: &str, user: UserNode) -> ContributionHistory {
    let calendar = user.contributions.calendar;
    let mut days: Vec<ContributionDay> = calendar
        .weeks
        .into_iter()
        .flat_map(|week| week.contribution_days)
        .map(|day| ContributionDay {
            date: day.date,
            count: day.contribution_count,
        })
        .collect();
    days.sort_by_key(|day| day.date);

    ContributionHistory {
        username: username.to_string(),
        display_name: user.name,
        avatar_url: user.avatar_url,
        total_contributions: calendar.total_contributions,
        days,
    }
}

// ============================================================================
// CLIENT
// ============================================================================

pub struct GitHubContributionClient {
    client: reqwest::Client,
    graphql_url: String,
    token: Option<String>,
}

impl GitHubContributionClient {
    pub fn new(graphql_url: impl Into<String>) -> Self {
        let token = get_github_token();
        if token.is_some() {
            info!("GitHub client initialized with authentication token");
        } else {
            warn!("GitHub client initialized WITHOUT token - GraphQL requests will be rejected");
        }
        Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            graphql_url: graphql_url.into(),
            token,
        }
    }

    /// Check if authenticated
    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    fn build_request(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let mut req = builder
            .header("User-Agent", "aura-engine/0.1.0")
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28");

        if let Some(token) = &self.token {
            req = req.header("Authorization", format!("Bearer {}", token));
        }

        req
    }

    /// Check GitHub API rate limit status (heartbeat)
    pub async fn check_rate_limit(&self) -> Result<RateLimitInfo, SourceError> {
        let url = format!("{}/rate_limit", GITHUB_API_BASE);
        let response = self.build_request(self.client.get(&url)).send().await?;

        if !response.status().is_success() {
            return Err(SourceError::Api(format!(
                "failed to check rate limit: {}",
                response.status()
            )));
        }

        #[derive(Deserialize)]
        struct RateLimitResponse {
            resources: RateLimitResources,
        }
        #[derive(Deserialize)]
        struct RateLimitResources {
            graphql: RateLimitCore,
        }
        #[derive(Deserialize)]
        struct RateLimitCore {
            limit: u32,
            remaining: u32,
            reset: i64,
            used: u32,
        }

        let data: RateLimitResponse = response.json().await?;
        Ok(RateLimitInfo {
            limit: data.resources.graphql.limit,
            remaining: data.resources.graphql.remaining,
            reset: data.resources.graphql.reset,
            used: data.resources.graphql.used,
        })
    }
}

#[async_trait]
impl ContributionSource for GitHubContributionClient {
    async fn fetch(&self, username: &str) -> Result<ContributionHistory, SourceError> {
        let to = Utc::now();
        let from = to - Duration::days(HISTORY_WINDOW_DAYS);

        debug!("Fetching contribution calendar for {}", username);

        let body = json!({
            "query": CONTRIBUTIONS_QUERY,
            "variables": {
                "login": username,
                "from": from.to_rfc3339(),
                "to": to.to_rfc3339(),
            },
        });

        let response = self
            .build_request(self.client.post(&self.graphql_url))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status.as_u16() == 403 || status.as_u16() == 429 {
            return Err(SourceError::RateLimited(format!(
                "github returned {}",
                status
            )));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SourceError::Api(format!("github returned {}: {}", status, body)));
        }

        let payload: GraphQlResponse = response.json().await?;

        if let Some(errors) = payload.errors {
            if errors
                .iter()
                .any(|e| e.kind.as_deref() == Some("NOT_FOUND"))
            {
                return Err(SourceError::UnknownUser(username.to_string()));
            }
            if errors
                .iter()
                .any(|e| e.kind.as_deref() == Some("RATE_LIMITED"))
            {
                let message = errors
                    .iter()
                    .map(|e| e.message.clone())
                    .collect::<Vec<_>>()
                    .join("; ");
                return Err(SourceError::RateLimited(message));
            }
            let message = errors
                .into_iter()
                .map(|e| e.message)
                .collect::<Vec<_>>()
                .join("; ");
            return Err(SourceError::Api(message));
        }

        let user = payload
            .data
            .and_then(|data| data.user)
            .ok_or_else(|| SourceError::UnknownUser(username.to_string()))?;

        let history = flatten_calendar(username, user);
        debug!(
            "Fetched {} contribution days ({} total) for {}",
            history.days.len(),
            history.total_contributions,
            username
        );
        Ok(history)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn calendar_weeks_flatten_into_sorted_days() {
        let raw = serde_json::json!({
            "name": "The Octocat",
            "avatarUrl": "https://example.com/a.png",
            "contributionsCollection": {
                "contributionCalendar": {
                    "totalContributions": 9,
                    "weeks": [
                        { "contributionDays": [
                            { "date": "2024-01-08", "contributionCount": 4 }
                        ]},
                        { "contributionDays": [
                            { "date": "2024-01-01", "contributionCount": 5 },
                            { "date": "2024-01-02", "contributionCount": 0 }
                        ]}
                    ]
                }
            }
        });

        let user: UserNode = serde_json::from_value(raw).unwrap();
        let history = flatten_calendar("octocat", user);

        assert_eq!(history.total_contributions, 9);
        assert_eq!(history.display_name.as_deref(), Some("The Octocat"));
        assert_eq!(history.days.len(), 3);
        assert_eq!(
            history.days[0].date,
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
        );
        assert_eq!(history.days[2].count, 4);
    }

    #[test]
    fn graphql_errors_deserialize_with_kind() {
        let raw = r#"{"data": null, "errors": [{"message": "Could not resolve to a User", "type": "NOT_FOUND"}]}"#;
        let payload: GraphQlResponse = serde_json::from_str(raw).unwrap();
        let errors = payload.errors.unwrap();
        assert_eq!(errors[0].kind.as_deref(), Some("NOT_FOUND"));
    }
}
