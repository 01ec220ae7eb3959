//! Aura scoring math
//!
//! Pure functions that turn a contribution calendar into monthly aura
//! totals and streak counters. Nothing here touches storage or the
//! network; callers pass the reference date in explicitly.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use anyhow::{anyhow, Context};
use chrono::{Datelike, Days, NaiveDate};
use serde::{Deserialize, Serialize};

/// Aura granted per contribution
pub const AURA_PER_CONTRIBUTION: i64 = 10;

/// Aura granted per day with at least one contribution
pub const AURA_PER_ACTIVE_DAY: i64 = 50;

/// Scale applied to the active-days fraction of the month
pub const CONSISTENCY_SCALE: f64 = 1000.0;

// ============================================================================
// MONTH KEY
// ============================================================================

/// One calendar month, serialized as "YYYY-MM".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MonthYear {
    year: i32,
    month: u32,
}

impl MonthYear {
    pub fn new(year: i32, month: u32) -> anyhow::Result<Self> {
        if !(1..=12).contains(&month) {
            return Err(anyhow!("invalid month {} (expected 1-12)", month));
        }
        Ok(Self { year, month })
    }

    /// Month containing the given date
    pub fn containing(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn first_day(&self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, self.month, 1).expect("month validated on construction")
    }

    pub fn next(&self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    pub fn previous(&self) -> Self {
        if self.month == 1 {
            Self {
                year: self.year - 1,
                month: 12,
            }
        } else {
            Self {
                year: self.year,
                month: self.month - 1,
            }
        }
    }

    /// Calendar days in this month (28-31, leap-aware)
    pub fn days_in_month(&self) -> u32 {
        (self.next().first_day() - self.first_day()).num_days() as u32
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date.year() == self.year && date.month() == self.month
    }
}

impl fmt::Display for MonthYear {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for MonthYear {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (year, month) = s
            .split_once('-')
            .ok_or_else(|| anyhow!("invalid month key '{}' (expected YYYY-MM)", s))?;
        let year: i32 = year
            .parse()
            .with_context(|| format!("invalid year in month key '{}'", s))?;
        let month: u32 = month
            .parse()
            .with_context(|| format!("invalid month in month key '{}'", s))?;
        Self::new(year, month)
    }
}

impl TryFrom<String> for MonthYear {
    type Error = anyhow::Error;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<MonthYear> for String {
    fn from(m: MonthYear) -> String {
        m.to_string()
    }
}

// ============================================================================
// SCORING
// ============================================================================

/// One day of a user's contribution calendar
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContributionDay {
    pub date: NaiveDate,
    pub count: u32,
}

/// Aura earned in a single month
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthlyAura {
    pub month: MonthYear,
    pub total_aura: i64,
    pub contributions_count: u32,
    pub active_days: u32,
}

/// Distinct months represented in the input, ascending
pub fn months_covered(days: &[ContributionDay]) -> Vec<MonthYear> {
    let months: BTreeSet<MonthYear> = days
        .iter()
        .map(|day| MonthYear::containing(day.date))
        .collect();
    months.into_iter().collect()
}

/// Score one month of a contribution calendar.
///
/// Days outside the target month are ignored; duplicate entries for the
/// same date are merged. A zero-contribution month scores exactly 0.
pub fn compute_month(month: MonthYear, days: &[ContributionDay]) -> MonthlyAura {
    let mut by_date: BTreeMap<NaiveDate, u32> = BTreeMap::new();
    for day in days {
        if month.contains(day.date) {
            *by_date.entry(day.date).or_insert(0) += day.count;
        }
    }

    let contributions_count: u32 = by_date.values().sum();
    let active_days = by_date.values().filter(|count| **count > 0).count() as u32;

    let base_aura = i64::from(contributions_count) * AURA_PER_CONTRIBUTION;
    let consistency_ratio = f64::from(active_days) / f64::from(month.days_in_month());
    let consistency_bonus = (consistency_ratio * CONSISTENCY_SCALE).round() as i64;

    MonthlyAura {
        month,
        total_aura: base_aura + i64::from(active_days) * AURA_PER_ACTIVE_DAY + consistency_bonus,
        contributions_count,
        active_days,
    }
}

// ============================================================================
// STREAKS
// ============================================================================

/// Streak counters derived from a full contribution calendar
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StreakState {
    pub current: u32,
    pub longest: u32,
    pub last_contribution_date: Option<NaiveDate>,
}

/// Scan the calendar oldest to newest and derive streaks.
///
/// A run is a maximal sequence of consecutive calendar days with at
/// least one contribution; dates absent from the input count as zero.
/// The final run is still current only if it reaches `today` or
/// yesterday (today is not counted against the user before it ends).
/// Dates after `today` are ignored.
pub fn compute_streaks(days: &[ContributionDay], today: NaiveDate) -> StreakState {
    let mut by_date: BTreeMap<NaiveDate, u32> = BTreeMap::new();
    for day in days {
        if day.date <= today {
            *by_date.entry(day.date).or_insert(0) += day.count;
        }
    }

    let active: Vec<NaiveDate> = by_date
        .into_iter()
        .filter(|(_, count)| *count > 0)
        .map(|(date, _)| date)
        .collect();

    let mut longest: u32 = 0;
    let mut run: u32 = 0;
    let mut prev: Option<NaiveDate> = None;
    for date in &active {
        run = match prev {
            Some(p) if p.checked_add_days(Days::new(1)) == Some(*date) => run + 1,
            _ => 1,
        };
        longest = longest.max(run);
        prev = Some(*date);
    }

    let last_contribution_date = active.last().copied();
    let yesterday = today.checked_sub_days(Days::new(1));
    let current = match (last_contribution_date, yesterday) {
        (Some(last), Some(y)) if last >= y => run,
        (Some(last), None) if last == today => run,
        _ => 0,
    };

    StreakState {
        current,
        longest,
        last_contribution_date,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn calendar(start: NaiveDate, counts: &[u32]) -> Vec<ContributionDay> {
        counts
            .iter()
            .enumerate()
            .map(|(i, count)| ContributionDay {
                date: start.checked_add_days(Days::new(i as u64)).unwrap(),
                count: *count,
            })
            .collect()
    }

    #[test]
    fn month_key_parses_and_formats() {
        let m: MonthYear = "2024-03".parse().unwrap();
        assert_eq!(m.year(), 2024);
        assert_eq!(m.month(), 3);
        assert_eq!(m.to_string(), "2024-03");
    }

    #[test]
    fn month_key_rejects_garbage() {
        assert!("2024-13".parse::<MonthYear>().is_err());
        assert!("2024-00".parse::<MonthYear>().is_err());
        assert!("202403".parse::<MonthYear>().is_err());
        assert!("2024-3x".parse::<MonthYear>().is_err());
    }

    #[test]
    fn days_in_month_is_leap_aware() {
        assert_eq!(MonthYear::new(2024, 2).unwrap().days_in_month(), 29);
        assert_eq!(MonthYear::new(2023, 2).unwrap().days_in_month(), 28);
        assert_eq!(MonthYear::new(2024, 1).unwrap().days_in_month(), 31);
        assert_eq!(MonthYear::new(2024, 4).unwrap().days_in_month(), 30);
    }

    #[test]
    fn previous_and_next_wrap_year_boundaries() {
        let jan = MonthYear::new(2024, 1).unwrap();
        assert_eq!(jan.previous(), MonthYear::new(2023, 12).unwrap());
        assert_eq!(MonthYear::new(2023, 12).unwrap().next(), jan);
    }

    #[test]
    fn january_example_scores_245() {
        let month = MonthYear::new(2024, 1).unwrap();
        let days = vec![
            ContributionDay {
                date: date(2024, 1, 1),
                count: 5,
            },
            ContributionDay {
                date: date(2024, 1, 2),
                count: 0,
            },
            ContributionDay {
                date: date(2024, 1, 3),
                count: 3,
            },
        ];

        let aura = compute_month(month, &days);
        assert_eq!(aura.contributions_count, 8);
        assert_eq!(aura.active_days, 2);
        // 80 base + 100 active-day bonus + round(2/31 * 1000) = 65
        assert_eq!(aura.total_aura, 245);
    }

    #[test]
    fn empty_month_scores_zero() {
        let month = MonthYear::new(2024, 6).unwrap();
        let aura = compute_month(month, &[]);
        assert_eq!(aura.total_aura, 0);
        assert_eq!(aura.contributions_count, 0);
        assert_eq!(aura.active_days, 0);
    }

    #[test]
    fn zero_count_days_score_zero() {
        let month = MonthYear::new(2024, 6).unwrap();
        let days = calendar(date(2024, 6, 1), &[0, 0, 0]);
        assert_eq!(compute_month(month, &days).total_aura, 0);
    }

    #[test]
    fn days_outside_target_month_are_ignored() {
        let month = MonthYear::new(2024, 2).unwrap();
        let days = vec![
            ContributionDay {
                date: date(2024, 1, 31),
                count: 10,
            },
            ContributionDay {
                date: date(2024, 2, 1),
                count: 2,
            },
            ContributionDay {
                date: date(2024, 3, 1),
                count: 10,
            },
        ];

        let aura = compute_month(month, &days);
        assert_eq!(aura.contributions_count, 2);
        assert_eq!(aura.active_days, 1);
    }

    #[test]
    fn duplicate_dates_merge_into_one_active_day() {
        let month = MonthYear::new(2024, 5).unwrap();
        let days = vec![
            ContributionDay {
                date: date(2024, 5, 10),
                count: 3,
            },
            ContributionDay {
                date: date(2024, 5, 10),
                count: 2,
            },
        ];

        let aura = compute_month(month, &days);
        assert_eq!(aura.contributions_count, 5);
        assert_eq!(aura.active_days, 1);
    }

    #[test]
    fn months_covered_is_sorted_and_unique() {
        let days = vec![
            ContributionDay {
                date: date(2024, 3, 5),
                count: 1,
            },
            ContributionDay {
                date: date(2024, 1, 2),
                count: 1,
            },
            ContributionDay {
                date: date(2024, 3, 9),
                count: 0,
            },
        ];

        let months = months_covered(&days);
        assert_eq!(
            months,
            vec![
                MonthYear::new(2024, 1).unwrap(),
                MonthYear::new(2024, 3).unwrap()
            ]
        );
    }

    #[test]
    fn streak_example_current_and_longest_are_three() {
        // Oldest to newest: 1,1,0,1,1,1 ending today
        let today = date(2024, 6, 6);
        let days = calendar(date(2024, 6, 1), &[1, 1, 0, 1, 1, 1]);

        let streaks = compute_streaks(&days, today);
        assert_eq!(streaks.current, 3);
        assert_eq!(streaks.longest, 3);
        assert_eq!(streaks.last_contribution_date, Some(date(2024, 6, 6)));
    }

    #[test]
    fn streak_survives_when_today_is_still_empty() {
        // Last contribution yesterday; today has no entry yet
        let today = date(2024, 6, 7);
        let days = calendar(date(2024, 6, 4), &[1, 1, 1]);

        let streaks = compute_streaks(&days, today);
        assert_eq!(streaks.current, 3);
    }

    #[test]
    fn streak_resets_after_a_missed_day() {
        // Last contribution two days ago
        let today = date(2024, 6, 8);
        let days = calendar(date(2024, 6, 4), &[1, 1, 1]);

        let streaks = compute_streaks(&days, today);
        assert_eq!(streaks.current, 0);
        assert_eq!(streaks.longest, 3);
        assert_eq!(streaks.last_contribution_date, Some(date(2024, 6, 6)));
    }

    #[test]
    fn longest_streak_remembers_older_runs() {
        let today = date(2024, 6, 12);
        // Five-day run, a gap, then a live two-day run
        let mut days = calendar(date(2024, 6, 1), &[1, 1, 1, 1, 1]);
        days.extend(calendar(date(2024, 6, 11), &[1, 1]));

        let streaks = compute_streaks(&days, today);
        assert_eq!(streaks.current, 2);
        assert_eq!(streaks.longest, 5);
    }

    #[test]
    fn absent_dates_break_runs() {
        // Entries only for the 1st and the 3rd; the 2nd is missing
        let today = date(2024, 6, 3);
        let days = vec![
            ContributionDay {
                date: date(2024, 6, 1),
                count: 4,
            },
            ContributionDay {
                date: date(2024, 6, 3),
                count: 2,
            },
        ];

        let streaks = compute_streaks(&days, today);
        assert_eq!(streaks.current, 1);
        assert_eq!(streaks.longest, 1);
    }

    #[test]
    fn future_dates_are_ignored() {
        let today = date(2024, 6, 5);
        let mut days = calendar(date(2024, 6, 4), &[1, 1]);
        days.push(ContributionDay {
            date: date(2024, 6, 9),
            count: 7,
        });

        let streaks = compute_streaks(&days, today);
        assert_eq!(streaks.current, 2);
        assert_eq!(streaks.longest, 2);
        assert_eq!(streaks.last_contribution_date, Some(date(2024, 6, 5)));
    }

    #[test]
    fn empty_calendar_has_no_streaks() {
        let streaks = compute_streaks(&[], date(2024, 6, 1));
        assert_eq!(streaks, StreakState::default());
    }
}
