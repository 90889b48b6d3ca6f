//! Calendar bucketing of run timestamps.
//!
//! Keys for daily/weekly/monthly/yearly buckets are zero-padded date strings
//! so they sort lexicographically in chronological order. Weeks start on
//! Sunday.
use chrono::{Datelike, Days, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::error::ParseError;

const PER_RUN_KEY_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f";
const DAY_KEY_FORMAT: &str = "%Y-%m-%d";

/// Width of a period bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum PeriodDuration {
    #[default]
    PerRun,
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl PeriodDuration {
    pub const ALL: [Self; 5] = [
        Self::PerRun,
        Self::Daily,
        Self::Weekly,
        Self::Monthly,
        Self::Yearly,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PerRun => "per-run",
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
            Self::Yearly => "yearly",
        }
    }
}

impl fmt::Display for PeriodDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PeriodDuration {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "per-run" | "perrun" | "run" => Ok(Self::PerRun),
            "daily" | "day" => Ok(Self::Daily),
            "weekly" | "week" => Ok(Self::Weekly),
            "monthly" | "month" => Ok(Self::Monthly),
            "yearly" | "year" => Ok(Self::Yearly),
            _ => Err(ParseError::Duration(s.to_string())),
        }
    }
}

/// Sunday on or before `date`.
#[must_use]
pub fn week_start(date: NaiveDate) -> NaiveDate {
    let offset = u64::from(date.weekday().num_days_from_sunday());
    date.checked_sub_days(Days::new(offset)).unwrap_or(date)
}

/// Canonical bucket key for `timestamp` at the given granularity.
///
/// Per-run keys are the full timestamp (millisecond precision); the other
/// granularities use the local calendar date.
#[must_use]
pub fn period_key(timestamp: NaiveDateTime, duration: PeriodDuration) -> String {
    let date = timestamp.date();
    match duration {
        PeriodDuration::PerRun => timestamp.format(PER_RUN_KEY_FORMAT).to_string(),
        PeriodDuration::Daily => date.format(DAY_KEY_FORMAT).to_string(),
        PeriodDuration::Weekly => week_start(date).format(DAY_KEY_FORMAT).to_string(),
        PeriodDuration::Monthly => format!("{:04}-{:02}", date.year(), date.month()),
        PeriodDuration::Yearly => format!("{:04}", date.year()),
    }
}

/// Start of the bucket named by `key`, the inverse of [`period_key`].
#[must_use]
pub fn parse_period_key(key: &str, duration: PeriodDuration) -> Option<NaiveDateTime> {
    let start = match duration {
        PeriodDuration::PerRun => {
            return NaiveDateTime::parse_from_str(key, "%Y-%m-%dT%H:%M:%S%.f").ok();
        }
        PeriodDuration::Daily | PeriodDuration::Weekly => {
            NaiveDate::parse_from_str(key, DAY_KEY_FORMAT).ok()?
        }
        PeriodDuration::Monthly => {
            let (year, month) = key.split_once('-')?;
            NaiveDate::from_ymd_opt(year.parse().ok()?, month.parse().ok()?, 1)?
        }
        PeriodDuration::Yearly => NaiveDate::from_ymd_opt(key.parse().ok()?, 1, 1)?,
    };
    start.and_hms_opt(0, 0, 0)
}

/// Order two keys of the same granularity chronologically.
///
/// Per-run keys are compared as parsed timestamps; calendar keys are
/// zero-padded and compare lexicographically.
#[must_use]
pub fn compare_period_keys(a: &str, b: &str, duration: PeriodDuration) -> Ordering {
    if duration == PeriodDuration::PerRun
        && let (Some(left), Some(right)) = (
            parse_period_key(a, duration),
            parse_period_key(b, duration),
        )
    {
        return left.cmp(&right);
    }
    a.cmp(b)
}

/// Short label for a bucket.
///
/// Per-run buckets are numbered from the most recent: `index` 0 is the
/// newest of `total_count` runs and is labelled `Run #total_count`.
#[must_use]
pub fn period_label(
    key: &str,
    duration: PeriodDuration,
    index: Option<usize>,
    total_count: Option<usize>,
) -> String {
    if duration == PeriodDuration::PerRun
        && let (Some(index), Some(total)) = (index, total_count)
    {
        return format!("Run #{}", total.saturating_sub(index));
    }
    let Some(start) = parse_period_key(key, duration) else {
        return key.to_string();
    };
    match duration {
        PeriodDuration::PerRun => start.format("%b %-d %H:%M").to_string(),
        PeriodDuration::Daily | PeriodDuration::Weekly => start.format("%b %-d").to_string(),
        PeriodDuration::Monthly => start.format("%b %y").to_string(),
        PeriodDuration::Yearly => start.format("%Y").to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .and_then(|date| date.and_hms_opt(h, min, 0))
            .unwrap()
    }

    #[test]
    fn weekly_key_is_the_preceding_sunday() {
        // 2024-03-15 is a Friday
        assert_eq!(
            period_key(ts(2024, 3, 15, 18, 45), PeriodDuration::Weekly),
            "2024-03-10"
        );
        // Sunday maps to itself and the following Saturday stays in that week
        assert_eq!(
            period_key(ts(2024, 3, 10, 0, 0), PeriodDuration::Weekly),
            "2024-03-10"
        );
        assert_eq!(
            period_key(ts(2024, 3, 16, 23, 59), PeriodDuration::Weekly),
            "2024-03-10"
        );
        // Crosses a month and year boundary
        assert_eq!(
            period_key(ts(2025, 1, 2, 9, 0), PeriodDuration::Weekly),
            "2024-12-29"
        );
    }

    #[test]
    fn calendar_keys_are_zero_padded() {
        let when = ts(2024, 3, 5, 7, 8);
        assert_eq!(period_key(when, PeriodDuration::Daily), "2024-03-05");
        assert_eq!(period_key(when, PeriodDuration::Monthly), "2024-03");
        assert_eq!(period_key(when, PeriodDuration::Yearly), "2024");
        assert_eq!(
            period_key(when, PeriodDuration::PerRun),
            "2024-03-05T07:08:00.000"
        );
    }

    #[test]
    fn keys_round_trip_to_the_same_bucket() {
        let samples = [
            ts(2023, 12, 31, 23, 59),
            ts(2024, 2, 29, 12, 0),
            ts(2024, 3, 15, 0, 0),
            ts(2024, 7, 4, 16, 20),
        ];
        for when in samples {
            for duration in PeriodDuration::ALL {
                let key = period_key(when, duration);
                let start = parse_period_key(&key, duration).unwrap();
                assert_eq!(period_key(start, duration), key, "{duration} {when}");
                assert!(start <= when);
            }
        }
    }

    #[test]
    fn per_run_keys_compare_chronologically() {
        let earlier = period_key(ts(2024, 3, 1, 9, 0), PeriodDuration::PerRun);
        let later = period_key(ts(2024, 3, 1, 10, 0), PeriodDuration::PerRun);
        assert_eq!(
            compare_period_keys(&earlier, &later, PeriodDuration::PerRun),
            Ordering::Less
        );
        assert_eq!(
            compare_period_keys("2024-02", "2024-10", PeriodDuration::Monthly),
            Ordering::Less
        );
    }

    #[test]
    fn per_run_labels_count_down_from_most_recent() {
        let key = "2024-03-01T09:00:00.000";
        assert_eq!(
            period_label(key, PeriodDuration::PerRun, Some(0), Some(12)),
            "Run #12"
        );
        assert_eq!(
            period_label(key, PeriodDuration::PerRun, Some(11), Some(12)),
            "Run #1"
        );
        assert_eq!(
            period_label(key, PeriodDuration::PerRun, None, None),
            "Mar 1 09:00"
        );
    }

    #[test]
    fn calendar_labels_are_short() {
        assert_eq!(
            period_label("2024-03-10", PeriodDuration::Weekly, None, None),
            "Mar 10"
        );
        assert_eq!(
            period_label("2024-03", PeriodDuration::Monthly, None, None),
            "Mar 24"
        );
        assert_eq!(period_label("2024", PeriodDuration::Yearly, None, None), "2024");
        assert_eq!(
            period_label("garbage", PeriodDuration::Daily, None, None),
            "garbage"
        );
    }

    #[test]
    fn durations_parse_from_flags() {
        assert_eq!("per-run".parse::<PeriodDuration>(), Ok(PeriodDuration::PerRun));
        assert_eq!("PER_RUN".parse::<PeriodDuration>(), Ok(PeriodDuration::PerRun));
        assert_eq!("weekly".parse::<PeriodDuration>(), Ok(PeriodDuration::Weekly));
        assert!("fortnightly".parse::<PeriodDuration>().is_err());
    }
}
